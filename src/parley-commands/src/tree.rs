//! Command tree and registration.
//!
//! Commands live in an arena owned by the tree. Parent links are plain
//! [`NodeId`]s used for lookups only; ownership flows from the tree down.

use tracing::debug;

use crate::error::RegistrationError;
use crate::flags::{FlagSpec, FlagValue, HELP_FLAG, HELP_SHORTHAND};
use crate::node::CommandNode;
use crate::permission::eq_fold;

/// Handle to a command inside a [`CommandTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// A tree of commands rooted at a single, unnamed-in-chat root.
///
/// The root is never matched by name; its children are the top-level
/// commands a message can address.
#[derive(Debug)]
pub struct CommandTree {
    nodes: Vec<CommandNode>,
}

impl CommandTree {
    pub fn new(root: CommandNode) -> Self {
        Self { nodes: vec![root] }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Store a command without attaching it.
    pub fn insert(&mut self, node: CommandNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Insert `node` and attach it beneath `parent`.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        node: CommandNode,
    ) -> Result<NodeId, RegistrationError> {
        let id = self.insert(node);
        self.attach(parent, &[id])?;
        Ok(id)
    }

    /// Insert and attach several commands, in order.
    pub fn add_children<I>(
        &mut self,
        parent: NodeId,
        nodes: I,
    ) -> Result<Vec<NodeId>, RegistrationError>
    where
        I: IntoIterator<Item = CommandNode>,
    {
        nodes
            .into_iter()
            .map(|node| self.add_child(parent, node))
            .collect()
    }

    /// Attach already-inserted commands beneath `parent`.
    ///
    /// Each child gains the implicit `--help`/`-h` flag. Aliases the child
    /// was built with are checked against siblings attached so far.
    pub fn attach(&mut self, parent: NodeId, children: &[NodeId]) -> Result<(), RegistrationError> {
        for &child in children {
            if child == parent {
                return Err(RegistrationError::SelfReference(
                    self.node(child).name.clone(),
                ));
            }
            if self.ancestors(parent).any(|a| a == child) {
                return Err(RegistrationError::Cycle {
                    child: self.node(child).name.clone(),
                    parent: self.node(parent).name.clone(),
                });
            }
            if let Some(current) = self.node(child).parent {
                return Err(RegistrationError::AlreadyAttached {
                    child: self.node(child).name.clone(),
                    parent: self.node(current).name.clone(),
                });
            }

            let aliases = self.node(child).aliases.clone();
            self.check_sibling_aliases(parent, &aliases)?;

            let node = &mut self.nodes[child.0];
            node.flags.schema().check(&node.name)?;
            let name = node.name.clone();
            node.flags.declare(
                &name,
                FlagSpec::new(
                    HELP_FLAG,
                    Some(HELP_SHORTHAND),
                    FlagValue::Bool(false),
                    "Print the help dialog",
                ),
            )?;
            node.parent = Some(parent);
            self.nodes[parent.0].children.push(child);

            debug!(
                "Registered command: {} under {}",
                self.path(child),
                self.node(parent).name
            );
        }
        Ok(())
    }

    /// Replace the aliases of an attached command.
    ///
    /// The new aliases are checked against every alias currently registered
    /// under the parent, the command's own included. Only siblings attached
    /// before this call are checked; a sibling attached later with a
    /// colliding alias is not rejected here.
    pub fn add_aliases<I, S>(&mut self, id: NodeId, aliases: I) -> Result<(), RegistrationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let aliases: Vec<String> = aliases.into_iter().map(Into::into).collect();
        let parent = self
            .node(id)
            .parent
            .ok_or_else(|| RegistrationError::Detached(self.node(id).name.clone()))?;
        self.check_sibling_aliases(parent, &aliases)?;

        debug!("Aliases {:?} set on {}", aliases, self.path(id));
        self.nodes[id.0].aliases = aliases;
        Ok(())
    }

    fn check_sibling_aliases(
        &self,
        parent: NodeId,
        aliases: &[String],
    ) -> Result<(), RegistrationError> {
        for &sibling in self.children(parent) {
            let sibling = self.node(sibling);
            for existing in &sibling.aliases {
                if aliases.iter().any(|a| eq_fold(a, existing)) {
                    return Err(RegistrationError::DuplicateAlias {
                        alias: existing.clone(),
                        sibling: sibling.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> &CommandNode {
        &self.nodes[id.0]
    }

    #[cfg(test)]
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut CommandNode {
        &mut self.nodes[id.0]
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// First child, in registration order, answering to `token`.
    ///
    /// Permissions are not considered.
    pub fn find_child(&self, id: NodeId, token: &str) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|&child| self.node(child).matches(token))
    }

    /// Walk from `id`'s parent up to the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(id), move |&n| self.parent(n)).skip(1)
    }

    /// Space separated command names from the top level down to `id`.
    pub fn path(&self, id: NodeId) -> String {
        let mut names: Vec<&str> = std::iter::once(id)
            .chain(self.ancestors(id))
            .filter(|&n| n != self.root())
            .map(|n| self.node(n).name.as_str())
            .collect();
        names.reverse();
        names.join(" ")
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &CommandNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }
}
