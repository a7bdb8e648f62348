//! Message dispatch.
//!
//! [`Dispatcher::process`] tokenizes an inbound message, walks the command
//! tree one token at a time and runs the resolved command:
//!
//! 1. The first token picks a permitted top-level command.
//! 2. That command's flags are locked. If the next positional token names
//!    one of its children, the walk continues there with the parent's lock
//!    still held.
//! 3. At the resolved command every token left is parsed against the flags
//!    of the whole locked path, then help, argument validation, pre-run
//!    hooks, the handler and post-run hooks run in that order.
//! 4. Locks are released leaf first. Each command's flags are reset to
//!    their defaults as its lock is released, whatever the outcome.
//!
//! Two messages addressing the same command serialize on its lock; messages
//! addressing different commands run in parallel. Handlers must not
//! dispatch back into a command on their own path, as the lock is not
//! reentrant.

use std::fmt;

use tracing::{debug, warn};

use crate::config::DispatchConfig;
use crate::error::{DeliveryError, DispatchError};
use crate::flags::{self, FlagGuard, Flags, HELP_FLAG};
use crate::help::HelpDocument;
use crate::hooks::{self, HookPhase};
use crate::message::{IncomingMessage, MessageSink};
use crate::node::CommandNode;
use crate::tree::{CommandTree, NodeId};

/// Root-level token that prints the root help.
const ROOT_HELP: &str = "help";

/// What [`Dispatcher::process`] did with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The message is too short or lacks the prefix.
    NotCommand,
    /// No permitted command answers to the tokens.
    NoMatch,
    /// A help document was delivered for `command`.
    Help { command: String },
    /// `command`'s handler ran and every hook succeeded.
    Executed { command: String },
}

/// Per-message context threaded through resolution.
#[derive(Clone, Copy)]
struct Request<'m> {
    message: &'m IncomingMessage,
    sink: &'m dyn MessageSink,
}

/// Resolves messages against a frozen [`CommandTree`].
///
/// The dispatcher is `Sync`; share it between threads by reference or
/// behind an `Arc`.
#[derive(Debug)]
pub struct Dispatcher {
    tree: CommandTree,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(tree: CommandTree, config: DispatchConfig) -> Self {
        Self { tree, config }
    }

    pub fn with_prefix(tree: CommandTree, prefix: char) -> Self {
        Self::new(tree, DispatchConfig::with_prefix(prefix))
    }

    pub fn tree(&self) -> &CommandTree {
        &self.tree
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn prefix(&self) -> char {
        self.config.prefix
    }

    /// Help for `id` as seen by a requester in `groups`.
    pub fn help<S: AsRef<str>>(&self, id: NodeId, groups: &[S]) -> HelpDocument {
        HelpDocument::build(&self.tree, id, groups, self.config.help_accent)
    }

    /// Split a message into tokens with the prefix removed.
    ///
    /// Returns `None` when the message is one character or shorter, or does
    /// not start with the prefix.
    pub fn tokenize(&self, content: &str) -> Option<Vec<String>> {
        let mut chars = content.chars();
        match (chars.next(), chars.next()) {
            (Some(first), Some(_)) if first == self.config.prefix => {}
            _ => return None,
        }

        let normalized = if self.config.normalize_em_dash {
            content.replace('\u{2014}', "--")
        } else {
            content.to_string()
        };

        let mut tokens: Vec<String> = normalized.split_whitespace().map(str::to_string).collect();
        if let Some(first) = tokens.first_mut()
            && let Some(stripped) = first.strip_prefix(self.config.prefix)
        {
            *first = stripped.to_string();
        }
        Some(tokens)
    }

    /// Process one inbound message.
    ///
    /// Invocation faults (bad flags, rejected arguments, failing hooks or
    /// handler) are delivered to the message's channel as text and returned.
    /// Messages that are not commands, or that address nothing the requester
    /// may invoke, are silently ignored.
    pub fn process(
        &self,
        message: &IncomingMessage,
        sink: &dyn MessageSink,
    ) -> Result<Outcome, DispatchError> {
        let Some(mut tokens) = self.tokenize(&message.content) else {
            return Ok(Outcome::NotCommand);
        };
        if tokens.is_empty() {
            return Ok(Outcome::NoMatch);
        }

        let request = Request { message, sink };
        let name = tokens.remove(0);
        let root = self.tree.root();

        if name == ROOT_HELP {
            self.deliver_help(root, request)?;
            return Ok(Outcome::Help {
                command: self.tree.node(root).name().to_string(),
            });
        }

        let mut scope = Vec::new();
        self.resolve(root, &name, tokens, &mut scope, request)
    }

    /// Match `name` among `parent`'s permitted children and lock the match
    /// for the rest of the walk.
    fn resolve<'t>(
        &'t self,
        parent: NodeId,
        name: &str,
        rest: Vec<String>,
        scope: &mut Vec<FlagGuard<'t>>,
        request: Request<'_>,
    ) -> Result<Outcome, DispatchError> {
        let groups = &request.message.groups;
        let matched = self.tree.children(parent).iter().copied().find(|&child| {
            let node = self.tree.node(child);
            node.matches(name) && node.has_permission(groups)
        });
        let Some(id) = matched else {
            debug!(
                "No permitted command {:?} under {}",
                name,
                self.tree.node(parent).name()
            );
            return Ok(Outcome::NoMatch);
        };

        scope.push(self.tree.node(id).flags().acquire());
        let result = self.descend(id, rest, scope, request);
        scope.pop();
        result
    }

    /// Continue into a child named by the next positional token, or run `id`.
    ///
    /// The lookahead only compares names; permission is checked when the
    /// child is resolved, so a forbidden child ends the walk with no match.
    fn descend<'t>(
        &'t self,
        id: NodeId,
        mut tokens: Vec<String>,
        scope: &mut Vec<FlagGuard<'t>>,
        request: Request<'_>,
    ) -> Result<Outcome, DispatchError> {
        if !self.tree.children(id).is_empty()
            && let Some(pos) = flags::first_positional(&tokens, scope)
            && self.tree.find_child(id, &tokens[pos]).is_some()
        {
            let name = tokens.remove(pos);
            return self.resolve(id, &name, tokens, scope, request);
        }
        self.execute(id, tokens, scope, request)
    }

    fn execute<'t>(
        &'t self,
        id: NodeId,
        tokens: Vec<String>,
        scope: &mut Vec<FlagGuard<'t>>,
        request: Request<'_>,
    ) -> Result<Outcome, DispatchError> {
        let node = self.tree.node(id);
        let command = self.tree.path(id);
        debug!(
            "Resolved command {} for channel {}",
            command, request.message.channel_id
        );

        let args = match flags::parse(&tokens, scope) {
            Ok(args) => args,
            Err(err) => return Err(self.report(request, err.into())),
        };
        let flags = Flags::new(scope.as_slice());

        if flags.get_bool(HELP_FLAG) == Some(true) || !node.is_runnable() {
            self.deliver_help(id, request)?;
            return Ok(Outcome::Help { command });
        }

        if let Some(validator) = &node.validator
            && let Err(err) = validator.validate(node, &args)
        {
            return Err(self.report(request, err.into()));
        }

        let invocation = Invocation {
            tree: &self.tree,
            id,
            node,
            args: &args,
            flags,
            message: request.message,
            sink: request.sink,
            accent: self.config.help_accent,
        };

        hooks::run(HookPhase::Pre, &node.pre_run, &invocation)
            .map_err(|err| self.report(request, err))?;

        if let Some(run) = &node.run {
            run(&invocation).map_err(|source| {
                self.report(
                    request,
                    DispatchError::Handler {
                        command: command.clone(),
                        source,
                    },
                )
            })?;
        }

        hooks::run(HookPhase::Post, &node.post_run, &invocation)
            .map_err(|err| self.report(request, err))?;

        Ok(Outcome::Executed { command })
    }

    fn deliver_help(&self, id: NodeId, request: Request<'_>) -> Result<(), DispatchError> {
        let help = self.help(id, &request.message.groups);
        request
            .sink
            .send_help(&request.message.channel_id, &help)
            .map_err(|err| {
                warn!("Failed to deliver help for {}: {}", self.tree.path(id), err);
                err.into()
            })
    }

    /// Deliver `err` to the requester and hand it back for returning.
    fn report(&self, request: Request<'_>, err: DispatchError) -> DispatchError {
        let channel = &request.message.channel_id;
        if let Err(delivery) = request.sink.send_text(channel, &err.to_string()) {
            warn!("Failed to report error to channel {}: {}", channel, delivery);
        }
        err
    }
}

/// Everything a handler or hook can see about the current invocation.
pub struct Invocation<'a> {
    tree: &'a CommandTree,
    id: NodeId,
    node: &'a CommandNode,
    args: &'a [String],
    flags: Flags<'a>,
    message: &'a IncomingMessage,
    sink: &'a dyn MessageSink,
    accent: u32,
}

impl<'a> Invocation<'a> {
    pub fn command_name(&self) -> &'a str {
        self.node.name()
    }

    /// Space separated names from the top-level command down.
    pub fn path(&self) -> String {
        self.tree.path(self.id)
    }

    pub fn node_id(&self) -> NodeId {
        self.id
    }

    pub fn node(&self) -> &'a CommandNode {
        self.node
    }

    pub fn tree(&self) -> &'a CommandTree {
        self.tree
    }

    /// Positional arguments left after flag parsing.
    pub fn args(&self) -> &'a [String] {
        self.args
    }

    /// Flags of the command and every ancestor on its path.
    pub fn flags(&self) -> Flags<'a> {
        self.flags
    }

    pub fn message(&self) -> &'a IncomingMessage {
        self.message
    }

    pub fn channel_id(&self) -> &'a str {
        &self.message.channel_id
    }

    pub fn groups(&self) -> &'a [String] {
        &self.message.groups
    }

    /// Post text to the channel the message came from.
    pub fn reply(&self, text: &str) -> Result<(), DeliveryError> {
        self.sink.send_text(&self.message.channel_id, text)
    }

    /// Post this command's help to the channel the message came from.
    pub fn reply_help(&self) -> Result<(), DeliveryError> {
        let help = HelpDocument::build(self.tree, self.id, &self.message.groups, self.accent);
        self.sink.send_help(&self.message.channel_id, &help)
    }
}

impl fmt::Debug for Invocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("command", &self.path())
            .field("args", &self.args)
            .field("flags", &self.flags)
            .field("channel_id", &self.message.channel_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Delivery, RecordingSink};
    use pretty_assertions::assert_eq;

    fn dispatcher() -> Dispatcher {
        let mut tree = CommandTree::new(CommandNode::new("bot").long("Test bot"));
        tree.add_child(
            tree.root(),
            CommandNode::new("ping").short("Pong").run(|inv| {
                inv.reply("pong")?;
                Ok(())
            }),
        )
        .unwrap();
        Dispatcher::with_prefix(tree, '!')
    }

    #[test]
    fn test_tokenize() {
        let d = dispatcher();

        assert_eq!(d.tokenize("!ping a  b"), Some(vec!["ping".into(), "a".into(), "b".into()]));
        assert_eq!(d.tokenize("!"), None);
        assert_eq!(d.tokenize(""), None);
        assert_eq!(d.tokenize("?ping"), None);
        assert_eq!(d.tokenize(" !ping"), None);
        assert_eq!(d.tokenize("! ping"), Some(vec!["".into(), "ping".into()]));
    }

    #[test]
    fn test_tokenize_counts_characters() {
        let d = Dispatcher::with_prefix(CommandTree::new(CommandNode::new("bot")), '→');
        assert_eq!(d.tokenize("→"), None);
        assert_eq!(d.tokenize("→x"), Some(vec!["x".into()]));
    }

    #[test]
    fn test_tokenize_em_dash() {
        let d = dispatcher();
        assert_eq!(
            d.tokenize("!echo \u{2014}upper hi"),
            Some(vec!["echo".into(), "--upper".into(), "hi".into()])
        );

        let config = DispatchConfig {
            normalize_em_dash: false,
            ..DispatchConfig::default()
        };
        let d = Dispatcher::new(CommandTree::new(CommandNode::new("bot")), config);
        assert_eq!(
            d.tokenize("!echo \u{2014}upper"),
            Some(vec!["echo".into(), "\u{2014}upper".into()])
        );
    }

    #[test]
    fn test_process_ping() {
        let d = dispatcher();
        let sink = RecordingSink::new();

        let outcome = d.process(&IncomingMessage::new("C1", "!ping"), &sink).unwrap();

        assert_eq!(outcome, Outcome::Executed { command: "ping".into() });
        assert_eq!(
            sink.deliveries(),
            vec![Delivery::Text {
                channel_id: "C1".into(),
                text: "pong".into()
            }]
        );
    }

    #[test]
    fn test_not_command_and_empty_token() {
        let d = dispatcher();
        let sink = RecordingSink::new();

        assert_eq!(d.process(&IncomingMessage::new("C1", "ping"), &sink).unwrap(), Outcome::NotCommand);
        assert_eq!(d.process(&IncomingMessage::new("C1", "! ping"), &sink).unwrap(), Outcome::NoMatch);
        assert_eq!(d.process(&IncomingMessage::new("C1", "!pong"), &sink).unwrap(), Outcome::NoMatch);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_root_help() {
        let d = dispatcher();
        let sink = RecordingSink::new();

        let outcome = d.process(&IncomingMessage::new("C1", "!help"), &sink).unwrap();
        assert_eq!(outcome, Outcome::Help { command: "bot".into() });

        let helps = sink.helps();
        assert_eq!(helps.len(), 1);
        assert_eq!(helps[0].title, "Help: bot");
        assert_eq!(helps[0].description, "Test bot");

        // The root keyword is matched exactly.
        sink.clear();
        assert_eq!(d.process(&IncomingMessage::new("C1", "!HELP"), &sink).unwrap(), Outcome::NoMatch);
    }

    #[test]
    fn test_delivery_failure_is_returned() {
        struct ClosedSink;
        impl MessageSink for ClosedSink {
            fn send_text(&self, channel_id: &str, _: &str) -> Result<(), DeliveryError> {
                Err(DeliveryError::new(channel_id, "closed"))
            }
            fn send_help(&self, channel_id: &str, _: &HelpDocument) -> Result<(), DeliveryError> {
                Err(DeliveryError::new(channel_id, "closed"))
            }
        }

        let d = dispatcher();
        let err = d.process(&IncomingMessage::new("C1", "!help"), &ClosedSink).unwrap_err();
        assert!(matches!(err, DispatchError::Delivery(_)));

        // A handler's failed reply surfaces as a handler error.
        let err = d.process(&IncomingMessage::new("C1", "!ping"), &ClosedSink).unwrap_err();
        assert_eq!(err.command(), Some("ping"));
    }
}
