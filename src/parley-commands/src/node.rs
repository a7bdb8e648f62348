//! A single addressable command and its builder.

use std::fmt;
use std::sync::Arc;

use crate::dispatch::Invocation;
use crate::flags::{FlagSpec, FlagState, FlagValue};
use crate::permission::{eq_fold, has_permission};
use crate::tree::NodeId;
use crate::validate::ArgValidator;

/// Signature shared by handlers, pre-run hooks and post-run hooks.
pub type CommandFn = Arc<dyn Fn(&Invocation<'_>) -> anyhow::Result<()> + Send + Sync>;

/// Overrides applied when building a command's help document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HelpOverrides {
    pub title: Option<String>,
    pub description: Option<String>,
    pub accent: Option<u32>,
}

/// A registered command.
///
/// Built with the chained setters below, then attached to a
/// [`crate::CommandTree`]. After the tree is handed to a
/// [`crate::Dispatcher`] only the flag values change.
pub struct CommandNode {
    pub(crate) name: String,
    pub(crate) aliases: Vec<String>,
    pub(crate) usage: String,
    pub(crate) short: String,
    pub(crate) long: String,
    pub(crate) help: HelpOverrides,
    pub(crate) validator: Option<ArgValidator>,
    pub(crate) pre_run: Vec<CommandFn>,
    pub(crate) run: Option<CommandFn>,
    pub(crate) post_run: Vec<CommandFn>,
    pub(crate) groups: Vec<String>,
    pub(crate) hidden: bool,
    pub(crate) flags: FlagState,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl fmt::Debug for CommandNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandNode")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("groups", &self.groups)
            .field("hidden", &self.hidden)
            .field("validator", &self.validator)
            .field("pre_run", &self.pre_run.len())
            .field("runnable", &self.run.is_some())
            .field("post_run", &self.post_run.len())
            .field("flags", self.flags.schema())
            .field("parent", &self.parent)
            .field("children", &self.children)
            .finish()
    }
}

impl CommandNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            usage: String::new(),
            short: String::new(),
            long: String::new(),
            help: HelpOverrides::default(),
            validator: None,
            pre_run: Vec::new(),
            run: None,
            post_run: Vec::new(),
            groups: Vec::new(),
            hidden: false,
            flags: FlagState::default(),
            parent: None,
            children: Vec::new(),
        }
    }

    /// Aliases checked against siblings when the command is attached.
    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    /// Example usage, shown in help.
    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }

    /// One-line description shown in the parent's command listing.
    pub fn short(mut self, short: impl Into<String>) -> Self {
        self.short = short.into();
        self
    }

    /// Full description shown in this command's help.
    pub fn long(mut self, long: impl Into<String>) -> Self {
        self.long = long.into();
        self
    }

    pub fn help_title(mut self, title: impl Into<String>) -> Self {
        self.help.title = Some(title.into());
        self
    }

    pub fn help_description(mut self, description: impl Into<String>) -> Self {
        self.help.description = Some(description.into());
        self
    }

    pub fn help_accent(mut self, accent: u32) -> Self {
        self.help.accent = Some(accent);
        self
    }

    pub fn args(mut self, validator: ArgValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn pre_run<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.pre_run.push(Arc::new(hook));
        self
    }

    pub fn run<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.run = Some(Arc::new(handler));
        self
    }

    pub fn post_run<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.post_run.push(Arc::new(hook));
        self
    }

    /// Permission groups; an empty set leaves the command unrestricted.
    pub fn groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }

    /// Hide the command from its parent's help listing.
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn flag(mut self, spec: FlagSpec) -> Self {
        self.flags.push_unchecked(spec);
        self
    }

    pub fn bool_flag(
        self,
        name: &str,
        shorthand: Option<char>,
        default: bool,
        usage: &str,
    ) -> Self {
        self.flag(FlagSpec::new(name, shorthand, FlagValue::Bool(default), usage))
    }

    pub fn string_flag(
        self,
        name: &str,
        shorthand: Option<char>,
        default: &str,
        usage: &str,
    ) -> Self {
        self.flag(FlagSpec::new(
            name,
            shorthand,
            FlagValue::Str(default.to_string()),
            usage,
        ))
    }

    pub fn int_flag(self, name: &str, shorthand: Option<char>, default: i64, usage: &str) -> Self {
        self.flag(FlagSpec::new(name, shorthand, FlagValue::Int(default), usage))
    }

    pub fn float_flag(
        self,
        name: &str,
        shorthand: Option<char>,
        default: f64,
        usage: &str,
    ) -> Self {
        self.flag(FlagSpec::new(name, shorthand, FlagValue::Float(default), usage))
    }

    pub fn list_flag(self, name: &str, shorthand: Option<char>, usage: &str) -> Self {
        self.flag(FlagSpec::new(name, shorthand, FlagValue::List(Vec::new()), usage))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alias_list(&self) -> &[String] {
        &self.aliases
    }

    pub fn usage_text(&self) -> &str {
        &self.usage
    }

    pub fn short_text(&self) -> &str {
        &self.short
    }

    pub fn long_text(&self) -> &str {
        &self.long
    }

    pub fn help_overrides(&self) -> &HelpOverrides {
        &self.help
    }

    pub fn group_list(&self) -> &[String] {
        &self.groups
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn is_runnable(&self) -> bool {
        self.run.is_some()
    }

    pub fn flags(&self) -> &FlagState {
        &self.flags
    }

    /// Whether `token` is this command's name or one of its aliases.
    pub fn matches(&self, token: &str) -> bool {
        eq_fold(&self.name, token) || self.aliases.iter().any(|a| eq_fold(a, token))
    }

    pub fn has_permission<S: AsRef<str>>(&self, requester: &[S]) -> bool {
        has_permission(&self.groups, requester)
    }

    /// All names this command answers to.
    pub fn all_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}
