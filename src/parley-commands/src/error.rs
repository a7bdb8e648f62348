//! Error types for command registration and dispatch.
//!
//! Errors fall into two tiers:
//! - [`RegistrationError`] is raised while the command tree is being built
//!   and indicates a programming mistake. Startup should abort on it.
//! - [`DispatchError`] is raised while a single message is being processed.
//!   It is reported to the requester and returned to the caller, never fatal.

use thiserror::Error;

use crate::flags::FlagError;
use crate::validate::ArgsError;

/// Errors raised while wiring up the command tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// A command was attached to itself.
    #[error("Command '{0}' cannot be a child of itself")]
    SelfReference(String),

    /// Attaching the child would make a command its own descendant.
    #[error("Command '{child}' is an ancestor of '{parent}' and cannot be attached beneath it")]
    Cycle {
        /// Command being attached.
        child: String,
        /// Intended parent.
        parent: String,
    },

    /// The child already belongs to another parent.
    #[error("Command '{child}' is already attached to '{parent}'")]
    AlreadyAttached {
        /// Command being attached.
        child: String,
        /// Current parent.
        parent: String,
    },

    /// An alias collides with an alias of an already-registered sibling.
    #[error("Alias {alias} redefined in command {sibling}")]
    DuplicateAlias {
        /// The colliding alias.
        alias: String,
        /// Sibling that already declares it.
        sibling: String,
    },

    /// Aliases can only be added to a command that has a parent.
    #[error("Command '{0}' has no parent; attach it before adding aliases")]
    Detached(String),

    /// A flag long name was declared twice on one command.
    #[error("Flag --{flag} redefined in command {command}")]
    DuplicateFlag {
        /// Flag long name.
        flag: String,
        /// Declaring command.
        command: String,
    },

    /// A flag shorthand was declared twice on one command.
    #[error("Flag shorthand -{shorthand} redefined in command {command}")]
    DuplicateShorthand {
        /// Flag shorthand.
        shorthand: char,
        /// Declaring command.
        command: String,
    },
}

/// Errors returned from processing a single message.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Argument count did not satisfy the command's validator.
    #[error(transparent)]
    Args(#[from] ArgsError),

    /// Flag tokens could not be parsed.
    #[error(transparent)]
    Flags(#[from] FlagError),

    /// A pre-run hook failed; the handler did not run.
    #[error("{command}: {source}")]
    PreHook {
        /// Resolved command name.
        command: String,
        /// Error returned by the hook.
        source: anyhow::Error,
    },

    /// The command handler failed.
    #[error("{command}: {source}")]
    Handler {
        /// Resolved command name.
        command: String,
        /// Error returned by the handler.
        source: anyhow::Error,
    },

    /// A post-run hook failed after the handler completed.
    #[error("{command}: {source}")]
    PostHook {
        /// Resolved command name.
        command: String,
        /// Error returned by the hook.
        source: anyhow::Error,
    },

    /// Help output could not be delivered.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

impl DispatchError {
    /// Name of the command the error was raised for, when one was resolved.
    pub fn command(&self) -> Option<&str> {
        match self {
            DispatchError::PreHook { command, .. }
            | DispatchError::Handler { command, .. }
            | DispatchError::PostHook { command, .. } => Some(command),
            _ => None,
        }
    }
}

/// Failure to hand output to the chat transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Delivery to channel {channel_id} failed: {message}")]
pub struct DeliveryError {
    /// Destination channel.
    pub channel_id: String,
    /// Transport-specific reason.
    pub message: String,
}

impl DeliveryError {
    /// Create a new delivery error.
    pub fn new(channel_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            message: message.into(),
        }
    }
}

/// Errors raised while loading dispatcher configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML for [`crate::DispatchConfig`].
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
