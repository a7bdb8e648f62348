//! Text-command dispatch for chat bots.
//!
//! This crate turns chat messages such as `!admin kick bob --reason spam`
//! into calls on a tree of registered commands. It provides:
//! - A command tree with aliases, nested subcommands and permission groups
//! - Typed per-command flags that are reset after every invocation
//! - Argument-count validators
//! - Ordered pre-run and post-run hooks around each handler
//! - Help documents built from the command declarations
//!
//! # Architecture
//!
//! Commands are declared with the [`CommandNode`] builder and attached to a
//! [`CommandTree`] at startup. The tree is then handed to a [`Dispatcher`],
//! after which only flag values change. Transports feed the dispatcher an
//! [`IncomingMessage`] and receive replies through a [`MessageSink`].
//!
//! # Example
//!
//! ```rust,ignore
//! use parley_commands::prelude::*;
//!
//! let mut tree = CommandTree::new(CommandNode::new("bot"));
//! tree.add_child(
//!     tree.root(),
//!     CommandNode::new("echo")
//!         .usage("!echo <text>")
//!         .args(ArgValidator::minimum(1))
//!         .bool_flag("upper", Some('u'), false, "Shout the reply")
//!         .run(|inv| {
//!             let text = inv.args().join(" ");
//!             let upper = inv.flags().get_bool("upper").unwrap_or(false);
//!             inv.reply(&if upper { text.to_uppercase() } else { text })?;
//!             Ok(())
//!         }),
//! )?;
//!
//! let dispatcher = Dispatcher::new(tree, DispatchConfig::from_env());
//! dispatcher.process(&IncomingMessage::new("general", "!echo -u hi"), &sink)?;
//! ```
//!
//! # Configuration
//!
//! [`DispatchConfig`] can be loaded from TOML or from the environment:
//! - `PARLEY_PREFIX` - Command prefix character (default `!`)
//! - `PARLEY_HELP_ACCENT` - Help accent colour (default `0xFF00FF`)

pub mod config;
pub mod dispatch;
pub mod error;
pub mod flags;
pub mod help;
mod hooks;
pub mod message;
pub mod node;
pub mod permission;
pub mod tree;
pub mod validate;

pub use config::DispatchConfig;
pub use dispatch::{Dispatcher, Invocation, Outcome};
pub use error::{ConfigError, DeliveryError, DispatchError, RegistrationError};
pub use flags::{FlagError, FlagKind, FlagSpec, FlagValue, Flags};
pub use help::{HelpDocument, HelpField, HelpSection};
pub use hooks::HookPhase;
pub use message::{Delivery, IncomingMessage, MessageSink, RecordingSink};
pub use node::{CommandFn, CommandNode};
pub use permission::has_permission;
pub use tree::{CommandTree, NodeId};
pub use validate::{ArgValidator, ArgsError};

/// Common imports for declaring commands and wiring a transport.
pub mod prelude {
    pub use crate::{
        ArgValidator, CommandNode, CommandTree, DispatchConfig, Dispatcher, IncomingMessage,
        Invocation, MessageSink, Outcome,
    };
}
