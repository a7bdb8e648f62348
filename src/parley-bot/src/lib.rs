//! Console chat bot built on `parley-commands`.
//!
//! Each line read from stdin is treated as a chat message posted to a single
//! channel by a single member. Replies and help are printed to stdout, logs
//! go to stderr.

pub mod commands;
pub mod console;

pub use commands::build_tree;
pub use console::ConsoleSink;
