//! Dispatcher configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;
use crate::help::DEFAULT_ACCENT;

/// Settings shared by every message a [`crate::Dispatcher`] processes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Leading character marking a message as a command.
    #[serde(default = "default_prefix")]
    pub prefix: char,

    /// Accent used for help documents that don't override it.
    #[serde(default = "default_help_accent")]
    pub help_accent: u32,

    /// Replace em-dashes with `--` before tokenizing. Phone keyboards
    /// autocorrect `--` into an em-dash.
    #[serde(default = "default_true")]
    pub normalize_em_dash: bool,
}

fn default_prefix() -> char {
    '!'
}

fn default_help_accent() -> u32 {
    DEFAULT_ACCENT
}

fn default_true() -> bool {
    true
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            help_accent: default_help_accent(),
            normalize_em_dash: true,
        }
    }
}

impl DispatchConfig {
    pub fn with_prefix(prefix: char) -> Self {
        Self {
            prefix,
            ..Self::default()
        }
    }

    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load from environment variables.
    ///
    /// - `PARLEY_PREFIX` - a single character
    /// - `PARLEY_HELP_ACCENT` - hex (`0xFF00FF` / `FF00FF`) or decimal
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(prefix) = std::env::var("PARLEY_PREFIX") {
            match parse_prefix(&prefix) {
                Some(c) => config.prefix = c,
                None => warn!("Ignoring PARLEY_PREFIX={prefix:?}: expected a single character"),
            }
        }

        if let Ok(accent) = std::env::var("PARLEY_HELP_ACCENT") {
            match parse_accent(&accent) {
                Some(value) => config.help_accent = value,
                None => warn!("Ignoring PARLEY_HELP_ACCENT={accent:?}: not a colour value"),
            }
        }

        config
    }
}

/// Accept exactly one non-whitespace character.
pub fn parse_prefix(value: &str) -> Option<char> {
    let mut chars = value.trim().chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

fn parse_accent(value: &str) -> Option<u32> {
    let value = value.trim();
    let hex = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .or_else(|| value.strip_prefix('#'));
    match hex {
        Some(digits) => u32::from_str_radix(digits, 16).ok(),
        None => value
            .parse()
            .ok()
            .or_else(|| u32::from_str_radix(value, 16).ok()),
    }
}
