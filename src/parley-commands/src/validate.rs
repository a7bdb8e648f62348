//! Argument-count validators.
//!
//! A validator inspects the positional arguments left after flag parsing and
//! either accepts them or returns an [`ArgsError`] describing the expected
//! constraint and the count that was received.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::node::CommandNode;

/// Argument validation failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgsError {
    #[error("command doesn't accept args, received {received}")]
    NoArgs { received: usize },

    #[error("command accepts {expected} arg(s), received {received}")]
    Exact { expected: usize, received: usize },

    #[error("command accepts at least {min} arg(s), received {received}")]
    Minimum { min: usize, received: usize },

    #[error("command accepts up to {max} arg(s), received {received}")]
    Maximum { max: usize, received: usize },

    #[error("command accepts between {min} and {max} arg(s), received {received}")]
    Range {
        min: usize,
        max: usize,
        received: usize,
    },

    /// Raised by user-supplied validators.
    #[error("{0}")]
    Custom(String),
}

type ValidateFn = dyn Fn(&CommandNode, &[String]) -> Result<(), ArgsError> + Send + Sync;

/// A pluggable predicate over a command's positional arguments.
#[derive(Clone)]
pub struct ArgValidator {
    name: &'static str,
    check: Arc<ValidateFn>,
}

impl fmt::Debug for ArgValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ArgValidator").field(&self.name).finish()
    }
}

impl ArgValidator {
    /// Wrap an arbitrary validation function.
    pub fn custom<F>(check: F) -> Self
    where
        F: Fn(&CommandNode, &[String]) -> Result<(), ArgsError> + Send + Sync + 'static,
    {
        Self {
            name: "custom",
            check: Arc::new(check),
        }
    }

    fn named<F>(name: &'static str, check: F) -> Self
    where
        F: Fn(&CommandNode, &[String]) -> Result<(), ArgsError> + Send + Sync + 'static,
    {
        Self {
            name,
            check: Arc::new(check),
        }
    }

    /// Reject any positional argument.
    pub fn no_args() -> Self {
        Self::named("no_args", |_, args| {
            if args.is_empty() {
                Ok(())
            } else {
                Err(ArgsError::NoArgs {
                    received: args.len(),
                })
            }
        })
    }

    /// Require exactly `n` arguments.
    pub fn exact(n: usize) -> Self {
        Self::named("exact", move |_, args| {
            if args.len() == n {
                Ok(())
            } else {
                Err(ArgsError::Exact {
                    expected: n,
                    received: args.len(),
                })
            }
        })
    }

    /// Require at least `n` arguments.
    pub fn minimum(n: usize) -> Self {
        Self::named("minimum", move |_, args| {
            if args.len() >= n {
                Ok(())
            } else {
                Err(ArgsError::Minimum {
                    min: n,
                    received: args.len(),
                })
            }
        })
    }

    /// Allow at most `n` arguments.
    pub fn maximum(n: usize) -> Self {
        Self::named("maximum", move |_, args| {
            if args.len() <= n {
                Ok(())
            } else {
                Err(ArgsError::Maximum {
                    max: n,
                    received: args.len(),
                })
            }
        })
    }

    /// Require between `min` and `max` arguments, inclusive.
    pub fn range(min: usize, max: usize) -> Self {
        Self::named("range", move |_, args| {
            if (min..=max).contains(&args.len()) {
                Ok(())
            } else {
                Err(ArgsError::Range {
                    min,
                    max,
                    received: args.len(),
                })
            }
        })
    }

    /// Run `self`, then `other`; the first failure wins.
    pub fn and(self, other: ArgValidator) -> Self {
        let (first, second) = (self.check, other.check);
        Self::named("all", move |node, args| {
            first(node, args)?;
            second(node, args)
        })
    }

    pub fn validate(&self, node: &CommandNode, args: &[String]) -> Result<(), ArgsError> {
        (self.check)(node, args)
    }
}
