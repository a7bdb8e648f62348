//! Pre-run and post-run hook execution.

use std::fmt;
use std::time::Instant;

use tracing::debug;

use crate::dispatch::Invocation;
use crate::error::DispatchError;
use crate::node::CommandFn;

/// When a hook runs relative to the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    /// Before the handler. A failure skips the handler.
    Pre,
    /// After a successful handler.
    Post,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookPhase::Pre => write!(f, "pre-run"),
            HookPhase::Post => write!(f, "post-run"),
        }
    }
}

impl HookPhase {
    fn error(self, command: &str, source: anyhow::Error) -> DispatchError {
        let command = command.to_string();
        match self {
            HookPhase::Pre => DispatchError::PreHook { command, source },
            HookPhase::Post => DispatchError::PostHook { command, source },
        }
    }
}

/// Run `hooks` in declaration order, stopping at the first failure.
pub(crate) fn run(
    phase: HookPhase,
    hooks: &[CommandFn],
    invocation: &Invocation<'_>,
) -> Result<(), DispatchError> {
    let command = invocation.path();
    for (index, hook) in hooks.iter().enumerate() {
        let start = Instant::now();
        let result = hook(invocation);
        debug!(
            "{} hook {} for {} finished in {:?} (ok: {})",
            phase,
            index,
            command,
            start.elapsed(),
            result.is_ok()
        );
        if let Err(source) = result {
            return Err(phase.error(&command, source));
        }
    }
    Ok(())
}
