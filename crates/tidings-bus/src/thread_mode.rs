//! Thread modes and the execution contexts behind them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where a subscription's handler runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadMode {
    /// On the main thread. Inline when the publisher is the main thread,
    /// queued otherwise.
    ///
    /// An event posted from the main thread therefore runs before events
    /// still waiting in the main queue for the same subscription. Use
    /// [`ThreadMode::MainOrdered`] when delivery must follow posting order.
    #[default]
    Main,
    /// Always queued on the main thread, strict FIFO across publishers.
    MainOrdered,
    /// Inline on the publisher's thread.
    Posting,
    /// Inline on the publisher's thread.
    Trampoline,
    /// Shared unbounded I/O pool.
    Io,
    /// Shared unbounded I/O pool.
    Background,
    /// Shared unbounded I/O pool.
    Async,
    /// Bounded pool sized to the available parallelism.
    Computation,
    /// One long-lived worker shared by every `Single` subscription.
    Single,
    /// A fresh OS thread per delivered event.
    NewThread,
}

/// Execution context a [`ThreadMode`] resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionContext {
    /// Publisher's thread.
    Inline,
    /// Main thread, inline if already there.
    MainThread,
    /// Main thread queue, never inline.
    MainQueue,
    /// Blocking pool.
    IoPool,
    /// Worker pool.
    ComputationPool,
    /// Dedicated single worker.
    SingleWorker,
    /// Ephemeral thread.
    NewThread,
}

/// Indexed by the `ThreadMode` discriminant.
const CONTEXTS: [ExecutionContext; 10] = [
    ExecutionContext::MainThread,
    ExecutionContext::MainQueue,
    ExecutionContext::Inline,
    ExecutionContext::Inline,
    ExecutionContext::IoPool,
    ExecutionContext::IoPool,
    ExecutionContext::IoPool,
    ExecutionContext::ComputationPool,
    ExecutionContext::SingleWorker,
    ExecutionContext::NewThread,
];

const NAMES: [&str; 10] = [
    "main",
    "main_ordered",
    "posting",
    "trampoline",
    "io",
    "background",
    "async",
    "computation",
    "single",
    "new_thread",
];

impl ThreadMode {
    /// Every thread mode, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::Main,
        Self::MainOrdered,
        Self::Posting,
        Self::Trampoline,
        Self::Io,
        Self::Background,
        Self::Async,
        Self::Computation,
        Self::Single,
        Self::NewThread,
    ];

    /// The execution context this mode dispatches on.
    #[must_use]
    pub const fn context(self) -> ExecutionContext {
        CONTEXTS[self as usize]
    }

    /// The `snake_case` name used in config files and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        NAMES[self as usize]
    }

    /// Whether handlers in this mode run before `post` returns.
    #[must_use]
    pub const fn is_inline(self) -> bool {
        matches!(self.context(), ExecutionContext::Inline)
    }
}

impl fmt::Display for ThreadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown thread mode name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown thread mode '{0}'")]
pub struct ParseThreadModeError(String);

impl FromStr for ThreadMode {
    type Err = ParseThreadModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == normalized)
            .ok_or_else(|| ParseThreadModeError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_main() {
        assert_eq!(ThreadMode::default(), ThreadMode::Main);
    }

    #[test]
    fn test_context_table() {
        assert_eq!(ThreadMode::Main.context(), ExecutionContext::MainThread);
        assert_eq!(ThreadMode::MainOrdered.context(), ExecutionContext::MainQueue);
        assert_eq!(ThreadMode::Posting.context(), ExecutionContext::Inline);
        assert_eq!(ThreadMode::Trampoline.context(), ExecutionContext::Inline);
        assert_eq!(ThreadMode::Io.context(), ExecutionContext::IoPool);
        assert_eq!(ThreadMode::Background.context(), ExecutionContext::IoPool);
        assert_eq!(ThreadMode::Async.context(), ExecutionContext::IoPool);
        assert_eq!(
            ThreadMode::Computation.context(),
            ExecutionContext::ComputationPool
        );
        assert_eq!(ThreadMode::Single.context(), ExecutionContext::SingleWorker);
        assert_eq!(ThreadMode::NewThread.context(), ExecutionContext::NewThread);
    }

    #[test]
    fn test_inline_modes() {
        let inline: Vec<_> = ThreadMode::ALL
            .into_iter()
            .filter(|m| m.is_inline())
            .collect();
        assert_eq!(inline, vec![ThreadMode::Posting, ThreadMode::Trampoline]);
    }

    #[test]
    fn test_parse_and_display_agree() {
        for mode in ThreadMode::ALL {
            assert_eq!(mode.to_string().parse::<ThreadMode>().unwrap(), mode);
        }
        assert_eq!(
            "Main-Ordered".parse::<ThreadMode>().unwrap(),
            ThreadMode::MainOrdered
        );
        assert!("ui".parse::<ThreadMode>().is_err());
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&ThreadMode::NewThread).unwrap();
        assert_eq!(json, "\"new_thread\"");

        let parsed: ThreadMode = serde_json::from_str("\"main_ordered\"").unwrap();
        assert_eq!(parsed, ThreadMode::MainOrdered);
    }
}
