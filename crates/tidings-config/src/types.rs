//! Configuration types for the Tidings event bus.
//!
//! Every struct implements [`Default`] so that an empty document (or a bare
//! `[section]` header) produces a working configuration.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TidingsConfig {
    /// Execution contexts backing the bus thread modes.
    pub bus: BusSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// BusSection
// ---------------------------------------------------------------------------

/// Which thread drains the main-thread queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MainThreadPolicy {
    /// The bus spawns and owns a dedicated main thread.
    #[default]
    Dedicated,
    /// The application drives the queue from its own thread through a
    /// `MainLoop` handle.
    Manual,
}

/// Execution context sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusSection {
    /// Main-thread policy for `main` and `main_ordered` subscriptions.
    pub main_thread: MainThreadPolicy,
    /// Worker count of the computation pool. `None` uses the available
    /// parallelism of the host.
    pub computation_threads: Option<usize>,
    /// Upper bound on threads in the I/O pool.
    pub io_max_threads: usize,
    /// Seconds an idle I/O thread is kept before it exits.
    pub io_keep_alive_secs: u64,
    /// Prefix for the names of every thread the bus spawns.
    pub thread_name_prefix: String,
}

impl Default for BusSection {
    fn default() -> Self {
        Self {
            main_thread: MainThreadPolicy::default(),
            computation_threads: None,
            io_max_threads: 512,
            io_keep_alive_secs: 10,
            thread_name_prefix: "tidings".to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"`, or `"full"`.
    pub format: String,
    /// Per-crate tracing directives (e.g. `["tidings_bus=trace"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}
