//! Fixture events and preconfigured buses.

use std::time::Duration;

use tidings_bus::{EventBus, MainThreadPolicy};

/// How long tests wait for asynchronous deliveries before failing.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(5);

/// Thread name prefix of buses built by [`test_bus`].
pub const TEST_THREAD_PREFIX: &str = "tidings-test";

/// A text event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventA(pub String);

impl EventA {
    /// Create an `EventA` carrying `text`.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }
}

/// A counter event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventB(pub u32);

/// A signed value event, distinct from [`EventB`] for routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventC(pub i64);

/// An event stamped with its producer and a per-producer sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sequenced {
    /// Index of the producing thread.
    pub producer: usize,
    /// Position in that producer's stream.
    pub seq: usize,
}

/// A bus with small pools and a dedicated main thread.
///
/// # Panics
///
/// Panics if the bus threads cannot be started.
#[must_use]
pub fn test_bus() -> EventBus {
    EventBus::builder()
        .with_computation_threads(2)
        .with_io_max_threads(8)
        .with_io_keep_alive(Duration::from_secs(1))
        .with_thread_name_prefix(TEST_THREAD_PREFIX)
        .build()
        .expect("failed to build test bus")
}

/// A bus whose main thread is driven by the test through
/// [`EventBus::main_loop`].
///
/// # Panics
///
/// Panics if the bus threads cannot be started.
#[must_use]
pub fn manual_test_bus() -> EventBus {
    EventBus::builder()
        .with_main_thread(MainThreadPolicy::Manual)
        .with_computation_threads(2)
        .with_io_max_threads(8)
        .with_thread_name_prefix(TEST_THREAD_PREFIX)
        .build()
        .expect("failed to build manual test bus")
}
