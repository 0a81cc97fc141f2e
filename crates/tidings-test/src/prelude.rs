//! Prelude module - commonly used test utilities.
//!
//! Use `use tidings_test::prelude::*;` to import all essential helpers.

// Recording
pub use crate::{Delivery, Recorder, RecordingSubscriber};

// Fixtures
pub use crate::{DEFAULT_WAIT, EventA, EventB, EventC, Sequenced, manual_test_bus, test_bus};

// Logging
pub use crate::init_test_logging;
