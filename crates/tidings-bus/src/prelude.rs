//! Prelude module - commonly used types for convenient import.
//!
//! Use `use tidings_bus::prelude::*;` to import all essential types.

// Bus
pub use crate::{EventBus, EventBusBuilder, MainLoop, MainThreadPolicy};

// Subscribers
pub use crate::{Subscribe, SubscribeOptions, SubscriberMethod, SubscriberMethods, ThreadMode};

// Events
pub use crate::{Event, EventType};

// Errors
pub use crate::{BusError, BusResult, HandlerInvocationError};
