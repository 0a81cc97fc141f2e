//! Tidings Bus - Typed in-process publish/subscribe event bus.
//!
//! This crate provides:
//! - [`EventBus`]: register subscribers, post events, cache sticky events
//! - [`Subscribe`]: the contract through which a subscriber lists its handlers
//! - [`ThreadMode`]: where each handler runs
//!
//! # Architecture
//!
//! A subscriber lists one [`SubscriberMethod`] per event type it handles.
//! Registration turns each into a subscription, routed by the event's
//! concrete type. Posting looks up the routes for that type and schedules
//! every handler on its execution context:
//!
//! 1. **Inline** (`Posting`, `Trampoline`): on the publisher's thread, before
//!    `post` returns.
//! 2. **Main thread** (`Main`, `MainOrdered`): a dedicated bus thread, or the
//!    application's own thread through [`MainLoop`].
//! 3. **Pools** (`Io`, `Background`, `Async`, `Computation`): tokio's blocking
//!    pool and worker threads.
//! 4. **Threads** (`Single`, `NewThread`): one shared FIFO worker, or a fresh
//!    thread per event.
//!
//! Handler failures never reach the publisher; they go to the error hook.
//!
//! # Example
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use tidings_bus::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Temperature(i32);
//!
//! #[derive(Default)]
//! struct Display {
//!     last: Mutex<Option<i32>>,
//! }
//!
//! impl Subscribe for Display {
//!     fn subscriber_methods(self: Arc<Self>) -> Vec<SubscriberMethod> {
//!         SubscriberMethods::new(self)
//!             .on(
//!                 SubscribeOptions::from(ThreadMode::Posting).sticky(),
//!                 |display: &Display, t: &Temperature| {
//!                     *display.last.lock().unwrap() = Some(t.0);
//!                 },
//!             )
//!             .build()
//!     }
//! }
//!
//! # fn main() -> BusResult<()> {
//! let bus = EventBus::new()?;
//! bus.post_sticky(Temperature(21));
//!
//! let display = Arc::new(Display::default());
//! bus.register(&display)?;
//! assert_eq!(*display.last.lock().unwrap(), Some(21));
//!
//! bus.unregister(&display)?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod bus;
mod error;
mod event;
mod gate;
mod registry;
mod router;
mod scheduler;
mod sticky;
mod subscriber;
mod subscription;
mod thread_mode;

pub use bus::{EventBus, EventBusBuilder};
pub use error::{BusError, BusResult, ErrorHook, HandlerInvocationError};
pub use event::{Event, EventType};
pub use scheduler::MainLoop;
pub use subscriber::{
    Subscribe, SubscribeOptions, SubscriberId, SubscriberMethod, SubscriberMethods,
    find_subscriber_methods,
};
pub use thread_mode::{ExecutionContext, ParseThreadModeError, ThreadMode};

pub use tidings_config::MainThreadPolicy;
