//! Tidings Test - Shared test utilities for the Tidings event bus.
//!
//! This crate provides recording subscribers, fixture events and bus
//! builders that can be used across Tidings crates as a dev-dependency.
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! tidings-test.workspace = true
//! ```
//!
//! Then use in your tests:
//!
//! ```rust,ignore
//! use tidings_bus::ThreadMode;
//! use tidings_test::{DEFAULT_WAIT, EventA, Recorder, RecordingSubscriber, test_bus};
//!
//! #[test]
//! fn test_delivery() {
//!     let bus = test_bus();
//!     let seen = Recorder::new();
//!     let subscriber = RecordingSubscriber::new("s")
//!         .recording::<EventA>(ThreadMode::Io, &seen)
//!         .into_arc();
//!
//!     bus.register(&subscriber).unwrap();
//!     bus.post(EventA::new("x"));
//!     assert!(seen.wait_for_len(1, DEFAULT_WAIT));
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod fixtures;
pub mod logging;
pub mod mocks;
pub mod recorder;

pub use fixtures::*;
pub use logging::*;
pub use mocks::*;
pub use recorder::*;
