//! Error types for the event bus.

use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::event::EventType;
use crate::thread_mode::ThreadMode;

/// Errors returned by bus operations.
#[derive(Debug, Error)]
pub enum BusError {
    /// The subscriber declared no subscriber methods.
    #[error("subscriber {subscriber} declares no subscriber methods")]
    NoSubscriberMethods {
        /// Display name of the subscriber.
        subscriber: String,
    },

    /// The subscriber has no registry entry.
    #[error("subscriber {subscriber} is not registered")]
    NotRegistered {
        /// Display name of the subscriber.
        subscriber: String,
    },

    /// The subscriber is registered but never subscribed to this event type.
    #[error("subscriber {subscriber} has no subscription for {event_type}")]
    NoSuchSubscription {
        /// Display name of the subscriber.
        subscriber: String,
        /// The event type that was asked for.
        event_type: EventType,
    },

    /// A main loop operation was attempted off the main thread.
    #[error("main loop is bound to another thread")]
    NotMainThread,

    /// The execution contexts could not be started.
    #[error("scheduler error: {0}")]
    Scheduler(String),
}

/// Result type for bus operations.
pub type BusResult<T> = Result<T, BusError>;

/// A handler failed while processing an event.
///
/// Never returned to a publisher. It is built where the handler is invoked
/// and passed to the bus error hook.
#[derive(Debug, Clone, Error)]
#[error("{subscriber} failed handling {event_type} on {thread_mode}: {message}")]
pub struct HandlerInvocationError {
    /// Display name of the subscriber that owns the handler.
    pub subscriber: String,
    /// The event type being delivered.
    pub event_type: EventType,
    /// Thread mode of the failing subscription.
    pub thread_mode: ThreadMode,
    /// Rendered error or panic message.
    pub message: String,
    /// Whether the handler panicked rather than returning an error.
    pub panicked: bool,
}

/// Callback receiving every handler failure.
pub type ErrorHook = Arc<dyn Fn(&HandlerInvocationError) + Send + Sync>;

/// The hook installed when none is configured: log and continue.
pub(crate) fn default_error_hook() -> ErrorHook {
    Arc::new(|err: &HandlerInvocationError| {
        warn!(
            subscriber = %err.subscriber,
            event_type = %err.event_type,
            thread_mode = ?err.thread_mode,
            panicked = err.panicked,
            error = %err.message,
            "Subscriber handler failed"
        );
    })
}
