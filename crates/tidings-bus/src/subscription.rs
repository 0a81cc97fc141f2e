//! Live subscriptions and sticky replays.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use crate::error::{ErrorHook, HandlerInvocationError};
use crate::event::EventType;
use crate::gate::Gate;
use crate::subscriber::{Handler, SubscriberId, SubscriberMethod};
use crate::thread_mode::ThreadMode;

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

/// One handler of one subscriber, bound to an event type.
///
/// Also used for one-shot sticky replays, which share the handler of the
/// live subscription but have their own gate.
pub(crate) struct Subscription {
    id: u64,
    owner: SubscriberId,
    event_type: EventType,
    thread_mode: ThreadMode,
    priority: i32,
    handler: Handler,
    gate: Gate,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("event_type", &self.event_type)
            .field("thread_mode", &self.thread_mode)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    pub(crate) fn new(owner: SubscriberId, method: &SubscriberMethod) -> Self {
        Self {
            id: NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed),
            owner,
            event_type: method.event_type(),
            thread_mode: method.thread_mode(),
            priority: method.priority(),
            handler: method.handler().clone(),
            gate: Gate::new(),
        }
    }

    /// A one-shot replay sharing this subscription's handler.
    pub(crate) fn replay(&self) -> Self {
        Self {
            id: NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed),
            owner: self.owner.clone(),
            event_type: self.event_type,
            thread_mode: self.thread_mode,
            priority: self.priority,
            handler: self.handler.clone(),
            gate: Gate::new(),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn owner(&self) -> &SubscriberId {
        &self.owner
    }

    pub(crate) fn event_type(&self) -> EventType {
        self.event_type
    }

    pub(crate) fn thread_mode(&self) -> ThreadMode {
        self.thread_mode
    }

    pub(crate) fn priority(&self) -> i32 {
        self.priority
    }

    pub(crate) fn is_active(&self) -> bool {
        self.gate.is_open()
    }

    /// Stop new deliveries without waiting for running ones.
    pub(crate) fn close(&self) {
        self.gate.close();
    }

    /// Wait until no delivery of this subscription is running.
    pub(crate) fn wait_idle(&self) {
        self.gate.wait_idle();
    }

    /// Invoke the handler on the current thread.
    ///
    /// Skipped when the subscription was cancelled after the event was
    /// scheduled. Errors and panics are reported to `hook`.
    pub(crate) fn deliver(&self, event: &(dyn Any + Send + Sync), hook: &ErrorHook) {
        let outcome = self
            .gate
            .enter(|| catch_unwind(AssertUnwindSafe(|| (self.handler)(event))));

        let (message, panicked) = match outcome {
            None => {
                trace!(
                    subscriber = %self.owner,
                    event_type = %self.event_type,
                    "Subscription cancelled, delivery skipped"
                );
                return;
            },
            Some(Ok(Ok(()))) => {
                trace!(
                    subscriber = %self.owner,
                    event_type = %self.event_type,
                    thread_mode = ?self.thread_mode,
                    "Event delivered"
                );
                return;
            },
            Some(Ok(Err(e))) => (format!("{e:#}"), false),
            Some(Err(payload)) => (panic_message(&*payload), true),
        };

        hook(&HandlerInvocationError {
            subscriber: self.owner.name().to_string(),
            event_type: self.event_type,
            thread_mode: self.thread_mode,
            message,
            panicked,
        });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
