//! Configurable subscribers for testing.

use std::sync::Arc;

use anyhow::anyhow;
use tidings_bus::{Event, Subscribe, SubscribeOptions, SubscriberMethod};

use crate::recorder::{Delivery, Recorder};

/// Subscriber assembled from recording, failing and custom handlers.
///
/// Each handler is added with its own options, so one subscriber can cover
/// several event types and thread modes.
#[derive(Debug, Clone)]
pub struct RecordingSubscriber {
    name: String,
    methods: Vec<SubscriberMethod>,
}

impl RecordingSubscriber {
    /// Create a subscriber with no handlers yet.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    /// Record every `E` into `recorder`.
    #[must_use]
    pub fn recording<E: Event + Clone>(
        self,
        options: impl Into<SubscribeOptions>,
        recorder: &Recorder<E>,
    ) -> Self {
        let recorder = recorder.clone();
        self.with_method(SubscriberMethod::new(options, move |event: &E| {
            recorder.push(event.clone());
            Ok(())
        }))
    }

    /// Record every `E` together with the thread that handled it.
    #[must_use]
    pub fn recording_deliveries<E: Event + Clone>(
        self,
        options: impl Into<SubscribeOptions>,
        recorder: &Recorder<Delivery<E>>,
    ) -> Self {
        let recorder = recorder.clone();
        self.with_method(SubscriberMethod::new(options, move |event: &E| {
            recorder.push(Delivery::here(event.clone()));
            Ok(())
        }))
    }

    /// Fail on every `E` with `message`.
    #[must_use]
    pub fn failing<E: Event>(self, options: impl Into<SubscribeOptions>, message: &str) -> Self {
        let message = message.to_string();
        self.with_method(SubscriberMethod::new(options, move |_: &E| {
            Err(anyhow!("{message}"))
        }))
    }

    /// Panic on every `E` with `message`.
    #[must_use]
    pub fn panicking<E: Event>(self, options: impl Into<SubscribeOptions>, message: &str) -> Self {
        let message = message.to_string();
        self.with_method(SubscriberMethod::new(options, move |_: &E| -> anyhow::Result<()> {
            panic!("{message}")
        }))
    }

    /// Add an arbitrary descriptor.
    #[must_use]
    pub fn with_method(mut self, method: SubscriberMethod) -> Self {
        self.methods.push(method);
        self
    }

    /// Wrap in an `Arc`, ready for registration.
    #[must_use]
    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl Subscribe for RecordingSubscriber {
    fn subscriber_methods(self: Arc<Self>) -> Vec<SubscriberMethod> {
        self.methods.clone()
    }

    fn name(&self) -> &str {
        &self.name
    }
}
