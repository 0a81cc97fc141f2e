//! Subscriber discovery contract.
//!
//! A subscriber describes its handlers by implementing [`Subscribe`] and
//! returning one [`SubscriberMethod`] per event type it wants. The
//! [`SubscriberMethods`] builder captures the subscriber in every handler, so
//! the bus keeps it alive for as long as it stays registered.

use std::any::{Any, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use anyhow::anyhow;

use crate::error::{BusError, BusResult};
use crate::event::{Event, EventType};
use crate::thread_mode::ThreadMode;

/// Type-erased handler stored in a subscription.
pub(crate) type Handler = Arc<dyn Fn(&(dyn Any + Send + Sync)) -> anyhow::Result<()> + Send + Sync>;

/// Trait for types that receive events from the bus.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use tidings_bus::{Subscribe, SubscribeOptions, SubscriberMethod, SubscriberMethods, ThreadMode};
///
/// #[derive(Debug)]
/// struct Login(String);
///
/// struct Audit;
///
/// impl Audit {
///     fn on_login(&self, event: &Login) {
///         println!("login: {}", event.0);
///     }
/// }
///
/// impl Subscribe for Audit {
///     fn subscriber_methods(self: Arc<Self>) -> Vec<SubscriberMethod> {
///         SubscriberMethods::new(self)
///             .on(ThreadMode::Io, Audit::on_login)
///             .build()
///     }
/// }
/// ```
pub trait Subscribe: Send + Sync + 'static {
    /// Describe every handler of this subscriber.
    fn subscriber_methods(self: Arc<Self>) -> Vec<SubscriberMethod>;

    /// Name used in logs and errors.
    fn name(&self) -> &str {
        type_name::<Self>()
    }
}

/// Per-handler options: thread mode, stickiness and priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SubscribeOptions {
    /// Execution context of the handler.
    pub thread_mode: ThreadMode,
    /// Replay the cached sticky event of this type on registration.
    pub sticky: bool,
    /// Higher priorities are dispatched first among handlers of one type.
    pub priority: i32,
}

impl SubscribeOptions {
    /// Options with the defaults: `Main`, not sticky, priority 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the thread mode.
    #[must_use]
    pub fn with_thread_mode(mut self, thread_mode: ThreadMode) -> Self {
        self.thread_mode = thread_mode;
        self
    }

    /// Mark the handler sticky.
    #[must_use]
    pub fn sticky(mut self) -> Self {
        self.sticky = true;
        self
    }

    /// Set the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl From<ThreadMode> for SubscribeOptions {
    fn from(thread_mode: ThreadMode) -> Self {
        Self::new().with_thread_mode(thread_mode)
    }
}

/// Descriptor of one handler.
#[derive(Clone)]
pub struct SubscriberMethod {
    event_type: EventType,
    options: SubscribeOptions,
    handler: Handler,
}

impl SubscriberMethod {
    /// Describe a handler for events of type `E`.
    pub fn new<E, F>(options: impl Into<SubscribeOptions>, handler: F) -> Self
    where
        E: Event,
        F: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(move |event: &(dyn Any + Send + Sync)| {
            match event.downcast_ref::<E>() {
                Some(event) => handler(event),
                None => Err(anyhow!("expected event of type {}", type_name::<E>())),
            }
        });
        Self {
            event_type: EventType::of::<E>(),
            options: options.into(),
            handler,
        }
    }

    /// The event type this handler receives.
    #[must_use]
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// The handler's options.
    #[must_use]
    pub fn options(&self) -> SubscribeOptions {
        self.options
    }

    /// Shorthand for `options().thread_mode`.
    #[must_use]
    pub fn thread_mode(&self) -> ThreadMode {
        self.options.thread_mode
    }

    /// Shorthand for `options().sticky`.
    #[must_use]
    pub fn is_sticky(&self) -> bool {
        self.options.sticky
    }

    /// Shorthand for `options().priority`.
    #[must_use]
    pub fn priority(&self) -> i32 {
        self.options.priority
    }

    pub(crate) fn handler(&self) -> &Handler {
        &self.handler
    }
}

impl fmt::Debug for SubscriberMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberMethod")
            .field("event_type", &self.event_type)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Builder for a subscriber's descriptor list.
pub struct SubscriberMethods<S: ?Sized> {
    subscriber: Arc<S>,
    methods: Vec<SubscriberMethod>,
}

impl<S: Send + Sync + ?Sized + 'static> SubscriberMethods<S> {
    /// Start describing `subscriber`.
    #[must_use]
    pub fn new(subscriber: Arc<S>) -> Self {
        Self {
            subscriber,
            methods: Vec::new(),
        }
    }

    /// Add an infallible handler for `E`.
    #[must_use]
    pub fn on<E, F>(self, options: impl Into<SubscribeOptions>, handler: F) -> Self
    where
        E: Event,
        F: Fn(&S, &E) + Send + Sync + 'static,
    {
        self.try_on(options, move |subscriber: &S, event: &E| {
            handler(subscriber, event);
            Ok(())
        })
    }

    /// Add a fallible handler for `E`. Errors go to the bus error hook.
    #[must_use]
    pub fn try_on<E, F>(mut self, options: impl Into<SubscribeOptions>, handler: F) -> Self
    where
        E: Event,
        F: Fn(&S, &E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let subscriber = Arc::clone(&self.subscriber);
        self.methods.push(SubscriberMethod::new(options, move |event: &E| {
            handler(&subscriber, event)
        }));
        self
    }

    /// Add a prebuilt descriptor.
    #[must_use]
    pub fn method(mut self, method: SubscriberMethod) -> Self {
        self.methods.push(method);
        self
    }

    /// Finish the list.
    #[must_use]
    pub fn build(self) -> Vec<SubscriberMethod> {
        self.methods
    }
}

/// Identity of a registered subscriber: the address of its `Arc` plus its
/// name.
///
/// Equality and hashing use the address only. The bus holds a strong
/// reference through the handlers, so the address cannot be reused while
/// the subscriber is registered.
#[derive(Clone)]
pub struct SubscriberId {
    addr: usize,
    name: Arc<str>,
}

impl SubscriberId {
    /// Identity of `subscriber`.
    #[must_use]
    pub fn of<S: Subscribe + ?Sized>(subscriber: &Arc<S>) -> Self {
        Self {
            addr: Arc::as_ptr(subscriber).cast::<()>().addr(),
            name: Arc::from(subscriber.name()),
        }
    }

    /// The subscriber's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for SubscriberId {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr
    }
}

impl Eq for SubscriberId {}

impl Hash for SubscriberId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr.hash(state);
    }
}

impl fmt::Debug for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriberId({}@{:#x})", self.name, self.addr)
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Collect the descriptors of `subscriber`.
///
/// # Errors
///
/// Returns [`BusError::NoSubscriberMethods`] when the list is empty.
pub fn find_subscriber_methods<S: Subscribe + ?Sized>(
    subscriber: &Arc<S>,
) -> BusResult<Vec<SubscriberMethod>> {
    let methods = Arc::clone(subscriber).subscriber_methods();
    if methods.is_empty() {
        return Err(BusError::NoSubscriberMethods {
            subscriber: subscriber.name().to_string(),
        });
    }
    Ok(methods)
}
