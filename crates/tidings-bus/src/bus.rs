//! The event bus facade.

use std::any::TypeId;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::thread;
use std::time::Duration;

use tidings_config::{BusSection, MainThreadPolicy};
use tracing::{debug, trace, warn};

use crate::error::{BusResult, ErrorHook, HandlerInvocationError, default_error_hook};
use crate::event::{ErasedEvent, Event, EventType};
use crate::registry::Registry;
use crate::router::Router;
use crate::scheduler::{MainLoop, SchedulerSettings, Schedulers};
use crate::sticky::StickyStore;
use crate::subscriber::{Subscribe, SubscriberId, find_subscriber_methods};
use crate::subscription::Subscription;

static GLOBAL: OnceLock<EventBus> = OnceLock::new();

/// Typed publish/subscribe bus.
///
/// Subscribers register a list of handlers, one per event type; posting an
/// event runs every handler of that exact type on the execution context its
/// [`ThreadMode`](crate::ThreadMode) selects. Sticky events are cached per
/// type and replayed to sticky handlers that register later.
///
/// Clones share the same subscriptions, sticky cache and worker threads.
///
/// **WARNING:** the bus keeps every registered subscriber alive through its
/// handlers. A subscriber that stores a clone of the bus forms an `Arc`
/// cycle until it is unregistered. Always unregister.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

struct BusInner {
    registry: Registry,
    router: Router,
    sticky: StickyStore,
    error_hook: ErrorHook,
    main_loop: Mutex<Option<MainLoop>>,
    schedulers: Schedulers,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("subscriptions", &self.subscription_count())
            .field("sticky_events", &self.sticky_count())
            .field("schedulers", &self.inner.schedulers)
            .finish()
    }
}

impl EventBus {
    /// The process-wide bus, created with default settings on first use.
    ///
    /// # Panics
    ///
    /// Panics if the worker threads of the default bus cannot be started.
    #[must_use]
    pub fn global() -> &'static EventBus {
        GLOBAL.get_or_init(|| {
            Self::builder()
                .build()
                .expect("failed to start the global event bus")
        })
    }

    /// A new bus with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Scheduler`](crate::BusError::Scheduler) if the
    /// worker threads cannot be started.
    pub fn new() -> BusResult<Self> {
        Self::builder().build()
    }

    /// Start configuring a new bus.
    #[must_use]
    pub fn builder() -> EventBusBuilder {
        EventBusBuilder::default()
    }

    /// Register every handler `subscriber` describes.
    ///
    /// Handlers of a type the subscriber already subscribes to replace the
    /// earlier ones. Sticky handlers then receive the cached event of their
    /// type, if there is one.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::NoSubscriberMethods`](crate::BusError::NoSubscriberMethods)
    /// if the subscriber describes no handlers. Nothing is registered then.
    pub fn register<S: Subscribe + ?Sized>(&self, subscriber: &Arc<S>) -> BusResult<()> {
        let methods = find_subscriber_methods(subscriber)?;
        let owner = SubscriberId::of(subscriber);

        let registration = self
            .inner
            .registry
            .register(&owner, &methods, &self.inner.router);
        for previous in &registration.replaced {
            previous.wait_idle();
        }

        debug!(
            subscriber = %owner,
            subscriptions = registration.installed,
            sticky = registration.sticky.len(),
            "Subscriber registered"
        );

        for subscription in &registration.sticky {
            self.replay_sticky(subscription);
        }
        Ok(())
    }

    /// Deliver the cached sticky event once to a newly routed subscription.
    fn replay_sticky(&self, subscription: &Arc<Subscription>) {
        let event_type = subscription.event_type();
        let Some(event) = self.inner.sticky.get(event_type.id()) else {
            return;
        };

        let replay = Arc::new(subscription.replay());
        if !self
            .inner
            .registry
            .track_replay(subscription, Arc::clone(&replay))
        {
            warn!(
                subscriber = %subscription.owner(),
                event_type = %event_type,
                "Subscription cancelled before sticky replay, replay dropped"
            );
            return;
        }

        trace!(
            subscriber = %subscription.owner(),
            event_type = %event_type,
            thread_mode = ?replay.thread_mode(),
            "Replaying sticky event"
        );
        let hook = Arc::clone(&self.inner.error_hook);
        self.inner.schedulers.schedule(
            replay.thread_mode(),
            Box::new(move || {
                replay.deliver(&*event, &hook);
                replay.close();
            }),
        );
    }

    /// Cancel every subscription and pending sticky replay of `subscriber`.
    ///
    /// When this returns no handler of the subscriber is running, and none
    /// will start, unless it is called from inside one of those handlers.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::NotRegistered`](crate::BusError::NotRegistered)
    /// if the subscriber is not registered.
    ///
    /// # Deadlocks
    ///
    /// Waits for the subscriber's running handlers. Two handlers running on
    /// different threads that each unregister the other's subscriber wait
    /// on each other forever. The same applies to
    /// [`EventBus::unregister_event_type`] and to re-registering.
    pub fn unregister<S: Subscribe + ?Sized>(&self, subscriber: &Arc<S>) -> BusResult<()> {
        let owner = SubscriberId::of(subscriber);
        let cancelled = self.inner.registry.unregister(&owner, &self.inner.router)?;
        for subscription in &cancelled {
            subscription.wait_idle();
        }

        debug!(
            subscriber = %owner,
            cancelled = cancelled.len(),
            "Subscriber unregistered"
        );
        Ok(())
    }

    /// Cancel only the subscription of `subscriber` for events of type `E`.
    ///
    /// # Errors
    ///
    /// See [`EventBus::unregister_event_type`].
    pub fn unregister_event<E: Event, S: Subscribe + ?Sized>(
        &self,
        subscriber: &Arc<S>,
    ) -> BusResult<()> {
        self.unregister_event_type(subscriber, EventType::of::<E>())
    }

    /// Cancel only the subscription of `subscriber` for `event_type`.
    ///
    /// The subscriber stays registered for its other event types. Once its
    /// last subscription is gone it is no longer registered at all.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::NotRegistered`](crate::BusError::NotRegistered)
    /// if the subscriber is unknown and
    /// [`BusError::NoSuchSubscription`](crate::BusError::NoSuchSubscription)
    /// if it never subscribed to `event_type`.
    pub fn unregister_event_type<S: Subscribe + ?Sized>(
        &self,
        subscriber: &Arc<S>,
        event_type: EventType,
    ) -> BusResult<()> {
        let owner = SubscriberId::of(subscriber);
        let cancelled =
            self.inner
                .registry
                .unregister_event_type(&owner, event_type, &self.inner.router)?;
        for subscription in &cancelled {
            subscription.wait_idle();
        }

        debug!(
            subscriber = %owner,
            event_type = %event_type,
            "Subscription cancelled"
        );
        Ok(())
    }

    /// Publish `event` to every subscription of its type.
    ///
    /// Dropped when the bus has no subscriptions at all. Returns how many
    /// deliveries were scheduled.
    pub fn post<E: Event>(&self, event: E) -> usize {
        let event_type = EventType::of::<E>();
        if self.inner.router.is_empty() {
            trace!(event_type = %event_type, "No subscriptions, event dropped");
            return 0;
        }
        let event: ErasedEvent = Arc::new(event);
        self.dispatch(event_type, &event)
    }

    /// Cache `event` as the sticky event of its type, then publish it like
    /// [`EventBus::post`].
    pub fn post_sticky<E: Event>(&self, event: E) -> usize {
        let event_type = EventType::of::<E>();
        let event: ErasedEvent = Arc::new(event);
        let replaced = self
            .inner
            .sticky
            .put(event_type.id(), Arc::clone(&event))
            .is_some();
        debug!(event_type = %event_type, replaced, "Sticky event stored");

        if self.inner.router.is_empty() {
            return 0;
        }
        self.dispatch(event_type, &event)
    }

    fn dispatch(&self, event_type: EventType, event: &ErasedEvent) -> usize {
        self.inner.router.dispatch(
            event_type,
            event,
            &self.inner.schedulers,
            &self.inner.error_hook,
        )
    }

    /// Remove the cached sticky event of type `E` if it equals `event`.
    ///
    /// Returns whether it was removed.
    pub fn remove_sticky_event<E: Event + PartialEq>(&self, event: &E) -> bool {
        let event_type = EventType::of::<E>();
        let removed = self
            .inner
            .sticky
            .remove_if(event_type.id(), |cached| cached.downcast_ref::<E>() == Some(event));
        debug!(event_type = %event_type, removed, "Sticky event removal requested");
        removed
    }

    /// Remove the cached sticky event of type `E`, whatever its value.
    pub fn remove_sticky<E: Event>(&self) -> Option<Arc<E>> {
        let removed = self.inner.sticky.remove(TypeId::of::<E>())?;
        debug!(event_type = %EventType::of::<E>(), "Sticky event removed");
        removed.downcast::<E>().ok()
    }

    /// Drop every cached sticky event.
    pub fn remove_all_sticky_events(&self) {
        let cleared = self.inner.sticky.clear();
        debug!(cleared, "Sticky events cleared");
    }

    /// The cached sticky event of type `E`.
    #[must_use]
    pub fn sticky_event<E: Event>(&self) -> Option<Arc<E>> {
        self.inner
            .sticky
            .get(TypeId::of::<E>())
            .and_then(|event| event.downcast::<E>().ok())
    }

    /// Number of cached sticky events.
    #[must_use]
    pub fn sticky_count(&self) -> usize {
        self.inner.sticky.len()
    }

    /// Whether `subscriber` is registered.
    #[must_use]
    pub fn is_registered<S: Subscribe + ?Sized>(&self, subscriber: &Arc<S>) -> bool {
        self.inner.registry.is_registered(&SubscriberId::of(subscriber))
    }

    /// Number of live subscriptions held by `subscriber`.
    #[must_use]
    pub fn subscriptions_of<S: Subscribe + ?Sized>(&self, subscriber: &Arc<S>) -> usize {
        self.inner
            .registry
            .subscriptions_of(&SubscriberId::of(subscriber))
    }

    /// Whether any subscription receives events of type `E`.
    #[must_use]
    pub fn has_subscriber_for<E: Event>(&self) -> bool {
        self.inner.router.has_routes(TypeId::of::<E>())
    }

    /// Number of live subscriptions across all subscribers.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.inner.router.len()
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Take the handle that drives the main thread.
    ///
    /// Returns `Some` once, and only for buses built with
    /// [`MainThreadPolicy::Manual`].
    #[must_use]
    pub fn main_loop(&self) -> Option<MainLoop> {
        self.inner
            .main_loop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Whether the calling thread is this bus's main thread.
    #[must_use]
    pub fn is_main_thread(&self) -> bool {
        self.inner.schedulers.is_main_thread()
    }
}

/// Builder for [`EventBus`].
pub struct EventBusBuilder {
    main_thread: MainThreadPolicy,
    computation_threads: Option<usize>,
    io_max_threads: usize,
    io_keep_alive: Duration,
    thread_name_prefix: String,
    error_hook: Option<ErrorHook>,
}

impl std::fmt::Debug for EventBusBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBusBuilder")
            .field("main_thread", &self.main_thread)
            .field("computation_threads", &self.computation_threads)
            .field("io_max_threads", &self.io_max_threads)
            .field("io_keep_alive", &self.io_keep_alive)
            .field("thread_name_prefix", &self.thread_name_prefix)
            .field("custom_error_hook", &self.error_hook.is_some())
            .finish()
    }
}

impl Default for EventBusBuilder {
    fn default() -> Self {
        Self {
            main_thread: MainThreadPolicy::default(),
            computation_threads: None,
            io_max_threads: 0,
            io_keep_alive: Duration::ZERO,
            thread_name_prefix: String::new(),
            error_hook: None,
        }
        .with_config(&BusSection::default())
    }
}

impl EventBusBuilder {
    /// Take every setting from a `[bus]` config section.
    #[must_use]
    pub fn with_config(mut self, section: &BusSection) -> Self {
        self.main_thread = section.main_thread;
        self.computation_threads = section.computation_threads;
        self.io_max_threads = section.io_max_threads;
        self.io_keep_alive = Duration::from_secs(section.io_keep_alive_secs);
        self.thread_name_prefix.clone_from(&section.thread_name_prefix);
        self
    }

    /// Choose who drains the main-thread queue.
    #[must_use]
    pub fn with_main_thread(mut self, policy: MainThreadPolicy) -> Self {
        self.main_thread = policy;
        self
    }

    /// Size the computation pool.
    #[must_use]
    pub fn with_computation_threads(mut self, threads: usize) -> Self {
        self.computation_threads = Some(threads);
        self
    }

    /// Bound the I/O pool.
    #[must_use]
    pub fn with_io_max_threads(mut self, threads: usize) -> Self {
        self.io_max_threads = threads;
        self
    }

    /// How long an idle I/O thread lingers.
    #[must_use]
    pub fn with_io_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.io_keep_alive = keep_alive;
        self
    }

    /// Prefix for the names of the bus threads.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Receive every handler failure instead of the default `warn!` log.
    #[must_use]
    pub fn with_error_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&HandlerInvocationError) + Send + Sync + 'static,
    {
        self.error_hook = Some(Arc::new(hook));
        self
    }

    /// Start the execution contexts and build the bus.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Scheduler`](crate::BusError::Scheduler) if a
    /// thread count is zero or a worker thread cannot be started.
    pub fn build(self) -> BusResult<EventBus> {
        let computation_threads = self.computation_threads.unwrap_or_else(|| {
            thread::available_parallelism().map_or(1, NonZeroUsize::get)
        });
        let settings = SchedulerSettings {
            main_thread: self.main_thread,
            computation_threads,
            io_max_threads: self.io_max_threads,
            io_keep_alive: self.io_keep_alive,
            thread_name_prefix: self.thread_name_prefix,
        };
        let (schedulers, main_loop) = Schedulers::start(&settings)?;

        Ok(EventBus {
            inner: Arc::new(BusInner {
                registry: Registry::default(),
                router: Router::default(),
                sticky: StickyStore::default(),
                error_hook: self.error_hook.unwrap_or_else(default_error_hook),
                main_loop: Mutex::new(main_loop),
                schedulers,
            }),
        })
    }
}
