//! Routing table from event type to subscriptions.
//!
//! Each event type maps to an immutable, priority-ordered slice of
//! subscriptions. Writers replace the slice; dispatch clones the `Arc` and
//! releases the map shard before any handler is scheduled, so no lock is held
//! while handlers run.

use std::any::TypeId;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use tracing::trace;

use crate::error::ErrorHook;
use crate::event::{ErasedEvent, EventType};
use crate::scheduler::Schedulers;
use crate::subscription::Subscription;

type Routes = Arc<[Arc<Subscription>]>;

#[derive(Debug, Default)]
pub(crate) struct Router {
    routes: DashMap<TypeId, Routes>,
    live: AtomicUsize,
}

impl Router {
    /// Add `subscription` after every route of equal or higher priority.
    pub(crate) fn insert(&self, subscription: Arc<Subscription>) {
        let mut entry = self
            .routes
            .entry(subscription.event_type().id())
            .or_insert_with(|| Arc::from(Vec::new()));

        let mut routes = entry.to_vec();
        let at = routes.partition_point(|s| s.priority() >= subscription.priority());
        routes.insert(at, subscription);
        *entry = Arc::from(routes);
        self.live.fetch_add(1, Ordering::SeqCst);
    }

    /// Remove `subscription`. Returns whether it was routed.
    pub(crate) fn remove(&self, subscription: &Arc<Subscription>) -> bool {
        let key = subscription.event_type().id();
        let removed = match self.routes.get_mut(&key) {
            Some(mut entry) => {
                let before = entry.len();
                let routes: Vec<_> = entry
                    .iter()
                    .filter(|s| !Arc::ptr_eq(s, subscription))
                    .cloned()
                    .collect();
                let removed = routes.len() != before;
                *entry = Arc::from(routes);
                removed
            },
            None => false,
        };
        // Shard guard above is released before this second lookup.
        self.routes.remove_if(&key, |_, routes| routes.is_empty());

        if removed {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
        removed
    }

    /// Snapshot of the routes for `type_id`, in dispatch order.
    pub(crate) fn routes_for(&self, type_id: TypeId) -> Option<Routes> {
        self.routes.get(&type_id).map(|entry| Arc::clone(entry.value()))
    }

    pub(crate) fn has_routes(&self, type_id: TypeId) -> bool {
        self.routes.contains_key(&type_id)
    }

    /// Number of live subscriptions across all types.
    pub(crate) fn len(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hand `event` to every subscription of `event_type`, each on its own
    /// execution context. Returns how many deliveries were scheduled.
    pub(crate) fn dispatch(
        &self,
        event_type: EventType,
        event: &ErasedEvent,
        schedulers: &Schedulers,
        hook: &ErrorHook,
    ) -> usize {
        let Some(routes) = self.routes_for(event_type.id()) else {
            trace!(event_type = %event_type, "No subscribers for event type");
            return 0;
        };

        for subscription in routes.iter() {
            let subscription = Arc::clone(subscription);
            let event = Arc::clone(event);
            let hook = Arc::clone(hook);
            schedulers.schedule(
                subscription.thread_mode(),
                Box::new(move || subscription.deliver(&*event, &hook)),
            );
        }

        trace!(
            event_type = %event_type,
            subscriptions = routes.len(),
            "Event dispatched"
        );
        routes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriber::{Subscribe, SubscribeOptions, SubscriberId, SubscriberMethod, SubscriberMethods};
    use crate::thread_mode::ThreadMode;

    struct Ranked(i32);

    impl Subscribe for Ranked {
        fn subscriber_methods(self: Arc<Self>) -> Vec<SubscriberMethod> {
            let priority = self.0;
            SubscriberMethods::new(self)
                .on(
                    SubscribeOptions::from(ThreadMode::Posting).with_priority(priority),
                    |_: &Self, _: &u8| {},
                )
                .build()
        }
    }

    fn subscription(priority: i32) -> Arc<Subscription> {
        let subscriber = Arc::new(Ranked(priority));
        let methods = Arc::clone(&subscriber).subscriber_methods();
        Arc::new(Subscription::new(SubscriberId::of(&subscriber), &methods[0]))
    }

    #[test]
    fn test_insert_orders_by_priority_then_arrival() {
        let router = Router::default();
        let low = subscription(0);
        let high = subscription(10);
        let low_later = subscription(0);
        let mid = subscription(5);

        for s in [&low, &high, &low_later, &mid] {
            router.insert(Arc::clone(s));
        }

        let routes = router.routes_for(TypeId::of::<u8>()).unwrap();
        let ids: Vec<_> = routes.iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec![high.id(), mid.id(), low.id(), low_later.id()]);
        assert_eq!(router.len(), 4);
    }

    #[test]
    fn test_remove_drops_empty_routes() {
        let router = Router::default();
        let only = subscription(0);
        router.insert(Arc::clone(&only));
        assert!(router.has_routes(TypeId::of::<u8>()));

        assert!(router.remove(&only));
        assert!(!router.remove(&only));
        assert!(!router.has_routes(TypeId::of::<u8>()));
        assert!(router.is_empty());
    }

    #[test]
    fn test_snapshot_survives_removal() {
        let router = Router::default();
        let a = subscription(0);
        router.insert(Arc::clone(&a));

        let snapshot = router.routes_for(TypeId::of::<u8>()).unwrap();
        router.remove(&a);
        assert_eq!(snapshot.len(), 1);
        assert!(router.routes_for(TypeId::of::<u8>()).is_none());
    }
}
