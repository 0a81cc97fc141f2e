//! Per-subscriber bookkeeping of live subscriptions and sticky replays.
//!
//! Lock order is registry first, then the router's shards. Nothing here
//! waits on a gate: callers close subscriptions under the lock and wait for
//! them after it is released.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::error::{BusError, BusResult};
use crate::event::EventType;
use crate::router::Router;
use crate::subscriber::{SubscriberId, SubscriberMethod};
use crate::subscription::Subscription;

#[derive(Debug, Default)]
struct RegistryIndex {
    live: HashMap<SubscriberId, HashMap<EventType, Arc<Subscription>>>,
    sticky: HashMap<SubscriberId, Vec<Arc<Subscription>>>,
}

/// What a registration changed.
#[derive(Debug, Default)]
pub(crate) struct Registration {
    /// Subscriptions displaced by this registration, already closed.
    pub(crate) replaced: Vec<Arc<Subscription>>,
    /// Newly routed subscriptions that want a sticky replay.
    pub(crate) sticky: Vec<Arc<Subscription>>,
    /// Number of subscriptions routed.
    pub(crate) installed: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Registry {
    index: Mutex<RegistryIndex>,
}

impl Registry {
    fn lock(&self) -> MutexGuard<'_, RegistryIndex> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Route one subscription per descriptor for `owner`.
    ///
    /// A descriptor whose event type `owner` already subscribes to replaces
    /// the earlier subscription.
    pub(crate) fn register(
        &self,
        owner: &SubscriberId,
        methods: &[SubscriberMethod],
        router: &Router,
    ) -> Registration {
        let mut guard = self.lock();
        let index = &mut *guard;
        let mut registration = Registration::default();
        let subscriptions = index.live.entry(owner.clone()).or_default();
        let mut replaced_types = Vec::new();

        for method in methods {
            let subscription = Arc::new(Subscription::new(owner.clone(), method));

            if let Some(previous) =
                subscriptions.insert(method.event_type(), Arc::clone(&subscription))
            {
                router.remove(&previous);
                previous.close();
                debug!(
                    subscriber = %owner,
                    event_type = %method.event_type(),
                    previous = previous.id(),
                    "Replacing existing subscription"
                );
                replaced_types.push(method.event_type());
                registration.replaced.push(previous);
            }

            router.insert(Arc::clone(&subscription));
            registration.installed = registration.installed.saturating_add(1);
            if method.is_sticky() {
                registration.sticky.push(subscription);
            }
        }

        // A later descriptor of the same type displaced these.
        registration.sticky.retain(|subscription| subscription.is_active());

        if let Some(replays) = index.sticky.get_mut(owner) {
            let (stale, kept): (Vec<_>, Vec<_>) = replays.drain(..).partition(|replay| {
                replaced_types.contains(&replay.event_type()) || !replay.is_active()
            });
            *replays = kept;
            for replay in stale {
                if replay.is_active() {
                    replay.close();
                    registration.replaced.push(replay);
                }
            }
        }

        registration
    }

    /// Remember a pending sticky replay of `source` so `unregister` can
    /// cancel it.
    ///
    /// Returns `false`, and the replay must not run, once `source` is no
    /// longer its owner's live subscription for that event type.
    pub(crate) fn track_replay(
        &self,
        source: &Arc<Subscription>,
        replay: Arc<Subscription>,
    ) -> bool {
        let mut index = self.lock();
        let owner = source.owner();
        let live = index
            .live
            .get(owner)
            .and_then(|subscriptions| subscriptions.get(&source.event_type()))
            .is_some_and(|current| Arc::ptr_eq(current, source) && current.is_active());
        if !live {
            return false;
        }
        let replays = index.sticky.entry(owner.clone()).or_default();
        replays.retain(|r| r.is_active());
        replays.push(replay);
        true
    }

    /// Remove every subscription and replay of `owner`.
    ///
    /// Returns them closed; the caller waits for them to go idle.
    pub(crate) fn unregister(
        &self,
        owner: &SubscriberId,
        router: &Router,
    ) -> BusResult<Vec<Arc<Subscription>>> {
        let mut index = self.lock();
        let Some(subscriptions) = index.live.remove(owner) else {
            return Err(BusError::NotRegistered {
                subscriber: owner.name().to_string(),
            });
        };

        let mut cancelled: Vec<_> = subscriptions.into_values().collect();
        for subscription in &cancelled {
            router.remove(subscription);
            subscription.close();
        }
        if let Some(replays) = index.sticky.remove(owner) {
            for replay in &replays {
                replay.close();
            }
            cancelled.extend(replays);
        }

        Ok(cancelled)
    }

    /// Remove the subscription of `owner` for `event_type`, together with
    /// any replay for it. The owner's entry goes once it is empty.
    pub(crate) fn unregister_event_type(
        &self,
        owner: &SubscriberId,
        event_type: EventType,
        router: &Router,
    ) -> BusResult<Vec<Arc<Subscription>>> {
        let mut index = self.lock();
        let Entry::Occupied(mut owned) = index.live.entry(owner.clone()) else {
            return Err(BusError::NotRegistered {
                subscriber: owner.name().to_string(),
            });
        };
        let Some(subscription) = owned.get_mut().remove(&event_type) else {
            return Err(BusError::NoSuchSubscription {
                subscriber: owner.name().to_string(),
                event_type,
            });
        };
        let owner_emptied = owned.get().is_empty();
        if owner_emptied {
            owned.remove();
        }

        router.remove(&subscription);
        subscription.close();
        let mut cancelled = vec![subscription];

        if owner_emptied {
            if let Some(replays) = index.sticky.remove(owner) {
                cancelled.extend(replays);
            }
        } else if let Some(replays) = index.sticky.get_mut(owner) {
            let (matching, rest): (Vec<_>, Vec<_>) = replays
                .drain(..)
                .partition(|replay| replay.event_type() == event_type);
            *replays = rest;
            cancelled.extend(matching);
        }
        for subscription in &cancelled {
            subscription.close();
        }

        Ok(cancelled)
    }

    pub(crate) fn is_registered(&self, owner: &SubscriberId) -> bool {
        self.lock().live.contains_key(owner)
    }

    /// Number of live subscriptions held by `owner`.
    pub(crate) fn subscriptions_of(&self, owner: &SubscriberId) -> usize {
        self.lock().live.get(owner).map_or(0, HashMap::len)
    }

    /// Number of registered subscribers.
    pub(crate) fn len(&self) -> usize {
        self.lock().live.len()
    }
}
