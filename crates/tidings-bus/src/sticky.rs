//! Cache of the most recent sticky event per type.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::event::ErasedEvent;

/// Last sticky event of each type. All operations take the one lock, so
/// they are atomic with respect to each other.
#[derive(Default)]
pub(crate) struct StickyStore {
    events: RwLock<HashMap<TypeId, ErasedEvent>>,
}

impl std::fmt::Debug for StickyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StickyStore")
            .field("len", &self.len())
            .finish()
    }
}

impl StickyStore {
    fn read(&self) -> RwLockReadGuard<'_, HashMap<TypeId, ErasedEvent>> {
        self.events.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<TypeId, ErasedEvent>> {
        self.events.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cache `event`, returning the entry it replaced.
    pub(crate) fn put(&self, type_id: TypeId, event: ErasedEvent) -> Option<ErasedEvent> {
        self.write().insert(type_id, event)
    }

    pub(crate) fn get(&self, type_id: TypeId) -> Option<ErasedEvent> {
        self.read().get(&type_id).cloned()
    }

    /// Remove the entry for `type_id` only if `matches` accepts it.
    pub(crate) fn remove_if(
        &self,
        type_id: TypeId,
        matches: impl FnOnce(&(dyn Any + Send + Sync)) -> bool,
    ) -> bool {
        let mut events = self.write();
        let accepted = events.get(&type_id).is_some_and(|cached| matches(&**cached));
        if accepted {
            events.remove(&type_id);
        }
        accepted
    }

    pub(crate) fn remove(&self, type_id: TypeId) -> Option<ErasedEvent> {
        self.write().remove(&type_id)
    }

    /// Drop every entry, returning how many there were.
    pub(crate) fn clear(&self) -> usize {
        let mut events = self.write();
        let count = events.len();
        events.clear();
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.read().len()
    }
}
