//! Event marker trait and runtime event type keys.

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Anything that can travel over the bus.
///
/// Implemented for every `'static + Send + Sync + Debug` type, so plain
/// structs and enums are events without further ceremony. Routing uses the
/// concrete type only: posting a `u32` never reaches a `u64` handler.
pub trait Event: Any + Send + Sync + fmt::Debug {}

impl<T: Any + Send + Sync + fmt::Debug> Event for T {}

/// Type-erased event shared between all deliveries of one post.
pub(crate) type ErasedEvent = Arc<dyn Any + Send + Sync>;

/// Routing key of an event: its [`TypeId`] plus a readable name.
///
/// Equality and hashing only consider the `TypeId`.
#[derive(Clone, Copy)]
pub struct EventType {
    id: TypeId,
    name: &'static str,
}

impl EventType {
    /// The key for event type `E`.
    #[must_use]
    pub fn of<E: Event>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: type_name::<E>(),
        }
    }

    /// The underlying type id.
    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The Rust type name, for diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for EventType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventType {}

impl Hash for EventType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EventType").field(&self.name).finish()
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Ping;

    #[test]
    fn test_event_type_identity() {
        assert_eq!(EventType::of::<Ping>(), EventType::of::<Ping>());
        assert_ne!(EventType::of::<u32>(), EventType::of::<u64>());
        assert_eq!(EventType::of::<Ping>().id(), TypeId::of::<Ping>());
    }

    #[test]
    fn test_event_type_display_uses_type_name() {
        let ty = EventType::of::<Ping>();
        assert!(ty.to_string().ends_with("Ping"));
        assert_eq!(EventType::of::<String>().name(), "alloc::string::String");
    }
}
