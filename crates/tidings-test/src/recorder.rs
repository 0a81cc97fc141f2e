//! Thread-safe event log for assertions across execution contexts.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Duration;

/// Append-only log shared between handlers and the test thread.
///
/// Clones share the same log.
#[derive(Debug)]
pub struct Recorder<T> {
    inner: Arc<Shared<T>>,
}

#[derive(Debug)]
struct Shared<T> {
    items: Mutex<Vec<T>>,
    grew: Condvar,
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Recorder<T> {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Shared {
                items: Mutex::new(Vec::new()),
                grew: Condvar::new(),
            }),
        }
    }

    fn items(&self) -> MutexGuard<'_, Vec<T>> {
        self.inner
            .items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an item and wake waiters.
    pub fn push(&self, item: T) {
        self.items().push(item);
        self.inner.grew.notify_all();
    }

    /// Number of recorded items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items().len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.items().clear();
    }

    /// Block until at least `len` items are recorded or `timeout` elapses.
    ///
    /// Returns whether the length was reached.
    #[must_use]
    pub fn wait_for_len(&self, len: usize, timeout: Duration) -> bool {
        let items = self.items();
        let (items, _) = self
            .inner
            .grew
            .wait_timeout_while(items, timeout, |items| items.len() < len)
            .unwrap_or_else(PoisonError::into_inner);
        items.len() >= len
    }
}

impl<T: Clone> Recorder<T> {
    /// Copy of everything recorded so far, in arrival order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        self.items().clone()
    }
}

/// An event together with the thread that handled it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery<E> {
    /// The delivered event.
    pub event: E,
    /// Name of the handling thread, if it has one.
    pub thread_name: Option<String>,
    /// Id of the handling thread.
    pub thread_id: ThreadId,
}

impl<E> Delivery<E> {
    /// Capture `event` with the current thread.
    #[must_use]
    pub fn here(event: E) -> Self {
        let current = thread::current();
        Self {
            event,
            thread_name: current.name().map(str::to_string),
            thread_id: current.id(),
        }
    }

    /// Whether the handling thread's name starts with `prefix`.
    #[must_use]
    pub fn ran_on(&self, prefix: &str) -> bool {
        self.thread_name
            .as_deref()
            .is_some_and(|name| name.starts_with(prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_snapshot() {
        let recorder = Recorder::new();
        recorder.push(1);
        recorder.clone().push(2);
        assert_eq!(recorder.snapshot(), vec![1, 2]);
        assert_eq!(recorder.len(), 2);

        recorder.clear();
        assert!(recorder.is_empty());
    }

    #[test]
    fn test_wait_for_len_across_threads() {
        let recorder = Recorder::new();
        let writer = recorder.clone();
        let handle = thread::spawn(move || {
            for i in 0..3 {
                thread::sleep(Duration::from_millis(5));
                writer.push(i);
            }
        });

        assert!(recorder.wait_for_len(3, Duration::from_secs(5)));
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_for_len_times_out() {
        let recorder: Recorder<u8> = Recorder::new();
        assert!(!recorder.wait_for_len(1, Duration::from_millis(10)));
    }

    #[test]
    fn test_delivery_captures_thread() {
        let delivery = thread::Builder::new()
            .name("worker-7".to_string())
            .spawn(|| Delivery::here("x"))
            .unwrap()
            .join()
            .unwrap();
        assert!(delivery.ran_on("worker-"));
        assert_ne!(delivery.thread_id, thread::current().id());
    }
}
