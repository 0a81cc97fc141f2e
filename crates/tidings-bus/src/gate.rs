//! Cancellation gate guarding a subscription's handler.
//!
//! Every delivery passes through [`Gate::enter`]. Closing the gate stops new
//! deliveries immediately, and [`Gate::wait_idle`] blocks until the ones
//! already running have left. A thread that is currently inside the gate
//! never waits for itself, so a handler may cancel its own subscription.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

static NEXT_GATE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Gates the current thread is inside, innermost last.
    static ENTERED: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

#[derive(Debug)]
struct GateState {
    open: bool,
    in_flight: usize,
}

#[derive(Debug)]
pub(crate) struct Gate {
    id: u64,
    state: Mutex<GateState>,
    idle: Condvar,
}

impl Gate {
    pub(crate) fn new() -> Self {
        Self {
            id: NEXT_GATE_ID.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(GateState {
                open: true,
                in_flight: 0,
            }),
            idle: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_open(&self) -> bool {
        self.lock().open
    }

    /// Run `f` if the gate is open. Returns `None` without running it
    /// otherwise.
    pub(crate) fn enter<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        {
            let mut state = self.lock();
            if !state.open {
                return None;
            }
            state.in_flight = state.in_flight.saturating_add(1);
        }

        let _pass = Pass::new(self);
        Some(f())
    }

    /// Refuse all further entries. Does not wait.
    pub(crate) fn close(&self) {
        self.lock().open = false;
    }

    /// Block until no delivery is in flight, unless the current thread is
    /// itself inside this gate.
    pub(crate) fn wait_idle(&self) {
        if self.entered_here() {
            return;
        }
        let mut state = self.lock();
        while state.in_flight > 0 {
            state = self
                .idle
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn entered_here(&self) -> bool {
        ENTERED.with(|entered| entered.borrow().contains(&self.id))
    }
}

/// Tracks one delivery inside a gate. Leaves on drop, including unwinds.
struct Pass<'a> {
    gate: &'a Gate,
}

impl<'a> Pass<'a> {
    fn new(gate: &'a Gate) -> Self {
        ENTERED.with(|entered| entered.borrow_mut().push(gate.id));
        Self { gate }
    }
}

impl Drop for Pass<'_> {
    fn drop(&mut self) {
        ENTERED.with(|entered| {
            let mut entered = entered.borrow_mut();
            if let Some(pos) = entered.iter().rposition(|id| *id == self.gate.id) {
                entered.remove(pos);
            }
        });

        let mut state = self.gate.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        if state.in_flight == 0 {
            self.gate.idle.notify_all();
        }
    }
}
