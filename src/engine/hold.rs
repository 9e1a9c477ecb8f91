//! Held calls: calls waiting for an employee to free up.
//!
//! A held call sits in the dispatcher's FIFO queue and parks its task until
//! either the dispatcher wakes it or its hold timer expires. Both signals
//! funnel through one compare-and-swap on the hold state, so exactly one of
//! them wins:
//!
//! ```text
//! Waiting ──wake()──────▶ Woken     (try to take a free employee)
//!    └────timer fires──▶ TimedOut  (reject: no employee available)
//! ```

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

use crate::model::CallId;

const WAITING: u8 = 0;
const WOKEN: u8 = 1;
const TIMED_OUT: u8 = 2;

/// How a hold ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldOutcome {
    /// Woken before the timer fired.
    Woken,
    /// The timer fired first.
    TimedOut,
}

/// A call parked until an employee frees up or its timer expires.
#[derive(Debug)]
pub struct HeldCall {
    call_id: CallId,
    state: AtomicU8,
    wake: Notify,
}

impl HeldCall {
    pub fn new(call_id: CallId) -> Self {
        Self {
            call_id,
            state: AtomicU8::new(WAITING),
            wake: Notify::new(),
        }
    }

    pub fn call_id(&self) -> CallId {
        self.call_id
    }

    /// Still waiting on either signal?
    pub fn is_waiting(&self) -> bool {
        self.state.load(Ordering::Acquire) == WAITING
    }

    /// Wake the held call.
    ///
    /// Returns false if the hold already ended (woken before or timed out),
    /// in which case nothing is signalled.
    pub fn wake(&self) -> bool {
        if self.transition(WOKEN) {
            // Stores a permit if the task has not reached `wait` yet.
            self.wake.notify_one();
            true
        } else {
            false
        }
    }

    /// Park until woken or until `timeout` elapses.
    ///
    /// A wake that lands after the timer fired but before the hold is
    /// settled still counts as a wake: the decision is taken by the state
    /// swap, not by which branch of the race returned.
    pub async fn wait(&self, timeout: Duration) -> HoldOutcome {
        if self.is_waiting() {
            tokio::select! {
                _ = self.wake.notified() => {}
                _ = tokio::time::sleep(timeout) => {}
            }
        }
        self.settle()
    }

    fn settle(&self) -> HoldOutcome {
        if self.transition(TIMED_OUT) {
            return HoldOutcome::TimedOut;
        }
        match self.state.load(Ordering::Acquire) {
            WOKEN => HoldOutcome::Woken,
            _ => HoldOutcome::TimedOut,
        }
    }

    fn transition(&self, to: u8) -> bool {
        self.state
            .compare_exchange(WAITING, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
