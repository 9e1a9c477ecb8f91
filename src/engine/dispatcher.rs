//! Dispatcher: admission control, employee selection and held-call wake-up.
//!
//! All shared bookkeeping (in-flight counter, roster, held queue) lives in
//! one [`DispatchState`] behind one mutex. Employee availability is part of
//! the roster, so a woken call re-checking for a free employee sees every
//! assignment and release made before it.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use opentelemetry::KeyValue;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, warn};

use super::handler::CallHandler;
use super::hold::{HeldCall, HoldOutcome};
use crate::error::{Error, Result};
use crate::model::{Call, CallId, Employee, EmployeeId, Reason};
use crate::telemetry::dispatch::{record_transition, start_call_span};
use crate::telemetry::metrics;

/// Constructor-time inputs for a dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Maximum number of calls being answered or held at once.
    pub max_concurrent: usize,
    /// How long a held call waits for an employee before it is rejected.
    pub hold_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            hold_timeout: Duration::from_secs(10),
        }
    }
}

/// Point-in-time view of the dispatcher's bookkeeping.
#[derive(Debug, Clone)]
pub struct DispatcherStatus {
    pub in_flight: usize,
    pub held: usize,
    pub roster: Vec<Employee>,
}

/// Routes calls to employees.
///
/// Cheap to clone; clones share the same roster, queue and counter.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    config: DispatcherConfig,
    handler: Arc<dyn CallHandler>,
    runtime: Handle,
    state: Mutex<DispatchState>,
}

#[derive(Default)]
struct DispatchState {
    in_flight: usize,
    /// Sorted by tier once, at replacement time.
    roster: Vec<Employee>,
    held: VecDeque<Arc<HeldCall>>,
}

impl DispatchState {
    /// First free employee in roster order, marked busy with `call`.
    fn claim_free_employee(&mut self, call: CallId) -> Option<Employee> {
        let employee = self.roster.iter_mut().find(|e| e.is_free())?;
        employee.occupy(call);
        Some(employee.clone())
    }

    fn release_employee(&mut self, employee: EmployeeId, call: CallId) -> bool {
        self.roster
            .iter_mut()
            .find(|e| e.id == employee && e.current_call == Some(call))
            .is_some_and(|e| e.release(call))
    }

    /// Wake the oldest held call and drop it from the queue.
    ///
    /// Entries whose timer already fired are discarded on the way, so a
    /// wake-up is never spent on a call that can no longer use it.
    fn wake_oldest_held(&mut self) -> Option<CallId> {
        while let Some(held) = self.held.pop_front() {
            if held.wake() {
                return Some(held.call_id());
            }
        }
        None
    }

    fn remove_held(&mut self, held: &Arc<HeldCall>) {
        self.held.retain(|h| !Arc::ptr_eq(h, held));
    }

    fn waiting(&self) -> usize {
        self.held.iter().filter(|h| h.is_waiting()).count()
    }
}

impl Dispatcher {
    /// Create a dispatcher that spawns onto the current tokio runtime.
    pub fn new(config: DispatcherConfig, handler: Arc<dyn CallHandler>) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| Error::Runtime(e.to_string()))?;
        Ok(Self::with_runtime(config, handler, runtime))
    }

    /// Create a dispatcher that spawns onto `runtime`.
    ///
    /// At most `max_concurrent` calls occupy a task at any time, so the
    /// runtime never runs more dispatch work than the limit allows.
    pub fn with_runtime(
        config: DispatcherConfig,
        handler: Arc<dyn CallHandler>,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                handler,
                runtime,
                state: Mutex::new(DispatchState::default()),
            }),
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.inner.config
    }

    /// Submit a call.
    ///
    /// Never blocks. The returned handle resolves with the call once it has
    /// been answered or rejected; over-capacity calls come back already
    /// resolved with `Reason::NoCapacity`.
    pub fn submit(&self, mut call: Call) -> CallHandle {
        if !call.is_pending() {
            warn!(call_id = %call.id, outcome = %call.outcome, "call already resolved, not dispatching");
            return CallHandle::ready(call);
        }

        let mut state = self.inner.state.lock();
        if state.in_flight >= self.inner.config.max_concurrent {
            let in_flight = state.in_flight;
            drop(state);
            debug!(call_id = %call.id, in_flight, "all lines busy, rejecting call");
            metrics::calls_submitted().add(1, &[KeyValue::new("result", "rejected")]);
            reject(&mut call, Reason::NoCapacity);
            record_resolution(&call);
            return CallHandle::ready(call);
        }

        state.in_flight += 1;
        let slot = CapacitySlot {
            inner: Arc::clone(&self.inner),
        };
        let span = start_call_span(call.id);
        let fallback = call.clone();
        let inner = Arc::clone(&self.inner);
        metrics::calls_submitted().add(1, &[KeyValue::new("result", "accepted")]);

        let task = match state.claim_free_employee(call.id) {
            Some(employee) => {
                let in_flight = state.in_flight;
                drop(state);
                span.in_scope(|| {
                    debug!(employee_id = %employee.id, tier = %employee.tier, in_flight, "call assigned");
                });
                record_transition(&span, "pending", "assigned");
                self.inner.runtime.spawn(
                    async move {
                        let _slot = slot;
                        let call = inner.attend(employee, call).await;
                        record_resolution(&call);
                        call
                    }
                    .instrument(span),
                )
            }
            None => {
                let held = Arc::new(HeldCall::new(call.id));
                state.held.push_back(Arc::clone(&held));
                let queued = state.held.len();
                drop(state);
                span.in_scope(|| debug!(queued, "no free employee, holding call"));
                record_transition(&span, "pending", "held");
                metrics::calls_held().add(1, &[]);
                self.inner.runtime.spawn(
                    async move {
                        let _slot = slot;
                        let call = inner.hold(held, call).await;
                        record_resolution(&call);
                        call
                    }
                    .instrument(span),
                )
            }
        };

        CallHandle::pending(task, fallback)
    }

    /// Replace the roster with `employees`, sorted by tier.
    ///
    /// An empty roster is ignored and leaves everything as it was. Otherwise
    /// the oldest held call is woken, since the new roster may have someone
    /// free. Returns whether the roster was replaced.
    pub fn replace_roster(&self, employees: impl IntoIterator<Item = Employee>) -> bool {
        let mut roster: Vec<Employee> = employees.into_iter().collect();
        if roster.is_empty() {
            debug!("empty roster supplied, keeping current roster");
            return false;
        }
        // Stable: equal tiers keep the order they were supplied in.
        roster.sort_by_key(|e| e.tier);
        let size = roster.len();

        let mut state = self.inner.state.lock();
        state.roster = roster;
        let woken = state.wake_oldest_held();
        drop(state);

        if let Some(call_id) = woken {
            metrics::held_wakeups().add(1, &[KeyValue::new("trigger", "roster")]);
            info!(employees = size, woken = %call_id, "roster replaced");
        } else {
            info!(employees = size, "roster replaced");
        }
        true
    }

    pub fn status(&self) -> DispatcherStatus {
        let state = self.inner.state.lock();
        DispatcherStatus {
            in_flight: state.in_flight,
            held: state.waiting(),
            roster: state.roster.clone(),
        }
    }

    /// Calls currently being answered or held.
    pub fn in_flight(&self) -> usize {
        self.inner.state.lock().in_flight
    }

    /// Calls currently waiting in the hold queue.
    pub fn held(&self) -> usize {
        self.inner.state.lock().waiting()
    }

    pub fn roster(&self) -> Vec<Employee> {
        self.inner.state.lock().roster.clone()
    }
}

impl Inner {
    /// Answer `call` with an employee already marked busy for it.
    async fn attend(&self, employee: Employee, mut call: Call) -> Call {
        let _assignment = Assignment {
            inner: self,
            employee: employee.id,
            call: call.id,
        };
        let employee_id = employee.id;
        let handler = Arc::clone(&self.handler);
        let snapshot = call.clone();
        let started = tokio::time::Instant::now();

        let result = self
            .runtime
            .spawn(async move { handler.handle(&employee, &snapshot).await }.in_current_span())
            .await;

        let duration_ms = started.elapsed().as_millis() as u64;
        metrics::handling_duration_ms().record(duration_ms as f64, &[]);

        match result {
            Ok(Ok(())) => {
                if let Err(e) = call.complete(employee_id) {
                    warn!(call_id = %call.id, error = %e, "could not complete call");
                }
                info!(call_id = %call.id, employee_id = %employee_id, duration_ms, "call completed");
            }
            Ok(Err(e)) => {
                warn!(call_id = %call.id, employee_id = %employee_id, error = %e, "call handling failed");
                reject(&mut call, Reason::ProcessingError);
            }
            Err(e) => {
                error!(call_id = %call.id, employee_id = %employee_id, error = %e, "call handling interrupted");
                reject(&mut call, Reason::ProcessingError);
            }
        }
        call
    }

    /// Park a held call until it is woken or its timer fires.
    async fn hold(&self, held: Arc<HeldCall>, mut call: Call) -> Call {
        match held.wait(self.config.hold_timeout).await {
            HoldOutcome::TimedOut => {
                self.state.lock().remove_held(&held);
                warn!(call_id = %call.id, "hold timed out, returning call unanswered");
                reject(&mut call, Reason::NoEmployeeAvailable);
                call
            }
            HoldOutcome::Woken => {
                let claimed = self.state.lock().claim_free_employee(call.id);
                match claimed {
                    Some(employee) => {
                        debug!(call_id = %call.id, employee_id = %employee.id, "held call assigned");
                        self.attend(employee, call).await
                    }
                    None => {
                        // Another call took the employee first. The call is
                        // rejected rather than re-queued.
                        warn!(call_id = %call.id, "woken but no employee free, rejecting");
                        reject(&mut call, Reason::NoEmployeeAvailable);
                        call
                    }
                }
            }
        }
    }

    fn release_capacity(&self) {
        let mut state = self.state.lock();
        state.in_flight = match state.in_flight.checked_sub(1) {
            Some(n) => n,
            None => {
                error!("in-flight counter released below zero");
                0
            }
        };
        if let Some(call_id) = state.wake_oldest_held() {
            drop(state);
            metrics::held_wakeups().add(1, &[KeyValue::new("trigger", "release")]);
            debug!(woken = %call_id, "woke oldest held call");
        }
    }
}

/// One unit of in-flight capacity, released on drop.
///
/// Owned by the task answering or holding the call, so capacity comes back
/// exactly once however that task ends.
struct CapacitySlot {
    inner: Arc<Inner>,
}

impl Drop for CapacitySlot {
    fn drop(&mut self) {
        self.inner.release_capacity();
    }
}

/// Frees the assigned employee on drop, including on handler failure.
struct Assignment<'a> {
    inner: &'a Inner,
    employee: EmployeeId,
    call: CallId,
}

impl Drop for Assignment<'_> {
    fn drop(&mut self) {
        let released = self
            .inner
            .state
            .lock()
            .release_employee(self.employee, self.call);
        if !released {
            debug!(employee_id = %self.employee, call_id = %self.call, "employee no longer on roster");
        }
    }
}

fn reject(call: &mut Call, reason: Reason) {
    if let Err(e) = call.reject(reason) {
        warn!(call_id = %call.id, error = %e, "could not reject call");
    }
}

fn record_resolution(call: &Call) {
    let reason = call.reason.map(|r| r.to_string()).unwrap_or_else(|| "none".to_string());
    metrics::calls_resolved().add(
        1,
        &[
            KeyValue::new("outcome", call.outcome.to_string()),
            KeyValue::new("reason", reason),
        ],
    );
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Resolves to the submitted call once it has an outcome.
pub struct CallHandle {
    id: CallId,
    state: HandleState,
}

enum HandleState {
    Ready(Call),
    Pending {
        task: JoinHandle<Call>,
        /// Copy of the call as submitted, in case the task is lost.
        fallback: Call,
    },
}

impl CallHandle {
    fn ready(call: Call) -> Self {
        Self {
            id: call.id,
            state: HandleState::Ready(call),
        }
    }

    fn pending(task: JoinHandle<Call>, fallback: Call) -> Self {
        Self {
            id: fallback.id,
            state: HandleState::Pending { task, fallback },
        }
    }

    pub fn call_id(&self) -> CallId {
        self.id
    }

    /// True once the outcome is available without waiting.
    pub fn is_finished(&self) -> bool {
        match &self.state {
            HandleState::Ready(_) => true,
            HandleState::Pending { task, .. } => task.is_finished(),
        }
    }
}

impl Future for CallHandle {
    type Output = Call;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Call> {
        let this = self.get_mut();
        let call = match &mut this.state {
            HandleState::Ready(call) => return Poll::Ready(call.clone()),
            HandleState::Pending { task, fallback } => match Pin::new(task).poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Ok(call)) => call,
                Poll::Ready(Err(e)) => {
                    error!(call_id = %fallback.id, error = %e, "dispatch task lost");
                    let mut call = fallback.clone();
                    reject(&mut call, Reason::ProcessingError);
                    call
                }
            },
        };
        this.state = HandleState::Ready(call.clone());
        Poll::Ready(call)
    }
}
