//! Integration tests for the dispatcher.
//!
//! Timing-sensitive tests run on paused tokio time, so hold timers and
//! handling durations advance deterministically.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use switchboard_rs::engine::{CallHandler, Dispatcher, DispatcherConfig, SimulatedHandler};
use switchboard_rs::error::{Error, Result};
use switchboard_rs::model::*;
use tokio::time::Instant;

fn dispatcher(max_concurrent: usize, hold_secs: u64, handling_secs: u64) -> Dispatcher {
    Dispatcher::new(
        DispatcherConfig {
            max_concurrent,
            hold_timeout: Duration::from_secs(hold_secs),
        },
        Arc::new(SimulatedHandler::fixed(Duration::from_secs(handling_secs))),
    )
    .expect("inside a tokio runtime")
}

fn operators(n: u32) -> Vec<Employee> {
    (0..n).map(|id| Employee::new(id, Tier::Operator)).collect()
}

/// Fails calls whose id is listed, after a short delay; answers the rest.
struct FailingHandler {
    fail: Vec<CallId>,
}

#[async_trait]
impl CallHandler for FailingHandler {
    async fn handle(&self, _employee: &Employee, call: &Call) -> Result<()> {
        tokio::time::sleep(Duration::from_secs(1)).await;
        if self.fail.contains(&call.id) {
            Err(Error::Handling("line dropped".to_string()))
        } else {
            Ok(())
        }
    }
}

struct PanickingHandler;

#[async_trait]
impl CallHandler for PanickingHandler {
    async fn handle(&self, _employee: &Employee, _call: &Call) -> Result<()> {
        panic!("handler blew up");
    }
}

// ---------------------------------------------------------------------------
// Direct assignment and capacity
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn single_call_is_answered() {
    let d = dispatcher(10, 10, 5);
    d.replace_roster(operators(1));

    let call = d.submit(Call::new(1)).await;

    assert_eq!(call.outcome, Outcome::Completed);
    assert_eq!(call.reason, None);
    assert_eq!(call.handled_by, Some(EmployeeId(0)));
    assert!(call.resolved_at.is_some());
    assert_eq!(d.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn assigned_employee_is_busy_until_call_ends() {
    let d = dispatcher(10, 10, 5);
    d.replace_roster(operators(1));

    let handle = d.submit(Call::new(7));
    let roster = d.roster();
    assert_eq!(roster[0].availability, Availability::Busy);
    assert_eq!(roster[0].current_call, Some(CallId(7)));
    assert_eq!(d.in_flight(), 1);

    handle.await;
    let roster = d.roster();
    assert!(roster[0].is_free());
    assert_eq!(roster[0].current_call, None);
}

#[tokio::test(start_paused = true)]
async fn over_capacity_call_is_rejected_immediately() {
    let d = dispatcher(1, 10, 5);
    d.replace_roster(operators(2));

    let first = d.submit(Call::new(1));
    let second = d.submit(Call::new(2));

    assert!(second.is_finished());
    assert_eq!(d.in_flight(), 1);

    let start = Instant::now();
    let second = second.await;
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(second.outcome, Outcome::Rejected);
    assert_eq!(second.reason, Some(Reason::NoCapacity));
    assert_eq!(second.handled_by, None);

    assert_eq!(first.await.outcome, Outcome::Completed);
}

#[tokio::test(start_paused = true)]
async fn twenty_calls_on_ten_lines_rejects_ten() {
    let d = dispatcher(10, 10, 5);
    d.replace_roster(operators(5));

    let handles: Vec<_> = (0..20).map(|id| d.submit(Call::new(id))).collect();
    assert_eq!(d.in_flight(), 10);
    assert_eq!(d.held(), 5);
    assert!(handles[10..].iter().all(|h| h.is_finished()));

    let mut calls = Vec::new();
    for handle in handles {
        calls.push(handle.await);
    }

    for call in &calls[..10] {
        assert_eq!(call.outcome, Outcome::Completed, "{}", call.id);
    }
    for call in &calls[10..] {
        assert_eq!(call.outcome, Outcome::Rejected, "{}", call.id);
        assert_eq!(call.reason, Some(Reason::NoCapacity));
    }
    assert_eq!(d.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn non_pending_call_is_returned_untouched() {
    let d = dispatcher(10, 10, 5);
    d.replace_roster(operators(1));

    let mut call = Call::new(3);
    call.reject(Reason::NoCapacity).unwrap();

    let handle = d.submit(call);
    assert!(handle.is_finished());
    assert_eq!(d.in_flight(), 0);

    let call = handle.await;
    assert_eq!(call.reason, Some(Reason::NoCapacity));
    assert!(d.roster()[0].is_free());
}

// ---------------------------------------------------------------------------
// Employee selection
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn lowest_tier_is_offered_calls_first() {
    let d = dispatcher(10, 10, 5);
    d.replace_roster(vec![
        Employee::new(1, Tier::Director),
        Employee::new(2, Tier::Operator),
        Employee::new(3, Tier::Supervisor),
    ]);

    let tiers: Vec<_> = d.roster().iter().map(|e| e.tier).collect();
    assert_eq!(tiers, vec![Tier::Operator, Tier::Supervisor, Tier::Director]);

    let first = d.submit(Call::new(1));
    let second = d.submit(Call::new(2));
    let third = d.submit(Call::new(3));

    assert_eq!(first.await.handled_by, Some(EmployeeId(2)));
    assert_eq!(second.await.handled_by, Some(EmployeeId(3)));
    assert_eq!(third.await.handled_by, Some(EmployeeId(1)));
}

#[tokio::test(start_paused = true)]
async fn equal_tiers_keep_roster_order() {
    let d = dispatcher(10, 10, 5);
    d.replace_roster(vec![
        Employee::new(5, Tier::Supervisor),
        Employee::new(9, Tier::Operator),
        Employee::new(4, Tier::Operator),
    ]);

    let ids: Vec<_> = d.roster().iter().map(|e| e.id.0).collect();
    assert_eq!(ids, vec![9, 4, 5]);

    let first = d.submit(Call::new(1));
    let second = d.submit(Call::new(2));
    assert_eq!(first.await.handled_by, Some(EmployeeId(9)));
    assert_eq!(second.await.handled_by, Some(EmployeeId(4)));
}

// ---------------------------------------------------------------------------
// Holding
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn ten_calls_five_employees_all_answered() {
    let d = dispatcher(10, 10, 5);
    d.replace_roster(operators(5));

    let start = Instant::now();
    let handles: Vec<_> = (0..10).map(|id| d.submit(Call::new(id))).collect();
    assert_eq!(d.held(), 5);

    for handle in handles {
        let call = handle.await;
        assert_eq!(call.outcome, Outcome::Completed, "{}", call.id);
    }

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(10), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(11), "{elapsed:?}");
    assert_eq!(d.in_flight(), 0);
    assert_eq!(d.held(), 0);
}

#[tokio::test(start_paused = true)]
async fn held_call_times_out_without_employees() {
    let d = dispatcher(1, 10, 5);

    let start = Instant::now();
    let handle = d.submit(Call::new(1));
    assert_eq!(d.held(), 1);
    assert_eq!(d.in_flight(), 1);

    let call = handle.await;
    assert!(start.elapsed() >= Duration::from_secs(10));
    assert_eq!(call.outcome, Outcome::Rejected);
    assert_eq!(call.reason, Some(Reason::NoEmployeeAvailable));
    assert_eq!(d.in_flight(), 0);
    assert_eq!(d.held(), 0);
}

#[tokio::test(start_paused = true)]
async fn held_calls_are_served_oldest_first() {
    // One employee, 5s calls, 7s hold: A is answered directly, B is woken
    // when A ends at 5s, C times out at 7s.
    let d = dispatcher(3, 7, 5);
    d.replace_roster(operators(1));

    let a = d.submit(Call::new(1));
    let b = d.submit(Call::new(2));
    let c = d.submit(Call::new(3));
    assert_eq!(d.held(), 2);

    let a = a.await;
    let b = b.await;
    let c = c.await;

    assert_eq!(a.outcome, Outcome::Completed);
    assert_eq!(b.outcome, Outcome::Completed);
    assert_eq!(c.outcome, Outcome::Rejected);
    assert_eq!(c.reason, Some(Reason::NoEmployeeAvailable));
    assert_eq!(d.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn new_roster_wakes_held_call() {
    let d = dispatcher(2, 10, 5);

    let start = Instant::now();
    let handle = d.submit(Call::new(1));
    assert_eq!(d.held(), 1);

    assert!(d.replace_roster(operators(1)));
    assert_eq!(d.held(), 0);

    let call = handle.await;
    assert_eq!(call.outcome, Outcome::Completed);
    assert_eq!(call.handled_by, Some(EmployeeId(0)));
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn woken_call_rejected_when_employee_taken_first() {
    // The woken call re-checks for a free employee when its task runs. A
    // submission that lands in between takes the employee, and the woken
    // call is rejected rather than put back on hold.
    let d = dispatcher(2, 10, 5);

    let start = Instant::now();
    let held = d.submit(Call::new(1));
    assert!(d.replace_roster(operators(1)));
    let direct = d.submit(Call::new(2));

    let held = held.await;
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(held.outcome, Outcome::Rejected);
    assert_eq!(held.reason, Some(Reason::NoEmployeeAvailable));

    let direct = direct.await;
    assert_eq!(direct.outcome, Outcome::Completed);
    assert_eq!(d.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn empty_roster_replacement_changes_nothing() {
    let d = dispatcher(3, 10, 5);
    d.replace_roster(vec![Employee::new(1, Tier::Supervisor)]);

    let a = d.submit(Call::new(1));
    let b = d.submit(Call::new(2));
    let before = d.status();

    assert!(!d.replace_roster(Vec::new()));

    let after = d.status();
    assert_eq!(after.in_flight, before.in_flight);
    assert_eq!(after.held, before.held);
    assert_eq!(after.roster, before.roster);
    assert_eq!(after.in_flight, 2);
    assert_eq!(after.held, 1);

    assert_eq!(a.await.outcome, Outcome::Completed);
    assert_eq!(b.await.outcome, Outcome::Completed);
}

// ---------------------------------------------------------------------------
// Handling failures
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn handler_error_rejects_call_and_frees_employee() {
    let d = Dispatcher::new(
        DispatcherConfig::default(),
        Arc::new(FailingHandler {
            fail: vec![CallId(1)],
        }),
    )
    .unwrap();
    d.replace_roster(operators(1));

    let call = d.submit(Call::new(1)).await;

    assert_eq!(call.outcome, Outcome::Rejected);
    assert_eq!(call.reason, Some(Reason::ProcessingError));
    assert!(d.roster()[0].is_free());
    assert_eq!(d.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_call_still_lets_held_call_through() {
    let d = Dispatcher::new(
        DispatcherConfig {
            max_concurrent: 2,
            hold_timeout: Duration::from_secs(10),
        },
        Arc::new(FailingHandler {
            fail: vec![CallId(1)],
        }),
    )
    .unwrap();
    d.replace_roster(operators(1));

    let failing = d.submit(Call::new(1));
    let waiting = d.submit(Call::new(2));

    assert_eq!(failing.await.reason, Some(Reason::ProcessingError));
    let waiting = waiting.await;
    assert_eq!(waiting.outcome, Outcome::Completed);
    assert_eq!(waiting.handled_by, Some(EmployeeId(0)));
}

#[tokio::test(start_paused = true)]
async fn handler_panic_is_reported_as_processing_error() {
    let d = Dispatcher::new(DispatcherConfig::default(), Arc::new(PanickingHandler)).unwrap();
    d.replace_roster(operators(1));

    let call = d.submit(Call::new(1)).await;

    assert_eq!(call.outcome, Outcome::Rejected);
    assert_eq!(call.reason, Some(Reason::ProcessingError));
    assert!(d.roster()[0].is_free());
    assert_eq!(d.in_flight(), 0);
}

// ---------------------------------------------------------------------------
// Runtime binding
// ---------------------------------------------------------------------------

#[test]
fn new_outside_runtime_fails() {
    let result = Dispatcher::new(
        DispatcherConfig::default(),
        Arc::new(SimulatedHandler::default()),
    );
    assert!(matches!(result, Err(Error::Runtime(_))));
}

#[test]
fn dispatcher_runs_on_supplied_runtime() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();
    let d = Dispatcher::with_runtime(
        DispatcherConfig::default(),
        Arc::new(SimulatedHandler::fixed(Duration::from_millis(10))),
        runtime.handle().clone(),
    );
    d.replace_roster(operators(2));

    let handles: Vec<_> = (0..2).map(|id| d.submit(Call::new(id))).collect();
    for handle in handles {
        let call = runtime.block_on(handle);
        assert_eq!(call.outcome, Outcome::Completed);
    }
    assert_eq!(d.in_flight(), 0);
}
