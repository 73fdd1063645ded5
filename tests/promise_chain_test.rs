use std::cell::RefCell;
use std::rc::Rc;

use futures::executor::block_on;
use thiserror::Error;

use promise_chain::{
    all, race, scheduler, OnReason, OnValue, Promise, PromiseError, Resolution, Thenable,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
enum TestError {
    #[error("boom")]
    Boom,
    #[error(transparent)]
    Fault(#[from] PromiseError),
}

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn executor_chain_fulfills_through_then() {
    init_logs();
    let doubled = Promise::<i32, PromiseError>::new(|settle| {
        settle.resolve(1);
        Ok(())
    })
    .then(|value| Ok(value + 1));
    assert!(doubled.is_pending());
    scheduler::run_until_idle();
    assert_eq!(doubled.outcome(), Some(Ok(2)));
}

#[test]
fn chaining_law_feeds_each_result_forward() {
    init_logs();
    let chained = Promise::<i32, String>::resolve(3)
        .then(|value| Ok(value * 2))
        .then(|value| Ok(value + 1));
    scheduler::run_until_idle();
    assert_eq!(chained.outcome(), Some(Ok(7)));
}

#[test]
fn handler_failure_takes_the_rejection_branch_downstream() {
    init_logs();
    let observed = Promise::<i32, String>::resolve(3)
        .then(|_| Err::<i32, _>("mid-chain".to_string()))
        .then_catch(
            |value| Ok(format!("value {value}")),
            |reason| Ok(format!("reason {reason}")),
        );
    scheduler::run_until_idle();
    assert_eq!(observed.outcome(), Some(Ok("reason mid-chain".to_string())));
}

#[test]
fn reactions_wait_for_the_registering_call_to_return() {
    init_logs();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let promise = Promise::<i32, String>::resolve(7);
    let sink = seen.clone();
    let _derived = promise.then(move |value| {
        sink.borrow_mut().push(value);
        Ok(value)
    });
    // Already settled, yet nothing runs until the queue drains.
    assert!(seen.borrow().is_empty());
    scheduler::run_until_idle();
    assert_eq!(*seen.borrow(), vec![7]);
}

#[test]
fn reactions_on_one_promise_run_in_registration_order() {
    init_logs();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let (settle, promise) = Promise::<i32, String>::pair();
    for tag in ["first", "second", "third"] {
        let sink = seen.clone();
        let _each = promise.then(move |value| {
            sink.borrow_mut().push((tag, value));
            Ok(value)
        });
    }
    settle.resolve(9);
    scheduler::run_until_idle();
    assert_eq!(
        *seen.borrow(),
        vec![("first", 9), ("second", 9), ("third", 9)]
    );
}

#[test]
fn repeated_settlement_attempts_are_silent_no_ops() {
    init_logs();
    let (settle, promise) = Promise::<i32, String>::pair();
    settle.resolve(1);
    settle.resolve(2);
    settle.reject("late".to_string());
    scheduler::run_until_idle();
    assert_eq!(promise.outcome(), Some(Ok(1)));
}

#[test]
fn resolving_with_a_promise_adopts_its_outcome() {
    init_logs();
    let inner = Promise::<i32, String>::resolve(5);
    let middle: Promise<i32, String> = Promise::resolve(inner);
    let outer: Promise<i32, String> = Promise::resolve(middle);
    assert!(outer.is_pending());
    scheduler::run_until_idle();
    assert_eq!(outer.outcome(), Some(Ok(5)));
}

#[test]
fn adopting_a_rejected_promise_rejects_the_adopter() {
    init_logs();
    let failed = Promise::<i32, String>::reject("broken".to_string());
    let adopted: Promise<i32, String> = Promise::resolve(failed);
    scheduler::run_until_idle();
    assert_eq!(adopted.outcome(), Some(Err("broken".to_string())));
}

#[test]
fn long_adoption_chains_unwind_across_turns() {
    init_logs();
    let mut promise = Promise::<u32, String>::resolve(0);
    for _ in 0..10_000 {
        promise = Promise::resolve(promise);
    }
    scheduler::run_until_idle();
    assert_eq!(promise.outcome(), Some(Ok(0)));
}

#[test]
fn resolving_a_promise_with_itself_rejects_with_the_cycle_error() {
    init_logs();
    let (settle, promise) = Promise::<i32, String>::pair();
    // Clones share one settlement cell, so the clone *is* the promise itself.
    assert_eq!(promise.id(), promise.clone().id());
    settle.resolve(promise.clone());
    scheduler::run_until_idle();
    assert_eq!(
        promise.outcome(),
        Some(Err(PromiseError::Cycle.to_string()))
    );
}

#[test]
fn failing_executor_rejects_with_its_error() {
    init_logs();
    let failed = Promise::<i32, TestError>::new(|_settle| Err(TestError::Boom));
    scheduler::run_until_idle();
    assert_eq!(failed.outcome(), Some(Err(TestError::Boom)));
}

#[test]
fn catch_recovers_with_the_reasons_message() {
    init_logs();
    let message = Promise::<String, TestError>::reject(TestError::Boom)
        .catch(|reason| Ok(reason.to_string()));
    scheduler::run_until_idle();
    assert_eq!(message.outcome(), Some(Ok("boom".to_string())));
}

#[test]
fn all_fulfills_in_input_order_despite_settlement_order() {
    init_logs();
    let (settle_a, a) = Promise::<i32, String>::pair();
    let (settle_b, b) = Promise::<i32, String>::pair();
    let combined: Promise<Vec<i32>, String> = all(vec![a, b]);
    scheduler::enqueue(move || settle_b.resolve(2));
    scheduler::enqueue(move || settle_a.resolve(1));
    scheduler::run_until_idle();
    assert_eq!(combined.outcome(), Some(Ok(vec![1, 2])));
}

#[test]
fn all_of_an_empty_sequence_fulfills_immediately() {
    init_logs();
    let combined: Promise<Vec<i32>, String> = all(Vec::<Resolution<i32, String>>::new());
    assert_eq!(combined.outcome(), Some(Ok(Vec::new())));
}

#[test]
fn all_rejects_with_the_first_rejection_reason() {
    init_logs();
    let entries: Vec<Resolution<i32, String>> = vec![
        Promise::resolve(1).into(),
        Promise::reject("x".to_string()).into(),
    ];
    let combined: Promise<Vec<i32>, String> = all(entries);
    scheduler::run_until_idle();
    assert_eq!(combined.outcome(), Some(Err("x".to_string())));
}

#[test]
fn race_settles_with_the_earliest_input() {
    init_logs();
    let (settle_slow, slow) = Promise::<&str, String>::pair();
    let (settle_fast, fast) = Promise::<&str, String>::pair();
    let winner = race(vec![slow, fast]);
    // Delays modeled as scheduler turns: the fast input settles first.
    scheduler::enqueue(move || settle_fast.resolve("b"));
    scheduler::enqueue(move || settle_slow.resolve("a"));
    scheduler::run_until_idle();
    assert_eq!(winner.outcome(), Some(Ok("b")));
}

#[test]
fn race_of_an_empty_sequence_never_settles() {
    init_logs();
    let silent: Promise<i32, String> = race(Vec::<Resolution<i32, String>>::new());
    scheduler::run_until_idle();
    assert!(silent.is_pending());
    assert!(scheduler::is_idle());
}

#[test]
fn settled_promises_can_be_awaited() {
    init_logs();
    let chained = Promise::<i32, String>::resolve(3).then(|value| Ok(value + 1));
    scheduler::run_until_idle();
    assert_eq!(block_on(chained), Ok(4));
}

/// A hostile thenable that fires both callbacks and then fails its
/// subscription: only the first invocation may count.
struct Unruly;

impl Thenable<i32, String> for Unruly {
    fn subscribe(
        self: Box<Self>,
        on_value: OnValue<i32, String>,
        on_reason: OnReason<String>,
    ) -> Result<(), String> {
        on_value(Resolution::Value(1));
        on_reason("second call, ignored".to_string());
        Err("subscription error, ignored".to_string())
    }
}

#[test]
fn only_a_thenables_first_callback_invocation_counts() {
    init_logs();
    let adopted: Promise<i32, String> =
        Promise::resolve(Resolution::Thenable(Box::new(Unruly)));
    scheduler::run_until_idle();
    assert_eq!(adopted.outcome(), Some(Ok(1)));
}

/// A thenable whose subscription fails before invoking either callback.
struct Broken;

impl Thenable<i32, String> for Broken {
    fn subscribe(
        self: Box<Self>,
        _on_value: OnValue<i32, String>,
        _on_reason: OnReason<String>,
    ) -> Result<(), String> {
        Err("no subscription".to_string())
    }
}

#[test]
fn a_failing_subscription_rejects_the_adopter() {
    init_logs();
    let adopted: Promise<i32, String> =
        Promise::resolve(Resolution::Thenable(Box::new(Broken)));
    scheduler::run_until_idle();
    assert_eq!(adopted.outcome(), Some(Err("no subscription".to_string())));
}
