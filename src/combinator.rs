//! Combinators over many promises.
//!
//! Both combinators pass every input through the resolution procedure first,
//! so plain values sit alongside promises in the same input sequence (via
//! [`Resolution`] for mixed sequences). Neither cancels anything: losing
//! inputs still run to completion, their outcomes discarded.

use std::sync::{Arc, Mutex};

use log::trace;

use crate::cell::{new_cell, register, settle_fulfilled, settle_rejected, Reaction};
use crate::thenable::Resolution;
use crate::{Promise, PromiseError};

struct Gather<T> {
    slots: Vec<Option<T>>,
    remaining: usize,
}

/// Fulfills with every input's value, in input order, once all inputs have
/// fulfilled; rejects with the first rejection's reason.
///
/// An empty input fulfills immediately with an empty vec.
///
/// # Examples
///
/// ```
/// use promise_chain::{all, scheduler, Promise};
///
/// let combined: Promise<Vec<i32>, String> = all(vec![
///     Promise::resolve(1),
///     Promise::resolve(2),
/// ]);
/// scheduler::run_until_idle();
/// assert_eq!(combined.outcome(), Some(Ok(vec![1, 2])));
/// ```
pub fn all<T, E, I>(inputs: I) -> Promise<Vec<T>, E>
where
    T: Clone + 'static,
    E: Clone + From<PromiseError> + 'static,
    I: IntoIterator,
    I::Item: Into<Resolution<T, E>>,
{
    let output = new_cell::<Vec<T>, E>();
    let entries: Vec<Resolution<T, E>> = inputs.into_iter().map(Into::into).collect();
    if entries.is_empty() {
        settle_fulfilled(&output, Vec::new());
        return Promise { cell: output };
    }
    trace!("all: waiting on {} inputs", entries.len());
    let gather = Arc::new(Mutex::new(Gather {
        slots: vec![None; entries.len()],
        remaining: entries.len(),
    }));
    for (index, entry) in entries.into_iter().enumerate() {
        let input = Promise::resolve(entry);
        let on_value = {
            let output = output.clone();
            let gather = gather.clone();
            Box::new(move |value: T| {
                let complete = {
                    let mut gather = gather.lock().unwrap();
                    gather.slots[index] = Some(value);
                    gather.remaining -= 1;
                    if gather.remaining == 0 {
                        Some(std::mem::take(&mut gather.slots))
                    } else {
                        None
                    }
                };
                if let Some(slots) = complete {
                    // Every slot is Some once the countdown reaches zero.
                    settle_fulfilled(&output, slots.into_iter().flatten().collect());
                }
            }) as Box<dyn FnOnce(T)>
        };
        let on_reason = {
            let output = output.clone();
            Box::new(move |reason: E| settle_rejected(&output, reason)) as Box<dyn FnOnce(E)>
        };
        register(&input.cell, Reaction { on_value, on_reason });
    }
    Promise { cell: output }
}

/// Settles with the outcome of whichever input settles first, fulfilled or
/// rejected.
///
/// An empty input never settles; that is a defined edge case, not an error.
///
/// # Examples
///
/// ```
/// use promise_chain::{race, scheduler, Promise};
///
/// let (settle_slow, slow) = Promise::<&str, String>::pair();
/// let (settle_fast, fast) = Promise::<&str, String>::pair();
/// let winner = race(vec![slow, fast]);
///
/// // The fast input settles a turn before the slow one.
/// scheduler::enqueue(move || settle_fast.resolve("b"));
/// scheduler::enqueue(move || settle_slow.resolve("a"));
/// scheduler::run_until_idle();
/// assert_eq!(winner.outcome(), Some(Ok("b")));
/// ```
pub fn race<T, E, I>(inputs: I) -> Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + From<PromiseError> + 'static,
    I: IntoIterator,
    I::Item: Into<Resolution<T, E>>,
{
    let output = new_cell::<T, E>();
    for entry in inputs {
        let input = Promise::resolve(entry.into());
        let on_value = {
            let output = output.clone();
            Box::new(move |value: T| settle_fulfilled(&output, value)) as Box<dyn FnOnce(T)>
        };
        let on_reason = {
            let output = output.clone();
            Box::new(move |reason: E| settle_rejected(&output, reason)) as Box<dyn FnOnce(E)>
        };
        register(&input.cell, Reaction { on_value, on_reason });
    }
    Promise { cell: output }
}
