//! The settlement cell and the resolution procedure.
//!
//! One cell backs each promise handle. The state is a closed tagged variant,
//! so an outcome exists exactly when the cell has left `Pending`; the
//! reaction list lives inside the `Pending` variant and disappears with it
//! when the cell settles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::Waker;

use log::trace;

use crate::scheduler;
use crate::thenable::{Resolution, Thenable};
use crate::PromiseError;

pub(crate) type Shared<T, E> = Arc<Mutex<Cell<T, E>>>;

pub(crate) struct Cell<T, E> {
    pub(crate) state: State<T, E>,
    /// Set once a settle capability fires; later capability calls are no-ops
    /// even while a thenable adoption is still in flight.
    pub(crate) latched: bool,
    pub(crate) wakers: Vec<Waker>,
}

pub(crate) enum State<T, E> {
    Pending(Vec<Reaction<T, E>>),
    Fulfilled(T),
    Rejected(E),
}

/// One registered `then` reaction. Each callback is `FnOnce`, so "invoked at
/// most once" holds structurally.
pub(crate) struct Reaction<T, E> {
    pub(crate) on_value: Box<dyn FnOnce(T)>,
    pub(crate) on_reason: Box<dyn FnOnce(E)>,
}

pub(crate) fn new_cell<T, E>() -> Shared<T, E> {
    Arc::new(Mutex::new(Cell {
        state: State::Pending(Vec::new()),
        latched: false,
        wakers: Vec::new(),
    }))
}

/// Opaque identity of a promise's settlement cell.
///
/// Two handles compare equal exactly when they share a cell; the resolution
/// procedure uses this to detect a promise being resolved with itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromiseId(usize);

pub(crate) fn cell_id<T, E>(cell: &Shared<T, E>) -> PromiseId {
    PromiseId(Arc::as_ptr(cell) as *const () as usize)
}

/// Commits `Pending -> Fulfilled`. A cell that already left `Pending` is
/// untouched. Recorded reactions are handed to the scheduler in registration
/// order, each with its own copy of the value.
pub(crate) fn settle_fulfilled<T, E>(cell: &Shared<T, E>, value: T)
where
    T: Clone + 'static,
{
    let (reactions, wakers) = {
        let mut cell = cell.lock().unwrap();
        match &mut cell.state {
            State::Pending(reactions) => {
                let reactions = std::mem::take(reactions);
                let wakers = std::mem::take(&mut cell.wakers);
                cell.state = State::Fulfilled(value.clone());
                (reactions, wakers)
            }
            _ => return,
        }
    };
    trace!("cell fulfilled, dispatching {} reactions", reactions.len());
    for reaction in reactions {
        let value = value.clone();
        scheduler::enqueue(move || (reaction.on_value)(value));
    }
    for waker in wakers {
        waker.wake();
    }
}

/// Commits `Pending -> Rejected`. Symmetric to [`settle_fulfilled`].
pub(crate) fn settle_rejected<T, E>(cell: &Shared<T, E>, reason: E)
where
    E: Clone + 'static,
{
    let (reactions, wakers) = {
        let mut cell = cell.lock().unwrap();
        match &mut cell.state {
            State::Pending(reactions) => {
                let reactions = std::mem::take(reactions);
                let wakers = std::mem::take(&mut cell.wakers);
                cell.state = State::Rejected(reason.clone());
                (reactions, wakers)
            }
            _ => return,
        }
    };
    trace!("cell rejected, dispatching {} reactions", reactions.len());
    for reaction in reactions {
        let reason = reason.clone();
        scheduler::enqueue(move || (reaction.on_reason)(reason));
    }
    for waker in wakers {
        waker.wake();
    }
}

/// Records a reaction. On a pending cell it queues behind earlier reactions;
/// on a settled cell the matching callback is still deferred, never run
/// inline.
pub(crate) fn register<T, E>(cell: &Shared<T, E>, reaction: Reaction<T, E>)
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    let settled = {
        let mut cell = cell.lock().unwrap();
        match &mut cell.state {
            State::Pending(reactions) => {
                reactions.push(reaction);
                return;
            }
            State::Fulfilled(value) => Ok(value.clone()),
            State::Rejected(reason) => Err(reason.clone()),
        }
    };
    match settled {
        Ok(value) => scheduler::enqueue(move || (reaction.on_value)(value)),
        Err(reason) => scheduler::enqueue(move || (reaction.on_reason)(reason)),
    }
}

/// The resolution procedure: turns a produced value into a settlement of
/// `cell`.
///
/// Plain values fulfill directly. A thenable that is the cell's own promise
/// rejects with [`PromiseError::Cycle`]; any other thenable is adopted.
pub(crate) fn resolve_cell<T, E>(cell: &Shared<T, E>, resolution: Resolution<T, E>)
where
    T: Clone + 'static,
    E: Clone + From<PromiseError> + 'static,
{
    match resolution {
        Resolution::Value(value) => settle_fulfilled(cell, value),
        Resolution::Thenable(thenable) => {
            if thenable.id() == Some(cell_id(cell)) {
                settle_rejected(cell, PromiseError::Cycle.into());
            } else {
                adopt(cell.clone(), thenable);
            }
        }
    }
}

/// Subscribes to `thenable` on a later scheduler turn, so chains of adopted
/// thenables unwind across turns instead of recursing on the stack.
///
/// The two callbacks share one first-invocation latch, which also covers a
/// subscription error arriving after a callback already fired.
fn adopt<T, E>(cell: Shared<T, E>, thenable: Box<dyn Thenable<T, E>>)
where
    T: Clone + 'static,
    E: Clone + From<PromiseError> + 'static,
{
    scheduler::enqueue(move || {
        let fired = Arc::new(AtomicBool::new(false));
        let on_value = {
            let cell = cell.clone();
            let fired = fired.clone();
            Box::new(move |resolution: Resolution<T, E>| {
                if !fired.swap(true, Ordering::SeqCst) {
                    resolve_cell(&cell, resolution);
                }
            }) as Box<dyn FnOnce(Resolution<T, E>)>
        };
        let on_reason = {
            let cell = cell.clone();
            let fired = fired.clone();
            Box::new(move |reason: E| {
                if !fired.swap(true, Ordering::SeqCst) {
                    settle_rejected(&cell, reason);
                }
            }) as Box<dyn FnOnce(E)>
        };
        if let Err(reason) = thenable.subscribe(on_value, on_reason) {
            if !fired.swap(true, Ordering::SeqCst) {
                settle_rejected(&cell, reason);
            }
        }
    });
}
