//! The public promise handle and its settle capability.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::cell::{
    cell_id, new_cell, register, resolve_cell, settle_fulfilled, settle_rejected, Reaction, Shared,
    State,
};
use crate::thenable::{OnReason, OnValue, Resolution, Thenable};
use crate::{PromiseError, PromiseId};

/// The eventual result of an operation: pending, fulfilled with a `T`, or
/// rejected with an `E`.
///
/// Handles are cheap to clone and all observe the same settlement. A settled
/// promise is immutable and can be read any number of times, through
/// [`outcome`](Promise::outcome), through reactions, or by `.await`ing it.
pub struct Promise<T, E> {
    pub(crate) cell: Shared<T, E>,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

/// The write side of a promise: the capability to settle it.
///
/// Both [`resolve`](Resolver::resolve) and [`reject`](Resolver::reject) are
/// idempotent: whichever fires first wins and every later call is a silent
/// no-op, including calls made while a resolved thenable is still being
/// adopted.
pub struct Resolver<T, E> {
    cell: Shared<T, E>,
}

impl<T, E> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<T, E> Resolver<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Resolves the promise with a value or a thenable to adopt.
    pub fn resolve(&self, value: impl Into<Resolution<T, E>>)
    where
        E: From<PromiseError>,
    {
        if self.latch() {
            return;
        }
        resolve_cell(&self.cell, value.into());
    }

    /// Rejects the promise. The reason is taken as-is, never adopted.
    pub fn reject(&self, reason: E) {
        if self.latch() {
            return;
        }
        settle_rejected(&self.cell, reason);
    }

    /// Returns the previous latch value, setting it.
    fn latch(&self) -> bool {
        let mut cell = self.cell.lock().unwrap();
        std::mem::replace(&mut cell.latched, true)
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Creates a pending promise together with its settle capability.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_chain::Promise;
    ///
    /// let (settle, promise) = Promise::<String, String>::pair();
    /// assert!(promise.is_pending());
    ///
    /// settle.resolve(String::from("🍓"));
    /// assert_eq!(promise.outcome(), Some(Ok(String::from("🍓"))));
    /// ```
    pub fn pair() -> (Resolver<T, E>, Self) {
        let cell = new_cell();
        (Resolver { cell: cell.clone() }, Promise { cell })
    }

    /// Runs `executor` synchronously with the settle capability.
    ///
    /// An executor that fails before settling rejects the promise with its
    /// error; one that neither settles nor stashes the capability leaves the
    /// promise pending forever.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_chain::Promise;
    ///
    /// let failed = Promise::<i32, String>::new(|_settle| Err(String::from("boom")));
    /// assert_eq!(failed.outcome(), Some(Err(String::from("boom"))));
    /// ```
    pub fn new<F>(executor: F) -> Self
    where
        F: FnOnce(Resolver<T, E>) -> Result<(), E>,
        E: From<PromiseError>,
    {
        let (settle, promise) = Self::pair();
        if let Err(reason) = executor(settle.clone()) {
            settle.reject(reason);
        }
        promise
    }

    /// Returns a promise resolved with `value`.
    ///
    /// A plain value fulfills immediately; a promise (or other thenable) is
    /// adopted, so `resolve` never nests one promise inside another.
    pub fn resolve(value: impl Into<Resolution<T, E>>) -> Self
    where
        E: From<PromiseError>,
    {
        let cell = new_cell();
        resolve_cell(&cell, value.into());
        Promise { cell }
    }

    /// Returns a promise rejected with `reason`, taken as-is.
    pub fn reject(reason: E) -> Self {
        let cell = new_cell();
        settle_rejected(&cell, reason);
        Promise { cell }
    }

    /// Registers a fulfillment handler and returns the derived promise.
    ///
    /// The handler's `Ok` feeds the derived promise's resolution procedure
    /// (so it may return a plain value or another promise); its `Err`
    /// rejects the derived promise. A rejection of `self` passes through
    /// unchanged. The handler never runs before this call returns, even on
    /// an already-settled promise.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_chain::{scheduler, Promise, PromiseError};
    ///
    /// let sum = Promise::<i32, PromiseError>::resolve(1).then(|value| Ok(value + 1));
    /// scheduler::run_until_idle();
    /// assert_eq!(sum.outcome(), Some(Ok(2)));
    /// ```
    pub fn then<U, R, F>(&self, on_fulfilled: F) -> Promise<U, E>
    where
        U: Clone + 'static,
        R: Into<Resolution<U, E>>,
        F: FnOnce(T) -> Result<R, E> + 'static,
        E: From<PromiseError>,
    {
        let derived = new_cell::<U, E>();
        let on_value = {
            let derived = derived.clone();
            Box::new(move |value: T| match on_fulfilled(value) {
                Ok(resolution) => resolve_cell(&derived, resolution.into()),
                Err(reason) => settle_rejected(&derived, reason),
            }) as Box<dyn FnOnce(T)>
        };
        let on_reason = {
            let derived = derived.clone();
            Box::new(move |reason: E| settle_rejected(&derived, reason)) as Box<dyn FnOnce(E)>
        };
        register(&self.cell, Reaction { on_value, on_reason });
        Promise { cell: derived }
    }

    /// Registers both a fulfillment and a rejection handler.
    ///
    /// Each handler's `Ok` resolves the derived promise and its `Err`
    /// rejects it, exactly as in [`then`](Promise::then) and
    /// [`catch`](Promise::catch).
    pub fn then_catch<U, RF, RR, F, G>(&self, on_fulfilled: F, on_rejected: G) -> Promise<U, E>
    where
        U: Clone + 'static,
        RF: Into<Resolution<U, E>>,
        RR: Into<Resolution<U, E>>,
        F: FnOnce(T) -> Result<RF, E> + 'static,
        G: FnOnce(E) -> Result<RR, E> + 'static,
        E: From<PromiseError>,
    {
        let derived = new_cell::<U, E>();
        let on_value = {
            let derived = derived.clone();
            Box::new(move |value: T| match on_fulfilled(value) {
                Ok(resolution) => resolve_cell(&derived, resolution.into()),
                Err(reason) => settle_rejected(&derived, reason),
            }) as Box<dyn FnOnce(T)>
        };
        let on_reason = {
            let derived = derived.clone();
            Box::new(move |reason: E| match on_rejected(reason) {
                Ok(resolution) => resolve_cell(&derived, resolution.into()),
                Err(reason) => settle_rejected(&derived, reason),
            }) as Box<dyn FnOnce(E)>
        };
        register(&self.cell, Reaction { on_value, on_reason });
        Promise { cell: derived }
    }

    /// Registers a rejection handler; a fulfillment of `self` passes through
    /// unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_chain::{scheduler, Promise};
    ///
    /// let recovered = Promise::<String, String>::reject(String::from("boom"))
    ///     .catch(|reason| Ok(format!("caught {reason}")));
    /// scheduler::run_until_idle();
    /// assert_eq!(recovered.outcome(), Some(Ok(String::from("caught boom"))));
    /// ```
    pub fn catch<R, G>(&self, on_rejected: G) -> Promise<T, E>
    where
        R: Into<Resolution<T, E>>,
        G: FnOnce(E) -> Result<R, E> + 'static,
        E: From<PromiseError>,
    {
        let derived = new_cell::<T, E>();
        let on_value = {
            let derived = derived.clone();
            Box::new(move |value: T| settle_fulfilled(&derived, value)) as Box<dyn FnOnce(T)>
        };
        let on_reason = {
            let derived = derived.clone();
            Box::new(move |reason: E| match on_rejected(reason) {
                Ok(resolution) => resolve_cell(&derived, resolution.into()),
                Err(reason) => settle_rejected(&derived, reason),
            }) as Box<dyn FnOnce(E)>
        };
        register(&self.cell, Reaction { on_value, on_reason });
        Promise { cell: derived }
    }

    /// Snapshot of the settled outcome, or `None` while pending.
    pub fn outcome(&self) -> Option<Result<T, E>> {
        match &self.cell.lock().unwrap().state {
            State::Pending(_) => None,
            State::Fulfilled(value) => Some(Ok(value.clone())),
            State::Rejected(reason) => Some(Err(reason.clone())),
        }
    }

    /// True while the promise has not settled.
    pub fn is_pending(&self) -> bool {
        matches!(self.cell.lock().unwrap().state, State::Pending(_))
    }

    /// The identity of this promise's settlement cell.
    pub fn id(&self) -> PromiseId {
        cell_id(&self.cell)
    }
}

/// Awaiting a promise yields its settled outcome.
///
/// Settlement wakes every registered waker, so any number of clones can be
/// awaited. Something still has to drive settlement; a promise nobody ever
/// settles never resolves its future either.
impl<T, E> Future for Promise<T, E>
where
    T: Clone,
    E: Clone,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut cell = self.cell.lock().unwrap();
        match &cell.state {
            State::Fulfilled(value) => return Poll::Ready(Ok(value.clone())),
            State::Rejected(reason) => return Poll::Ready(Err(reason.clone())),
            State::Pending(_) => {}
        }
        cell.wakers.push(cx.waker().clone());
        Poll::Pending
    }
}

impl<T, E> fmt::Debug for Promise<T, E>
where
    T: fmt::Debug,
    E: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cell.lock().unwrap().state {
            State::Pending(_) => write!(f, "Promise {{ <state>: \"PENDING\" }}"),
            State::Fulfilled(value) => {
                write!(f, "Promise {{ <state>: \"FULFILLED\", <value>: {value:?} }}")
            }
            State::Rejected(reason) => {
                write!(f, "Promise {{ <state>: \"REJECTED\", <reason>: {reason:?} }}")
            }
        }
    }
}

impl<T, E> Thenable<T, E> for Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    fn subscribe(
        self: Box<Self>,
        on_value: OnValue<T, E>,
        on_reason: OnReason<E>,
    ) -> Result<(), E> {
        register(
            &self.cell,
            Reaction {
                on_value: Box::new(move |value| on_value(Resolution::Value(value))),
                on_reason,
            },
        );
        Ok(())
    }

    fn id(&self) -> Option<PromiseId> {
        Some(cell_id(&self.cell))
    }
}

impl<T, E> From<Promise<T, E>> for Resolution<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    fn from(promise: Promise<T, E>) -> Self {
        Resolution::Thenable(Box::new(promise))
    }
}
