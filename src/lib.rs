//! A chainable promise: a value that may still be pending, may settle with a
//! result, or may fail with a reason.
//!
//! [`Promise<T, E>`] is the read side; a [`Resolver<T, E>`] (or the executor
//! passed to [`Promise::new`]) is the write side. Settlement is irrevocable
//! and happens at most once. Reactions registered with [`Promise::then`],
//! [`Promise::then_catch`] and [`Promise::catch`] never run synchronously:
//! they are pushed onto the [`scheduler`] queue and run once the current
//! call unwinds, in registration order per promise.
//!
//! Resolving with another promise (or anything implementing [`Thenable`])
//! adopts its eventual outcome instead of nesting it. The [`all`] and
//! [`race`] combinators compose many promises into one.
//!
//! # Examples
//!
//! ```
//! use promise_chain::{scheduler, Promise, PromiseError};
//!
//! let doubled = Promise::<i32, PromiseError>::new(|settle| {
//!     settle.resolve(21);
//!     Ok(())
//! })
//! .then(|value| Ok(value * 2));
//!
//! assert!(doubled.is_pending());
//! scheduler::run_until_idle();
//! assert_eq!(doubled.outcome(), Some(Ok(42)));
//! ```

use thiserror::Error;

mod cell;
pub mod combinator;
mod promise;
pub mod scheduler;
mod thenable;

pub use cell::PromiseId;
pub use combinator::{all, race};
pub use promise::{Promise, Resolver};
pub use thenable::{OnReason, OnValue, Resolution, Thenable};

/// Faults the promise machinery itself raises as rejection reasons.
///
/// Reason types absorb these through a `From<PromiseError>` bound, which is
/// required only on operations where such a fault can arise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PromiseError {
    /// A promise was resolved with itself.
    #[error("chaining cycle detected: a promise cannot adopt itself")]
    Cycle,
}

/// Lets `String` work as a reason type without a wrapper.
impl From<PromiseError> for String {
    fn from(fault: PromiseError) -> Self {
        fault.to_string()
    }
}
