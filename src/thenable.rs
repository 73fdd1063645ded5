//! The adoption protocol: anything that can hand its eventual outcome to a
//! promise.

use crate::cell::PromiseId;

/// Success callback handed to [`Thenable::subscribe`]. It feeds the adopting
/// promise's resolution procedure, so it may itself receive another thenable.
pub type OnValue<T, E> = Box<dyn FnOnce(Resolution<T, E>)>;

/// Failure callback handed to [`Thenable::subscribe`].
pub type OnReason<E> = Box<dyn FnOnce(E)>;

/// A value whose eventual outcome a promise can adopt.
///
/// The adopting promise guards both callbacks with a shared first-invocation
/// latch: a `Thenable` that invokes both, or whose `subscribe` fails after a
/// callback already fired, settles the adopter exactly once with whatever
/// came first.
pub trait Thenable<T, E> {
    /// Registers the two callbacks. Returning `Err` rejects the adopting
    /// promise, unless a callback already fired.
    fn subscribe(self: Box<Self>, on_value: OnValue<T, E>, on_reason: OnReason<E>)
        -> Result<(), E>;

    /// Identity used for self-resolution detection. Foreign thenables keep
    /// the default.
    fn id(&self) -> Option<PromiseId> {
        None
    }
}

/// What a promise may be resolved with: a plain value, or a thenable whose
/// outcome it adopts.
///
/// Plain values convert with [`From`], and so does [`Promise`], mapping to
/// the [`Resolution::Thenable`] variant. That conversion is why resolving
/// with an existing promise adopts it rather than wrapping it.
///
/// [`Promise`]: crate::Promise
pub enum Resolution<T, E> {
    /// Settle with this value directly.
    Value(T),
    /// Adopt the outcome of this thenable.
    Thenable(Box<dyn Thenable<T, E>>),
}

impl<T, E> From<T> for Resolution<T, E> {
    fn from(value: T) -> Self {
        Resolution::Value(value)
    }
}
