#![forbid(unsafe_code)]

//! The capability set shared by everything a [`Binder`](crate::Binder) routes to.

use std::fmt::Debug;
use std::sync::Arc;

use crate::error::BindError;
use crate::invalidate::RepaintSignal;

/// Opaque identifier for a presentation surface.
///
/// Keys are never owned by the engine. `Ord` gives the binder a stable
/// iteration order; `Debug` is only used in log fields.
pub trait Key: Clone + Ord + Debug + Send + Sync + 'static {}

impl<T: Clone + Ord + Debug + Send + Sync + 'static> Key for T {}

/// An entity that mirrors its state into one or more keyed surfaces.
///
/// Implemented by [`BoundValue`](crate::BoundValue) and
/// [`BoundCommand`](crate::BoundCommand). Implementations own their dirty bit
/// and talk to the binder only through the [`RepaintSignal`] they are bound to.
pub trait Bindable<K: Key>: Send + Sync {
    /// Register `key` with this entity under `parent`.
    ///
    /// # Errors
    ///
    /// [`BindError::AlreadyBound`] if the entity already belongs to a
    /// different parent. Nothing is recorded in that case.
    fn bind(&self, parent: &Arc<RepaintSignal>, key: K) -> Result<(), BindError>;

    /// The surface under `key` reported a user action.
    fn on_command(&self, key: &K);

    /// The surface under `key` reported a passive state change.
    fn on_notify(&self, key: &K);

    /// Flush pending state to every bound surface. Returns whether anything
    /// was pending.
    fn on_draw(&self) -> bool;

    /// Mark this entity as needing a flush.
    fn invalidate(&self);

    /// Whether a flush is pending.
    fn is_dirty(&self) -> bool;
}
