#![forbid(unsafe_code)]

//! Dirty tracking shared by every bindable entity and its binder.
//!
//! Each entity owns an [`Invalidation`]: a dirty bit plus a weak link to at
//! most one parent [`RepaintSignal`]. The binder owns the signal, which
//! aggregates child dirtiness into a single "repaint needed" callback.
//!
//! # Invariants
//!
//! 1. Both flags start dirty, so the first draw always flushes.
//! 2. Marking dirty is idempotent. An entity forwards to its parent only on
//!    its own clean→dirty transition.
//! 3. The signal fires its external callback only on its own clean→dirty
//!    transition, however many children invalidate in between two draws.
//! 4. The parent link is set once. Attaching to a different signal fails and
//!    leaves the link untouched; re-attaching to the same signal succeeds.
//! 5. The link is weak: it never keeps the binder alive. A dead parent simply
//!    stops receiving invalidations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;

use crate::error::BindError;

/// External repaint callback stored behind the signal.
struct Invalidator(Box<dyn Fn() + Send + Sync>);

/// Aggregate dirty flag owned by a [`Binder`](crate::Binder).
///
/// Children hold a `Weak` to this; it is the identity used for the
/// single-parent rule.
pub struct RepaintSignal {
    dirty: AtomicBool,
    invalidator: ArcSwapOption<Invalidator>,
}

impl RepaintSignal {
    /// Create a signal in the dirty state with no callback attached.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dirty: AtomicBool::new(true),
            invalidator: ArcSwapOption::empty(),
        }
    }

    /// Install the callback fired on every clean→dirty transition.
    ///
    /// The callback should schedule a repaint, not perform one: it may run on
    /// a command's worker thread.
    pub fn set_invalidator(&self, invalidator: impl Fn() + Send + Sync + 'static) {
        self.invalidator
            .store(Some(Arc::new(Invalidator(Box::new(invalidator)))));
    }

    /// Remove the callback, if any.
    pub fn clear_invalidator(&self) {
        self.invalidator.store(None);
    }

    /// Mark dirty; fire the callback if this is a clean→dirty transition.
    pub fn invalidate(&self) {
        if self.dirty.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::debug!("repaint requested");
        if let Some(invalidator) = self.invalidator.load_full() {
            (invalidator.0)();
        }
    }

    /// Whether a repaint is pending.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Clear the flag, returning whether it was set.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }
}

impl Default for RepaintSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RepaintSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepaintSignal")
            .field("dirty", &self.is_dirty())
            .field("has_invalidator", &self.invalidator.load().is_some())
            .finish()
    }
}

/// Per-entity dirty bit with a weak link to one parent signal.
pub struct Invalidation {
    dirty: AtomicBool,
    parent: Mutex<Option<Weak<RepaintSignal>>>,
}

impl Invalidation {
    /// Create an unparented node in the dirty state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dirty: AtomicBool::new(true),
            parent: Mutex::new(None),
        }
    }

    /// Link this node to `parent`.
    ///
    /// Succeeds if the node is unparented or already linked to `parent`. A
    /// node that is still dirty forwards that to the new parent, so its
    /// pending flush is scheduled even though no transition happens later.
    ///
    /// # Errors
    ///
    /// [`BindError::AlreadyBound`] if linked to a different signal.
    pub fn attach(&self, parent: &Arc<RepaintSignal>) -> Result<(), BindError> {
        {
            let mut slot = self.parent.lock();
            match slot.as_ref() {
                Some(current) if Weak::as_ptr(current) != Arc::as_ptr(parent) => {
                    return Err(BindError::AlreadyBound);
                }
                Some(_) => {}
                None => *slot = Some(Arc::downgrade(parent)),
            }
        }
        if self.is_dirty() {
            parent.invalidate();
        }
        Ok(())
    }

    /// Whether a parent has been attached (alive or not).
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.parent.lock().is_some()
    }

    /// Whether this node is linked to exactly `parent`.
    #[must_use]
    pub fn is_attached_to(&self, parent: &Arc<RepaintSignal>) -> bool {
        self.parent
            .lock()
            .as_ref()
            .is_some_and(|current| Weak::as_ptr(current) == Arc::as_ptr(parent))
    }

    /// Mark dirty, forwarding to the parent on a clean→dirty transition.
    pub fn invalidate(&self) {
        if self.dirty.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::trace!("entity invalidated");
        let parent = self.parent.lock().as_ref().and_then(Weak::upgrade);
        if let Some(parent) = parent {
            parent.invalidate();
        }
    }

    /// Whether a flush is pending.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Clear the bit, returning whether it was set.
    ///
    /// Callers clear before flushing so that an invalidation racing with the
    /// flush re-arms the bit instead of being lost.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }
}

impl Default for Invalidation {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Invalidation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invalidation")
            .field("dirty", &self.is_dirty())
            .field("attached", &self.is_attached())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_signal() -> (Arc<RepaintSignal>, Arc<AtomicUsize>) {
        let signal = Arc::new(RepaintSignal::new());
        let fired = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&fired);
        signal.set_invalidator(move || {
            f.fetch_add(1, Ordering::SeqCst);
        });
        (signal, fired)
    }

    #[test]
    fn starts_dirty() {
        assert!(RepaintSignal::new().is_dirty());
        assert!(Invalidation::new().is_dirty());
    }

    #[test]
    fn signal_fires_once_per_transition() {
        let (signal, fired) = counting_signal();
        assert!(signal.take_dirty());

        signal.invalidate();
        signal.invalidate();
        signal.invalidate();
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        assert!(signal.take_dirty());
        assert!(!signal.take_dirty());
        signal.invalidate();
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn signal_without_invalidator_still_tracks() {
        let signal = RepaintSignal::new();
        signal.take_dirty();
        signal.invalidate();
        assert!(signal.is_dirty());
    }

    #[test]
    fn cleared_invalidator_stops_firing() {
        let (signal, fired) = counting_signal();
        signal.take_dirty();
        signal.clear_invalidator();
        signal.invalidate();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn node_forwards_only_on_transition() {
        let (signal, fired) = counting_signal();
        let node = Invalidation::new();
        node.take_dirty();
        node.attach(&signal).unwrap();
        signal.take_dirty();

        node.invalidate();
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Parent redrawn but the node was not: no second forward.
        signal.take_dirty();
        node.invalidate();
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        node.take_dirty();
        node.invalidate();
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn attaching_dirty_node_schedules_parent() {
        let (signal, fired) = counting_signal();
        signal.take_dirty();

        let node = Invalidation::new();
        node.attach(&signal).unwrap();
        assert!(signal.is_dirty());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn attaching_clean_node_leaves_parent_clean() {
        let signal = Arc::new(RepaintSignal::new());
        signal.take_dirty();

        let node = Invalidation::new();
        node.take_dirty();
        node.attach(&signal).unwrap();
        assert!(!signal.is_dirty());
    }

    #[test]
    fn single_parent_rule() {
        let first = Arc::new(RepaintSignal::new());
        let second = Arc::new(RepaintSignal::new());
        let node = Invalidation::new();

        assert!(node.attach(&first).is_ok());
        assert!(node.attach(&first).is_ok());
        assert_eq!(node.attach(&second), Err(BindError::AlreadyBound));
        assert!(node.is_attached_to(&first));
        assert!(!node.is_attached_to(&second));
    }

    #[test]
    fn dead_parent_is_ignored() {
        let node = Invalidation::new();
        {
            let signal = Arc::new(RepaintSignal::new());
            node.attach(&signal).unwrap();
        }
        node.take_dirty();
        node.invalidate();
        assert!(node.is_dirty());
        assert!(node.is_attached());
    }

    #[test]
    fn debug_format() {
        let node = Invalidation::new();
        let debug = format!("{node:?}");
        assert!(debug.contains("dirty: true"));
        assert!(debug.contains("attached: false"));
    }
}
