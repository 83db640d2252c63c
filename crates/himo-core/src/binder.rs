#![forbid(unsafe_code)]

//! Key-based router and invalidation aggregator.
//!
//! A [`Binder<K>`] is the single entry point the presentation layer talks to.
//! It maps each key to the entities bound under it, forwards command and
//! notify events for a key to those entities, and flushes every dirty entity
//! in one [`on_draw`](Binder::on_draw) call per redraw cycle.
//!
//! # Invariants
//!
//! 1. An entity appears in the map only if its own `bind` succeeded, so the
//!    map and each entity's parent link always agree.
//! 2. Dispatch for one key runs in registration order, sequentially, on the
//!    calling thread.
//! 3. Dispatch to a key with no registrations is a no-op.
//! 4. The external invalidator fires once per clean→dirty transition, however
//!    many children invalidate between two draws.
//!
//! # Re-entrancy
//!
//! The entity list for a key is cloned before dispatch, so an entity's hooks
//! may bind new entities or dispatch further events through the same binder.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::bindable::{Bindable, Key};
use crate::error::BindError;
use crate::invalidate::RepaintSignal;

type Entry<K> = Arc<dyn Bindable<K>>;

/// Routes keyed events to bound entities and batches their redraws.
pub struct Binder<K: Key> {
    bindings: RwLock<BTreeMap<K, Vec<Entry<K>>>>,
    signal: Arc<RepaintSignal>,
}

impl<K: Key> Binder<K> {
    /// Create an empty binder. It starts dirty so the first draw flushes.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bindings: RwLock::new(BTreeMap::new()),
            signal: Arc::new(RepaintSignal::new()),
        }
    }

    /// Install the callback that asks the host to schedule a repaint.
    ///
    /// It may be called from a command's worker thread. It should post a
    /// request to the host's event loop rather than draw synchronously.
    pub fn attach_invalidator(&self, invalidator: impl Fn() + Send + Sync + 'static) -> &Self {
        self.signal.set_invalidator(invalidator);
        self
    }

    /// Remove the repaint callback.
    pub fn clear_invalidator(&self) {
        self.signal.clear_invalidator();
    }

    /// Bind `entity` to the surface under `key`.
    ///
    /// # Errors
    ///
    /// [`BindError::AlreadyBound`] if the entity belongs to another binder.
    /// Nothing is registered in that case.
    pub fn bind<B: Bindable<K> + 'static>(&self, entity: &Arc<B>, key: K) -> Result<(), BindError> {
        let entry: Entry<K> = Arc::clone(entity) as Entry<K>;
        self.bind_dyn(entry, key)
    }

    /// [`bind`](Self::bind) for an already type-erased entity.
    ///
    /// # Errors
    ///
    /// [`BindError::AlreadyBound`] if the entity belongs to another binder.
    pub fn bind_dyn(&self, entity: Entry<K>, key: K) -> Result<(), BindError> {
        entity.bind(&self.signal, key.clone())?;
        let mut bindings = self.bindings.write();
        let entries = bindings.entry(key.clone()).or_default();
        entries.push(entity);
        tracing::trace!(?key, registered = entries.len(), "entity registered");
        Ok(())
    }

    /// A user action happened on the surface under `key`.
    pub fn on_command(&self, key: &K) {
        let entries = self.entries_for(key);
        tracing::trace!(?key, entities = entries.len(), "dispatch command");
        for entry in &entries {
            entry.on_command(key);
        }
    }

    /// A passive state change happened on the surface under `key`.
    pub fn on_notify(&self, key: &K) {
        let entries = self.entries_for(key);
        tracing::trace!(?key, entities = entries.len(), "dispatch notify");
        for entry in &entries {
            entry.on_notify(key);
        }
    }

    /// Flush every dirty entity, once per redraw cycle.
    ///
    /// Returns `false` without touching any entity when nothing invalidated
    /// the binder since the last draw.
    pub fn on_draw(&self) -> bool {
        if !self.signal.take_dirty() {
            return false;
        }

        let entries: Vec<Entry<K>> = self
            .bindings
            .read()
            .values()
            .flatten()
            .cloned()
            .collect();
        let mut flushed = 0usize;
        for entry in &entries {
            if entry.on_draw() {
                flushed += 1;
            }
        }
        tracing::trace!(flushed, "binder drawn");
        true
    }

    /// Mark the binder dirty; fires the invalidator on a clean→dirty transition.
    pub fn invalidate(&self) {
        self.signal.invalidate();
    }

    /// Whether a draw is pending.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.signal.is_dirty()
    }

    /// Keys with at least one registration, in iteration order.
    #[must_use]
    pub fn keys(&self) -> Vec<K> {
        self.bindings.read().keys().cloned().collect()
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.read().len()
    }

    /// Whether nothing has been bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.read().is_empty()
    }

    /// Number of registrations under `key`.
    #[must_use]
    pub fn bindings_for(&self, key: &K) -> usize {
        self.bindings.read().get(key).map_or(0, Vec::len)
    }

    fn entries_for(&self, key: &K) -> Vec<Entry<K>> {
        self.bindings.read().get(key).cloned().unwrap_or_default()
    }
}

impl<K: Key> Default for Binder<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Key> std::fmt::Debug for Binder<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bindings = self.bindings.read();
        f.debug_struct("Binder")
            .field("keys", &bindings.len())
            .field("entities", &bindings.values().map(Vec::len).sum::<usize>())
            .field("dirty", &self.signal.is_dirty())
            .finish()
    }
}
