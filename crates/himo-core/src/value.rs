#![forbid(unsafe_code)]

//! A single logical value mirrored into any number of keyed surfaces.
//!
//! [`BoundValue<K, V>`] owns the value and the list of keys that display it.
//! The collaborator supplies hooks that read a surface (`getter`), write a
//! surface (`setter`), compare two values (`comparator`) and normalize a value
//! (`validator`).
//!
//! # Write paths
//!
//! - [`set_value`](BoundValue::set_value) (programmatic): stores the value and
//!   marks the entity dirty. Surfaces are updated on the next draw.
//! - [`on_command`](Bindable::on_command) / [`on_notify`](Bindable::on_notify)
//!   (surface-originated): reads the surface, and on acceptance pushes the new
//!   value to every *other* key immediately. The origin already shows it.
//!
//! # Invariants
//!
//! 1. Without a comparator every incoming value counts as a change.
//! 2. With both validator and comparator, `v` is accepted only if
//!    `comparator(v, validator(v))` is `Equal`. A validator alone is ignored.
//! 3. A rejected surface edit is undone at its origin only; state is untouched.
//! 4. A draw never presents a value that fails validation.
//! 5. Keys keep registration order and are never deduplicated.
//!
//! # Re-entrancy
//!
//! The value and the key list sit behind separate re-entrant locks. Hooks run
//! while the value lock is held but never while a `RefCell` borrow is live, so
//! a hook may call back into the same `BoundValue` from the same thread.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::sync::Arc;

use parking_lot::{ReentrantMutex, RwLock};

use crate::bindable::{Bindable, Key};
use crate::error::BindError;
use crate::invalidate::{Invalidation, RepaintSignal};

type Getter<K, V> = Arc<dyn Fn(&K) -> V + Send + Sync>;
type Setter<K, V> = Arc<dyn Fn(&K, &V) + Send + Sync>;
type Comparator<V> = Arc<dyn Fn(&V, &V) -> Ordering + Send + Sync>;
type Validator<V> = Arc<dyn Fn(&V) -> V + Send + Sync>;
type OnChange<K, V> = Arc<dyn Fn(&BoundValue<K, V>) + Send + Sync>;

struct ValueHooks<K, V> {
    getter: Option<Getter<K, V>>,
    setter: Option<Setter<K, V>>,
    comparator: Option<Comparator<V>>,
    validator: Option<Validator<V>>,
    on_change: Option<OnChange<K, V>>,
}

impl<K, V> ValueHooks<K, V> {
    fn accepts(&self, value: &V) -> bool {
        match (&self.validator, &self.comparator) {
            (Some(validator), Some(comparator)) => {
                comparator(value, &validator(value)) == Ordering::Equal
            }
            _ => true,
        }
    }

    fn differs(&self, current: &V, incoming: &V) -> bool {
        self.comparator
            .as_ref()
            .is_none_or(|comparator| comparator(current, incoming) != Ordering::Equal)
    }
}

impl<K, V> Clone for ValueHooks<K, V> {
    fn clone(&self) -> Self {
        Self {
            getter: self.getter.clone(),
            setter: self.setter.clone(),
            comparator: self.comparator.clone(),
            validator: self.validator.clone(),
            on_change: self.on_change.clone(),
        }
    }
}

impl<K, V> Default for ValueHooks<K, V> {
    fn default() -> Self {
        Self {
            getter: None,
            setter: None,
            comparator: None,
            validator: None,
            on_change: None,
        }
    }
}

/// A value kept in sync across every surface bound to it.
pub struct BoundValue<K, V> {
    node: Invalidation,
    value: ReentrantMutex<RefCell<V>>,
    keys: ReentrantMutex<RefCell<Vec<K>>>,
    hooks: RwLock<ValueHooks<K, V>>,
}

impl<K: Key, V: Clone + Send + 'static> BoundValue<K, V> {
    /// Create an unbound value with no hooks attached.
    #[must_use]
    pub fn new(initial: V) -> Self {
        Self {
            node: Invalidation::new(),
            value: ReentrantMutex::new(RefCell::new(initial)),
            keys: ReentrantMutex::new(RefCell::new(Vec::new())),
            hooks: RwLock::new(ValueHooks::default()),
        }
    }

    /// Attach the hook that reads a surface's current state.
    pub fn attach_getter(&self, getter: impl Fn(&K) -> V + Send + Sync + 'static) -> &Self {
        self.hooks.write().getter = Some(Arc::new(getter));
        self
    }

    /// Attach the hook that writes a value into a surface.
    pub fn attach_setter(&self, setter: impl Fn(&K, &V) + Send + Sync + 'static) -> &Self {
        self.hooks.write().setter = Some(Arc::new(setter));
        self
    }

    /// Attach the comparator used for change detection and validation.
    pub fn attach_comparator(
        &self,
        comparator: impl Fn(&V, &V) -> Ordering + Send + Sync + 'static,
    ) -> &Self {
        self.hooks.write().comparator = Some(Arc::new(comparator));
        self
    }

    /// Attach a comparator that only distinguishes equal from not equal.
    pub fn attach_eq_comparator(&self) -> &Self
    where
        V: PartialEq,
    {
        self.attach_comparator(|a, b| {
            if a == b {
                Ordering::Equal
            } else {
                Ordering::Greater
            }
        })
    }

    /// Attach the normalizing validator. Only effective with a comparator.
    pub fn attach_validator(&self, validator: impl Fn(&V) -> V + Send + Sync + 'static) -> &Self {
        self.hooks.write().validator = Some(Arc::new(validator));
        self
    }

    /// Register the observer run after a surface edit is accepted.
    pub fn register_on_change(
        &self,
        on_change: impl Fn(&BoundValue<K, V>) + Send + Sync + 'static,
    ) -> &Self {
        self.hooks.write().on_change = Some(Arc::new(on_change));
        self
    }

    /// Copy every hook from `source`. Value, keys and parent are not copied.
    pub fn copy_behavior_from(&self, source: &BoundValue<K, V>) -> &Self {
        if !std::ptr::eq(self, source) {
            let hooks = source.hooks.read().clone();
            *self.hooks.write() = hooks;
        }
        self
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> V {
        self.current()
    }

    /// Access the current value by reference.
    ///
    /// `f` must not write to this value.
    pub fn with<R>(&self, f: impl FnOnce(&V) -> R) -> R {
        let guard = self.value.lock();
        let value = guard.borrow();
        f(&value)
    }

    /// Programmatic write.
    ///
    /// Returns `true` if `value` passed validation and differs from the
    /// current value. On acceptance the entity is marked dirty; surfaces are
    /// updated on the next draw.
    pub fn set_value(&self, value: V) -> bool {
        let hooks = self.hooks.read().clone();
        if !hooks.accepts(&value) {
            tracing::debug!("rejected programmatic value");
            return false;
        }

        let guard = self.value.lock();
        let current = guard.borrow().clone();
        if !hooks.differs(&current, &value) {
            return false;
        }
        *guard.borrow_mut() = value;
        self.node.invalidate();
        true
    }

    /// Keys bound so far, in registration order.
    #[must_use]
    pub fn bound_keys(&self) -> Vec<K> {
        let guard = self.keys.lock();
        let keys = guard.borrow().clone();
        keys
    }

    /// Whether this value belongs to a binder.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.node.is_attached()
    }

    fn current(&self) -> V {
        let guard = self.value.lock();
        let value = guard.borrow().clone();
        value
    }

    /// Read, validate and broadcast a surface-originated change.
    fn pull_from(&self, key: &K) {
        let hooks = self.hooks.read().clone();
        let Some(getter) = hooks.getter.as_ref() else {
            return;
        };

        let guard = self.value.lock();
        let incoming = getter(key);

        if !hooks.accepts(&incoming) {
            tracing::debug!(?key, "rejected surface value, restoring last accepted");
            if let Some(setter) = hooks.setter.as_ref() {
                let current = guard.borrow().clone();
                setter(key, &current);
            }
            return;
        }

        let current = guard.borrow().clone();
        if !hooks.differs(&current, &incoming) {
            return;
        }
        *guard.borrow_mut() = incoming.clone();

        if let Some(on_change) = hooks.on_change.as_ref() {
            on_change(self);
        }

        let Some(setter) = hooks.setter.as_ref() else {
            return;
        };
        let keys = self.keys.lock();
        let peers = keys.borrow().clone();
        let mut pushed = 0usize;
        for peer in peers.iter().filter(|peer| *peer != key) {
            setter(peer, &incoming);
            pushed += 1;
        }
        tracing::trace!(?key, peers = pushed, "broadcast surface change");
    }
}

impl<K: Key, V: Clone + Send + 'static> Bindable<K> for BoundValue<K, V> {
    fn bind(&self, parent: &Arc<RepaintSignal>, key: K) -> Result<(), BindError> {
        if let Err(err) = self.node.attach(parent) {
            tracing::warn!(?key, "value is already bound to another binder");
            return Err(err);
        }

        {
            let guard = self.keys.lock();
            guard.borrow_mut().push(key.clone());
        }

        let setter = self.hooks.read().setter.clone();
        if let Some(setter) = setter {
            let guard = self.value.lock();
            let current = guard.borrow().clone();
            setter(&key, &current);
        }
        tracing::trace!(?key, "value bound");
        Ok(())
    }

    fn on_command(&self, key: &K) {
        self.pull_from(key);
    }

    fn on_notify(&self, key: &K) {
        self.pull_from(key);
    }

    fn on_draw(&self) -> bool {
        if !self.node.take_dirty() {
            return false;
        }

        let hooks = self.hooks.read().clone();
        let Some(setter) = hooks.setter.as_ref() else {
            return true;
        };

        let guard = self.value.lock();
        let current = guard.borrow().clone();
        if !hooks.accepts(&current) {
            tracing::debug!("skipping flush of a value that fails validation");
            return true;
        }

        let keys = self.keys.lock();
        let targets = keys.borrow().clone();
        for key in &targets {
            setter(key, &current);
        }
        tracing::trace!(keys = targets.len(), "flushed value");
        true
    }

    fn invalidate(&self) {
        self.node.invalidate();
    }

    fn is_dirty(&self) -> bool {
        self.node.is_dirty()
    }
}

impl<K: Key, V: Clone + Send + std::fmt::Debug + 'static> std::fmt::Debug for BoundValue<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundValue")
            .field("value", &self.get())
            .field("keys", &self.bound_keys())
            .field("dirty", &self.node.is_dirty())
            .finish()
    }
}
