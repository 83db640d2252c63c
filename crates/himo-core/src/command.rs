#![forbid(unsafe_code)]

//! User-triggered actions gated by an enabled flag and a busy flag.
//!
//! A [`BoundCommand<K>`] runs its action when a bound surface reports a user
//! action, either on the calling thread ([`ExecutionMode::Sync`]) or on a
//! worker thread ([`ExecutionMode::Async`]). Surfaces are told whether the
//! command can currently run through the `enabler` hook.
//!
//! # State machine
//!
//! ```text
//!   Idle(enabled) ──on_command, enabled && !busy──▶ Running
//!        ▲                                              │
//!        └──────────── action returns or panics ◀───────┘
//! ```
//!
//! # Invariants
//!
//! 1. An action starts only if `enabled && !busy`.
//! 2. Surfaces are shown `enabled && !busy`, never the raw `enabled` flag.
//! 3. At most one worker is outstanding. A new trigger joins the previous
//!    worker before starting, so runs never overlap.
//! 4. Dropping the command blocks until the outstanding worker has finished.
//!    Workers are never detached.
//! 5. `busy` is lowered and the command invalidated even if the action panics.
//!
//! # Failure Modes
//!
//! - Missing action: triggers are ignored.
//! - Missing enabler: draws clear the dirty bit and write nothing.
//! - Panicking async action: logged when the worker is joined; the command
//!   stays usable.
//! - Panicking sync action: propagates to the caller of `on_command`.

use std::cell::{Cell, RefCell};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Mutex, ReentrantMutex, RwLock};

use crate::bindable::{Bindable, Key};
use crate::error::BindError;
use crate::invalidate::{Invalidation, RepaintSignal};

type Enabler<K> = Arc<dyn Fn(&K, bool) + Send + Sync>;
type Action<K> = Arc<dyn Fn(&K) + Send + Sync>;

/// Where a command's action runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// On the thread that delivered the trigger.
    #[default]
    Sync,
    /// On a dedicated worker thread, with the command busy until it returns.
    Async,
}

struct CommandHooks<K> {
    enabler: Option<Enabler<K>>,
    action: Option<Action<K>>,
    mode: ExecutionMode,
}

impl<K> Clone for CommandHooks<K> {
    fn clone(&self) -> Self {
        Self {
            enabler: self.enabler.clone(),
            action: self.action.clone(),
            mode: self.mode,
        }
    }
}

impl<K> Default for CommandHooks<K> {
    fn default() -> Self {
        Self {
            enabler: None,
            action: None,
            mode: ExecutionMode::default(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Gate {
    enabled: bool,
    running: usize,
}

impl Gate {
    fn busy(self) -> bool {
        self.running > 0
    }

    fn can_run(self) -> bool {
        self.enabled && !self.busy()
    }
}

/// The part of a command a worker keeps after `on_command` has returned.
struct Shared {
    node: Invalidation,
    gate: ReentrantMutex<Cell<Gate>>,
}

impl Shared {
    fn gate(&self) -> Gate {
        self.gate.lock().get()
    }

    fn update(&self, f: impl FnOnce(&mut Gate)) {
        {
            let guard = self.gate.lock();
            let mut gate = guard.get();
            f(&mut gate);
            guard.set(gate);
        }
        self.node.invalidate();
    }
}

/// Lowers `busy` when the worker finishes, panicking or not.
struct RunningGuard(Arc<Shared>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.update(|gate| gate.running = gate.running.saturating_sub(1));
    }
}

/// An action bound to one or more keyed surfaces.
pub struct BoundCommand<K> {
    shared: Arc<Shared>,
    keys: ReentrantMutex<RefCell<Vec<K>>>,
    hooks: RwLock<CommandHooks<K>>,
    in_flight: Mutex<Option<JoinHandle<()>>>,
}

impl<K: Key> BoundCommand<K> {
    /// Create an unbound command with the given initial enabled state.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            shared: Arc::new(Shared {
                node: Invalidation::new(),
                gate: ReentrantMutex::new(Cell::new(Gate {
                    enabled,
                    running: 0,
                })),
            }),
            keys: ReentrantMutex::new(RefCell::new(Vec::new())),
            hooks: RwLock::new(CommandHooks::default()),
            in_flight: Mutex::new(None),
        }
    }

    /// Attach the hook that shows a surface as enabled or disabled.
    pub fn attach_enabler(&self, enabler: impl Fn(&K, bool) + Send + Sync + 'static) -> &Self {
        self.hooks.write().enabler = Some(Arc::new(enabler));
        self
    }

    /// Attach the action and choose where it runs.
    pub fn attach_action(
        &self,
        action: impl Fn(&K) + Send + Sync + 'static,
        mode: ExecutionMode,
    ) -> &Self {
        let mut hooks = self.hooks.write();
        hooks.action = Some(Arc::new(action));
        hooks.mode = mode;
        self
    }

    /// Copy enabler, action and execution mode from `source`.
    pub fn copy_behavior_from(&self, source: &BoundCommand<K>) -> &Self {
        if !std::ptr::eq(self, source) {
            let hooks = source.hooks.read().clone();
            *self.hooks.write() = hooks;
        }
        self
    }

    /// Set the enabled flag and schedule a redraw.
    pub fn enable(&self, enabled: bool) {
        self.shared.update(|gate| gate.enabled = enabled);
    }

    /// The raw enabled flag, ignoring `busy`.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.shared.gate().enabled
    }

    /// Whether an asynchronous action is running.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.shared.gate().busy()
    }

    /// Keys bound so far, in registration order.
    #[must_use]
    pub fn bound_keys(&self) -> Vec<K> {
        let guard = self.keys.lock();
        let keys = guard.borrow().clone();
        keys
    }

    /// Whether this command belongs to a binder.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.shared.node.is_attached()
    }

    /// Block until the outstanding worker, if any, has finished.
    ///
    /// Called from the worker itself this returns immediately and leaves the
    /// handle in place for the next caller.
    pub fn wait_idle(&self) {
        let handle = {
            let mut slot = self.in_flight.lock();
            if slot
                .as_ref()
                .is_some_and(|handle| handle.thread().id() == thread::current().id())
            {
                return;
            }
            slot.take()
        };
        if let Some(handle) = handle {
            join_worker(handle);
        }
    }

    fn spawn(&self, action: Action<K>, key: K) {
        self.shared.update(|gate| gate.running += 1);

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("himo-command".to_owned())
            .spawn(move || {
                let _running = RunningGuard(shared);
                tracing::debug!(?key, "async action started");
                action(&key);
                tracing::debug!(?key, "async action finished");
            });

        match spawned {
            Ok(handle) => {
                let stale = self.in_flight.lock().replace(handle);
                if let Some(stale) = stale {
                    join_worker(stale);
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to spawn command worker");
                self.shared
                    .update(|gate| gate.running = gate.running.saturating_sub(1));
            }
        }
    }
}

fn join_worker(handle: JoinHandle<()>) {
    // A worker re-triggering or dropping its own command cannot join itself.
    if handle.thread().id() == thread::current().id() {
        return;
    }
    if handle.join().is_err() {
        tracing::warn!("async action panicked");
    }
}

impl<K: Key> Bindable<K> for BoundCommand<K> {
    fn bind(&self, parent: &Arc<RepaintSignal>, key: K) -> Result<(), BindError> {
        if let Err(err) = self.shared.node.attach(parent) {
            tracing::warn!(?key, "command is already bound to another binder");
            return Err(err);
        }

        {
            let guard = self.keys.lock();
            guard.borrow_mut().push(key.clone());
        }

        let enabler = self.hooks.read().enabler.clone();
        if let Some(enabler) = enabler {
            let guard = self.shared.gate.lock();
            enabler(&key, guard.get().can_run());
        }
        tracing::trace!(?key, "command bound");
        Ok(())
    }

    fn on_command(&self, key: &K) {
        if !self.is_enabled() {
            tracing::trace!(?key, "command disabled, trigger ignored");
            return;
        }

        self.wait_idle();
        if !self.shared.gate().can_run() {
            return;
        }

        let hooks = self.hooks.read().clone();
        let Some(action) = hooks.action else {
            return;
        };
        match hooks.mode {
            ExecutionMode::Sync => action(key),
            ExecutionMode::Async => self.spawn(action, key.clone()),
        }
    }

    fn on_notify(&self, _key: &K) {}

    fn on_draw(&self) -> bool {
        if !self.shared.node.take_dirty() {
            return false;
        }

        let enabler = self.hooks.read().enabler.clone();
        let Some(enabler) = enabler else {
            return true;
        };

        let gate = self.shared.gate.lock();
        let can_run = gate.get().can_run();
        let keys = self.keys.lock();
        let targets = keys.borrow().clone();
        for key in &targets {
            enabler(key, can_run);
        }
        tracing::trace!(keys = targets.len(), can_run, "flushed command state");
        true
    }

    fn invalidate(&self) {
        self.shared.node.invalidate();
    }

    fn is_dirty(&self) -> bool {
        self.shared.node.is_dirty()
    }
}

impl<K> Drop for BoundCommand<K> {
    fn drop(&mut self) {
        if let Some(handle) = self.in_flight.get_mut().take() {
            join_worker(handle);
        }
    }
}

impl<K: Key> std::fmt::Debug for BoundCommand<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let gate = self.shared.gate();
        f.debug_struct("BoundCommand")
            .field("enabled", &gate.enabled)
            .field("busy", &gate.busy())
            .field("keys", &self.bound_keys())
            .field("dirty", &self.shared.node.is_dirty())
            .finish()
    }
}
