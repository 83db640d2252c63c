#![forbid(unsafe_code)]

//! Key-routed data bindings and commands for retained-mode UIs.
//!
//! `himo-core` keeps any number of presentation surfaces ("controls") in sync
//! with one logical value, and gates user-triggered actions behind an enabled
//! flag and a busy flag. Surfaces are identified by an opaque [`Key`]; the
//! engine never owns them and never renders anything. The host supplies
//! closures that read and write a surface, and calls three entry points on a
//! [`Binder`]:
//!
//! - [`Binder::on_command`] when a user acts on a surface,
//! - [`Binder::on_notify`] when a surface reports a passive change,
//! - [`Binder::on_draw`] once per redraw cycle.
//!
//! # Architecture
//!
//! - [`BoundValue<K, V>`]: one value, many surfaces. Surface edits are read,
//!   validated and broadcast to the other surfaces immediately; programmatic
//!   writes are deferred to the next draw.
//! - [`BoundCommand<K>`]: an action with an enabled/busy gate, run on the
//!   calling thread or on one worker thread at a time.
//! - [`Binder<K>`]: maps keys to entities, routes events, and aggregates the
//!   entities' dirty bits into one repaint callback.
//! - [`Invalidation`] / [`RepaintSignal`]: the dirty bits themselves.
//!
//! Mutation and presentation are two phases: entities mark themselves dirty
//! when they change, and only the next draw writes their state out. Many
//! changes in one UI tick therefore cost one flush.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use std::sync::{Arc, Mutex};
//! use himo_core::{Binder, BoundValue};
//!
//! let surfaces = Arc::new(Mutex::new(BTreeMap::<u32, String>::new()));
//! let binder = Binder::new();
//! let name: Arc<BoundValue<u32, String>> = Arc::new(BoundValue::new("ada".into()));
//!
//! let s = Arc::clone(&surfaces);
//! name.attach_setter(move |k, v| {
//!     s.lock().unwrap().insert(*k, v.clone());
//! });
//! binder.bind(&name, 1).unwrap();
//! binder.bind(&name, 2).unwrap();
//!
//! name.set_value(String::from("grace"));
//! binder.on_draw();
//! assert_eq!(surfaces.lock().unwrap()[&1], "grace");
//! assert_eq!(surfaces.lock().unwrap()[&2], "grace");
//! ```

pub mod bindable;
pub mod binder;
pub mod command;
pub mod error;
pub mod invalidate;
pub mod value;

pub use bindable::{Bindable, Key};
pub use binder::Binder;
pub use command::{BoundCommand, ExecutionMode};
pub use error::BindError;
pub use invalidate::{Invalidation, RepaintSignal};
pub use value::BoundValue;
