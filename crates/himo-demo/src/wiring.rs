#![forbid(unsafe_code)]

//! Composition root: which controls mirror which bound objects.
//!
//! - `text` is shown in every edit and every label.
//! - `editable` drives the enabled state of every edit.
//! - `append` (async) waits, then appends `"1"` to `text`.
//! - `toggle` (sync) flips `editable`.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use himo_core::{Binder, BoundCommand, BoundValue, ExecutionMode};

use crate::form::{Control, Form};

/// Longest text the edits accept. Longer input is rejected and restored.
pub const MAX_TEXT: usize = 24;

pub struct Wiring {
    pub binder: Binder<Control>,
    pub text: Arc<BoundValue<Control, String>>,
    pub editable: Arc<BoundValue<Control, bool>>,
    pub append: Arc<BoundCommand<Control>>,
    pub toggle: Arc<BoundCommand<Control>>,
}

impl Wiring {
    /// Bind `edits` edit/label pairs and both buttons of `form`.
    ///
    /// `request_repaint` is called whenever the form needs a redraw; it may
    /// run on the append worker thread.
    pub fn new(
        form: &Arc<Form>,
        edits: u16,
        append_delay: Duration,
        request_repaint: impl Fn() + Send + Sync + 'static,
    ) -> Result<Self> {
        let binder = Binder::new();
        binder.attach_invalidator(request_repaint);

        let text: Arc<BoundValue<Control, String>> = Arc::new(BoundValue::new(String::new()));
        let f = Arc::clone(form);
        text.attach_getter(move |c| f.text(*c));
        let f = Arc::clone(form);
        text.attach_setter(move |c, v: &String| f.set_text(*c, v));
        text.attach_eq_comparator();
        text.attach_validator(|v: &String| v.chars().take(MAX_TEXT).collect());

        let editable: Arc<BoundValue<Control, bool>> = Arc::new(BoundValue::new(true));
        let f = Arc::clone(form);
        editable.attach_getter(move |c| f.is_enabled(*c));
        let f = Arc::clone(form);
        editable.attach_setter(move |c, v: &bool| f.set_enabled(*c, *v));
        editable.attach_eq_comparator();

        let append = Arc::new(BoundCommand::new(true));
        let f = Arc::clone(form);
        append.attach_enabler(move |c, en| f.set_enabled(*c, en));
        let t = Arc::clone(&text);
        append.attach_action(
            move |_| {
                thread::sleep(append_delay);
                let next = format!("{}1", t.get());
                if !t.set_value(next) {
                    tracing::info!("append rejected, text is full");
                }
            },
            ExecutionMode::Async,
        );

        let toggle = Arc::new(BoundCommand::new(true));
        toggle.copy_behavior_from(&append);
        let e = Arc::clone(&editable);
        toggle.attach_action(
            move |_| {
                e.set_value(!e.get());
            },
            ExecutionMode::Sync,
        );

        for n in 0..edits {
            for control in [Control::Edit(n), Control::Label(n)] {
                binder
                    .bind(&text, control)
                    .with_context(|| format!("binding text to {control}"))?;
            }
            binder
                .bind(&editable, Control::Edit(n))
                .with_context(|| format!("binding editable to edit{n}"))?;
        }
        binder
            .bind(&append, Control::Append)
            .context("binding append button")?;
        binder
            .bind(&toggle, Control::Toggle)
            .context("binding toggle button")?;
        tracing::debug!(keys = binder.len(), "form wired");

        Ok(Self {
            binder,
            text,
            editable,
            append,
            toggle,
        })
    }
}
