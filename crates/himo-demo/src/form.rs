#![forbid(unsafe_code)]

//! Host-side widget table standing in for a windowing system.

use std::collections::BTreeMap;
use std::fmt;

use parking_lot::Mutex;

/// Identity of a control on the form. This is the binding key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Control {
    Edit(u16),
    Label(u16),
    Append,
    Toggle,
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Edit(n) => format!("edit{n}"),
            Self::Label(n) => format!("label{n}"),
            Self::Append => "[append]".to_owned(),
            Self::Toggle => "[toggle]".to_owned(),
        };
        f.pad(&name)
    }
}

#[derive(Debug, Clone)]
struct Widget {
    text: String,
    enabled: bool,
}

impl Default for Widget {
    fn default() -> Self {
        Self {
            text: String::new(),
            enabled: true,
        }
    }
}

/// The form's controls and their presentation state.
#[derive(Debug, Default)]
pub struct Form {
    widgets: Mutex<BTreeMap<Control, Widget>>,
}

impl Form {
    /// Create a form with `edits` edit boxes, one label per edit, and the two
    /// buttons.
    #[must_use]
    pub fn new(edits: u16) -> Self {
        let mut widgets = BTreeMap::new();
        for n in 0..edits {
            widgets.insert(Control::Edit(n), Widget::default());
            widgets.insert(Control::Label(n), Widget::default());
        }
        widgets.insert(Control::Append, Widget::default());
        widgets.insert(Control::Toggle, Widget::default());
        Self {
            widgets: Mutex::new(widgets),
        }
    }

    pub fn text(&self, control: Control) -> String {
        self.widgets
            .lock()
            .get(&control)
            .map(|w| w.text.clone())
            .unwrap_or_default()
    }

    pub fn set_text(&self, control: Control, text: &str) {
        if let Some(widget) = self.widgets.lock().get_mut(&control) {
            widget.text = text.to_owned();
        }
    }

    pub fn is_enabled(&self, control: Control) -> bool {
        self.widgets
            .lock()
            .get(&control)
            .is_some_and(|w| w.enabled)
    }

    pub fn set_enabled(&self, control: Control, enabled: bool) {
        if let Some(widget) = self.widgets.lock().get_mut(&control) {
            widget.enabled = enabled;
        }
    }

    /// One line per control, in control order.
    pub fn render(&self) -> String {
        let widgets = self.widgets.lock();
        let mut out = String::new();
        for (control, widget) in widgets.iter() {
            let state = if widget.enabled { "  " } else { "x " };
            out.push_str(&format!("{state}{control:<10} {:?}\n", widget.text));
        }
        out
    }
}
