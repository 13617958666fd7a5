//! Text entry through pluggable text-field adapters.
//!
//! The UI substrate exposes a field's text as metadata only. Editing goes
//! through a [`TextFieldAdapter`] registered for the widget kinds an
//! application uses; the first adapter that accepts a field handles it.

use std::sync::Arc;

use keysym::LegacyKey;
use tracing::{debug, warn};

use crate::{
    config::GESTURES,
    error::Outcome,
    harness::Harness,
    ui::{ElementId, ElementInfo, find},
    wait::Waiter,
};

/// Edits one kind of text widget.
pub trait TextFieldAdapter: Send + Sync {
    /// Adapter name for logs.
    fn name(&self) -> &str;
    /// Whether this adapter can edit `field`.
    fn accepts(&self, field: &ElementInfo) -> bool;
    /// Current text of `field`.
    fn text(&self, field: ElementId) -> Option<String>;
    /// Replace the text of `field`.
    fn set_text(&self, field: ElementId, text: &str);
    /// Give `field` keyboard focus.
    fn focus(&self, field: ElementId);
    /// Commit the edit, as pressing Return would.
    fn submit(&self, field: ElementId);
}

/// Registered adapters, consulted in registration order.
#[derive(Clone, Default)]
pub struct TextAdapters {
    /// Adapters.
    adapters: Vec<Arc<dyn TextFieldAdapter>>,
}

impl TextAdapters {
    /// Register an adapter.
    pub fn register(&mut self, adapter: Arc<dyn TextFieldAdapter>) {
        self.adapters.push(adapter);
    }

    /// First adapter accepting `field`.
    pub fn adapter_for(&self, field: &ElementInfo) -> Option<Arc<dyn TextFieldAdapter>> {
        self.adapters.iter().find(|a| a.accepts(field)).cloned()
    }

    /// Number of registered adapters.
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Whether no adapter is registered.
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

/// Text entry bound to one scope.
pub struct TextInput<'a> {
    /// Runtime state.
    harness: &'a Harness,
    /// Scope waits.
    waiter: Waiter,
}

impl<'a> TextInput<'a> {
    /// Bind text entry to a waiter.
    pub fn new(harness: &'a Harness, waiter: Waiter) -> Self {
        Self { harness, waiter }
    }

    /// Resolve a field and its adapter, warning when either is missing.
    fn editable(&self, field: Option<ElementId>) -> Option<(ElementId, Arc<dyn TextFieldAdapter>)> {
        let Some(id) = field.or_else(|| self.harness.selected()) else {
            warn!("text_no_selected_field");
            return None;
        };
        let info = self.harness.substrate().ui.element(id)?;
        match self.harness.text_adapters().adapter_for(&info) {
            Some(adapter) => Some((id, adapter)),
            None => {
                warn!(field = %info.name, "text_no_adapter");
                None
            }
        }
    }

    /// Type into the selected field one character at a time.
    pub async fn type_text(&self, text: &str) -> Outcome<bool> {
        self.type_chars(None, text, GESTURES.typing_delay_secs).await
    }

    /// Select the field named `name` and type into it.
    pub async fn type_into(&self, name: &str, text: &str) -> Outcome<bool> {
        let Some(id) = find::find_by_name(self.harness.substrate().ui.as_ref(), name) else {
            warn!(field = name, "text_field_not_found");
            return Ok(false);
        };
        self.harness.set_selected(Some(id));
        self.type_chars(Some(id), text, GESTURES.typing_delay_secs)
            .await
    }

    /// Append `text` to a field, waiting `delay` seconds after each character.
    pub async fn type_chars(&self, field: Option<ElementId>, text: &str, delay: f64) -> Outcome<bool> {
        let Some((id, adapter)) = self.editable(field) else {
            return Ok(false);
        };
        adapter.focus(id);
        let mut current = adapter.text(id).unwrap_or_default();
        for ch in text.chars() {
            self.waiter.check_cancelled()?;
            current.push(ch);
            adapter.set_text(id, &current);
            self.waiter.seconds(delay).await?;
        }
        debug!(adapter = adapter.name(), field = %id, chars = text.chars().count(), "text_typed");
        self.harness
            .diagnostics()
            .update_action(&format!("type {} chars", text.chars().count()));
        Ok(true)
    }

    /// Clear a field, or the selected one.
    pub fn clear(&self, field: Option<ElementId>) -> bool {
        match self.editable(field) {
            Some((id, adapter)) => {
                adapter.set_text(id, "");
                true
            }
            None => false,
        }
    }

    /// Submit a field, or the selected one, and tap Return on the keyboard.
    pub async fn submit(&self, field: Option<ElementId>) -> Outcome<bool> {
        let Some((id, adapter)) = self.editable(field) else {
            return Ok(false);
        };
        adapter.submit(id);
        let keyboard = self.harness.keyboard();
        keyboard.key_down(LegacyKey::Return);
        self.waiter.tick().await?;
        keyboard.key_up(LegacyKey::Return);
        Ok(true)
    }
}
