// crates/tube_core/src/control.rs
//! The button layer. It only knows slot names and the paused flag; what a
//! slot actually does is up to whichever module registered it.

use std::collections::BTreeMap;
use std::sync::Arc;

use tube_shared::CallbackSlot;

use crate::config::PanelDefaults;
use crate::registry::{CallbackRegistry, Invocation};

pub struct ControlPanel {
    registry: Arc<CallbackRegistry>,
    buttons: BTreeMap<String, CallbackSlot>,
}

impl ControlPanel {
    pub fn new(registry: Arc<CallbackRegistry>, buttons: BTreeMap<String, CallbackSlot>) -> Self {
        Self { registry, buttons }
    }

    pub fn with_default_buttons(registry: Arc<CallbackRegistry>) -> Self {
        Self::new(registry, PanelDefaults::button_bindings())
    }

    /// Resolves a button id, falling back to a bare slot name (`play`, `play_step`, ...).
    pub fn resolve(&self, button: &str) -> Option<CallbackSlot> {
        self.buttons
            .get(button)
            .copied()
            .or_else(|| CallbackSlot::from_name(button))
    }

    /// `None` when the button is unknown; nothing is invoked in that case.
    pub fn press(&self, button: &str) -> Option<Invocation> {
        let Some(slot) = self.resolve(button) else {
            tracing::warn!(button, "no such button");
            return None;
        };
        Some(self.invoke(slot))
    }

    pub fn invoke(&self, slot: CallbackSlot) -> Invocation {
        self.registry.invoke(slot)
    }

    pub fn play_label(&self) -> &'static str {
        if self.registry.is_paused() {
            "Play"
        } else {
            "Pause"
        }
    }

    pub fn registry(&self) -> &Arc<CallbackRegistry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn buttons_and_slot_names_both_resolve() {
        let panel = ControlPanel::with_default_buttons(Arc::new(CallbackRegistry::new()));
        assert_eq!(panel.resolve("play_button"), Some(CallbackSlot::Play));
        assert_eq!(panel.resolve("play_step"), Some(CallbackSlot::PlayStep));
        assert_eq!(panel.resolve("rewind_button"), None);
    }

    #[test]
    fn unknown_button_invokes_nothing() {
        let registry = Arc::new(CallbackRegistry::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        registry.set_callbacks(
            Some(Arc::new(move || {
                h.fetch_add(1, Ordering::SeqCst);
            })),
            None,
            None,
            None,
            None,
        );
        let panel = ControlPanel::with_default_buttons(registry);

        assert_eq!(panel.press("rewind_button"), None);
        assert_eq!(panel.press("step_button"), Some(Invocation::Unbound));
        assert_eq!(panel.press("restart_button"), Some(Invocation::Dispatched));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn play_label_follows_flag() {
        let registry = Arc::new(CallbackRegistry::new());
        let panel = ControlPanel::with_default_buttons(Arc::clone(&registry));
        assert_eq!(panel.play_label(), "Play");
        registry.set_paused(false);
        assert_eq!(panel.play_label(), "Pause");
    }
}
