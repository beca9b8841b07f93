// crates/tube_core/src/config.rs

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tube_shared::CallbackSlot;

use crate::error::ConfigError;

/// Centralized defaults for the panel. Keeps `PanelConfig::default` small and easy to tweak.
pub struct PanelDefaults;

impl PanelDefaults {
    pub const PLAY_STEP_INTERVAL_MS: u64 = 250;
    pub const MAX_STEPS_PER_TICK: u32 = 5;
    pub const RELOAD_DEBOUNCE_MS: u64 = 500;
    pub const LOG_LEVEL: &'static str = "info";

    /// The four buttons a panel shows. PlayStep has no button: the ticker drives it.
    pub fn button_bindings() -> BTreeMap<String, CallbackSlot> {
        [
            ("restart_button", CallbackSlot::Restart),
            ("step_button", CallbackSlot::Step),
            ("play_button", CallbackSlot::Play),
            ("end_button", CallbackSlot::End),
        ]
        .into_iter()
        .map(|(id, slot)| (id.to_string(), slot))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    pub module_path: Option<PathBuf>,
    pub play_step_interval_ms: u64,
    pub max_steps_per_tick: u32,
    pub hot_reload: bool,
    pub reload_debounce_ms: u64,
    pub log_level: String,
    pub buttons: BTreeMap<String, CallbackSlot>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            module_path: None,
            play_step_interval_ms: PanelDefaults::PLAY_STEP_INTERVAL_MS,
            max_steps_per_tick: PanelDefaults::MAX_STEPS_PER_TICK,
            hot_reload: true,
            reload_debounce_ms: PanelDefaults::RELOAD_DEBOUNCE_MS,
            log_level: PanelDefaults::LOG_LEVEL.to_string(),
            buttons: PanelDefaults::button_bindings(),
        }
    }
}

impl PanelConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Never zero, so the ticker always makes progress.
    pub fn play_step_interval(&self) -> Duration {
        Duration::from_millis(self.play_step_interval_ms.max(1))
    }

    pub fn reload_debounce(&self) -> Duration {
        Duration::from_millis(self.reload_debounce_ms)
    }

    pub fn max_steps_per_tick(&self) -> u32 {
        self.max_steps_per_tick.max(1)
    }
}
