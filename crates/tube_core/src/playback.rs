// crates/tube_core/src/playback.rs

use std::time::Duration;

use tube_shared::CallbackSlot;

use crate::config::PanelConfig;
use crate::registry::{CallbackRegistry, Invocation};

/// Drives the PlayStep slot while the registry is unpaused.
/// Fixed-interval accumulator with a per-advance cap and backlog drop.
pub struct PlaybackTicker {
    accumulator: Duration,
    interval: Duration,
    max_steps_per_tick: u32,
}

impl PlaybackTicker {
    pub fn new(interval: Duration, max_steps_per_tick: u32) -> Self {
        Self {
            accumulator: Duration::ZERO,
            interval: interval.max(Duration::from_millis(1)),
            max_steps_per_tick: max_steps_per_tick.max(1),
        }
    }

    pub fn from_config(config: &PanelConfig) -> Self {
        Self::new(config.play_step_interval(), config.max_steps_per_tick())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Fires PlayStep once per elapsed interval, re-checking the flag before
    /// each firing so a handler that pauses ends the burst. Returns how many fired.
    pub fn advance(&mut self, elapsed: Duration, registry: &CallbackRegistry) -> u32 {
        if registry.is_paused() {
            self.accumulator = Duration::ZERO;
            return 0;
        }

        self.accumulator = self.accumulator.saturating_add(elapsed);

        let mut steps = 0;
        while self.accumulator >= self.interval && steps < self.max_steps_per_tick {
            if registry.is_paused() {
                self.accumulator = Duration::ZERO;
                break;
            }
            self.accumulator -= self.interval;
            if registry.invoke(CallbackSlot::PlayStep) == Invocation::Unbound {
                // Nobody to drive yet.
                self.accumulator = Duration::ZERO;
                break;
            }
            steps += 1;
        }

        // Drop the backlog rather than chase it.
        if steps == self.max_steps_per_tick && self.accumulator >= self.interval {
            tracing::debug!(dropped = ?self.accumulator, "play-step backlog dropped");
            self.accumulator = Duration::ZERO;
        }

        steps
    }
}
