// crates/tube_shared/src/callback_types.rs
//! The fixed set of control slots. Closed on purpose: there is no way to add one at runtime.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable integer id for a slot (FFI-safe).
pub type SlotId = u32;
pub const SLOT_NOT_FOUND: SlotId = u32::MAX;

pub const SLOT_COUNT: usize = 5;

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackSlot {
    Restart = 0,
    Step = 1,
    Play = 2,
    End = 3,
    PlayStep = 4,
}

impl CallbackSlot {
    /// All slots in registration order.
    pub const ALL: [CallbackSlot; SLOT_COUNT] = [
        CallbackSlot::Restart,
        CallbackSlot::Step,
        CallbackSlot::Play,
        CallbackSlot::End,
        CallbackSlot::PlayStep,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn id(self) -> SlotId {
        self as SlotId
    }

    /// Returns `None` for out-of-range ids (including `SLOT_NOT_FOUND`).
    pub fn from_id(id: SlotId) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            CallbackSlot::Restart => "restart",
            CallbackSlot::Step => "step",
            CallbackSlot::Play => "play",
            CallbackSlot::End => "end",
            CallbackSlot::PlayStep => "play_step",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.name() == name)
    }
}

impl fmt::Display for CallbackSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_follow_registration_order() {
        for (i, slot) in CallbackSlot::ALL.iter().enumerate() {
            assert_eq!(slot.index(), i);
            assert_eq!(CallbackSlot::from_id(slot.id()), Some(*slot));
        }
        assert_eq!(CallbackSlot::from_id(SLOT_COUNT as SlotId), None);
        assert_eq!(CallbackSlot::from_id(SLOT_NOT_FOUND), None);
    }

    #[test]
    fn names_match_serde_representation() {
        for slot in CallbackSlot::ALL {
            let json = serde_json::to_string(&slot).expect("slot serializes");
            assert_eq!(json, format!("\"{}\"", slot.name()));
            assert_eq!(CallbackSlot::from_name(slot.name()), Some(slot));
        }
        assert_eq!(CallbackSlot::from_name("pause"), None);
    }
}
