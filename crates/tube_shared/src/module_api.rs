// crates/tube_shared/src/module_api.rs
use core::ffi::c_char;
use core::ptr;

use crate::callback_types::{CallbackSlot, SlotId};

// ==================================================================================
// 1. OPAQUE HANDLES
// ==================================================================================

/// The host's callback registry, as the module sees it.
///
/// Zero-sized and opaque: the module can hand it back to host functions but
/// cannot read through it. PhantomData keeps it !Send/!Sync and !Unpin.
#[repr(C)]
pub struct RegistryContext {
    _data: [u8; 0],
    _marker: core::marker::PhantomData<(*mut u8, core::marker::PhantomPinned)>,
}

/// The module's own state, as the host sees it.
#[repr(C)]
pub struct ModuleContext {
    _data: [u8; 0],
    _marker: core::marker::PhantomData<(*mut u8, core::marker::PhantomPinned)>,
}

// ==================================================================================
// 2. CALLBACK TABLE
// ==================================================================================

/// One handler as it crosses the boundary: module state plus a trampoline.
///
/// The host never owns `target`. It stays valid until the module registers a
/// table that no longer mentions it.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct RawCallback {
    pub target: *mut ModuleContext,
    pub call: Option<extern "C" fn(*mut ModuleContext)>,
}

impl RawCallback {
    pub const UNSET: Self = Self {
        target: ptr::null_mut(),
        call: None,
    };

    pub fn new(target: *mut ModuleContext, call: extern "C" fn(*mut ModuleContext)) -> Self {
        Self {
            target,
            call: Some(call),
        }
    }

    pub fn is_set(&self) -> bool {
        self.call.is_some()
    }
}

impl Default for RawCallback {
    fn default() -> Self {
        Self::UNSET
    }
}

/// All five handlers in one record. This is the only shape a module can
/// register, so a half-updated table cannot be expressed.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct ButtonCallbacks {
    pub restart: RawCallback,
    pub step: RawCallback,
    pub play: RawCallback,
    pub end: RawCallback,
    pub play_step: RawCallback,
}

impl ButtonCallbacks {
    pub const UNSET: Self = Self {
        restart: RawCallback::UNSET,
        step: RawCallback::UNSET,
        play: RawCallback::UNSET,
        end: RawCallback::UNSET,
        play_step: RawCallback::UNSET,
    };

    pub fn get(&self, slot: CallbackSlot) -> RawCallback {
        match slot {
            CallbackSlot::Restart => self.restart,
            CallbackSlot::Step => self.step,
            CallbackSlot::Play => self.play,
            CallbackSlot::End => self.end,
            CallbackSlot::PlayStep => self.play_step,
        }
    }
}

// ==================================================================================
// 3. STRUCTURAL HASHING (The "Handshake")
// ==================================================================================

/// Describes the boundary layout. Bump it whenever a `#[repr(C)]` type in
/// this file changes shape.
pub const LAYOUT_TAG: &str = "tube_shared::ButtonCallbacks[5]{target,call}/HostInterface{ctx,set_callbacks,is_paused,set_paused,invoke,log}/v1";

/// FNV-1a over the layout tag. Host and module compare the result on load.
pub fn calculate_layout_hash(tag: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    for b in tag.bytes() {
        hash ^= b as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

pub fn current_layout_hash() -> u64 {
    calculate_layout_hash(LAYOUT_TAG)
}

// ==================================================================================
// 4. HOST INTERFACE
// ==================================================================================

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FFIResult {
    Success = 0,
    Error = 1,
    PanicDetected = 2,
}

/// Handed to the module in `on_load`. Every function takes `ctx` back so the
/// module talks to one explicit registry rather than a global.
#[repr(C)]
pub struct HostInterface {
    pub ctx: *const RegistryContext,
    /// Replaces all five slots. A null table clears them.
    pub set_callbacks: extern "C" fn(ctx: *const RegistryContext, table: *const ButtonCallbacks),
    pub is_paused: extern "C" fn(ctx: *const RegistryContext) -> bool,
    pub set_paused: extern "C" fn(ctx: *const RegistryContext, paused: bool),
    /// Returns false when the slot is unknown or unbound.
    pub invoke: extern "C" fn(ctx: *const RegistryContext, slot: SlotId) -> bool,
    pub log: Option<extern "C" fn(msg: *const c_char)>,
}

// ==================================================================================
// 5. MODULE API
// ==================================================================================

/// Name of the exported constructor: `extern "C" fn() -> ModuleApi`.
pub const CREATE_MODULE_SYMBOL: &[u8] = b"_create_module";

#[repr(C)]
pub struct ModuleApi {
    pub state: *mut ModuleContext,

    pub on_load: extern "C" fn(*mut ModuleContext, *const HostInterface) -> FFIResult,
    pub on_unload: extern "C" fn(*mut ModuleContext) -> FFIResult,
    pub drop_state: extern "C" fn(*mut ModuleContext),

    // The host calls this immediately after loading and aborts on mismatch.
    pub get_layout_hash: extern "C" fn() -> u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn noop(_: *mut ModuleContext) {}

    #[test]
    fn unset_table_has_no_bound_slot() {
        let table = ButtonCallbacks::default();
        assert!(CallbackSlot::ALL.iter().all(|s| !table.get(*s).is_set()));
    }

    #[test]
    fn table_lookup_matches_field() {
        let table = ButtonCallbacks {
            end: RawCallback::new(ptr::null_mut(), noop),
            ..ButtonCallbacks::UNSET
        };
        assert!(table.get(CallbackSlot::End).is_set());
        assert!(!table.get(CallbackSlot::PlayStep).is_set());
    }

    #[test]
    fn layout_hash_is_stable_and_tag_sensitive() {
        assert_eq!(current_layout_hash(), calculate_layout_hash(LAYOUT_TAG));
        assert_ne!(current_layout_hash(), calculate_layout_hash("something else"));
    }
}
