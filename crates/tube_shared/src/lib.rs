// crates/tube_shared/src/lib.rs
//! Types shared by the host (panel) and the module across the C boundary.

pub mod callback_types;
pub mod module_api;

pub use callback_types::{CallbackSlot, SlotId, SLOT_COUNT, SLOT_NOT_FOUND};
pub use module_api::{
    ButtonCallbacks, FFIResult, HostInterface, ModuleApi, ModuleContext, RawCallback,
    RegistryContext, CREATE_MODULE_SYMBOL, LAYOUT_TAG,
    calculate_layout_hash, current_layout_hash,
};
