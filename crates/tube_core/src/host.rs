// crates/tube_core/src/host.rs
use std::ffi::{c_char, CStr};
use std::sync::Arc;

use tube_shared::{ButtonCallbacks, CallbackSlot, HostInterface, RegistryContext, SlotId};

use crate::ffi::{callback_set_from_table, catch_ffi_panic};
use crate::registry::{CallbackRegistry, Invocation};

/// Casts the context back to the registry it was created from.
///
/// # Safety
/// `ctx` must be null or come from `create_interface` with the registry still alive.
unsafe fn registry_from<'a>(ctx: *const RegistryContext) -> Option<&'a CallbackRegistry> {
    (ctx as *const CallbackRegistry).as_ref()
}

extern "C" fn host_set_callbacks(ctx: *const RegistryContext, table: *const ButtonCallbacks) {
    let Some(registry) = (unsafe { registry_from(ctx) }) else {
        tracing::warn!("set_callbacks called with null RegistryContext");
        return;
    };
    catch_ffi_panic("set_callbacks", (), || {
        // SAFETY: the module passes either null or a pointer to a live table for this call.
        match unsafe { table.as_ref() } {
            Some(table) => registry.install(callback_set_from_table(table)),
            None => registry.clear(),
        }
    })
}

extern "C" fn host_is_paused(ctx: *const RegistryContext) -> bool {
    match unsafe { registry_from(ctx) } {
        Some(registry) => registry.is_paused(),
        None => true,
    }
}

extern "C" fn host_set_paused(ctx: *const RegistryContext, paused: bool) {
    if let Some(registry) = unsafe { registry_from(ctx) } {
        registry.set_paused(paused);
    }
}

extern "C" fn host_invoke(ctx: *const RegistryContext, slot: SlotId) -> bool {
    let Some(registry) = (unsafe { registry_from(ctx) }) else {
        return false;
    };
    let Some(slot) = CallbackSlot::from_id(slot) else {
        tracing::warn!(slot, "invoke called with unknown slot id");
        return false;
    };
    catch_ffi_panic("invoke", false, || {
        registry.invoke(slot) == Invocation::Dispatched
    })
}

extern "C" fn host_log(msg: *const c_char) {
    if msg.is_null() {
        return;
    }
    // SAFETY: the module passes a NUL-terminated string valid for this call.
    let msg = unsafe { CStr::from_ptr(msg) };
    tracing::info!(target: "tube_module", "{}", msg.to_string_lossy());
}

/// Builds the table handed to a module. The returned interface points into
/// `registry`; keep the `Arc` alive for as long as the module may call it.
pub fn create_interface(registry: &Arc<CallbackRegistry>) -> HostInterface {
    HostInterface {
        ctx: Arc::as_ptr(registry) as *const RegistryContext,
        set_callbacks: host_set_callbacks,
        is_paused: host_is_paused,
        set_paused: host_set_paused,
        invoke: host_invoke,
        log: Some(host_log),
    }
}
