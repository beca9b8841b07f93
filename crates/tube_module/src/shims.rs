// crates/tube_module/src/shims.rs

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};

use tube_shared::{
    current_layout_hash, ButtonCallbacks, FFIResult, HostInterface, ModuleContext, RawCallback,
};

use crate::state::ModuleState;

pub type SharedState = Mutex<ModuleState>;

fn catch_ffi_panic<F>(f: F) -> FFIResult
where
    F: FnOnce() -> FFIResult,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(res) => res,
        Err(_) => FFIResult::PanicDetected,
    }
}

/// # Safety
/// `ctx` must be null or the pointer produced by `_create_module`, not yet dropped.
unsafe fn shared_state<'a>(ctx: *mut ModuleContext) -> Option<&'a SharedState> {
    (ctx as *const SharedState).as_ref()
}

/// Locks the state and runs one button action. Panics stay on this side.
fn run_action(ctx: *mut ModuleContext, action: fn(&mut ModuleState)) {
    let _ = panic::catch_unwind(AssertUnwindSafe(|| {
        if let Some(shared) = unsafe { shared_state(ctx) } {
            let mut state = shared.lock().unwrap_or_else(PoisonError::into_inner);
            action(&mut state);
        }
    }));
}

extern "C" fn restart_cb(ctx: *mut ModuleContext) {
    run_action(ctx, ModuleState::do_restart)
}

extern "C" fn step_cb(ctx: *mut ModuleContext) {
    run_action(ctx, ModuleState::do_step)
}

extern "C" fn play_cb(ctx: *mut ModuleContext) {
    run_action(ctx, ModuleState::do_play)
}

extern "C" fn end_cb(ctx: *mut ModuleContext) {
    run_action(ctx, ModuleState::do_end)
}

extern "C" fn play_step_cb(ctx: *mut ModuleContext) {
    run_action(ctx, ModuleState::do_play_step)
}

pub fn button_table(ctx: *mut ModuleContext) -> ButtonCallbacks {
    ButtonCallbacks {
        restart: RawCallback::new(ctx, restart_cb),
        step: RawCallback::new(ctx, step_cb),
        play: RawCallback::new(ctx, play_cb),
        end: RawCallback::new(ctx, end_cb),
        play_step: RawCallback::new(ctx, play_step_cb),
    }
}

pub extern "C" fn on_load(state: *mut ModuleContext, iface: *const HostInterface) -> FFIResult {
    catch_ffi_panic(|| {
        let (Some(shared), Some(host)) = (unsafe { shared_state(state) }, unsafe { iface.as_ref() })
        else {
            return FFIResult::Error;
        };

        shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .bind_host_resources(host);

        // Lock released: the host may call straight back into a handler.
        let table = button_table(state);
        (host.set_callbacks)(host.ctx, &table);
        FFIResult::Success
    })
}

pub extern "C" fn on_unload(state: *mut ModuleContext) -> FFIResult {
    catch_ffi_panic(|| {
        let Some(shared) = (unsafe { shared_state(state) }) else {
            return FFIResult::Error;
        };
        let host = shared.lock().unwrap_or_else(PoisonError::into_inner).host.take();
        if let Some(host) = host {
            host.clear_callbacks();
        }
        FFIResult::Success
    })
}

pub extern "C" fn drop_state(state: *mut ModuleContext) {
    if state.is_null() {
        return;
    }
    // SAFETY: produced by Box::into_raw in `_create_module` and dropped once.
    let _ = panic::catch_unwind(AssertUnwindSafe(|| unsafe {
        drop(Box::from_raw(state as *mut SharedState));
    }));
}

pub extern "C" fn get_layout_hash() -> u64 {
    current_layout_hash()
}
