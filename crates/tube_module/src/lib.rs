// crates/tube_module/src/lib.rs
//! Demonstration module: a stepping machine exposed through the five panel buttons.

pub mod machine;
pub mod shims;
pub mod state;

use std::sync::Mutex;

use tube_shared::{ModuleApi, ModuleContext};

use crate::state::ModuleState;

//
// FFI exports
//

#[no_mangle]
pub extern "C" fn _create_module() -> ModuleApi {
    let state: Box<shims::SharedState> = Box::new(Mutex::new(ModuleState::default()));
    ModuleApi {
        state: Box::into_raw(state) as *mut ModuleContext,
        on_load: shims::on_load,
        on_unload: shims::on_unload,
        drop_state: shims::drop_state,
        get_layout_hash: shims::get_layout_hash,
    }
}
