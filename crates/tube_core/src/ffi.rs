// crates/tube_core/src/ffi.rs
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use tube_shared::{ButtonCallbacks, CallbackSlot, ModuleContext, RawCallback};

use crate::registry::{Callback, CallbackRegistry, CallbackSet, Handler};

pub static GLOBAL_REGISTRY: OnceLock<Arc<CallbackRegistry>> = OnceLock::new();

/// The process-wide registry, created paused and empty on first use.
pub fn global_registry() -> Arc<CallbackRegistry> {
    Arc::clone(GLOBAL_REGISTRY.get_or_init(|| Arc::new(CallbackRegistry::new())))
}

/// A handler living on the module side of the boundary.
///
/// Non-owning: the module keeps `target` alive until it registers a table
/// without it, and the host clears the registry before dropping module state.
struct ForeignCallback {
    target: *mut ModuleContext,
    call: extern "C" fn(*mut ModuleContext),
}

// SAFETY: the module's trampolines are required to be callable from whichever
// host thread drives the control surface; `target` is only passed back to them.
unsafe impl Send for ForeignCallback {}
unsafe impl Sync for ForeignCallback {}

impl Callback for ForeignCallback {
    fn call(&self) {
        (self.call)(self.target)
    }
}

pub fn handler_from_raw(raw: RawCallback) -> Option<Handler> {
    raw.call.map(|call| {
        Arc::new(ForeignCallback {
            target: raw.target,
            call,
        }) as Handler
    })
}

/// Converts a module table into a registry record, slot by slot.
pub fn callback_set_from_table(table: &ButtonCallbacks) -> CallbackSet {
    let [restart, step, play, end, play_step] =
        CallbackSlot::ALL.map(|slot| handler_from_raw(table.get(slot)));
    CallbackSet::new(restart, step, play, end, play_step)
}

/// Runs `f`, turning a panic into `fallback` so it never unwinds into foreign frames.
pub fn catch_ffi_panic<T, F>(what: &str, fallback: T, f: F) -> T
where
    F: FnOnce() -> T,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            tracing::error!("panic caught at the module boundary in {what}");
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static HITS: AtomicUsize = AtomicUsize::new(0);

    extern "C" fn bump(target: *mut ModuleContext) {
        // Targets in this test point at a usize increment.
        let by = if target.is_null() { 1 } else { unsafe { *(target as *const usize) } };
        HITS.fetch_add(by, Ordering::SeqCst);
    }

    #[test]
    fn table_converts_slot_by_slot() {
        let mut ten = 10usize;
        let table = ButtonCallbacks {
            step: RawCallback::new(ptr::null_mut(), bump),
            end: RawCallback::new(&mut ten as *mut usize as *mut ModuleContext, bump),
            ..ButtonCallbacks::UNSET
        };

        let set = callback_set_from_table(&table);
        assert_eq!(
            set.bound_slots().collect::<Vec<_>>(),
            vec![CallbackSlot::Step, CallbackSlot::End]
        );

        let before = HITS.load(Ordering::SeqCst);
        set.get(CallbackSlot::Step).unwrap().call();
        set.get(CallbackSlot::End).unwrap().call();
        assert_eq!(HITS.load(Ordering::SeqCst) - before, 11);
    }

    #[test]
    fn global_registry_is_shared() {
        let a = global_registry();
        let b = global_registry();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn panics_become_the_fallback() {
        let value = catch_ffi_panic("test", 7, || -> i32 { panic!("boom") });
        assert_eq!(value, 7);
        assert_eq!(catch_ffi_panic("test", 7, || 3), 3);
    }
}
