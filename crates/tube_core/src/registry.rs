// crates/tube_core/src/registry.rs
//! The callback registry: five fixed slots plus a shared paused flag.
//!
//! Invocation semantics:
//! - `invoke` on an unbound slot is a no-op and reports `Invocation::Unbound`.
//! - A bound handler runs synchronously on the caller's thread; `invoke`
//!   returns once it has finished.
//! - The handler record is swapped as one immutable `Arc`, so an `invoke`
//!   racing a `set_callbacks` sees either the old five or the new five.
//! - No lock is held while a handler runs, so handlers may call back into
//!   the registry (flip the flag, invoke another slot, re-register).

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tube_shared::{CallbackSlot, SLOT_COUNT};

/// Single-method capability the registry dispatches to.
pub trait Callback: Send + Sync {
    fn call(&self);
}

impl<F> Callback for F
where
    F: Fn() + Send + Sync,
{
    fn call(&self) {
        self()
    }
}

pub type Handler = Arc<dyn Callback>;

/// Immutable record of the five bindings.
#[derive(Clone, Default)]
pub struct CallbackSet {
    handlers: [Option<Handler>; SLOT_COUNT],
    generation: u64,
}

impl CallbackSet {
    pub fn new(
        restart: Option<Handler>,
        step: Option<Handler>,
        play: Option<Handler>,
        end: Option<Handler>,
        play_step: Option<Handler>,
    ) -> Self {
        Self {
            handlers: [restart, step, play, end, play_step],
            generation: 0,
        }
    }

    pub fn get(&self, slot: CallbackSlot) -> Option<&Handler> {
        self.handlers[slot.index()].as_ref()
    }

    pub fn is_bound(&self, slot: CallbackSlot) -> bool {
        self.handlers[slot.index()].is_some()
    }

    pub fn bound_slots(&self) -> impl Iterator<Item = CallbackSlot> + '_ {
        CallbackSlot::ALL.into_iter().filter(|s| self.is_bound(*s))
    }

    /// Number of registrations the registry had seen when this set was installed.
    /// Zero for the initial empty set.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Debug for CallbackSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackSet")
            .field("generation", &self.generation)
            .field(
                "bound",
                &self.bound_slots().map(CallbackSlot::name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    Dispatched,
    Unbound,
}

pub struct CallbackRegistry {
    handlers: RwLock<Arc<CallbackSet>>,
    paused: AtomicBool,
}

impl CallbackRegistry {
    /// All slots unbound, paused.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Arc::new(CallbackSet::default())),
            paused: AtomicBool::new(true),
        }
    }

    /// Replaces all five bindings at once. `None` leaves that slot inert.
    /// Does not touch the paused flag.
    pub fn set_callbacks(
        &self,
        restart: Option<Handler>,
        step: Option<Handler>,
        play: Option<Handler>,
        end: Option<Handler>,
        play_step: Option<Handler>,
    ) {
        self.install(CallbackSet::new(restart, step, play, end, play_step));
    }

    /// Swaps in a whole record. The previous record is dropped after the
    /// lock is released, since dropping handlers may run arbitrary code.
    pub fn install(&self, mut set: CallbackSet) {
        let mut guard = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        set.generation = guard.generation + 1;
        let set = Arc::new(set);
        let previous = std::mem::replace(&mut *guard, Arc::clone(&set));
        drop(guard);

        tracing::debug!(
            generation = set.generation,
            bound = set.bound_slots().count(),
            "callbacks registered"
        );
        drop(previous);
    }

    /// Unbinds every slot.
    pub fn clear(&self) {
        self.install(CallbackSet::default());
    }

    /// The record currently installed.
    pub fn snapshot(&self) -> Arc<CallbackSet> {
        let guard = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    pub fn is_bound(&self, slot: CallbackSlot) -> bool {
        self.snapshot().is_bound(slot)
    }

    pub fn invoke(&self, slot: CallbackSlot) -> Invocation {
        let set = self.snapshot();
        match set.get(slot) {
            Some(handler) => {
                tracing::trace!(%slot, generation = set.generation, "dispatching");
                handler.call();
                Invocation::Dispatched
            }
            None => {
                tracing::trace!(%slot, "slot unbound, ignoring");
                Invocation::Unbound
            }
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    /// Flips the flag and returns the new value.
    pub fn toggle_paused(&self) -> bool {
        !self.paused.fetch_xor(true, Ordering::AcqRel)
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("handlers", &self.snapshot())
            .field("paused", &self.is_paused())
            .finish()
    }
}
