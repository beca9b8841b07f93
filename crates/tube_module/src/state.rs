// crates/tube_module/src/state.rs

use std::ffi::{c_char, CString};

use tube_shared::{ButtonCallbacks, HostInterface, RegistryContext};

use crate::machine::Machine;

/// The host functions the module keeps after `on_load`.
#[derive(Clone, Copy)]
pub struct HostBindings {
    ctx: *const RegistryContext,
    set_callbacks: extern "C" fn(*const RegistryContext, *const ButtonCallbacks),
    is_paused: extern "C" fn(*const RegistryContext) -> bool,
    set_paused: extern "C" fn(*const RegistryContext, bool),
    log: Option<extern "C" fn(*const c_char)>,
}

impl HostBindings {
    pub fn from_interface(host: &HostInterface) -> Self {
        Self {
            ctx: host.ctx,
            set_callbacks: host.set_callbacks,
            is_paused: host.is_paused,
            set_paused: host.set_paused,
            log: host.log,
        }
    }

    /// Registers an all-unset table so the host drops every handler into this module.
    pub fn clear_callbacks(&self) {
        (self.set_callbacks)(self.ctx, &ButtonCallbacks::UNSET);
    }
}

#[derive(Default)]
pub struct ModuleState {
    pub machine: Machine,
    pub host: Option<HostBindings>,
}

// SAFETY: the host pointers are only handed back to the host that issued them,
// and the host interface is callable from any thread.
unsafe impl Send for ModuleState {}

impl ModuleState {
    pub fn bind_host_resources(&mut self, host: &HostInterface) {
        self.host = Some(HostBindings::from_interface(host));
    }

    /// Without a host the machine counts as paused.
    pub fn is_paused(&self) -> bool {
        match self.host {
            Some(h) => (h.is_paused)(h.ctx),
            None => true,
        }
    }

    fn set_paused(&self, paused: bool) {
        if let Some(h) = self.host {
            (h.set_paused)(h.ctx, paused);
        }
    }

    pub fn do_restart(&mut self) {
        self.machine.restart();
        // Back at the beginning, so stop any run in progress.
        self.set_paused(true);
        self.report("restart");
    }

    pub fn do_step(&mut self) {
        self.machine.run_step();
        self.report("step");
    }

    pub fn do_play(&mut self) {
        let paused = !self.is_paused();
        self.set_paused(paused);
        if !paused {
            self.do_play_step();
        }
        // A finished machine re-pauses inside play-step; report what stuck.
        self.report(if self.is_paused() { "pause" } else { "play" });
    }

    pub fn do_end(&mut self) {
        self.machine.run();
        self.set_paused(true);
        self.report("end");
    }

    pub fn do_play_step(&mut self) {
        if self.machine.is_finished() {
            self.set_paused(true);
            return;
        }
        if !self.is_paused() {
            self.machine.run_step();
            self.report("play_step");
        }
    }

    fn report(&self, action: &str) {
        let Some(log) = self.host.and_then(|h| h.log) else {
            return;
        };
        let mut line = format!(
            "{action}: ip={}/{} cycles={} acc={}",
            self.machine.ip(),
            self.machine.program_len(),
            self.machine.exe_count(),
            self.machine.acc()
        );
        if let Some(last) = self.machine.messages().last() {
            line.push_str(&format!(" last=\"{last}\""));
        }
        if let Ok(msg) = CString::new(line) {
            log(msg.as_ptr());
        }
    }
}
