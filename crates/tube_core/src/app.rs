// crates/tube_core/src/app.rs

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tube_shared::CallbackSlot;

use crate::config::PanelConfig;
use crate::control::ControlPanel;
use crate::error::{CommandError, ModuleError};
use crate::module_manager::{CreateModuleFn, ModuleManager, ModuleRuntimeState};
use crate::playback::PlaybackTicker;
use crate::registry::{CallbackRegistry, Invocation};
use crate::watcher::ModuleWatcher;

/// One line of the panel session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelCommand {
    /// A button id or slot name.
    Press(String),
    /// Advance the playback clock.
    Wait(Duration),
    Status,
    Reload,
    Quit,
}

impl PanelCommand {
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let mut parts = line.split_whitespace();
        let Some(head) = parts.next() else {
            return Err(CommandError::Empty);
        };
        let cmd = match head {
            "wait" => {
                let arg = parts.next().ok_or(CommandError::MissingArgument("wait"))?;
                let ms = arg
                    .parse::<u64>()
                    .map_err(|_| CommandError::InvalidDuration(arg.to_string()))?;
                PanelCommand::Wait(Duration::from_millis(ms))
            }
            "status" => PanelCommand::Status,
            "reload" => PanelCommand::Reload,
            "quit" | "exit" => PanelCommand::Quit,
            button => PanelCommand::Press(button.to_string()),
        };
        if let Some(extra) = parts.next() {
            return Err(CommandError::UnexpectedArgument(extra.to_string()));
        }
        Ok(cmd)
    }
}

pub struct App {
    config: PanelConfig,
    panel: ControlPanel,
    ticker: PlaybackTicker,
    modules: Option<ModuleManager>,
    watcher: Option<ModuleWatcher>,
}

impl App {
    /// An app with no module attached; handlers may be registered on `registry` directly.
    pub fn new(config: PanelConfig, registry: Arc<CallbackRegistry>) -> Self {
        let panel = ControlPanel::new(registry, config.buttons.clone());
        let ticker = PlaybackTicker::from_config(&config);
        Self {
            config,
            panel,
            ticker,
            modules: None,
            watcher: None,
        }
    }

    pub fn load_module(&mut self, path: impl AsRef<Path>) -> Result<(), ModuleError> {
        let path = path.as_ref();
        // Detach the old module before the new one registers.
        self.modules = None;
        self.watcher = None;

        let manager = ModuleManager::load(
            path,
            Arc::clone(self.panel.registry()),
            self.config.reload_debounce(),
        )?;

        if self.config.hot_reload {
            match ModuleWatcher::new(path) {
                Ok(w) => self.watcher = Some(w),
                Err(e) => tracing::warn!("hot reload disabled: {e}"),
            }
        }
        self.modules = Some(manager);
        Ok(())
    }

    /// Attaches a module linked into this binary. No file to watch, but
    /// `reload` still re-runs its constructor.
    pub fn load_linked_module(&mut self, create: CreateModuleFn) -> Result<(), ModuleError> {
        self.modules = None;
        self.watcher = None;
        let manager = ModuleManager::linked(
            create,
            Arc::clone(self.panel.registry()),
            self.config.reload_debounce(),
        )?;
        self.modules = Some(manager);
        Ok(())
    }

    pub fn registry(&self) -> &Arc<CallbackRegistry> {
        self.panel.registry()
    }

    /// Reads commands until `quit` or end of input.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut out: W) -> io::Result<()> {
        for line in input.lines() {
            let line = line?;
            if line.trim().is_empty() || line.trim_start().starts_with('#') {
                continue;
            }
            self.poll_reload();
            match PanelCommand::parse(&line) {
                Ok(cmd) => {
                    if !self.execute(cmd, &mut out)? {
                        break;
                    }
                }
                Err(e) => writeln!(out, "error: {e}")?,
            }
            out.flush()?;
        }
        Ok(())
    }

    /// Returns false once the session should end.
    pub fn execute<W: Write>(&mut self, cmd: PanelCommand, out: &mut W) -> io::Result<bool> {
        match cmd {
            PanelCommand::Press(button) => match self.panel.press(&button) {
                Some(Invocation::Dispatched) => {
                    writeln!(out, "{button} [{}]", self.panel.play_label())?
                }
                Some(Invocation::Unbound) => writeln!(out, "{button}: not registered")?,
                None => writeln!(out, "{button}: unknown button")?,
            },
            PanelCommand::Wait(duration) => {
                let fired = self.advance(duration);
                writeln!(out, "waited {}ms, {fired} play-step(s)", duration.as_millis())?;
            }
            PanelCommand::Status => self.write_status(out)?,
            PanelCommand::Reload => match self.modules.as_mut() {
                Some(modules) => match modules.try_hot_reload() {
                    Ok(true) => writeln!(out, "module reloaded")?,
                    Ok(false) => writeln!(out, "reload skipped (debounce)")?,
                    Err(e) => writeln!(out, "reload failed: {e}")?,
                },
                None => writeln!(out, "no module loaded")?,
            },
            PanelCommand::Quit => return Ok(false),
        }
        Ok(true)
    }

    /// Advances the playback clock one interval at a time. Stops early once
    /// nothing can fire: paused, or no PlayStep handler registered.
    pub fn advance(&mut self, duration: Duration) -> u32 {
        let interval = self.ticker.interval();
        let registry = Arc::clone(self.panel.registry());
        let mut remaining = duration;
        let mut fired = 0;
        while !remaining.is_zero() {
            if registry.is_paused() || !registry.is_bound(CallbackSlot::PlayStep) {
                break;
            }
            let slice = remaining.min(interval);
            fired += self.ticker.advance(slice, &registry);
            remaining -= slice;
        }
        fired
    }

    fn poll_reload(&mut self) {
        let changed = self.watcher.as_ref().is_some_and(ModuleWatcher::changed);
        if !changed {
            return;
        }
        if let Some(modules) = self.modules.as_mut() {
            if let Err(e) = modules.try_hot_reload() {
                tracing::error!("hot reload failed: {e}");
            }
        }
    }

    fn write_status<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let set = self.registry().snapshot();
        let bound: Vec<_> = set.bound_slots().map(|s| s.name()).collect();
        let module = match self.modules.as_ref().map(ModuleManager::runtime_state) {
            Some(ModuleRuntimeState::Running) => "running".to_string(),
            Some(ModuleRuntimeState::Faulted(reason)) => format!("faulted ({reason})"),
            None => "none".to_string(),
        };
        writeln!(
            out,
            "play_button=[{}] registration={} bound=[{}] module={}",
            self.panel.play_label(),
            set.generation(),
            bound.join(", "),
            module
        )
    }
}
