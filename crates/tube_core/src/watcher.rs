// crates/tube_core/src/watcher.rs
use std::path::{Path, PathBuf};

use crossbeam_channel::{unbounded, Receiver};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::ModuleError;

/// Watches the module's directory and reports when the module file itself changes.
pub struct ModuleWatcher {
    _watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
    file_name: Option<PathBuf>,
}

impl ModuleWatcher {
    pub fn new(module_path: &Path) -> Result<Self, ModuleError> {
        let (tx, rx) = unbounded();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        })?;

        // Watch the directory: linkers usually replace the file rather than rewrite it.
        let dir = match module_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        Ok(Self {
            _watcher: watcher,
            rx,
            file_name: module_path.file_name().map(PathBuf::from),
        })
    }

    /// Drains pending events; true if any touched the module file.
    pub fn changed(&self) -> bool {
        let mut changed = false;
        for res in self.rx.try_iter() {
            match res {
                Ok(event) => changed |= self.is_module_event(&event),
                Err(e) => tracing::warn!("module watcher error: {e}"),
            }
        }
        changed
    }

    fn is_module_event(&self, event: &Event) -> bool {
        if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
            return false;
        }
        let Some(name) = &self.file_name else {
            return false;
        };
        event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(name.as_os_str()))
    }
}
