use std::env;
use std::io;
use std::path::PathBuf;

use anyhow::Context;
use tube_core::{global_registry, logging, App, PanelConfig};

#[cfg(target_os = "windows")]
const DEFAULT_MODULE: &str = "target/debug/tube_module.dll";
#[cfg(target_os = "macos")]
const DEFAULT_MODULE: &str = "target/debug/libtube_module.dylib";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const DEFAULT_MODULE: &str = "target/debug/libtube_module.so";

/// Usage: tube_panel [CONFIG.json] [MODULE_PATH]
fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    let config = match args.get(1) {
        Some(path) => PanelConfig::load(path)
            .with_context(|| format!("loading panel config from {path}"))?,
        None => PanelConfig::default(),
    };
    logging::init_logging(&config.log_level);

    let module_path = args
        .get(2)
        .map(PathBuf::from)
        .or_else(|| config.module_path.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MODULE));

    let mut app = App::new(config, global_registry());
    if module_path.exists() {
        app.load_module(&module_path)
            .with_context(|| format!("loading module {}", module_path.display()))?;
    } else {
        tracing::warn!(
            path = %module_path.display(),
            "module library not found, using the linked demo module"
        );
        app.load_linked_module(tube_module::_create_module)
            .context("loading linked module")?;
    }

    tracing::info!("panel ready: buttons restart_button, step_button, play_button, end_button; `wait <ms>`, `status`, `reload`, `quit`");
    let stdin = io::stdin();
    app.run(stdin.lock(), io::stdout().lock())
        .context("panel session failed")?;
    Ok(())
}
