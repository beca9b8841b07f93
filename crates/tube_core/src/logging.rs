// crates/tube_core/src/logging.rs
use tracing::Level;

/// Installs the fmt subscriber once. Later calls (tests, a second App) are ignored.
pub fn init_logging(level: &str) {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .try_init();
}
