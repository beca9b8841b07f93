// crates/tube_core/src/error.rs
use std::path::PathBuf;

use tube_shared::FFIResult;

#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    #[error("Module file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to load module library: {0}")]
    Library(#[from] libloading::Error),

    #[error("Module layout mismatch: host expects {expected:#018x}, module reports {found:#018x}")]
    LayoutMismatch { expected: u64, found: u64 },

    #[error("Module returned null state from its constructor")]
    NullState,

    #[error("Module on_load returned {0:?}")]
    LoadFailed(FFIResult),

    #[error("Failed to watch module file: {0}")]
    Watch(#[from] notify::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Empty command")]
    Empty,

    #[error("Missing argument for `{0}`")]
    MissingArgument(&'static str),

    #[error("Invalid duration `{0}`, expected milliseconds")]
    InvalidDuration(String),

    #[error("Unexpected argument `{0}`")]
    UnexpectedArgument(String),
}
