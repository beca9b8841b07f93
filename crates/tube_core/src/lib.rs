// crates/tube_core/src/lib.rs

// Core
pub mod registry;
pub mod ffi;
pub mod host;

// Control surface
pub mod control;
pub mod playback;
pub mod app;

// Module lifecycle
pub mod module_manager;
pub mod watcher;

pub mod config;
pub mod error;
pub mod logging;

// Re-export App so the panel binary can find it easily
pub use app::{App, PanelCommand};
pub use config::PanelConfig;
pub use ffi::global_registry;
pub use registry::{Callback, CallbackRegistry, CallbackSet, Handler, Invocation};
pub use tube_shared::CallbackSlot;
