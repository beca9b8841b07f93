// crates/tube_core/src/module_manager.rs

use std::ffi::OsStr;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use libloading::{Library, Symbol};

use tube_shared::{
    current_layout_hash, FFIResult, HostInterface, ModuleApi, CREATE_MODULE_SYMBOL,
};

use crate::error::ModuleError;
use crate::host::create_interface;
use crate::registry::CallbackRegistry;

/// Constructor exported by every module as `_create_module`.
pub type CreateModuleFn = extern "C" fn() -> ModuleApi;

/// Where a module comes from: a shared library on disk, or a constructor
/// linked into this binary.
#[derive(Debug, Clone)]
pub enum ModuleSource {
    Library(PathBuf),
    Linked(CreateModuleFn),
}

impl fmt::Display for ModuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleSource::Library(path) => write!(f, "{}", path.display()),
            ModuleSource::Linked(_) => f.write_str("<linked>"),
        }
    }
}

impl ModuleSource {
    fn open(&self) -> Result<ModuleHandle, ModuleError> {
        match self {
            // SAFETY: module libraries export `_create_module` with the `ModuleApi` signature.
            ModuleSource::Library(path) => unsafe { load_library(path) },
            ModuleSource::Linked(create) => verify(create(), None),
        }
    }
}

/// The copied library a module's code lives in.
pub struct LoadedLibrary {
    pub lib: Library,
    pub path: PathBuf,
}

impl LoadedLibrary {
    fn close(self) {
        let LoadedLibrary { lib, path } = self;
        drop(lib);
        if let Err(e) = fs::remove_file(&path) {
            tracing::debug!(path = %path.display(), "could not remove module copy: {e}");
        }
    }
}

pub struct ModuleHandle {
    pub api: ModuleApi,
    pub library: Option<LoadedLibrary>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleRuntimeState {
    Running,
    Faulted(String),
}

/// Owns the loaded module and the interface it registers through.
///
/// The registry only borrows the module's handlers, so every path that drops
/// module state clears the registry first.
pub struct ModuleManager {
    module: Option<ModuleHandle>,
    registry: Arc<CallbackRegistry>,
    // Boxed so the address handed to the module stays put.
    interface: Box<HostInterface>,
    runtime_state: ModuleRuntimeState,
    source: ModuleSource,
    last_reload: Option<Instant>,
    reload_debounce: Duration,
}

impl ModuleManager {
    pub fn load(
        path: impl AsRef<Path>,
        registry: Arc<CallbackRegistry>,
        reload_debounce: Duration,
    ) -> Result<Self, ModuleError> {
        let source = ModuleSource::Library(path.as_ref().to_path_buf());
        Self::from_source(source, registry, reload_debounce)
    }

    /// Attaches a module whose constructor is linked into this binary.
    /// Reloading re-runs the constructor.
    pub fn linked(
        create: CreateModuleFn,
        registry: Arc<CallbackRegistry>,
        reload_debounce: Duration,
    ) -> Result<Self, ModuleError> {
        Self::from_source(ModuleSource::Linked(create), registry, reload_debounce)
    }

    fn from_source(
        source: ModuleSource,
        registry: Arc<CallbackRegistry>,
        reload_debounce: Duration,
    ) -> Result<Self, ModuleError> {
        let interface = Box::new(create_interface(&registry));

        let mut manager = Self {
            module: None,
            registry,
            interface,
            runtime_state: ModuleRuntimeState::Running,
            source,
            last_reload: None,
            reload_debounce,
        };
        manager.attach()?;
        Ok(manager)
    }

    pub fn runtime_state(&self) -> &ModuleRuntimeState {
        &self.runtime_state
    }

    /// Opens the source and lets the module register its callbacks.
    fn attach(&mut self) -> Result<(), ModuleError> {
        let handle = self.source.open()?;

        let res = (handle.api.on_load)(handle.api.state, &*self.interface);
        if res != FFIResult::Success {
            // on_load may have registered before failing.
            self.registry.clear();
            release(handle);
            self.runtime_state = ModuleRuntimeState::Faulted(format!("on_load returned {res:?}"));
            return Err(ModuleError::LoadFailed(res));
        }

        tracing::info!(
            source = %self.source,
            bound = self.registry.snapshot().bound_slots().count(),
            "module loaded"
        );
        self.module = Some(handle);
        self.runtime_state = ModuleRuntimeState::Running;
        Ok(())
    }

    /// Detaches the module. Safe to call when nothing is loaded.
    pub fn unload(&mut self) {
        let Some(handle) = self.module.take() else {
            return;
        };

        let res = (handle.api.on_unload)(handle.api.state);
        if res != FFIResult::Success {
            tracing::warn!("module on_unload returned {res:?}");
        }
        // Whatever the module did, none of its handlers may outlive its state.
        self.registry.clear();
        release(handle);
        tracing::info!(source = %self.source, "module unloaded");
    }

    /// Reloads from the source, debounced. Returns `Ok(false)` when the
    /// request fell inside the debounce window.
    pub fn try_hot_reload(&mut self) -> Result<bool, ModuleError> {
        let now = Instant::now();
        if let Some(last) = self.last_reload {
            if now.duration_since(last) < self.reload_debounce {
                return Ok(false);
            }
        }
        self.last_reload = Some(now);

        tracing::info!("hot reload requested");
        self.unload();

        if let Err(e) = self.attach() {
            tracing::error!("failed to load new module: {e}");
            self.runtime_state = ModuleRuntimeState::Faulted(e.to_string());
            return Err(e);
        }
        Ok(true)
    }
}

impl Drop for ModuleManager {
    fn drop(&mut self) {
        self.unload();
    }
}

/// Drops module state, then the code it ran on.
fn release(handle: ModuleHandle) {
    let ModuleHandle { api, library } = handle;
    (api.drop_state)(api.state);
    if let Some(library) = library {
        library.close();
    }
}

/// Checks the handshake on a freshly constructed module. On failure the
/// module's state and library are released.
fn verify(api: ModuleApi, library: Option<LoadedLibrary>) -> Result<ModuleHandle, ModuleError> {
    let found = (api.get_layout_hash)();
    let expected = current_layout_hash();
    if found == expected && !api.state.is_null() {
        return Ok(ModuleHandle { api, library });
    }

    if !api.state.is_null() {
        (api.drop_state)(api.state);
    }
    if let Some(library) = library {
        library.close();
    }
    Err(if found != expected {
        ModuleError::LayoutMismatch { expected, found }
    } else {
        ModuleError::NullState
    })
}

/// # Safety
/// The library at `path` must export `_create_module` with the `ModuleApi` signature.
unsafe fn load_library(path: &Path) -> Result<ModuleHandle, ModuleError> {
    if !path.exists() {
        return Err(ModuleError::NotFound(path.to_path_buf()));
    }

    // Load a copy so the original can be rebuilt while we run.
    let copy_path = unique_copy_path(path);
    fs::copy(path, &copy_path)?;

    let lib = match Library::new(&copy_path) {
        Ok(lib) => lib,
        Err(e) => {
            let _ = fs::remove_file(&copy_path);
            return Err(e.into());
        }
    };

    let create_fn = lib
        .get::<CreateModuleFn>(CREATE_MODULE_SYMBOL)
        .map(|sym: Symbol<CreateModuleFn>| *sym);
    let library = LoadedLibrary {
        lib,
        path: copy_path,
    };
    match create_fn {
        Ok(create_fn) => verify(create_fn(), Some(library)),
        Err(e) => {
            library.close();
            Err(e.into())
        }
    }
}

fn unique_copy_path(original: &Path) -> PathBuf {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let stem = original
        .file_stem()
        .and_then(OsStr::to_str)
        .unwrap_or("module");
    match original.extension().and_then(OsStr::to_str) {
        Some(ext) => original.with_file_name(format!("{stem}_loaded_{ts}.{ext}")),
        None => original.with_file_name(format!("{stem}_loaded_{ts}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use tube_shared::{ButtonCallbacks, CallbackSlot, ModuleContext, RawCallback};

    // An in-process module that records its lifecycle. Its on_unload leaves
    // the registry alone, so any clearing seen here is the manager's doing.
    thread_local! {
        static EVENTS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
        static NEXT_ID: Cell<u32> = const { Cell::new(1) };
        static FAIL_NEXT_LOAD: Cell<bool> = const { Cell::new(false) };
        static BAD_HASH: Cell<bool> = const { Cell::new(false) };
    }

    struct FakeModule {
        id: u32,
        host: Cell<*const HostInterface>,
    }

    fn record(event: String) {
        EVENTS.with(|e| e.borrow_mut().push(event));
    }

    fn events() -> Vec<String> {
        EVENTS.with(|e| e.borrow_mut().drain(..).collect())
    }

    fn fake(ctx: *mut ModuleContext) -> &'static FakeModule {
        unsafe { &*(ctx as *const FakeModule) }
    }

    extern "C" fn fake_handler(ctx: *mut ModuleContext) {
        record(format!("call {}", fake(ctx).id));
    }

    extern "C" fn fake_on_load(ctx: *mut ModuleContext, iface: *const HostInterface) -> FFIResult {
        let module = fake(ctx);
        module.host.set(iface);
        let host = unsafe { &*iface };
        let cb = RawCallback::new(ctx, fake_handler);
        let table = ButtonCallbacks {
            restart: cb,
            step: cb,
            play: cb,
            end: cb,
            play_step: cb,
        };
        (host.set_callbacks)(host.ctx, &table);
        record(format!("load {}", module.id));
        if FAIL_NEXT_LOAD.with(|f| f.replace(false)) {
            FFIResult::Error
        } else {
            FFIResult::Success
        }
    }

    extern "C" fn fake_on_unload(ctx: *mut ModuleContext) -> FFIResult {
        record(format!("unload {}", fake(ctx).id));
        FFIResult::Success
    }

    extern "C" fn fake_drop_state(ctx: *mut ModuleContext) {
        let module = unsafe { Box::from_raw(ctx as *mut FakeModule) };
        let bound = match unsafe { module.host.get().as_ref() } {
            // A still-bound handler would run here and log a `call`.
            Some(host) => (host.invoke)(host.ctx, CallbackSlot::Step.id()),
            None => false,
        };
        record(format!("drop {} bound={bound}", module.id));
    }

    extern "C" fn fake_layout_hash() -> u64 {
        if BAD_HASH.with(Cell::get) {
            0xdead_beef
        } else {
            current_layout_hash()
        }
    }

    extern "C" fn fake_create() -> ModuleApi {
        let id = NEXT_ID.with(|n| n.replace(n.get() + 1));
        let state = Box::new(FakeModule {
            id,
            host: Cell::new(std::ptr::null()),
        });
        ModuleApi {
            state: Box::into_raw(state) as *mut ModuleContext,
            on_load: fake_on_load,
            on_unload: fake_on_unload,
            drop_state: fake_drop_state,
            get_layout_hash: fake_layout_hash,
        }
    }

    fn all_bound(registry: &CallbackRegistry) -> bool {
        CallbackSlot::ALL.iter().all(|s| registry.is_bound(*s))
    }

    fn none_bound(registry: &CallbackRegistry) -> bool {
        CallbackSlot::ALL.iter().all(|s| !registry.is_bound(*s))
    }

    #[test]
    fn copy_path_sits_next_to_original() {
        let copy = unique_copy_path(Path::new("/tmp/mods/libtube_module.so"));
        assert_eq!(copy.parent(), Some(Path::new("/tmp/mods")));
        let name = copy.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("libtube_module_loaded_"));
        assert!(name.ends_with(".so"));
    }

    #[test]
    fn missing_module_is_reported_and_registry_untouched() {
        let registry = Arc::new(CallbackRegistry::new());
        registry.set_callbacks(Some(Arc::new(|| {})), None, None, None, None);

        let err = ModuleManager::load(
            "/definitely/not/here/libtube_module.so",
            Arc::clone(&registry),
            Duration::from_millis(500),
        )
        .err()
        .expect("load must fail");

        assert!(matches!(err, ModuleError::NotFound(_)));
        assert!(registry.is_bound(CallbackSlot::Restart));
    }

    #[test]
    fn unload_clears_registry_before_dropping_state() {
        let registry = Arc::new(CallbackRegistry::new());
        let mut manager =
            ModuleManager::linked(fake_create, Arc::clone(&registry), Duration::ZERO).unwrap();
        assert!(all_bound(&registry));
        assert_eq!(manager.runtime_state(), &ModuleRuntimeState::Running);

        registry.invoke(CallbackSlot::Step);
        manager.unload();

        assert!(none_bound(&registry));
        assert_eq!(events(), vec!["load 1", "call 1", "unload 1", "drop 1 bound=false"]);

        // Nothing left to unload; dropping the manager is quiet.
        manager.unload();
        drop(manager);
        assert!(events().is_empty());
    }

    #[test]
    fn hot_reload_replaces_every_binding() {
        let registry = Arc::new(CallbackRegistry::new());
        let mut manager =
            ModuleManager::linked(fake_create, Arc::clone(&registry), Duration::ZERO).unwrap();
        let before = registry.snapshot().generation();

        assert!(manager.try_hot_reload().unwrap());

        assert!(registry.snapshot().generation() > before);
        assert!(all_bound(&registry));
        for slot in CallbackSlot::ALL {
            registry.invoke(slot);
        }
        assert_eq!(
            events(),
            vec![
                "load 1",
                "unload 1",
                "drop 1 bound=false",
                "load 2",
                "call 2",
                "call 2",
                "call 2",
                "call 2",
                "call 2",
            ]
        );
        assert_eq!(manager.runtime_state(), &ModuleRuntimeState::Running);
    }

    #[test]
    fn reload_inside_debounce_window_is_skipped() {
        let registry = Arc::new(CallbackRegistry::new());
        let mut manager = ModuleManager::linked(
            fake_create,
            Arc::clone(&registry),
            Duration::from_secs(3600),
        )
        .unwrap();

        assert!(manager.try_hot_reload().unwrap());
        assert!(!manager.try_hot_reload().unwrap());
        registry.invoke(CallbackSlot::Play);
        assert_eq!(events().last().map(String::as_str), Some("call 2"));
    }

    #[test]
    fn failed_on_load_clears_registry_and_faults() {
        let registry = Arc::new(CallbackRegistry::new());
        let mut manager =
            ModuleManager::linked(fake_create, Arc::clone(&registry), Duration::ZERO).unwrap();
        events();

        FAIL_NEXT_LOAD.with(|f| f.set(true));
        let err = manager.try_hot_reload().err().expect("reload must fail");

        assert!(matches!(err, ModuleError::LoadFailed(FFIResult::Error)));
        assert!(none_bound(&registry));
        assert!(matches!(manager.runtime_state(), ModuleRuntimeState::Faulted(_)));
        // The failed module registered, then was cleared before its state went.
        assert_eq!(
            events(),
            vec!["unload 1", "drop 1 bound=false", "load 2", "drop 2 bound=false"]
        );

        // The next reload recovers.
        assert!(manager.try_hot_reload().unwrap());
        assert!(all_bound(&registry));
        assert_eq!(manager.runtime_state(), &ModuleRuntimeState::Running);
    }

    #[test]
    fn failed_first_load_leaves_nothing_bound() {
        let registry = Arc::new(CallbackRegistry::new());
        FAIL_NEXT_LOAD.with(|f| f.set(true));

        let err = ModuleManager::linked(fake_create, Arc::clone(&registry), Duration::ZERO)
            .err()
            .expect("load must fail");

        assert!(matches!(err, ModuleError::LoadFailed(FFIResult::Error)));
        assert!(none_bound(&registry));
        assert_eq!(events(), vec!["load 1", "drop 1 bound=false"]);
    }

    #[test]
    fn layout_mismatch_drops_state_without_loading() {
        let registry = Arc::new(CallbackRegistry::new());
        BAD_HASH.with(|b| b.set(true));

        let err = ModuleManager::linked(fake_create, Arc::clone(&registry), Duration::ZERO)
            .err()
            .expect("load must fail");

        assert!(matches!(err, ModuleError::LayoutMismatch { found: 0xdead_beef, .. }));
        assert!(none_bound(&registry));
        assert_eq!(events(), vec!["drop 1 bound=false"]);
    }
}
