//! The embedded Rhai engine shared by every plugin.
//!
//! Rhai evaluation is not reentrant across threads here: the engine, its
//! module resolvers and the imported host module all sit behind one lock,
//! and every call into the engine holds it from argument construction until
//! the result has been converted. Nothing reached while the lock is held
//! calls back into [`ScriptEngine`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, MutexGuard};
use rhai::module_resolvers::{FileModuleResolver, ModuleResolversCollection};
use rhai::{AST, Dynamic, Engine, Scope};
use tracing::{debug, error, info, warn};

use super::api;
use super::api::host::PluginModules;
use crate::config::Platform;
use crate::error::ScriptError;

/// Module imported on init; defines the reload entry point
pub const HOST_MODULE: &str = "plugin_host";
/// Entry point called with a plugin's qualified name
pub const RELOAD_ENTRY: &str = "reload_plugin";
/// File extension of plugin scripts, without the dot
pub const PLUGIN_EXTENSION: &str = "rhai";

const BUILTIN_HOST: &str = include_str!("plugin_host.rhai");

struct Inner {
    engine: Engine,
    search_paths: Vec<PathBuf>,
    host: Option<AST>,
    initialized: bool,
}

/// The single serialized gateway to the script engine
pub struct ScriptEngine {
    inner: Mutex<Inner>,
    available: AtomicBool,
    // Read by `plume::plugin_module_path` while `inner` is held
    modules: PluginModules,
}

impl ScriptEngine {
    /// Create an engine with the `plume` namespace registered. No host
    /// module is imported until [`ScriptEngine::init`].
    pub fn new(platform: &Platform) -> Self {
        let modules = PluginModules::default();
        Self {
            inner: Mutex::new(Inner {
                engine: Self::create_engine(platform, &modules),
                search_paths: Vec::new(),
                host: None,
                initialized: false,
            }),
            available: AtomicBool::new(false),
            modules,
        }
    }

    fn create_engine(platform: &Platform, modules: &PluginModules) -> Engine {
        let mut engine = Engine::new();

        // Safety limits
        engine.set_max_expr_depths(64, 64);
        engine.set_max_operations(1_000_000);

        engine.register_static_module("plume", api::host::create_module(platform, modules).into());

        engine.on_print(|msg| info!(target: "plume::script", "{}", msg));
        engine.on_debug(|msg, source, pos| {
            debug!(target: "plume::script", source = source.unwrap_or(""), %pos, "{}", msg)
        });

        engine
    }

    /// Hold the engine for one complete call
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock()
    }

    /// Expose a native module to scripts as `name::*`. Must happen before
    /// the plugins that use it are loaded.
    pub fn register_static_module(&self, name: &str, module: rhai::Module) {
        let mut inner = self.lock();
        inner.engine.register_static_module(name, module.into());
    }

    /// Add a directory to module resolution. Later paths are searched after
    /// earlier ones.
    pub fn add_search_path(&self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        let mut inner = self.lock();
        if inner.search_paths.contains(&dir) {
            return;
        }
        debug!(path = %dir.display(), "adding script search path");
        inner.search_paths.push(dir);

        let resolver = Self::resolver(&inner.search_paths);
        inner.engine.set_module_resolver(resolver);
    }

    fn resolver(paths: &[PathBuf]) -> ModuleResolversCollection {
        let mut collection = ModuleResolversCollection::new();
        for path in paths {
            let mut file = FileModuleResolver::new_with_path(path);
            file.set_extension(PLUGIN_EXTENSION);
            // Reloads must see the file as it is now
            file.enable_cache(false);
            collection.push(file);
        }
        collection
    }

    pub fn search_paths(&self) -> Vec<PathBuf> {
        self.lock().search_paths.clone()
    }

    /// Tie a qualified plugin name to its file, relative to a search path.
    /// The host module reloads registered names from exactly that file.
    pub fn register_plugin(&self, qualified: &str, module: &str) {
        self.modules
            .write()
            .insert(qualified.to_string(), module.to_string());
    }

    /// Import the host module. Runs once; a failure is logged and leaves the
    /// engine unavailable, which turns every later plugin load into a no-op.
    pub fn init(&self) {
        let mut inner = self.lock();
        if inner.initialized {
            warn!("script engine already initialized");
            return;
        }
        inner.initialized = true;

        let (origin, source) = match Self::find_host(&inner.search_paths) {
            Some(path) => match std::fs::read_to_string(&path) {
                Ok(source) => (path.display().to_string(), source),
                Err(e) => {
                    error!(path = %path.display(), "error importing {HOST_MODULE}: {e}");
                    return;
                }
            },
            None => ("<builtin>".to_string(), BUILTIN_HOST.to_string()),
        };

        match Self::compile_host(&inner.engine, &origin, &source) {
            Ok(ast) => {
                info!(origin = %origin, "imported {HOST_MODULE}");
                inner.host = Some(ast);
                self.available.store(true, Ordering::Release);
            }
            Err(e) => error!("error importing {HOST_MODULE}: {e}"),
        }
    }

    fn compile_host(engine: &Engine, origin: &str, source: &str) -> Result<AST, ScriptError> {
        engine.compile(source).map_err(|e| ScriptError::Compile {
            module: origin.to_string(),
            message: e.to_string(),
        })
    }

    fn find_host(paths: &[PathBuf]) -> Option<PathBuf> {
        paths
            .iter()
            .map(|dir| dir.join(HOST_MODULE).with_extension(PLUGIN_EXTENSION))
            .find(|path| path.is_file())
    }

    /// Whether a host module is loaded
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    /// Drop the host module. Later calls fail with [`ScriptError::Unavailable`].
    pub fn shutdown(&self) {
        let mut inner = self.lock();
        inner.host = None;
        self.available.store(false, Ordering::Release);
    }

    /// Call `entry` in the host module with one string argument.
    ///
    /// A unit result is `None`. The returned value is detached from the
    /// engine and safe to use after the lock is released.
    pub fn call(&self, entry: &str, arg: &str) -> Result<Option<Dynamic>, ScriptError> {
        let inner = self.lock();
        let host = inner.host.as_ref().ok_or(ScriptError::Unavailable)?;

        let mut scope = Scope::new();
        let result = inner
            .engine
            .call_fn::<Dynamic>(&mut scope, host, entry, (arg.to_string(),))
            .map_err(|e| ScriptError::Call {
                entry: entry.to_string(),
                arg: arg.to_string(),
                message: e.to_string(),
            })?;

        Ok(if result.is_unit() { None } else { Some(result) })
    }

    /// Re-run the plugin with the given qualified name
    pub fn reload_plugin(&self, qualified: &str) -> Result<Option<Dynamic>, ScriptError> {
        self.call(RELOAD_ENTRY, qualified)
    }
}
