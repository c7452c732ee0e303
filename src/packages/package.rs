//! A package is a directory of settings, key maps and plugins.
//!
//! Loading splices the package's layers into the global chains below the
//! editor root and above every package loaded before it:
//!
//! ```text
//! settings:     editor -> own -> platform -> default -> (earlier packages) -> core
//! key bindings: editor -> own -> default -> (earlier packages) -> core
//! ```
//!
//! The own settings layer holds the user's `Preferences.sublime-settings`,
//! the own key-binding layer the platform key map.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::registry::{Handler, is_plugin};
use super::Plugin;
use crate::config::{Chain, Layer, Platform, absolute, load_json};
use crate::editor::Context;
use crate::error::LoadError;

pub const KEYMAP_FILE: &str = "Default.sublime-keymap";
pub const SETTINGS_FILE: &str = "Preferences.sublime-settings";

pub fn platform_keymap_file(platform: &Platform) -> String {
    format!("Default ({platform}).sublime-keymap")
}

pub fn platform_settings_file(platform: &Platform) -> String {
    format!("Preferences ({platform}).sublime-settings")
}

pub struct Package {
    dir: PathBuf,
    name: String,

    settings: Arc<Layer>,
    platform_settings: Arc<Layer>,
    default_settings: Arc<Layer>,
    key_bindings: Arc<Layer>,
    default_key_bindings: Arc<Layer>,

    // Set by the splice, once
    settings_chain: OnceLock<Chain>,
    key_bindings_chain: OnceLock<Chain>,

    plugins: Mutex<IndexMap<PathBuf, Arc<Plugin>>>,
    loaded: AtomicBool,
    ctx: Arc<Context>,
}

impl Package {
    pub fn new(dir: &Path, ctx: &Arc<Context>) -> Self {
        let dir = absolute(dir);
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let layer = |kind: &str| Arc::new(Layer::new(format!("{name}/{kind}")));

        Self {
            settings: layer("settings"),
            platform_settings: layer("platform settings"),
            default_settings: layer("default settings"),
            key_bindings: layer("key bindings"),
            default_key_bindings: layer("default key bindings"),
            name,
            dir,
            settings_chain: OnceLock::new(),
            key_bindings_chain: OnceLock::new(),
            plugins: Mutex::new(IndexMap::new()),
            loaded: AtomicBool::new(false),
            ctx: Arc::clone(ctx),
        }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Settings as seen from this package: own, platform, default, then
    /// whatever was loaded before it. Before loading only the package's own
    /// three layers are linked.
    pub fn settings(&self) -> Chain {
        self.settings_chain.get().cloned().unwrap_or_else(|| {
            Chain::with_parent(
                Arc::clone(&self.settings),
                Some(Chain::with_parent(
                    Arc::clone(&self.platform_settings),
                    Some(Chain::new(Arc::clone(&self.default_settings))),
                )),
            )
        })
    }

    pub fn key_bindings(&self) -> Chain {
        self.key_bindings_chain.get().cloned().unwrap_or_else(|| {
            Chain::with_parent(
                Arc::clone(&self.key_bindings),
                Some(Chain::new(Arc::clone(&self.default_key_bindings))),
            )
        })
    }

    pub fn default_settings(&self) -> &Arc<Layer> {
        &self.default_settings
    }

    pub fn platform_settings(&self) -> &Arc<Layer> {
        &self.platform_settings
    }

    pub fn default_key_bindings(&self) -> &Arc<Layer> {
        &self.default_key_bindings
    }

    /// Splice key bindings and settings, then discover plugins. Runs once;
    /// a package is never re-loaded.
    pub fn load(&self) {
        if self.loaded.swap(true, Ordering::AcqRel) {
            warn!(package = %self.name, "package already loaded");
            return;
        }

        debug!(package = %self.name, "loading package");
        self.load_key_bindings();
        self.load_settings();
        self.load_plugins();
    }

    fn load_file(&self, path: &Path, layer: &Layer) {
        trace!(path = %path.display(), "loading");
        if let Err(e) = load_json(path, layer) {
            warn!(package = %self.name, "{e}");
        }
    }

    // Files are read before the splice so the new chain is published with
    // its values already in place.
    fn load_key_bindings(&self) {
        trace!(package = %self.name, "loading key bindings");
        let platform = &self.ctx.config.platform;

        self.load_file(&self.dir.join(KEYMAP_FILE), &self.default_key_bindings);
        self.load_file(
            &self.dir.join(platform_keymap_file(platform)),
            &self.key_bindings,
        );

        let layers = [
            Arc::clone(&self.key_bindings),
            Arc::clone(&self.default_key_bindings),
        ];
        if let Some(chain) = self.ctx.key_bindings.splice(&layers) {
            let first = self.key_bindings_chain.set(chain);
            debug_assert!(first.is_ok(), "key bindings spliced twice");
        }
    }

    fn load_settings(&self) {
        trace!(package = %self.name, "loading settings");
        let config = &self.ctx.config;

        self.load_file(&self.dir.join(SETTINGS_FILE), &self.default_settings);
        self.load_file(
            &self.dir.join(platform_settings_file(&config.platform)),
            &self.platform_settings,
        );
        self.load_file(
            &config.packages_path_for("user").join(SETTINGS_FILE),
            &self.settings,
        );

        let layers = [
            Arc::clone(&self.settings),
            Arc::clone(&self.platform_settings),
            Arc::clone(&self.default_settings),
        ];
        if let Some(chain) = self.ctx.settings.splice(&layers) {
            let first = self.settings_chain.set(chain);
            debug_assert!(first.is_ok(), "settings spliced twice");
        }
    }

    fn load_plugins(&self) {
        trace!(package = %self.name, "loading plugins");
        let entries = match self.plugin_entries() {
            Ok(entries) => entries,
            Err(e) => {
                warn!(package = %self.name, "{e}");
                return;
            }
        };

        for path in entries {
            self.load_plugin(&path);
        }
    }

    /// Direct children named like plugins, sorted for a stable load order
    fn plugin_entries(&self) -> Result<Vec<PathBuf>, LoadError> {
        let read_dir = fs::read_dir(&self.dir).map_err(|source| LoadError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut entries: Vec<PathBuf> = read_dir
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| is_plugin(p))
            .collect();
        entries.sort();
        Ok(entries)
    }

    /// Construct and load the plugin at `path` unless this package already
    /// has one for it. Returns the new plugin.
    pub fn load_plugin(&self, path: &Path) -> Option<Arc<Plugin>> {
        let path = absolute(path);
        let plugin = {
            let mut plugins = self.plugins.lock();
            if plugins.contains_key(&path) {
                return None;
            }

            let plugin = match self.ctx.registry.resolve(&path, &self.ctx) {
                Some(Handler::Plugin(plugin)) => plugin,
                Some(other) => {
                    debug!(package = %self.name, "skipping {other:?}");
                    return None;
                }
                None => return None,
            };
            plugins.insert(path, Arc::clone(&plugin));
            plugin
        };

        // The map lock is not held across the engine call
        plugin.load();
        Some(plugin)
    }

    pub fn plugin(&self, path: &Path) -> Option<Arc<Plugin>> {
        self.plugins.lock().get(&absolute(path)).cloned()
    }

    /// Plugins in discovery order
    pub fn plugins(&self) -> Vec<Arc<Plugin>> {
        self.plugins.lock().values().cloned().collect()
    }

    /// Reload the plugin at `path`, if this package owns one
    pub fn file_changed(&self, path: &Path) {
        match self.plugin(path) {
            Some(plugin) => plugin.file_changed(path),
            None => debug!(package = %self.name, path = %path.display(), "no plugin for change"),
        }
    }
}

impl std::fmt::Debug for Package {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Package")
            .field("dir", &self.dir)
            .field("loaded", &self.is_loaded())
            .field("plugins", &self.plugins.lock().len())
            .finish()
    }
}
