use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::Context;
use crate::config::{ChainRoot, HostConfig, absolute};
use crate::input::KeySequence;
use crate::packages::{Handler, Package, Registry};

/// Owns the shared context and every package discovered so far
pub struct Editor {
    ctx: Arc<Context>,
    packages: RwLock<IndexMap<PathBuf, Arc<Package>>>,
}

impl Editor {
    pub fn new(config: HostConfig) -> Self {
        Self::with_registry(config, Registry::with_defaults())
    }

    pub fn with_registry(mut config: HostConfig, registry: Registry) -> Self {
        // Plugins and packages are keyed by absolute path
        config.packages_path = absolute(&config.packages_path);
        config.user_path = absolute(&config.user_path);

        Self {
            ctx: Arc::new(Context::with_registry(config, registry)),
            packages: RwLock::new(IndexMap::new()),
        }
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    pub fn config(&self) -> &HostConfig {
        &self.ctx.config
    }

    pub fn settings(&self) -> &ChainRoot {
        &self.ctx.settings
    }

    pub fn key_bindings(&self) -> &ChainRoot {
        &self.ctx.key_bindings
    }

    /// Resolve a setting through every loaded layer
    pub fn setting(&self, key: &str) -> Option<Value> {
        self.ctx.settings.get(key)
    }

    /// Resolve a key sequence to its binding object
    pub fn binding(&self, keys: &KeySequence) -> Option<Value> {
        self.ctx.key_bindings.get(&keys.to_string())
    }

    /// Import the script host module. Failures leave plugins unloadable.
    pub fn init(&self) {
        self.ctx.scripts.init();
    }

    /// Make a packages directory visible to script module resolution
    pub fn add_packages_path(&self, path: &Path) {
        self.ctx.scripts.add_search_path(absolute(path));
    }

    /// Discover and load every package under the packages root that is not
    /// loaded yet. Returns the packages loaded by this sweep.
    pub fn scan(&self) -> Vec<Arc<Package>> {
        let root = &self.ctx.config.packages_path;
        let read_dir = match fs::read_dir(root) {
            Ok(read_dir) => read_dir,
            Err(e) => {
                warn!(path = %root.display(), "error reading packages directory: {e}");
                return Vec::new();
            }
        };

        let mut entries: Vec<PathBuf> = read_dir
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| *p != self.ctx.config.user_path)
            .collect();
        entries.sort();

        let loaded: Vec<Arc<Package>> = entries
            .iter()
            .filter_map(|path| self.load_package(path))
            .collect();
        info!(count = loaded.len(), "loaded packages");
        loaded
    }

    /// Load the package at `dir` unless it is already known
    pub fn load_package(&self, dir: &Path) -> Option<Arc<Package>> {
        let dir = absolute(dir);
        let package = {
            let mut packages = self.packages.write();
            if packages.contains_key(&dir) {
                return None;
            }

            match self.ctx.registry.resolve(&dir, &self.ctx) {
                Some(Handler::Package(package)) => {
                    packages.insert(dir, Arc::clone(&package));
                    package
                }
                Some(other) => {
                    debug!("ignoring top-level {other:?}");
                    return None;
                }
                None => return None,
            }
        };

        package.load();
        Some(package)
    }

    pub fn package(&self, name: &str) -> Option<Arc<Package>> {
        self.packages
            .read()
            .values()
            .find(|p| p.name() == name)
            .cloned()
    }

    /// Packages in load order
    pub fn packages(&self) -> Vec<Arc<Package>> {
        self.packages.read().values().cloned().collect()
    }

    /// Route a change notification to the plugin that owns `path`
    pub fn file_changed(&self, path: &Path) {
        let path = absolute(path);
        let owner = path
            .parent()
            .and_then(|dir| self.packages.read().get(dir).cloned());

        match owner {
            Some(package) => package.file_changed(&path),
            None => debug!(path = %path.display(), "change outside any package"),
        }
    }
}
