//! A plugin is a single script file directly inside a package directory.
//!
//! Loading registers the plugin's file with the script engine under its
//! qualified name, then hands that name to the engine's reload entry point. Every change event repeats the full reload; there is no
//! unload.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, warn};

use crate::editor::Context;
use crate::error::ScriptError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    /// Constructed, no reload has succeeded yet
    Unloaded,
    /// At least one reload succeeded
    Loaded,
}

pub struct Plugin {
    path: PathBuf,
    name: String,
    qualified: String,
    module: String,
    loads: AtomicUsize,
    ctx: Arc<Context>,
}

impl Plugin {
    pub fn new(path: &Path, ctx: &Arc<Context>) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            path: path.to_path_buf(),
            name,
            qualified: qualified_name(path),
            module: module_path(path),
            loads: AtomicUsize::new(0),
            ctx: Arc::clone(ctx),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The file name, extension included
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `<package>.<file stem>`, the name the engine reloads by
    pub fn qualified_name(&self) -> &str {
        &self.qualified
    }

    pub fn state(&self) -> PluginState {
        if self.load_count() > 0 {
            PluginState::Loaded
        } else {
            PluginState::Unloaded
        }
    }

    /// Number of successful reloads
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Acquire)
    }

    /// Ask the engine to reload this plugin. Does nothing while the engine is
    /// unavailable; failures are logged and leave the state as it was.
    pub fn load(&self) {
        let scripts = &self.ctx.scripts;
        if !scripts.is_available() {
            return;
        }

        debug!(plugin = %self.qualified, "loading plugin");
        scripts.register_plugin(&self.qualified, &self.module);
        match scripts.reload_plugin(&self.qualified) {
            Ok(_) => {
                self.loads.fetch_add(1, Ordering::AcqRel);
            }
            // Shut down between the check and the call
            Err(ScriptError::Unavailable) => {}
            Err(e) => warn!(plugin = %self.qualified, "{e}"),
        }
    }

    pub fn file_changed(&self, _path: &Path) {
        self.load();
    }
}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("path", &self.path)
            .field("qualified", &self.qualified)
            .field("state", &self.state())
            .finish()
    }
}

/// Parent directory name and file stem joined by a dot
pub fn qualified_name(path: &Path) -> String {
    let package = path
        .parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = path
        .file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{package}.{stem}")
}

/// Parent directory name and file name, the module the engine imports
fn module_path(path: &Path) -> String {
    let package = path
        .parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{package}/{file}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HostConfig;
    use std::fs;

    fn context(packages: &Path) -> Arc<Context> {
        let ctx = Arc::new(Context::new(HostConfig::new(packages, packages.join("User"))));
        ctx.scripts.add_search_path(packages);
        ctx
    }

    #[test]
    fn qualified_name_uses_directory_and_stem() {
        assert_eq!(
            qualified_name(Path::new("/pkgs/Vintage/motions.rhai")),
            "Vintage.motions"
        );
    }

    #[test]
    fn module_path_keeps_the_whole_file_name() {
        assert_eq!(
            module_path(Path::new("/pkgs/My.Pkg/foo.bar.rhai")),
            "My.Pkg/foo.bar.rhai"
        );
    }

    #[test]
    fn load_is_a_no_op_without_engine() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let plugin = Plugin::new(&dir.path().join("Pkg/main.rhai"), &ctx);

        plugin.load();
        assert_eq!(plugin.state(), PluginState::Unloaded);
    }

    #[test]
    fn successful_reload_marks_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = dir.path().join("Pkg");
        fs::create_dir(&pkg).unwrap();
        fs::write(pkg.join("main.rhai"), "plume::log(\"hello\");").unwrap();

        let ctx = context(dir.path());
        ctx.scripts.init();

        let plugin = Plugin::new(&pkg.join("main.rhai"), &ctx);
        assert_eq!(plugin.name(), "main.rhai");
        plugin.load();
        assert_eq!(plugin.state(), PluginState::Loaded);

        plugin.file_changed(plugin.path());
        assert_eq!(plugin.load_count(), 2);
    }

    #[test]
    fn failed_reload_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = dir.path().join("Pkg");
        fs::create_dir(&pkg).unwrap();
        fs::write(pkg.join("bad.rhai"), "let = ;").unwrap();

        let ctx = context(dir.path());
        ctx.scripts.init();

        let plugin = Plugin::new(&pkg.join("bad.rhai"), &ctx);
        plugin.load();
        assert_eq!(plugin.state(), PluginState::Unloaded);

        // Fixing the file and signalling a change reloads it
        fs::write(pkg.join("bad.rhai"), "let fixed = true;").unwrap();
        plugin.file_changed(plugin.path());
        assert_eq!(plugin.state(), PluginState::Loaded);
    }

    #[test]
    fn dotted_names_reload_their_own_file() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = dir.path().join("Pkg");
        fs::create_dir(&pkg).unwrap();
        fs::write(pkg.join("foo.bar.rhai"), "plume::log(\"dotted\");").unwrap();
        // Where `Pkg/foo.bar` lands once the resolver swaps its extension
        fs::write(pkg.join("foo.rhai"), "throw \"wrong file\";").unwrap();
        let dotted_pkg = dir.path().join("My.Pkg");
        fs::create_dir(&dotted_pkg).unwrap();
        fs::write(dotted_pkg.join("main.rhai"), "let x = 1;").unwrap();

        let ctx = context(dir.path());
        ctx.scripts.init();

        let plugin = Plugin::new(&pkg.join("foo.bar.rhai"), &ctx);
        assert_eq!(plugin.qualified_name(), "Pkg.foo.bar");
        plugin.load();
        assert_eq!(plugin.state(), PluginState::Loaded);
        plugin.file_changed(plugin.path());
        assert_eq!(plugin.load_count(), 2);

        let plugin = Plugin::new(&dotted_pkg.join("main.rhai"), &ctx);
        plugin.load();
        assert_eq!(plugin.state(), PluginState::Loaded);
    }
}
