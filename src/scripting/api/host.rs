//! plume::* - host functions visible to every script
//!
//! Usage in Rhai:
//! ```rhai
//! plume::log("loaded");
//! if plume::platform() == "linux" { ... }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rhai::plugin::*;
use tracing::info;

use crate::config::Platform;
use crate::scripting::PLUGIN_EXTENSION;

/// Qualified plugin name to the file it reloads, relative to a search path
pub type PluginModules = Arc<RwLock<HashMap<String, String>>>;

/// Create the `plume` module for the given host platform
pub fn create_module(platform: &Platform, modules: &PluginModules) -> rhai::Module {
    let mut module = rhai::Module::new();

    // log(msg: &str)
    module.set_native_fn("log", |msg: &str| {
        info!(target: "plume::script", "{}", msg);
        Ok(())
    });

    // platform() -> String
    {
        let platform = platform.as_str().to_string();
        module.set_native_fn(
            "platform",
            move || -> Result<String, Box<EvalAltResult>> { Ok(platform.clone()) },
        );
    }

    // plugin_module_path(name: &str) -> String
    {
        let modules = Arc::clone(modules);
        module.set_native_fn(
            "plugin_module_path",
            move |name: &str| -> Result<String, Box<EvalAltResult>> {
                let registered = modules.read().get(name).cloned();
                Ok(registered.unwrap_or_else(|| plugin_module_path(name)))
            },
        );
    }

    module
}

/// `Package.plugin` -> `Package/plugin.rhai`, relative to a packages search
/// path. Used for names no plugin registered.
///
/// The extension is spelled out because the file resolver replaces whatever
/// follows the last dot. Only the last dot of the name separates the plugin,
/// so a dotted file stem is only reachable through a registered name.
pub fn plugin_module_path(qualified: &str) -> String {
    match qualified.rsplit_once('.') {
        Some((package, plugin)) => format!("{package}/{plugin}.{PLUGIN_EXTENSION}"),
        None => format!("{qualified}.{PLUGIN_EXTENSION}"),
    }
}
