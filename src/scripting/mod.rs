//! Scripting module - Rhai runtime for plugins
//!
//! Host functions are exposed to scripts under the `plume` namespace:
//! - `plume::log(msg)` - write to the host log
//! - `plume::platform()` - host platform id
//! - `plume::plugin_module_path(name)` - module file of a qualified plugin name

mod api;
mod engine;

pub use api::host::plugin_module_path;
pub use engine::{HOST_MODULE, PLUGIN_EXTENSION, RELOAD_ENTRY, ScriptEngine};
