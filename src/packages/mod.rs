//! Package and plugin discovery and loading
//!
//! A directory under the packages root is a [`Package`]; a script file
//! directly inside one is a [`Plugin`]. The [`Registry`] decides which is
//! which.

mod package;
mod plugin;
mod registry;

pub use package::{KEYMAP_FILE, Package, SETTINGS_FILE, platform_keymap_file, platform_settings_file};
pub use plugin::{Plugin, PluginState, qualified_name};
pub use registry::{Handler, Record, Registry, is_package, is_plugin};
