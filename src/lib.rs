//! Package and plugin host for the editor.
//!
//! Packages contribute settings and key bindings as layers spliced into
//! global override chains; their script plugins are (re)loaded through one
//! serialized Rhai engine.

pub mod config;
pub mod editor;
pub mod error;
pub mod input;
pub mod packages;
pub mod scripting;

pub use editor::{Context, Editor};
pub use error::{LoadError, ScriptError};
