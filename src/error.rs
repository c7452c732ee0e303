//! Error types for package loading and the scripting bridge.
//!
//! None of these escape the public lifecycle operations: `Package::load`,
//! `Plugin::load` and the editor's event dispatch log them and carry on.

use std::path::PathBuf;

use thiserror::Error;

/// Failures while reading package files or scanning package directories.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The document parsed but is neither a settings object nor a key-map array.
    #[error("unexpected document shape in {path}: {message}")]
    Shape { path: PathBuf, message: String },
}

/// Failures crossing into the embedded script engine.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The host module was never imported.
    #[error("script engine is not initialized")]
    Unavailable,

    #[error("failed to compile {module}: {message}")]
    Compile { module: String, message: String },

    #[error("call to {entry}({arg:?}) failed: {message}")]
    Call {
        entry: String,
        arg: String,
        message: String,
    },
}
