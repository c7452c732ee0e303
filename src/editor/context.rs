use std::sync::Arc;

use crate::config::{Chain, ChainRoot, HostConfig, Layer};
use crate::packages::Registry;
use crate::scripting::ScriptEngine;

/// Everything packages and plugins share: the global chains, the script
/// engine and the registry. Handed to constructors by reference instead of
/// living in process globals.
pub struct Context {
    pub config: HostConfig,
    pub settings: ChainRoot,
    pub key_bindings: ChainRoot,
    pub scripts: ScriptEngine,
    pub registry: Registry,
}

impl Context {
    pub fn new(config: HostConfig) -> Self {
        Self::with_registry(config, Registry::with_defaults())
    }

    pub fn with_registry(config: HostConfig, registry: Registry) -> Self {
        // Core defaults stay at the tail, below every package
        let root = || {
            ChainRoot::new(
                Arc::new(Layer::new("editor")),
                Some(Chain::new(Arc::new(Layer::new("core")))),
            )
        };

        Self {
            settings: root(),
            key_bindings: root(),
            scripts: ScriptEngine::new(&config.platform),
            registry,
            config,
        }
    }
}
