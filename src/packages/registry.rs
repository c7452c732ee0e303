//! Classifying discovered paths into packages and plugins.
//!
//! The registry is an ordered list of [`Record`]s, each a predicate paired
//! with a constructor. [`Registry::resolve`] walks the records in
//! registration order and builds a handler from the **first** record whose
//! predicate matches; later records that would also match are never
//! consulted. Records are not deduplicated and predicates are not required
//! to be mutually exclusive, so registration order is the only tie-break.

use std::ffi::OsStr;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use super::{Package, Plugin};
use crate::editor::Context;
use crate::scripting::PLUGIN_EXTENSION;

type Predicate = Box<dyn Fn(&Path) -> bool + Send + Sync>;
type Constructor = Box<dyn Fn(&Path, &Arc<Context>) -> Handler + Send + Sync>;

/// A constructed package or plugin
#[derive(Clone)]
pub enum Handler {
    Package(Arc<Package>),
    Plugin(Arc<Plugin>),
}

impl Handler {
    pub fn path(&self) -> &Path {
        match self {
            Handler::Package(p) => p.path(),
            Handler::Plugin(p) => p.path(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Handler::Package(_) => "package",
            Handler::Plugin(_) => "plugin",
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.path().display())
    }
}

/// An immutable (predicate, constructor) pair
pub struct Record {
    name: String,
    predicate: Predicate,
    constructor: Constructor,
}

impl Record {
    pub fn new(
        name: impl Into<String>,
        predicate: impl Fn(&Path) -> bool + Send + Sync + 'static,
        constructor: impl Fn(&Path, &Arc<Context>) -> Handler + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            predicate: Box::new(predicate),
            constructor: Box::new(constructor),
        }
    }

    /// Any directory is a package
    pub fn package() -> Self {
        Self::new("package", is_package, |path, ctx| {
            Handler::Package(Arc::new(Package::new(path, ctx)))
        })
    }

    /// Any file with the script extension is a plugin
    pub fn plugin() -> Self {
        Self::new("plugin", is_plugin, |path, ctx| {
            Handler::Plugin(Arc::new(Plugin::new(path, ctx)))
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matches(&self, path: &Path) -> bool {
        (self.predicate)(path)
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record").field("name", &self.name).finish()
    }
}

/// Ordered records, first match wins
#[derive(Debug, Default)]
pub struct Registry {
    records: Vec<Record>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `package` then `plugin`
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Record::package());
        registry.register(Record::plugin());
        registry
    }

    /// Append a record. Duplicates are kept.
    pub fn register(&mut self, record: Record) {
        self.records.push(record);
    }

    /// The first record whose predicate matches `path`
    pub fn classify(&self, path: &Path) -> Option<&Record> {
        self.records.iter().find(|r| r.matches(path))
    }

    /// Build the handler for `path` from the first matching record
    pub fn resolve(&self, path: &Path, ctx: &Arc<Context>) -> Option<Handler> {
        self.classify(path)
            .map(|record| (record.constructor)(path, ctx))
    }

    pub fn record_names(&self) -> Vec<&str> {
        self.records.iter().map(Record::name).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub fn is_package(path: &Path) -> bool {
    path.is_dir()
}

/// Decided by name alone, the file need not exist
pub fn is_plugin(path: &Path) -> bool {
    path.extension() == Some(OsStr::new(PLUGIN_EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HostConfig;
    use std::fs;

    fn context(registry: Registry) -> Arc<Context> {
        Arc::new(Context::with_registry(HostConfig::new("/pkgs", "/user"), registry))
    }

    #[test]
    fn plugin_predicate_checks_extension_only() {
        assert!(is_plugin(Path::new("/nowhere/Pkg/main.rhai")));
        assert!(!is_plugin(Path::new("/nowhere/Pkg/main.py")));
        assert!(!is_plugin(Path::new("/nowhere/Pkg/rhai")));
    }

    #[test]
    fn resolves_files_to_plugins_and_directories_to_packages() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = dir.path().join("Pkg");
        fs::create_dir(&pkg).unwrap();
        let script = pkg.join("main.rhai");
        fs::write(&script, "").unwrap();

        let ctx = context(Registry::with_defaults());
        let registry = &ctx.registry;

        let handler = registry.resolve(&script, &ctx).unwrap();
        assert!(matches!(handler, Handler::Plugin(_)));
        assert_eq!(handler.path(), script.as_path());
        assert_eq!(format!("{handler:?}"), format!("plugin({})", script.display()));
        assert!(matches!(registry.resolve(&pkg, &ctx), Some(Handler::Package(_))));
        assert!(registry.resolve(&pkg.join("notes.txt"), &ctx).is_none());
    }

    #[test]
    fn first_matching_record_wins() {
        let dir = tempfile::tempdir().unwrap();
        // A directory that also carries the plugin extension
        let odd = dir.path().join("odd.rhai");
        fs::create_dir(&odd).unwrap();

        let ctx = context(Registry::with_defaults());
        assert_eq!(ctx.registry.classify(&odd).map(Record::name), Some("package"));

        let mut reversed = Registry::new();
        reversed.register(Record::plugin());
        reversed.register(Record::package());
        let ctx = context(reversed);
        assert_eq!(ctx.registry.classify(&odd).map(Record::name), Some("plugin"));
    }

    #[test]
    fn duplicate_records_are_kept() {
        let mut registry = Registry::with_defaults();
        registry.register(Record::plugin());
        assert_eq!(registry.record_names(), vec!["package", "plugin", "plugin"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn empty_registry_resolves_nothing() {
        let ctx = context(Registry::new());
        assert!(ctx.registry.is_empty());
        assert!(ctx.registry.resolve(Path::new("/tmp"), &ctx).is_none());
    }
}
