//! Layered value resolution for settings and key bindings.
//!
//! A [`Layer`] holds locally-set values. A [`Chain`] is an immutable link list
//! of layers, most specific first; looking a key up walks the links until a
//! layer answers. Chains share their tails, so a layer reachable from several
//! chains is consulted by all of them and writes into it are visible
//! everywhere at once.
//!
//! [`ChainRoot`] is the globally reachable head of a chain. Its topology is
//! published as a whole through an [`ArcSwap`]: a splice builds the complete
//! new chain first and then swaps the head in a single store, so readers
//! never block and never observe a half-linked chain.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};

/// One node's locally-set key/value pairs
#[derive(Debug, Default)]
pub struct Layer {
    name: String,
    values: RwLock<Map<String, Value>>,
}

impl Layer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: RwLock::new(Map::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Local lookup only, never consults a parent
    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.values.write().insert(key.into(), value);
    }

    /// Merge every pair of `values` into this layer, replacing existing keys
    pub fn merge(&self, values: Map<String, Value>) {
        let mut local = self.values.write();
        for (key, value) in values {
            local.insert(key, value);
        }
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

#[derive(Debug)]
struct Link {
    layer: Arc<Layer>,
    parent: Option<Chain>,
}

/// An immutable chain of layers, cheap to clone
#[derive(Debug, Clone)]
pub struct Chain(Arc<Link>);

impl Chain {
    /// A chain of one layer with no fallback
    pub fn new(layer: Arc<Layer>) -> Self {
        Self::with_parent(layer, None)
    }

    /// Link `layer` in front of `parent`. The parent is shared, not copied.
    pub fn with_parent(layer: Arc<Layer>, parent: Option<Chain>) -> Self {
        Self(Arc::new(Link { layer, parent }))
    }

    /// The head layer, which receives every `set`
    pub fn layer(&self) -> &Arc<Layer> {
        &self.0.layer
    }

    pub fn parent(&self) -> Option<&Chain> {
        self.0.parent.as_ref()
    }

    /// Walk from the head towards the tail until some layer has `key`
    pub fn get(&self, key: &str) -> Option<Value> {
        self.layers().find_map(|layer| layer.get(key))
    }

    /// Like [`Chain::get`], also naming the layer that answered
    pub fn lookup(&self, key: &str) -> Option<(String, Value)> {
        self.layers()
            .find_map(|layer| layer.get(key).map(|v| (layer.name().to_string(), v)))
    }

    /// Writes to the head layer only
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.0.layer.set(key, value);
    }

    /// Layers from most to least specific
    pub fn layers(&self) -> impl Iterator<Item = &Arc<Layer>> {
        std::iter::successors(Some(self), |chain| chain.parent()).map(|chain| &chain.0.layer)
    }

    pub fn layer_names(&self) -> Vec<String> {
        self.layers().map(|l| l.name().to_string()).collect()
    }
}

/// The published head of a global chain
pub struct ChainRoot {
    head: ArcSwap<Link>,
    writer: Mutex<()>,
}

impl ChainRoot {
    pub fn new(layer: Arc<Layer>, parent: Option<Chain>) -> Self {
        Self {
            head: ArcSwap::from_pointee(Link { layer, parent }),
            writer: Mutex::new(()),
        }
    }

    /// The complete chain as currently published
    pub fn snapshot(&self) -> Chain {
        Chain(self.head.load_full())
    }

    pub fn layer(&self) -> Arc<Layer> {
        Arc::clone(&self.head.load().layer)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.snapshot().get(key)
    }

    pub fn lookup(&self, key: &str) -> Option<(String, Value)> {
        self.snapshot().lookup(key)
    }

    /// Writes to the root layer; overrides every spliced package
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.head.load().layer.set(key, value);
    }

    pub fn parent(&self) -> Option<Chain> {
        self.head.load().parent.clone()
    }

    /// Redirect the root to a new fallback chain
    pub fn set_parent(&self, parent: Option<Chain>) {
        let _writer = self.writer.lock();
        let layer = Arc::clone(&self.head.load().layer);
        self.head.store(Arc::new(Link { layer, parent }));
    }

    /// Insert `layers` (most specific first) between the root and whatever the
    /// root fell back to before, and return the chain starting at the first
    /// inserted layer.
    ///
    /// The previous fallback becomes the tail of the inserted layers, so every
    /// earlier splice stays reachable below the new one.
    pub fn splice(&self, layers: &[Arc<Layer>]) -> Option<Chain> {
        let _writer = self.writer.lock();
        let current = self.head.load_full();

        let mut tail = current.parent.clone();
        for layer in layers.iter().rev() {
            tail = Some(Chain::with_parent(Arc::clone(layer), tail));
        }

        self.head.store(Arc::new(Link {
            layer: Arc::clone(&current.layer),
            parent: tail.clone(),
        }));
        tail
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn layer(name: &str) -> Arc<Layer> {
        Arc::new(Layer::new(name))
    }

    fn root() -> ChainRoot {
        ChainRoot::new(layer("editor"), Some(Chain::new(layer("core"))))
    }

    #[test]
    fn get_falls_through_to_parent() {
        let base = layer("base");
        base.set("tab_size", json!(4));
        let chain = Chain::with_parent(layer("top"), Some(Chain::new(base)));

        assert_eq!(chain.get("tab_size"), Some(json!(4)));
        assert_eq!(chain.get("missing"), None);
    }

    #[test]
    fn set_writes_head_only() {
        let base = layer("base");
        base.set("tab_size", json!(4));
        let chain = Chain::with_parent(layer("top"), Some(Chain::new(Arc::clone(&base))));

        chain.set("tab_size", json!(8));
        assert_eq!(chain.get("tab_size"), Some(json!(8)));
        assert_eq!(base.get("tab_size"), Some(json!(4)));
    }

    #[test]
    fn ancestor_writes_are_visible_after_linking() {
        let base = layer("base");
        let chain = Chain::with_parent(layer("top"), Some(Chain::new(Arc::clone(&base))));

        base.set("font_size", json!(12));
        assert_eq!(chain.get("font_size"), Some(json!(12)));
    }

    #[test]
    fn lookup_names_the_answering_layer() {
        let root = root();
        let pkg = layer("Pkg/default");
        pkg.set("theme", json!("nord"));
        root.splice(&[pkg]);

        assert_eq!(
            root.lookup("theme"),
            Some(("Pkg/default".to_string(), json!("nord")))
        );
    }

    #[test]
    fn splice_orders_package_layers() {
        let root = root();
        let own = layer("own");
        let platform = layer("platform");
        let default = layer("default");
        default.set("tab_size", json!(4));
        platform.set("tab_size", json!(2));

        let chain = root
            .splice(&[own, platform, default])
            .expect("non-empty splice");

        assert_eq!(root.get("tab_size"), Some(json!(2)));
        assert_eq!(chain.get("tab_size"), Some(json!(2)));
        assert_eq!(
            root.snapshot().layer_names(),
            vec!["editor", "own", "platform", "default", "core"]
        );
    }

    #[test]
    fn splice_keeps_earlier_packages_reachable() {
        let root = root();
        let first = layer("P1/default");
        first.set("only_in_p1", json!(true));
        root.splice(&[layer("P1/own"), Arc::clone(&first)]);

        let second = layer("P2/default");
        second.set("shared", json!("p2"));
        first.set("shared", json!("p1"));
        root.splice(&[layer("P2/own"), second]);

        assert_eq!(root.get("only_in_p1"), Some(json!(true)));
        assert_eq!(root.get("shared"), Some(json!("p2")));
        assert_eq!(
            root.snapshot().layer_names(),
            vec!["editor", "P2/own", "P2/default", "P1/own", "P1/default", "core"]
        );
    }

    #[test]
    fn earlier_package_chain_is_not_rewritten() {
        let root = root();
        let p1 = root.splice(&[layer("P1/own")]).unwrap();
        root.splice(&[layer("P2/own")]);

        assert_eq!(p1.layer_names(), vec!["P1/own", "core"]);
    }

    #[test]
    fn root_layer_overrides_every_package() {
        let root = root();
        let own = layer("P1/own");
        own.set("color_scheme", json!("package"));
        root.splice(&[own]);
        root.set("color_scheme", json!("user"));
        root.splice(&[layer("P2/own")]);

        assert_eq!(root.get("color_scheme"), Some(json!("user")));
    }

    #[test]
    fn set_parent_redirects_without_copying() {
        let root = root();
        let other = layer("other");
        root.set_parent(Some(Chain::new(Arc::clone(&other))));

        other.set("word_wrap", json!(false));
        assert_eq!(root.get("word_wrap"), Some(json!(false)));
        assert_eq!(root.snapshot().layer_names(), vec!["editor", "other"]);
    }

    #[test]
    fn concurrent_splices_publish_whole_chains() {
        let root = root();

        std::thread::scope(|s| {
            for i in 0..8 {
                let root = &root;
                s.spawn(move || {
                    let own = layer(&format!("P{i}/own"));
                    let default = layer(&format!("P{i}/default"));
                    default.set(format!("key{i}"), json!(i));
                    root.splice(&[own, default]);
                });
            }
            s.spawn(|| {
                for _ in 0..200 {
                    let names = root.snapshot().layer_names();
                    for (at, name) in names.iter().enumerate() {
                        if let Some(pkg) = name.strip_suffix("/own") {
                            assert_eq!(names[at + 1], format!("{pkg}/default"));
                        }
                    }
                }
            });
        });

        let names = root.snapshot().layer_names();
        assert_eq!(names.len(), 2 + 16);
        for i in 0..8 {
            assert_eq!(root.get(&format!("key{i}")), Some(json!(i)));
        }
    }
}
