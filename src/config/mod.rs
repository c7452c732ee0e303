//! Layered settings and key bindings, the files they load from, and where
//! those files live

mod chain;
mod host;
mod json;

pub use chain::{Chain, ChainRoot, Layer};
pub use host::{HostConfig, Platform, absolute};
pub use json::load_json;
