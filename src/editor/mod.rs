mod context;
mod editor;

pub use context::Context;
pub use editor::Editor;
