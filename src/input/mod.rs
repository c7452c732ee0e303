mod handler;
pub mod keymap;

pub use handler::{Event, handle_event};
pub use keymap::{Key, KeySequence};
