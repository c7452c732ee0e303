use std::path::PathBuf;

use tracing::debug;

use crate::editor::Editor;

/// Host notifications the package system reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The host finished starting; import the script host module
    Init,
    /// A new packages directory exists
    PackagesPathAdded(PathBuf),
    /// A watched file was written
    FileChanged(PathBuf),
}

pub fn handle_event(editor: &Editor, event: Event) {
    debug!(?event, "handling event");
    match event {
        Event::Init => editor.init(),
        Event::PackagesPathAdded(path) => editor.add_packages_path(&path),
        Event::FileChanged(path) => editor.file_changed(&path),
    }
}
