//! Loading `.sublime-settings` and `.sublime-keymap` files into layers.
//!
//! Both formats are JSON with `//` and `/* */` comments and trailing commas
//! allowed. Settings files are objects merged key by key; key-map files are
//! arrays of bindings keyed by their normalised key sequence.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::trace;

use super::Layer;
use crate::error::LoadError;
use crate::input::keymap::binding_key;

/// Merge the file at `path` into `layer`.
///
/// Returns `Ok(false)` when the file does not exist, which callers treat as
/// an empty layer rather than an error.
pub fn load_json(path: &Path, layer: &Layer) -> Result<bool, LoadError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            trace!(path = %path.display(), "not present");
            return Ok(false);
        }
        Err(source) => {
            return Err(LoadError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let stripped = strip_comments(&content);
    if stripped.trim().is_empty() {
        return Ok(true);
    }

    let value: Value = serde_json::from_str(&stripped).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let values = match value {
        Value::Object(map) => map,
        Value::Array(entries) => key_map_entries(path, entries)?,
        other => {
            return Err(LoadError::Shape {
                path: path.to_path_buf(),
                message: format!("expected an object or an array, found {}", kind(&other)),
            });
        }
    };

    trace!(path = %path.display(), layer = layer.name(), count = values.len(), "merged");
    layer.merge(values);
    Ok(true)
}

/// The part of a key-map entry that decides its layer key
#[derive(Debug, Deserialize)]
struct BindingKeys {
    keys: Vec<String>,
}

fn key_map_entries(path: &Path, entries: Vec<Value>) -> Result<Map<String, Value>, LoadError> {
    let mut bindings = Map::new();
    for (i, entry) in entries.into_iter().enumerate() {
        let keys = match serde_json::from_value::<BindingKeys>(entry.clone()) {
            Ok(binding) if !binding.keys.is_empty() => binding.keys,
            _ => {
                return Err(LoadError::Shape {
                    path: path.to_path_buf(),
                    message: format!("binding {i} has no \"keys\" array"),
                });
            }
        };

        bindings.insert(binding_key(keys.iter().map(String::as_str)), entry);
    }
    Ok(bindings)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Drop comments and trailing commas, leaving string contents untouched
fn strip_comments(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut chars = src.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }

    drop_trailing_commas(&out)
}

fn drop_trailing_commas(src: &str) -> String {
    let chars: Vec<char> = src.chars().collect();
    let mut out = String::with_capacity(src.len());
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if c == '\\' && i + 1 < chars.len() {
                out.push(chars[i + 1]);
                i += 1;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
            out.push(c);
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
            if !matches!(next, Some(&'}') | Some(&']')) {
                out.push(c);
            }
        } else {
            out.push(c);
        }
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let layer = Layer::new("default");
        let loaded = load_json(&dir.path().join("Preferences.sublime-settings"), &layer).unwrap();
        assert!(!loaded);
        assert!(layer.is_empty());
    }

    #[test]
    fn merges_settings_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "Preferences.sublime-settings",
            r#"{
                // indentation
                "tab_size": 4,
                /* block */ "font_face": "Fira // Code",
                "rulers": [80, 100,],
            }"#,
        );

        let layer = Layer::new("default");
        layer.set("tab_size", json!(8));
        assert!(load_json(&path, &layer).unwrap());

        assert_eq!(layer.get("tab_size"), Some(json!(4)));
        assert_eq!(layer.get("font_face"), Some(json!("Fira // Code")));
        assert_eq!(layer.get("rulers"), Some(json!([80, 100])));
    }

    #[test]
    fn key_map_entries_are_keyed_by_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "Default.sublime-keymap",
            r#"[
                { "keys": ["Ctrl+S"], "command": "save" },
                { "keys": ["ctrl+k", "ctrl+b"], "command": "toggle_side_bar" },
                { "keys": ["ctrl+s"], "command": "save_all" },
            ]"#,
        );

        let layer = Layer::new("default");
        load_json(&path, &layer).unwrap();

        assert_eq!(layer.len(), 2);
        assert_eq!(layer.get("ctrl+s").unwrap()["command"], json!("save_all"));
        assert_eq!(
            layer.get("ctrl+k ctrl+b").unwrap()["command"],
            json!("toggle_side_bar")
        );
    }

    #[test]
    fn binding_without_keys_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "Default.sublime-keymap", r#"[{ "command": "x" }]"#);
        let err = load_json(&path, &Layer::new("kb")).unwrap_err();
        assert!(matches!(err, LoadError::Shape { .. }));
    }

    #[test]
    fn scalar_document_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "Preferences.sublime-settings", "42");
        let err = load_json(&path, &Layer::new("default")).unwrap_err();
        assert!(err.to_string().contains("a number"));
    }

    #[test]
    fn syntax_errors_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "Preferences.sublime-settings", "{ \"a\": }");
        let err = load_json(&path, &Layer::new("default")).unwrap_err();
        assert!(matches!(err, LoadError::Json { .. }));
    }

    #[test]
    fn escaped_quotes_do_not_end_strings() {
        let stripped = strip_comments(r#"{"a": "say \"hi\" // not a comment",}"#);
        let value: Value = serde_json::from_str(&stripped).unwrap();
        assert_eq!(value["a"], json!("say \"hi\" // not a comment"));
    }
}
