use std::fmt;

use crossterm::event::{KeyCode, KeyModifiers};

/// A single key press as written in key-map files, e.g. `ctrl+shift+p`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl Key {
    pub fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        Self { code, modifiers }
    }

    pub fn char(c: char) -> Self {
        Self::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    pub fn ctrl(c: char) -> Self {
        Self::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    /// Parse `mod+mod+key`. Modifier and key names are case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }

        // `ctrl++` binds the plus key itself
        let (mods, name) = if s == "+" {
            ("", "+")
        } else if let Some(prefix) = s.strip_suffix("++") {
            (prefix, "+")
        } else {
            match s.rsplit_once('+') {
                Some((mods, name)) => (mods, name),
                None => ("", s),
            }
        };

        let mut modifiers = KeyModifiers::NONE;
        if !mods.is_empty() {
            for m in mods.split('+') {
                modifiers |= parse_modifier(m)?;
            }
        }

        Some(Self::new(parse_code(name)?, modifiers))
    }
}

fn parse_modifier(m: &str) -> Option<KeyModifiers> {
    match m.to_ascii_lowercase().as_str() {
        "ctrl" | "control" => Some(KeyModifiers::CONTROL),
        "alt" | "option" => Some(KeyModifiers::ALT),
        "shift" => Some(KeyModifiers::SHIFT),
        "super" | "cmd" | "command" => Some(KeyModifiers::SUPER),
        "meta" => Some(KeyModifiers::META),
        _ => None,
    }
}

fn parse_code(name: &str) -> Option<KeyCode> {
    let lower = name.to_ascii_lowercase();
    let code = match lower.as_str() {
        "enter" => KeyCode::Enter,
        "escape" | "esc" => KeyCode::Esc,
        "tab" => KeyCode::Tab,
        "backspace" => KeyCode::Backspace,
        "delete" => KeyCode::Delete,
        "insert" => KeyCode::Insert,
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        "home" => KeyCode::Home,
        "end" => KeyCode::End,
        "pageup" | "page_up" => KeyCode::PageUp,
        "pagedown" | "page_down" => KeyCode::PageDown,
        "space" => KeyCode::Char(' '),
        f if f.len() > 1 && f.starts_with('f') => KeyCode::F(f[1..].parse().ok()?),
        _ => {
            let mut chars = lower.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => KeyCode::Char(c),
                _ => return None,
            }
        }
    };
    Some(code)
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Fixed modifier order so equal chords print identically
        for (flag, name) in [
            (KeyModifiers::CONTROL, "ctrl+"),
            (KeyModifiers::ALT, "alt+"),
            (KeyModifiers::SHIFT, "shift+"),
            (KeyModifiers::SUPER, "super+"),
            (KeyModifiers::META, "meta+"),
        ] {
            if self.modifiers.contains(flag) {
                f.write_str(name)?;
            }
        }
        match self.code {
            KeyCode::Char(' ') => f.write_str("space"),
            KeyCode::Char(c) => write!(f, "{c}"),
            KeyCode::F(n) => write!(f, "f{n}"),
            KeyCode::Enter => f.write_str("enter"),
            KeyCode::Esc => f.write_str("escape"),
            KeyCode::Tab => f.write_str("tab"),
            KeyCode::Backspace => f.write_str("backspace"),
            KeyCode::Delete => f.write_str("delete"),
            KeyCode::Insert => f.write_str("insert"),
            KeyCode::Up => f.write_str("up"),
            KeyCode::Down => f.write_str("down"),
            KeyCode::Left => f.write_str("left"),
            KeyCode::Right => f.write_str("right"),
            KeyCode::Home => f.write_str("home"),
            KeyCode::End => f.write_str("end"),
            KeyCode::PageUp => f.write_str("pageup"),
            KeyCode::PageDown => f.write_str("pagedown"),
            other => write!(f, "{}", format!("{other:?}").to_lowercase()),
        }
    }
}

/// A chord sequence such as `ctrl+k ctrl+b`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeySequence(Vec<Key>);

impl KeySequence {
    pub fn new(keys: Vec<Key>) -> Self {
        Self(keys)
    }

    /// Parse one key string per element, as in a key-map `keys` array
    pub fn from_keys<'a>(keys: impl IntoIterator<Item = &'a str>) -> Option<Self> {
        let keys: Vec<Key> = keys.into_iter().map(Key::parse).collect::<Option<_>>()?;
        if keys.is_empty() {
            return None;
        }
        Some(Self(keys))
    }

    /// Parse a whitespace separated sequence
    pub fn parse(s: &str) -> Option<Self> {
        Self::from_keys(s.split_whitespace())
    }

    pub fn keys(&self) -> &[Key] {
        &self.0
    }
}

impl fmt::Display for KeySequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}

/// Canonical layer key for a key-map entry. Unparseable keys are kept
/// lowercased so they still override each other consistently.
pub fn binding_key<'a>(keys: impl IntoIterator<Item = &'a str> + Clone) -> String {
    match KeySequence::from_keys(keys.clone()) {
        Some(seq) => seq.to_string(),
        None => keys
            .into_iter()
            .map(|k| k.trim().to_ascii_lowercase())
            .collect::<Vec<_>>()
            .join(" "),
    }
}
