//! Physical keys and the name → key table used by key-press steps.

use serde::{Deserialize, Serialize};

/// A physical key the input device can press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    /// A letter, digit or symbol key, identified by its unshifted character.
    Char(char),
    F(u8),
    Control,
    Alt,
    Shift,
    Meta,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Enter,
    Tab,
    Space,
    Backspace,
    Delete,
    Insert,
    Escape,
    CapsLock,
}

impl Key {
    /// Resolve a human-authored key name (`"ctrl"`, `"F5"`, `"pagedown"`, `"a"`).
    ///
    /// Lookup is case-insensitive and ignores surrounding whitespace.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_lowercase();
        let key = match normalized.as_str() {
            "ctrl" | "control" => Self::Control,
            "alt" | "option" => Self::Alt,
            "shift" => Self::Shift,
            "win" | "windows" | "meta" | "cmd" | "command" | "super" => Self::Meta,

            "up" => Self::Up,
            "down" => Self::Down,
            "left" => Self::Left,
            "right" => Self::Right,
            "home" => Self::Home,
            "end" => Self::End,
            "pageup" | "pgup" => Self::PageUp,
            "pagedown" | "pgdn" => Self::PageDown,

            "enter" | "return" => Self::Enter,
            "tab" => Self::Tab,
            "space" => Self::Space,
            "backspace" => Self::Backspace,
            "delete" | "del" => Self::Delete,
            "insert" => Self::Insert,
            "escape" | "esc" => Self::Escape,
            "capslock" => Self::CapsLock,

            "minus" => Self::Char('-'),
            "equal" => Self::Char('='),
            "comma" => Self::Char(','),
            "period" => Self::Char('.'),
            "slash" => Self::Char('/'),
            "backslash" => Self::Char('\\'),

            other => return Self::function_key(other).or_else(|| Self::single_char(other)),
        };
        Some(key)
    }

    fn function_key(name: &str) -> Option<Self> {
        let number: u8 = name.strip_prefix('f')?.parse().ok()?;
        (1..=12).contains(&number).then_some(Self::F(number))
    }

    fn single_char(name: &str) -> Option<Self> {
        let mut chars = name.chars();
        let c = chars.next()?;
        let supported = c.is_ascii_alphanumeric() || "-=,./\\".contains(c);
        (chars.next().is_none() && supported).then_some(Self::Char(c))
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Char(c) => write!(f, "{c}"),
            Self::F(n) => write!(f, "f{n}"),
            other => write!(f, "{}", format!("{other:?}").to_lowercase()),
        }
    }
}
