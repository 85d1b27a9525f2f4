use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Tab,
    Enter,
    Escape,
    Backspace,
    Char(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };
    pub const SHIFT: Self = Self {
        shift: true,
        ..Self::NONE
    };
    pub const CTRL: Self = Self {
        ctrl: true,
        ..Self::NONE
    };
    pub const META: Self = Self {
        meta: true,
        ..Self::NONE
    };

    /// Ctrl on most platforms, Cmd on macOS.
    #[must_use]
    pub fn is_command(&self) -> bool {
        self.ctrl || self.meta
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyInput {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyInput {
    #[must_use]
    pub fn new(key: Key, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }

    #[must_use]
    pub fn plain(key: Key) -> Self {
        Self::new(key, Modifiers::NONE)
    }
}

/// Raw input handed over by the host UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridInput {
    Key(KeyInput),
    HeaderMouseDown { col: usize, modifiers: Modifiers },
    CellMouseDown {
        row: usize,
        col: usize,
        modifiers: Modifiers,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyChordParseError {
    #[error("key binding is empty")]
    Empty,
    #[error("unknown modifier `{0}`")]
    UnknownModifier(String),
    #[error("unknown key `{0}`")]
    UnknownKey(String),
}

/// A key plus the exact modifiers that must be held, e.g. `Ctrl+C`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyChord {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyChord {
    #[must_use]
    pub fn matches(&self, input: &KeyInput) -> bool {
        let same_key = match (self.key, input.key) {
            (Key::Char(expected), Key::Char(actual)) => expected.eq_ignore_ascii_case(&actual),
            (expected, actual) => expected == actual,
        };
        same_key && self.modifiers == input.modifiers
    }
}

impl FromStr for KeyChord {
    type Err = KeyChordParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut parts = raw
            .split('+')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>();
        let key_name = parts.pop().ok_or(KeyChordParseError::Empty)?;

        let mut modifiers = Modifiers::NONE;
        for part in parts {
            match part.to_ascii_lowercase().as_str() {
                "shift" => modifiers.shift = true,
                "ctrl" | "control" => modifiers.ctrl = true,
                "alt" | "option" => modifiers.alt = true,
                "meta" | "cmd" | "super" => modifiers.meta = true,
                _ => return Err(KeyChordParseError::UnknownModifier(part.to_string())),
            }
        }

        let key = match key_name.to_ascii_lowercase().as_str() {
            "up" | "arrowup" => Key::ArrowUp,
            "down" | "arrowdown" => Key::ArrowDown,
            "left" | "arrowleft" => Key::ArrowLeft,
            "right" | "arrowright" => Key::ArrowRight,
            "tab" => Key::Tab,
            "enter" | "return" => Key::Enter,
            "esc" | "escape" => Key::Escape,
            "backspace" => Key::Backspace,
            _ => {
                let mut chars = key_name.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) => Key::Char(ch.to_ascii_lowercase()),
                    _ => return Err(KeyChordParseError::UnknownKey(key_name.to_string())),
                }
            }
        };

        Ok(Self { key, modifiers })
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.ctrl {
            f.write_str("Ctrl+")?;
        }
        if self.modifiers.alt {
            f.write_str("Alt+")?;
        }
        if self.modifiers.shift {
            f.write_str("Shift+")?;
        }
        if self.modifiers.meta {
            f.write_str("Meta+")?;
        }
        match self.key {
            Key::ArrowUp => f.write_str("Up"),
            Key::ArrowDown => f.write_str("Down"),
            Key::ArrowLeft => f.write_str("Left"),
            Key::ArrowRight => f.write_str("Right"),
            Key::Tab => f.write_str("Tab"),
            Key::Enter => f.write_str("Enter"),
            Key::Escape => f.write_str("Esc"),
            Key::Backspace => f.write_str("Backspace"),
            Key::Char(ch) => write!(f, "{}", ch.to_ascii_uppercase()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBindings {
    pub copy: Vec<KeyChord>,
    pub paste: Vec<KeyChord>,
}

impl KeyBindings {
    #[must_use]
    pub fn is_copy(&self, input: &KeyInput) -> bool {
        self.copy.iter().any(|chord| chord.matches(input))
    }

    #[must_use]
    pub fn is_paste(&self, input: &KeyInput) -> bool {
        self.paste.iter().any(|chord| chord.matches(input))
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            copy: vec![
                KeyChord {
                    key: Key::Char('c'),
                    modifiers: Modifiers::CTRL,
                },
                KeyChord {
                    key: Key::Char('c'),
                    modifiers: Modifiers::META,
                },
            ],
            paste: vec![
                KeyChord {
                    key: Key::Char('v'),
                    modifiers: Modifiers::CTRL,
                },
                KeyChord {
                    key: Key::Char('v'),
                    modifiers: Modifiers::META,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Key, KeyBindings, KeyChord, KeyChordParseError, KeyInput, Modifiers};

    #[test]
    fn parses_modifiers_and_keys() {
        let chord: KeyChord = "Ctrl+Shift+C".parse().expect("chord should parse");
        assert_eq!(chord.key, Key::Char('c'));
        assert!(chord.modifiers.ctrl && chord.modifiers.shift);
        assert_eq!(chord.to_string(), "Ctrl+Shift+C");

        let chord: KeyChord = "cmd+v".parse().expect("chord should parse");
        assert_eq!(chord.modifiers, Modifiers::META);
    }

    #[test]
    fn rejects_unknown_parts() {
        assert_eq!(
            "Hyper+C".parse::<KeyChord>(),
            Err(KeyChordParseError::UnknownModifier("Hyper".to_string()))
        );
        assert_eq!(
            "Ctrl+PageUp".parse::<KeyChord>(),
            Err(KeyChordParseError::UnknownKey("PageUp".to_string()))
        );
        assert_eq!("".parse::<KeyChord>(), Err(KeyChordParseError::Empty));
    }

    #[test]
    fn default_bindings_match_ctrl_and_cmd() {
        let bindings = KeyBindings::default();
        assert!(bindings.is_copy(&KeyInput::new(Key::Char('c'), Modifiers::CTRL)));
        assert!(bindings.is_paste(&KeyInput::new(Key::Char('V'), Modifiers::META)));
        assert!(!bindings.is_copy(&KeyInput::plain(Key::Char('c'))));
    }
}
