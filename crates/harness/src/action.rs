//! User actions and keyboard sequences

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, HarnessResult};

/// A named or printable key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Enter,
    Escape,
    Tab,
    Space,
    Backspace,
    ArrowRight,
    ArrowLeft,
    ArrowUp,
    ArrowDown,
    Home,
    End,
    Char(char),
}

impl Key {
    /// Name used by behaviours and logs (`enter`, `arrowright`, `a`, ...)
    pub fn name(&self) -> String {
        match self {
            Key::Enter => "enter".into(),
            Key::Escape => "esc".into(),
            Key::Tab => "tab".into(),
            Key::Space => "space".into(),
            Key::Backspace => "backspace".into(),
            Key::ArrowRight => "rightarrow".into(),
            Key::ArrowLeft => "leftarrow".into(),
            Key::ArrowUp => "uparrow".into(),
            Key::ArrowDown => "downarrow".into(),
            Key::Home => "home".into(),
            Key::End => "end".into(),
            Key::Char(c) => c.to_string(),
        }
    }

    fn from_name(name: &str) -> Option<Key> {
        let key = match name.to_ascii_lowercase().as_str() {
            "enter" => Key::Enter,
            "esc" | "escape" => Key::Escape,
            "tab" => Key::Tab,
            "space" => Key::Space,
            "backspace" => Key::Backspace,
            "rightarrow" | "arrowright" => Key::ArrowRight,
            "leftarrow" | "arrowleft" => Key::ArrowLeft,
            "uparrow" | "arrowup" => Key::ArrowUp,
            "downarrow" | "arrowdown" => Key::ArrowDown,
            "home" => Key::Home,
            "end" => Key::End,
            "{" => Key::Char('{'),
            _ => return None,
        };
        Some(key)
    }

    /// Parse a single key name: `enter`, `rightarrow`, or one printable character
    pub fn parse_name(name: &str) -> HarnessResult<Key> {
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Key::Char(c)),
            _ => Key::from_name(name)
                .ok_or_else(|| HarnessError::config(format!("unknown key name {:?}", name))),
        }
    }

    /// Parse a type sequence such as `hello{enter}`. `{{}` types a literal brace.
    pub fn parse_sequence(input: &str) -> HarnessResult<Vec<Key>> {
        let mut keys = Vec::new();
        let mut chars = input.chars();
        while let Some(c) = chars.next() {
            if c != '{' {
                keys.push(Key::Char(c));
                continue;
            }
            let mut name = String::new();
            loop {
                match chars.next() {
                    Some('}') if !name.is_empty() => break,
                    Some(ch) => name.push(ch),
                    None => {
                        return Err(HarnessError::config(format!(
                            "unterminated key sequence in {:?}",
                            input
                        )))
                    }
                }
            }
            let key = Key::from_name(&name).ok_or_else(|| {
                HarnessError::config(format!("unknown special key {{{}}} in {:?}", name, input))
            })?;
            keys.push(key);
        }
        if keys.is_empty() {
            return Err(HarnessError::config("type requires a non-empty key sequence"));
        }
        Ok(keys)
    }
}

/// An interaction with a resolved element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Focus,
    Blur,
    Click,
    Clear,
    Type(Vec<Key>),
    Select(String),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Focus => "focus",
            Action::Blur => "blur",
            Action::Click => "click",
            Action::Clear => "clear",
            Action::Type(_) => "type",
            Action::Select(_) => "select",
        }
    }

    /// Actions a disabled element rejects
    pub fn requires_enabled(&self) -> bool {
        matches!(
            self,
            Action::Click | Action::Clear | Action::Type(_) | Action::Select(_)
        )
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Type(keys) => {
                let text: String = keys
                    .iter()
                    .map(|k| match k {
                        Key::Char(c) => c.to_string(),
                        other => format!("{{{}}}", other.name()),
                    })
                    .collect();
                write!(f, "type {:?}", text)
            }
            Action::Select(value) => write!(f, "select {:?}", value),
            other => f.write_str(other.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_sequence() {
        let keys = Key::parse_sequence("ab{enter}{rightarrow}").unwrap();
        assert_eq!(
            keys,
            vec![Key::Char('a'), Key::Char('b'), Key::Enter, Key::ArrowRight]
        );
    }

    #[test]
    fn test_literal_brace() {
        assert_eq!(Key::parse_sequence("{{}").unwrap(), vec![Key::Char('{')]);
    }

    #[test]
    fn test_unknown_key_is_a_configuration_error() {
        let err = Key::parse_sequence("{pagedown}").unwrap_err();
        assert!(err.is_fatal());
        assert!(Key::parse_sequence("{enter").is_err());
        assert!(Key::parse_sequence("").is_err());
    }

    #[test]
    fn test_display_round_trips_special_keys() {
        let action = Action::Type(Key::parse_sequence("x{esc}").unwrap());
        assert_eq!(action.to_string(), r#"type "x{esc}""#);
    }
}
