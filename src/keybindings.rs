//! Customizable keybindings for polygon capture.
//!
//! Keys are identified by name (`"enter"`, `"backspace"`, `"q"`, ...) so the
//! same table works for a terminal, a scripted event file, or any windowing
//! toolkit that reports key names. Several names may map to one action.

use serde::{Deserialize, Serialize};

/// Capture action triggered by a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Finish the polygon for the current plant
    Finish,
    /// Remove the last vertex
    Undo,
    /// Clear all vertices
    Reset,
    /// Abandon the current polygon
    Quit,
}

impl KeyAction {
    /// Get the display name for this action.
    pub fn name(&self) -> &'static str {
        match self {
            KeyAction::Finish => "finish",
            KeyAction::Undo => "undo",
            KeyAction::Reset => "reset",
            KeyAction::Quit => "quit",
        }
    }

    /// Get all actions.
    pub fn all() -> &'static [KeyAction] {
        &[
            KeyAction::Finish,
            KeyAction::Undo,
            KeyAction::Reset,
            KeyAction::Quit,
        ]
    }
}

/// Keybinding configuration for capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    /// Keys that finish the polygon
    pub finish: Vec<String>,
    /// Keys that undo the last vertex
    pub undo: Vec<String>,
    /// Keys that reset the polygon
    pub reset: Vec<String>,
    /// Keys that quit
    pub quit: Vec<String>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            finish: vec!["enter".into(), "return".into()],
            undo: vec!["backspace".into()],
            reset: vec!["escape".into(), "esc".into()],
            quit: vec!["q".into(), "Q".into()],
        }
    }
}

impl KeyBindings {
    /// Get the action that corresponds to a key name, if any.
    pub fn action_for_key(&self, key: &str) -> Option<KeyAction> {
        KeyAction::all()
            .iter()
            .copied()
            .find(|action| self.keys_for(*action).iter().any(|k| k == key))
    }

    /// Get the key names bound to an action.
    pub fn keys_for(&self, action: KeyAction) -> &[String] {
        match action {
            KeyAction::Finish => &self.finish,
            KeyAction::Undo => &self.undo,
            KeyAction::Reset => &self.reset,
            KeyAction::Quit => &self.quit,
        }
    }

    /// Primary (first) key for an action, for prompts.
    pub fn primary_key(&self, action: KeyAction) -> &str {
        self.keys_for(action)
            .first()
            .map(String::as_str)
            .unwrap_or("<unbound>")
    }

    /// One-line help text such as `enter=finish, backspace=undo, ...`.
    pub fn help(&self) -> String {
        KeyAction::all()
            .iter()
            .map(|a| format!("{}={}", self.primary_key(*a), a.name()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Find a key bound to more than one action.
    pub fn find_conflict(&self) -> Option<(&str, KeyAction, KeyAction)> {
        let actions = KeyAction::all();
        for (i, first) in actions.iter().enumerate() {
            for second in &actions[i + 1..] {
                if let Some(key) = self
                    .keys_for(*first)
                    .iter()
                    .find(|k| self.keys_for(*second).contains(*k))
                {
                    return Some((key.as_str(), *first, *second));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bindings() {
        let bindings = KeyBindings::default();
        assert_eq!(bindings.action_for_key("enter"), Some(KeyAction::Finish));
        assert_eq!(bindings.action_for_key("backspace"), Some(KeyAction::Undo));
        assert_eq!(bindings.action_for_key("escape"), Some(KeyAction::Reset));
        assert_eq!(bindings.action_for_key("q"), Some(KeyAction::Quit));
        assert_eq!(bindings.action_for_key("Q"), Some(KeyAction::Quit));
        assert_eq!(bindings.action_for_key("x"), None);
        assert!(bindings.find_conflict().is_none());
    }

    #[test]
    fn test_help_text() {
        let help = KeyBindings::default().help();
        assert_eq!(help, "enter=finish, backspace=undo, escape=reset, q=quit");
    }

    #[test]
    fn test_conflict_detected() {
        let mut bindings = KeyBindings::default();
        bindings.reset.push("q".into());
        let (key, a, b) = bindings.find_conflict().unwrap();
        assert_eq!(key, "q");
        assert_eq!((a, b), (KeyAction::Reset, KeyAction::Quit));
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let bindings: KeyBindings = serde_json::from_str(r#"{"finish": ["f"]}"#).unwrap();
        assert_eq!(bindings.action_for_key("f"), Some(KeyAction::Finish));
        assert_eq!(bindings.action_for_key("enter"), None);
        assert_eq!(bindings.action_for_key("backspace"), Some(KeyAction::Undo));
    }
}
