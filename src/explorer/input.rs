use crate::path::NodeKind;

/// Logical key events forwarded by the keybinding layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keybind {
    Confirm,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputPurpose {
    /// `intent` decides the kind of an extension-less name without a
    /// trailing separator.
    NewItem { intent: Option<NodeKind> },
    Rename { path: String },
}

/// The inline text input of the tree view. It stays open after a rejected
/// submission so the user can correct the name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSession {
    pub purpose: InputPurpose,
    pub error: Option<String>,
}

impl InputSession {
    pub(crate) fn new(purpose: InputPurpose) -> Self {
        Self {
            purpose,
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeybindOutcome {
    Created(String),
    Renamed(String),
    Cancelled,
}
