// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the okbridge dialog protocol.

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// Visual layout a dialog gets, derived from its button count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonLayout {
    /// One affirmative action at index 0.
    Single,
    /// Affirmative action at index 0, dismissive action at index 1.
    Dual,
    /// Every button is a selectable list item; the chosen index is its position.
    List,
}

impl ButtonLayout {
    /// Classify a button count. Returns `None` for an empty button set,
    /// which no layout can present.
    pub fn classify(button_count: usize) -> Option<Self> {
        match button_count {
            0 => None,
            1 => Some(Self::Single),
            2 => Some(Self::Dual),
            _ => Some(Self::List),
        }
    }
}

impl std::fmt::Display for ButtonLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Single => "single-action",
            Self::Dual => "dual-action",
            Self::List => "list",
        };
        f.write_str(label)
    }
}

/// A request to show a modal dialog.
///
/// Immutable once constructed. The button set is never empty: both
/// [`DialogRequest::new`] and deserialization reject an empty list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDialogRequest")]
pub struct DialogRequest {
    title: String,
    message: String,
    buttons: Vec<String>,
}

/// Unvalidated wire shape used by serde before the invariant check.
#[derive(Deserialize)]
struct RawDialogRequest {
    title: String,
    message: String,
    buttons: Vec<String>,
}

impl TryFrom<RawDialogRequest> for DialogRequest {
    type Error = BridgeError;

    fn try_from(raw: RawDialogRequest) -> Result<Self> {
        Self::new(raw.title, raw.message, raw.buttons)
    }
}

impl DialogRequest {
    /// Build a request, failing fast on an empty button set.
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        buttons: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self> {
        let buttons: Vec<String> = buttons.into_iter().map(Into::into).collect();
        if buttons.is_empty() {
            return Err(BridgeError::EmptyButtons);
        }
        Ok(Self {
            title: title.into(),
            message: message.into(),
            buttons,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn buttons(&self) -> &[String] {
        &self.buttons
    }

    pub fn button_count(&self) -> usize {
        self.buttons.len()
    }

    /// The layout this request will be presented with.
    pub fn layout(&self) -> ButtonLayout {
        // Non-empty by construction.
        ButtonLayout::classify(self.buttons.len()).unwrap_or(ButtonLayout::Single)
    }

    /// Consume the request, yielding `(title, message, buttons)`.
    pub fn into_parts(self) -> (String, String, Vec<String>) {
        (self.title, self.message, self.buttons)
    }
}

/// Answers to every collaborator query, captured at one point in time.
///
/// A field is `None` when the platform could not answer that query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub platform: String,
    pub operating_system: Option<String>,
    pub device_model: Option<String>,
    pub display_density: Option<f32>,
    pub has_network_connection: Option<bool>,
    pub is_metered_connection: Option<bool>,
    pub is_television: Option<bool>,
    pub installation_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_by_button_count() {
        assert_eq!(ButtonLayout::classify(0), None);
        assert_eq!(ButtonLayout::classify(1), Some(ButtonLayout::Single));
        assert_eq!(ButtonLayout::classify(2), Some(ButtonLayout::Dual));
        assert_eq!(ButtonLayout::classify(3), Some(ButtonLayout::List));
        assert_eq!(ButtonLayout::classify(12), Some(ButtonLayout::List));
    }

    #[test]
    fn empty_buttons_rejected() {
        let err = DialogRequest::new("Title", "Message", Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, BridgeError::EmptyButtons));
    }

    #[test]
    fn request_keeps_button_order() {
        let req = DialogRequest::new("Pick", "Choose one", ["Red", "Green", "Blue"]).unwrap();
        assert_eq!(req.buttons(), ["Red", "Green", "Blue"]);
        assert_eq!(req.button_count(), 3);
        assert_eq!(req.layout(), ButtonLayout::List);
    }

    #[test]
    fn requests_compare_by_value() {
        let a = DialogRequest::new("Info", "OK?", ["OK"]).unwrap();
        let b = DialogRequest::new(String::from("Info"), "OK?", vec![String::from("OK")]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn deserialize_rejects_empty_buttons() {
        let json = r#"{"title":"t","message":"m","buttons":[]}"#;
        assert!(serde_json::from_str::<DialogRequest>(json).is_err());

        let json = r#"{"title":"Delete?","message":"This cannot be undone","buttons":["Delete","Cancel"]}"#;
        let req: DialogRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.layout(), ButtonLayout::Dual);
    }

    #[test]
    fn into_parts_yields_fields() {
        let req = DialogRequest::new("Info", "OK?", ["OK"]).unwrap();
        let (title, message, buttons) = req.into_parts();
        assert_eq!(title, "Info");
        assert_eq!(message, "OK?");
        assert_eq!(buttons, vec!["OK".to_string()]);
    }

    #[test]
    fn layout_display_labels() {
        assert_eq!(ButtonLayout::List.to_string(), "list");
        assert_eq!(ButtonLayout::Dual.to_string(), "dual-action");
    }
}
