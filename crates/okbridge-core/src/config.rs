// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Which request field becomes the dialog title in list layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListTitleSource {
    /// The message text is shown as the title and the request title is
    /// dropped. This is what deployed hosts of the bridge expect.
    #[default]
    Message,
    /// The request title is shown as the title.
    Title,
}

/// Bridge settings, loadable from a JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Name of the UI-owning thread on hosts where the bridge spawns it.
    pub ui_thread_name: String,
    /// Title source for list-layout dialogs.
    pub list_title: ListTitleSource,
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            ui_thread_name: "okbridge-ui".into(),
            list_title: ListTitleSource::Message,
            log_filter: "info".into(),
        }
    }
}

impl BridgeConfig {
    /// Read a JSON config file. Missing keys take their default values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Like [`BridgeConfig::load`], but falls back to defaults when the file
    /// is missing or malformed.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Write the config as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;

    #[test]
    fn defaults_keep_message_as_list_title() {
        let config = BridgeConfig::default();
        assert_eq!(config.list_title, ListTitleSource::Message);
        assert_eq!(config.ui_thread_name, "okbridge-ui");
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("okbridge.json");

        let config = BridgeConfig {
            ui_thread_name: "main-ui".into(),
            list_title: ListTitleSource::Title,
            log_filter: "debug".into(),
        };
        config.save(&path).expect("save");

        let loaded = BridgeConfig::load(&path).expect("load");
        assert_eq!(loaded, config);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("partial.json");
        std::fs::write(&path, r#"{ "list_title": "title" }"#).expect("write");

        let loaded = BridgeConfig::load(&path).expect("load");
        assert_eq!(loaded.list_title, ListTitleSource::Title);
        assert_eq!(loaded.ui_thread_name, "okbridge-ui");
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = BridgeConfig::load(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, BridgeError::Io(_)));
        assert_eq!(
            BridgeConfig::load_or_default(dir.path().join("nope.json")),
            BridgeConfig::default()
        );
    }

    #[test]
    fn malformed_file_is_serialization_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").expect("write");
        assert!(matches!(
            BridgeConfig::load(&path).unwrap_err(),
            BridgeError::Serialization(_)
        ));
    }
}
