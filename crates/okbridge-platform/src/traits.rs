// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for native capabilities.
//
// The dialog surface is the only capability with a protocol behind it; the
// rest are single-shot queries that each platform answers synchronously.

use okbridge_core::DeviceSnapshot;
use okbridge_core::error::{BridgeError, Result};

use crate::presenter::{DialogLayout, DialogPresenter};
use crate::token::ChoiceSink;

/// Unified bridge that groups all native capabilities.
///
/// Platforms that lack a facility return `BridgeError::PlatformUnavailable`
/// for it.
pub trait PlatformBridge: DeviceInfo + NativeConnectivity + NativeUrlOpener + Send + Sync {
    /// Human-readable platform name (e.g. "Android", "iOS").
    fn platform_name(&self) -> &str;

    /// The presenter that routes dialog requests onto this platform's UI
    /// context.
    fn dialogs(&self) -> &DialogPresenter;

    /// Tell the bridge its UI context is going away. Work not yet run on
    /// that context is discarded and later presentations are refused.
    fn teardown(&self);

    /// Answer every collaborator query at once. Queries the platform
    /// cannot answer are left as `None`.
    fn snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot {
            platform: self.platform_name().to_string(),
            operating_system: self.operating_system().ok(),
            device_model: self.device_model().ok(),
            display_density: self.display_density().ok(),
            has_network_connection: self.has_network_connection().ok(),
            is_metered_connection: self.is_metered_connection().ok(),
            is_television: self.is_television().ok(),
            installation_id: self.installation_id().ok(),
        }
    }
}

/// The host's native modal dialog facility.
pub trait NativeDialog: Send + Sync {
    /// Present `layout` as a non-cancelable modal.
    ///
    /// Only called on the UI-owning context. The implementation must
    /// disable back navigation and outside-tap dismissal, and resolve
    /// `sink` exactly once, on the UI-owning context, with the index of
    /// the control the user activated. On error the sink is dropped and
    /// its token abandoned.
    fn show_dialog(&self, layout: DialogLayout, sink: ChoiceSink) -> Result<()>;
}

/// Static facts about the device.
pub trait DeviceInfo {
    /// Operating system label with version (e.g. "Android 14").
    fn operating_system(&self) -> Result<String>;

    fn device_model(&self) -> Result<String>;

    /// Logical-to-physical pixel ratio of the main display.
    fn display_density(&self) -> Result<f32>;

    /// Identifier stable for this installation of the host app.
    fn installation_id(&self) -> Result<String>;

    /// Whether the host is running a television-style ("ten-foot") UI.
    fn is_television(&self) -> Result<bool>;
}

/// Network connectivity information.
pub trait NativeConnectivity {
    /// Whether any network is currently connected.
    fn has_network_connection(&self) -> Result<bool>;

    /// Whether the active connection is mobile data (and so likely metered).
    fn is_metered_connection(&self) -> Result<bool>;
}

/// Hand URLs to the platform.
pub trait NativeUrlOpener {
    /// Open `url` in the platform's default handler. Returns whether the
    /// platform accepted it.
    fn open_url(&self, url: &str) -> Result<bool>;
}

/// Reject URLs no platform could open. Returns the trimmed URL.
pub fn validate_url(url: &str) -> Result<&str> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(BridgeError::InvalidUrl(url.to_string()));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_urls_are_invalid() {
        assert!(matches!(validate_url(""), Err(BridgeError::InvalidUrl(_))));
        assert!(matches!(validate_url("  \t"), Err(BridgeError::InvalidUrl(_))));
    }

    #[test]
    fn urls_are_trimmed() {
        assert_eq!(validate_url(" https://example.org ").unwrap(), "https://example.org");
    }
}
