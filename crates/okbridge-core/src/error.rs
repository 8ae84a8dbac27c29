// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for okbridge.

use thiserror::Error;

/// Top-level error type for all bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    // -- Dialog protocol --
    #[error("dialog request has no buttons")]
    EmptyButtons,

    #[error("UI context is no longer available")]
    ContextUnavailable,

    #[error("button index {index} out of range for a dialog with {button_count} button(s)")]
    InvalidChoice { index: usize, button_count: usize },

    #[error("no pending dialog with id {0}")]
    UnknownDialog(String),

    // -- Collaborator queries --
    #[error("invalid URL: {0:?}")]
    InvalidUrl(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Platform bridge --
    #[error("platform bridge error: {0}")]
    Bridge(String),

    #[error("feature not available on this platform")]
    PlatformUnavailable,
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BridgeError>;
