// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! okbridge — native platform bridge.
//!
//! Lets a native application core show platform-owned modal dialogs and
//! query device facts. A dialog request is accepted on any thread, handed
//! to the platform's UI-owning context, and its outcome is delivered
//! exactly once to the caller's [`CompletionToken`].
//!
//! Android (JNI) and iOS (objc2) bridges are selected at compile time;
//! everywhere else a headless bridge backed by its own UI thread is used.

pub mod executor;
pub mod ffi;
pub mod presenter;
pub mod token;
pub mod traits;

#[cfg(target_os = "ios")]
pub mod ios;

#[cfg(target_os = "android")]
pub mod android;

#[cfg(not(any(target_os = "ios", target_os = "android")))]
pub mod stub;

pub use executor::{UiDispatcher, UiExecutor, UiHandle, UiTask};
pub use presenter::{DialogLayout, DialogPresenter};
pub use token::{ChoiceSink, CompletionToken, TokenId};
pub use traits::PlatformBridge;

use okbridge_core::BridgeConfig;
use okbridge_core::error::Result;

/// Build the bridge implementation for the target operating system.
///
/// RETURNS: a boxed trait object (`dyn PlatformBridge`) that abstracts away
/// the underlying native SDK details.
pub fn platform_bridge(config: &BridgeConfig) -> Result<Box<dyn PlatformBridge>> {
    #[cfg(target_os = "ios")]
    {
        // iOS: dialogs and queries go through objc2 message sends.
        Ok(Box::new(ios::IosBridge::new(config)))
    }
    #[cfg(target_os = "android")]
    {
        // Android: jni-rs calls into the hosting Activity.
        Ok(Box::new(android::AndroidBridge::new(config)))
    }
    #[cfg(not(any(target_os = "ios", target_os = "android")))]
    {
        // DESKTOP/CI: headless dialogs on a dedicated UI thread.
        Ok(Box::new(stub::StubBridge::new(config)?))
    }
}
