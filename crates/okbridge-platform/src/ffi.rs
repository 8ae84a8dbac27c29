// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// C ABI for native cores written in C or C++.
//
// The native side describes its continuation as `OkbCompletionToken`:
// an opaque context pointer plus `invoke` and `release` callbacks.
// `invoke(ctx, index)` runs at most once, on the UI thread. `release(ctx)`
// runs exactly once: right after `invoke` returns, or on its own when the
// presentation is rejected or abandoned. Nothing unwinds across this
// boundary.

use std::ffi::{CStr, c_char, c_void};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::ptr;

use tracing::{error, warn};

use okbridge_core::BridgeConfig;
use okbridge_core::error::BridgeError;

use crate::platform_bridge;
use crate::token::CompletionToken;
use crate::traits::PlatformBridge;

/// Receives the chosen button index.
pub type OkbInvokeFn = unsafe extern "C" fn(ctx: *mut c_void, button: i32);

/// Releases the native continuation.
pub type OkbReleaseFn = unsafe extern "C" fn(ctx: *mut c_void);

/// Native-side completion token.
#[repr(C)]
pub struct OkbCompletionToken {
    pub ctx: *mut c_void,
    pub invoke: Option<OkbInvokeFn>,
    pub release: Option<OkbReleaseFn>,
}

/// Result of `okbridge_present`.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OkbStatus {
    /// Queued for presentation on the UI thread.
    Accepted = 0,
    /// Null pointer or non-UTF-8 string.
    InvalidArgument = -1,
    /// `button_count` was zero.
    EmptyButtons = -2,
    /// The UI context is gone.
    ContextUnavailable = -3,
}

/// Opaque bridge handle handed to C.
pub struct OkBridge {
    bridge: Box<dyn PlatformBridge>,
}

/// Owns the native continuation; releasing it is tied to `Drop`, so the
/// release always follows any invoke and happens exactly once.
struct NativeContinuation {
    ctx: *mut c_void,
    invoke: Option<OkbInvokeFn>,
    release: Option<OkbReleaseFn>,
}

// SAFETY: the C contract requires `ctx` and both callbacks to be usable
// from the UI thread, which is where the continuation is invoked and
// (normally) released.
unsafe impl Send for NativeContinuation {}

impl NativeContinuation {
    fn invoke(&self, index: usize) {
        if let Some(invoke) = self.invoke {
            let button = i32::try_from(index).unwrap_or(i32::MAX);
            // SAFETY: caller-provided callback with its own context.
            unsafe { invoke(self.ctx, button) }
        }
    }
}

impl From<OkbCompletionToken> for NativeContinuation {
    fn from(token: OkbCompletionToken) -> Self {
        Self {
            ctx: token.ctx,
            invoke: token.invoke,
            release: token.release,
        }
    }
}

impl Drop for NativeContinuation {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            // SAFETY: caller-provided callback; called exactly once.
            unsafe { release(self.ctx) }
        }
    }
}

/// Borrow a C string as UTF-8. `None` for null or invalid UTF-8.
///
/// # Safety
/// A non-null `ptr` must point to a NUL-terminated string that outlives `'a`.
unsafe fn str_arg<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: guaranteed by the caller.
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

/// Create a bridge for the current platform.
///
/// `config_json` may be null for defaults; malformed JSON also falls back
/// to defaults. Returns null if the bridge cannot be started.
///
/// # Safety
/// - `config_json` must be null or a valid NUL-terminated string
/// - the returned handle must be freed with `okbridge_free`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn okbridge_new(config_json: *const c_char) -> *mut OkBridge {
    let config = if config_json.is_null() {
        BridgeConfig::default()
    } else {
        // SAFETY: non-null, guaranteed valid by the caller.
        match unsafe { str_arg(config_json) }.map(serde_json::from_str::<BridgeConfig>) {
            Some(Ok(config)) => config,
            _ => {
                warn!("invalid bridge config JSON; using defaults");
                BridgeConfig::default()
            }
        }
    };

    match catch_unwind(AssertUnwindSafe(|| platform_bridge(&config))) {
        Ok(Ok(bridge)) => Box::into_raw(Box::new(OkBridge { bridge })),
        Ok(Err(e)) => {
            error!(error = %e, "failed to start platform bridge");
            ptr::null_mut()
        }
        Err(_) => {
            error!("panic while starting platform bridge");
            ptr::null_mut()
        }
    }
}

/// Tear down and free a bridge. Pending presentations are abandoned and
/// their tokens released without being invoked.
///
/// # Safety
/// - `bridge` must be null or a handle from `okbridge_new`
/// - `bridge` must not be used after this call
#[unsafe(no_mangle)]
pub unsafe extern "C" fn okbridge_free(bridge: *mut OkBridge) {
    if bridge.is_null() {
        return;
    }
    // SAFETY: handle came from `Box::into_raw` in `okbridge_new`.
    let bridge = unsafe { Box::from_raw(bridge) };
    let result = catch_unwind(AssertUnwindSafe(move || {
        bridge.bridge.teardown();
        drop(bridge);
    }));
    if result.is_err() {
        error!("panic while freeing platform bridge");
    }
}

/// Present a modal dialog.
///
/// Returns `Accepted` once the dialog is queued for the UI thread. On any
/// other status the token's `release` has already been called and
/// `invoke` never will be.
///
/// # Safety
/// - `bridge` must be a live handle from `okbridge_new`
/// - `title` and `message` must be valid NUL-terminated strings
/// - `buttons` must point to `button_count` valid NUL-terminated strings
///   (it may be null when `button_count` is zero)
/// - `token.ctx` and its callbacks must be usable from the UI thread
#[unsafe(no_mangle)]
pub unsafe extern "C" fn okbridge_present(
    bridge: *const OkBridge,
    title: *const c_char,
    message: *const c_char,
    buttons: *const *const c_char,
    button_count: usize,
    token: OkbCompletionToken,
) -> OkbStatus {
    // From here on every return path releases the token.
    let native = NativeContinuation::from(token);

    // SAFETY: guaranteed by the caller.
    let Some(bridge) = (unsafe { bridge.as_ref() }) else {
        return OkbStatus::InvalidArgument;
    };
    // SAFETY: guaranteed by the caller.
    let (Some(title), Some(message)) = (unsafe { str_arg(title) }, unsafe { str_arg(message) })
    else {
        return OkbStatus::InvalidArgument;
    };
    if button_count > 0 && buttons.is_null() {
        return OkbStatus::InvalidArgument;
    }

    let mut labels = Vec::with_capacity(button_count);
    for i in 0..button_count {
        // SAFETY: `buttons` holds `button_count` entries per the contract.
        let label = unsafe { str_arg(*buttons.add(i)) };
        match label {
            Some(label) => labels.push(label.to_owned()),
            None => return OkbStatus::InvalidArgument,
        }
    }

    let token = CompletionToken::new(move |index| {
        native.invoke(index);
        drop(native);
    });

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        bridge
            .bridge
            .dialogs()
            .present_parts(title, message, labels, token)
    }));
    match outcome {
        Ok(Ok(())) => OkbStatus::Accepted,
        Ok(Err(BridgeError::EmptyButtons)) => OkbStatus::EmptyButtons,
        Ok(Err(BridgeError::ContextUnavailable)) => OkbStatus::ContextUnavailable,
        Ok(Err(e)) => {
            warn!(error = %e, "dialog presentation rejected");
            OkbStatus::InvalidArgument
        }
        Err(_) => {
            error!("panic while presenting dialog");
            OkbStatus::InvalidArgument
        }
    }
}
