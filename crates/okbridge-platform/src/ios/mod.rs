// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// iOS platform bridge via objc2.
//
// Requires compilation with the iOS SDK (Xcode). Dialogs are `UIAlertView`s
// built through Objective-C message sends; device queries read `UIDevice`,
// `UIScreen` and `sysctl`.
//
// This module is cfg-gated to `target_os = "ios"` and will not compile on
// other platforms.
//
// ## Threading
//
// The UI-owning context is the main dispatch queue. Dialog tasks are handed
// over with `dispatch_async_f`; UIKit queries made off the main thread hop
// over with `dispatch_sync_f`. Calling a query from a thread the main
// thread is blocked on will deadlock.
//
// ## Unsafe code
//
// 1. **libdispatch / sysctl FFI**: plain C calls declared below; context
//    pointers are boxed Rust values reclaimed exactly once by the
//    trampoline.
// 2. **ObjC message sends** (msg_send!, define_class! #[unsafe(...)]):
//    selectors are the documented UIKit / Foundation ones.

#![cfg(target_os = "ios")]

use std::cell::RefCell;
use std::ffi::{CStr, c_char, c_int, c_void};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::ptr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use objc2::rc::Retained;
use objc2::runtime::{AnyClass, AnyObject, Bool, NSObject};
use objc2::{ClassType, DefinedClass, MainThreadMarker, define_class, msg_send};
use objc2_foundation::{NSDictionary, NSString, NSURL, NSUUID};
use objc2_ui_kit::{UIApplication, UIDevice, UIScreen};
use tracing::{debug, error, info, warn};

use okbridge_core::BridgeConfig;
use okbridge_core::error::{BridgeError, Result};

use crate::executor::{UiDispatcher, UiTask};
use crate::presenter::{DialogLayout, DialogPresenter};
use crate::token::ChoiceSink;
use crate::traits::*;

// ---------------------------------------------------------------------------
// libdispatch / sysctl FFI
// ---------------------------------------------------------------------------

/// Opaque `struct dispatch_queue_s`.
#[repr(C)]
struct DispatchQueue {
    _private: [u8; 0],
}

type DispatchFunction = extern "C" fn(context: *mut c_void);

unsafe extern "C" {
    /// Backing object of `dispatch_get_main_queue()`, which is a macro.
    static _dispatch_main_q: DispatchQueue;

    fn dispatch_async_f(queue: *const DispatchQueue, context: *mut c_void, work: DispatchFunction);
    fn dispatch_sync_f(queue: *const DispatchQueue, context: *mut c_void, work: DispatchFunction);

    fn sysctlbyname(
        name: *const c_char,
        oldp: *mut c_void,
        oldlenp: *mut usize,
        newp: *mut c_void,
        newlen: usize,
    ) -> c_int;
}

#[allow(unused_unsafe)]
fn main_queue() -> *const DispatchQueue {
    // SAFETY: only the address of the libdispatch global is taken.
    unsafe { &raw const _dispatch_main_q }
}

/// `UIUserInterfaceIdiomTV`.
const IDIOM_TV: isize = 2;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Assert that we are on the main thread and return the marker.
fn require_main_thread() -> Result<MainThreadMarker> {
    MainThreadMarker::new()
        .ok_or_else(|| BridgeError::Bridge("must be called from the main thread".into()))
}

/// Run `f` on the main thread, blocking the caller until it returns.
fn on_main<T, F>(f: F) -> Result<T>
where
    F: FnOnce(MainThreadMarker) -> Result<T> + Send,
    T: Send,
{
    if let Some(mtm) = MainThreadMarker::new() {
        return f(mtm);
    }

    struct SyncCall<F, T> {
        f: Option<F>,
        out: Option<std::thread::Result<Result<T>>>,
    }

    extern "C" fn trampoline<F, T>(ctx: *mut c_void)
    where
        F: FnOnce(MainThreadMarker) -> Result<T>,
    {
        // SAFETY: `ctx` is the `SyncCall` on the caller's stack, kept alive
        // by `dispatch_sync_f` until this returns.
        let call = unsafe { &mut *ctx.cast::<SyncCall<F, T>>() };
        // SAFETY: work submitted to the main queue runs on the main thread.
        let mtm = unsafe { MainThreadMarker::new_unchecked() };
        if let Some(f) = call.f.take() {
            call.out = Some(catch_unwind(AssertUnwindSafe(move || f(mtm))));
        }
    }

    let mut call = SyncCall { f: Some(f), out: None };
    // SAFETY: `call` outlives the synchronous dispatch.
    unsafe {
        dispatch_sync_f(
            main_queue(),
            (&raw mut call).cast(),
            trampoline::<F, T>,
        )
    };
    match call.out {
        Some(Ok(result)) => result,
        Some(Err(_)) => Err(BridgeError::Bridge("main-thread query panicked".into())),
        None => Err(BridgeError::Bridge("main-thread query did not run".into())),
    }
}

/// `hw.machine`, e.g. `iPhone15,2`. The marketing name is not exposed.
fn machine_name() -> Result<String> {
    let name = c"hw.machine";
    let mut len = 0usize;
    // SAFETY: size query, no output buffer.
    let rc = unsafe { sysctlbyname(name.as_ptr(), ptr::null_mut(), &mut len, ptr::null_mut(), 0) };
    if rc != 0 || len == 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    let mut buf = vec![0u8; len];
    // SAFETY: `buf` holds `len` writable bytes.
    let rc = unsafe {
        sysctlbyname(
            name.as_ptr(),
            buf.as_mut_ptr().cast(),
            &mut len,
            ptr::null_mut(),
            0,
        )
    };
    if rc != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    let machine = CStr::from_bytes_until_nul(&buf)
        .map_err(|e| BridgeError::Bridge(format!("hw.machine: {e}")))?;
    Ok(machine.to_string_lossy().into_owned())
}

// ---------------------------------------------------------------------------
// UI hand-off -- main dispatch queue
// ---------------------------------------------------------------------------

struct QueuedTask {
    task: UiTask,
    alive: Arc<AtomicBool>,
}

extern "C" fn run_queued(ctx: *mut c_void) {
    // SAFETY: `ctx` is the box leaked in `IosDispatcher::post`; libdispatch
    // runs each work item exactly once.
    let QueuedTask { task, alive } = *unsafe { Box::from_raw(ctx.cast::<QueuedTask>()) };
    if !alive.load(Ordering::Acquire) {
        debug!("bridge torn down; discarding UI task");
        if catch_unwind(AssertUnwindSafe(move || drop(task))).is_err() {
            error!("panic while discarding UI task");
        }
        return;
    }
    if catch_unwind(AssertUnwindSafe(task)).is_err() {
        error!("UI task panicked on the main queue");
    }
}

/// Posts tasks onto the main dispatch queue.
pub struct IosDispatcher {
    alive: Arc<AtomicBool>,
}

impl UiDispatcher for IosDispatcher {
    fn post(&self, task: UiTask) -> Result<()> {
        if !self.is_live() {
            return Err(BridgeError::ContextUnavailable);
        }
        let queued = Box::new(QueuedTask {
            task,
            alive: Arc::clone(&self.alive),
        });
        // SAFETY: ownership of the box passes to `run_queued`.
        unsafe { dispatch_async_f(main_queue(), Box::into_raw(queued).cast(), run_queued) };
        Ok(())
    }

    fn is_live(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// Alert delegate (UIAlertViewDelegate)
// ---------------------------------------------------------------------------
// `UIAlertView.delegate` is a weak reference, so live delegates are retained
// here until their alert is dismissed.

thread_local! {
    static LIVE_ALERTS: RefCell<Vec<Retained<AlertDelegate>>> = const { RefCell::new(Vec::new()) };
}

struct AlertDelegateIvars {
    /// Taken on the first callback.
    sink: RefCell<Option<ChoiceSink>>,
}

// SAFETY: declares an NSObject subclass. MainThreadOnly because UIKit only
// calls alert delegates on the main thread.
define_class! {
    #[unsafe(super(NSObject))]
    #[thread_kind = MainThreadOnly]
    #[name = "OkBridgeAlertDelegate"]
    #[ivars = AlertDelegateIvars]
    struct AlertDelegate;

    impl AlertDelegate {
        /// Called once the alert is off screen.
        #[unsafe(method(alertView:didDismissWithButtonIndex:))]
        fn did_dismiss(&self, alert: &AnyObject, index: isize) {
            // SAFETY: UIAlertView property setter on the main thread.
            unsafe {
                let _: () = msg_send![alert, setDelegate: None::<&AnyObject>];
            }

            let sink = self.ivars().sink.borrow_mut().take();
            if let Some(sink) = sink {
                let outcome = catch_unwind(AssertUnwindSafe(move || match usize::try_from(index) {
                    Ok(index) => sink.choose(index),
                    Err(_) => Err(BridgeError::InvalidChoice {
                        index: usize::MAX,
                        button_count: sink.button_count(),
                    }),
                }));
                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(error = %e, index, "alert choice rejected"),
                    Err(_) => error!("completion token panicked"),
                }
            }

            release_delegate(self);
        }
    }
}

impl AlertDelegate {
    fn new(mtm: MainThreadMarker, sink: ChoiceSink) -> Retained<Self> {
        let this = mtm.alloc::<Self>();
        let this = this.set_ivars(AlertDelegateIvars {
            sink: RefCell::new(Some(sink)),
        });
        // SAFETY: standard NSObject init via super.
        unsafe { msg_send![super(this), init] }
    }
}

/// Drop the registry's reference to `delegate`.
fn release_delegate(delegate: &AlertDelegate) {
    let released = LIVE_ALERTS.with(|live| {
        let mut live = live.borrow_mut();
        live.iter()
            .position(|d| ptr::eq(&**d, delegate))
            .map(|i| live.swap_remove(i))
    });
    if let Some(delegate) = released {
        // Still inside one of its methods; the run loop's pool releases it.
        let _ = Retained::autorelease_ptr(delegate);
    }
}

// ---------------------------------------------------------------------------
// NativeDialog -- UIAlertView
// ---------------------------------------------------------------------------

/// `UIAlertView` surface. Buttons are added in order, so UIKit's button
/// index is the caller's index. No cancel button is set, which leaves the
/// alert with no way out other than a button.
pub struct IosDialog;

impl NativeDialog for IosDialog {
    fn show_dialog(&self, layout: DialogLayout, sink: ChoiceSink) -> Result<()> {
        let mtm = require_main_thread()?;
        let class = AnyClass::get(c"UIAlertView")
            .ok_or_else(|| BridgeError::Bridge("UIAlertView is not available".into()))?;

        // SAFETY: `new` on a UIKit class returns a +1 instance.
        let alert: Retained<AnyObject> = unsafe { msg_send![class, new] };
        let title = NSString::from_str(layout.title());
        // SAFETY: documented UIAlertView setters on the main thread.
        unsafe {
            let _: () = msg_send![&*alert, setTitle: &*title];
        }
        if let Some(message) = layout.message() {
            let message = NSString::from_str(message);
            // SAFETY: as above.
            unsafe {
                let _: () = msg_send![&*alert, setMessage: &*message];
            }
        }
        for label in layout.labels() {
            let label = NSString::from_str(label);
            // SAFETY: as above; the returned index follows insertion order.
            let _: isize = unsafe { msg_send![&*alert, addButtonWithTitle: &*label] };
        }

        let delegate = AlertDelegate::new(mtm, sink);
        // SAFETY: AlertDelegate implements the UIAlertViewDelegate selector
        // used above; it is retained by LIVE_ALERTS until dismissal.
        unsafe {
            let _: () = msg_send![&*alert, setDelegate: &*delegate];
            let _: () = msg_send![&*alert, show];
        }
        LIVE_ALERTS.with(|live| live.borrow_mut().push(delegate));

        info!(layout = %layout.kind(), "iOS: UIAlertView shown");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// IosBridge
// ---------------------------------------------------------------------------

/// Concrete iOS platform bridge.
///
/// Dialog presentation may be requested from any thread. UIKit queries
/// run on the main thread, hopping there if needed.
pub struct IosBridge {
    dispatcher: Arc<IosDispatcher>,
    presenter: DialogPresenter,
}

impl IosBridge {
    /// Create a new iOS bridge instance.
    pub fn new(config: &BridgeConfig) -> Self {
        let dispatcher = Arc::new(IosDispatcher {
            alive: Arc::new(AtomicBool::new(true)),
        });
        let presenter = DialogPresenter::new(dispatcher.clone(), Arc::new(IosDialog), config);
        Self {
            dispatcher,
            presenter,
        }
    }
}

impl PlatformBridge for IosBridge {
    fn platform_name(&self) -> &str {
        "iOS"
    }

    fn dialogs(&self) -> &DialogPresenter {
        &self.presenter
    }

    fn teardown(&self) {
        info!("iOS: bridge torn down");
        self.dispatcher.alive.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// DeviceInfo -- UIDevice, UIScreen, sysctl
// ---------------------------------------------------------------------------

impl DeviceInfo for IosBridge {
    /// `"<systemName> <systemVersion>"`, e.g. `iOS 17.4`.
    fn operating_system(&self) -> Result<String> {
        on_main(|mtm| {
            // SAFETY: UIDevice accessors on the main thread.
            let (name, version): (Retained<NSString>, Retained<NSString>) = unsafe {
                let device = UIDevice::currentDevice(mtm);
                (
                    msg_send![&device, systemName],
                    msg_send![&device, systemVersion],
                )
            };
            Ok(format!("{name} {version}"))
        })
    }

    fn device_model(&self) -> Result<String> {
        machine_name()
    }

    fn display_density(&self) -> Result<f32> {
        on_main(|mtm| {
            // SAFETY: UIScreen accessors on the main thread.
            let scale: f64 = unsafe {
                let screen = UIScreen::mainScreen(mtm);
                msg_send![&screen, scale]
            };
            Ok(scale as f32)
        })
    }

    /// `identifierForVendor`, which is nil until the device is unlocked
    /// after a restart.
    fn installation_id(&self) -> Result<String> {
        on_main(|mtm| {
            // SAFETY: UIDevice / NSUUID accessors on the main thread.
            let id: Option<Retained<NSString>> = unsafe {
                let device = UIDevice::currentDevice(mtm);
                let uuid: Option<Retained<NSUUID>> = msg_send![&device, identifierForVendor];
                uuid.map(|uuid| msg_send![&uuid, UUIDString])
            };
            id.map(|id| id.to_string())
                .ok_or_else(|| BridgeError::Bridge("identifierForVendor is nil".into()))
        })
    }

    fn is_television(&self) -> Result<bool> {
        on_main(|mtm| {
            // SAFETY: UIDevice accessor on the main thread.
            let idiom: isize = unsafe {
                let device = UIDevice::currentDevice(mtm);
                msg_send![&device, userInterfaceIdiom]
            };
            Ok(idiom == IDIOM_TV)
        })
    }
}

// ---------------------------------------------------------------------------
// NativeConnectivity -- not wired up on iOS
// ---------------------------------------------------------------------------

impl NativeConnectivity for IosBridge {
    fn has_network_connection(&self) -> Result<bool> {
        warn!("iOS: connectivity queries are not implemented");
        Err(BridgeError::PlatformUnavailable)
    }

    fn is_metered_connection(&self) -> Result<bool> {
        warn!("iOS: connectivity queries are not implemented");
        Err(BridgeError::PlatformUnavailable)
    }
}

// ---------------------------------------------------------------------------
// NativeUrlOpener -- UIApplication openURL
// ---------------------------------------------------------------------------

impl NativeUrlOpener for IosBridge {
    fn open_url(&self, url: &str) -> Result<bool> {
        let url = validate_url(url)?.to_owned();
        on_main(move |mtm| {
            let app = UIApplication::sharedApplication(mtm);
            let raw = NSString::from_str(&url);
            // SAFETY: NSURL factory; returns nil for malformed strings.
            let target: Option<Retained<NSURL>> =
                unsafe { msg_send![NSURL::class(), URLWithString: &*raw] };
            let Some(target) = target else {
                return Err(BridgeError::InvalidUrl(url));
            };

            // SAFETY: UIApplication accessor on the main thread.
            let can_open: Bool = unsafe { msg_send![&app, canOpenURL: &*target] };
            if !can_open.as_bool() {
                warn!(%url, "iOS: no app accepts the URL");
                return Ok(false);
            }

            let options = NSDictionary::new();
            // SAFETY: documented UIApplication method on the main thread;
            // the completion handler is optional.
            unsafe { app.openURL_options_completionHandler(&target, &options, None) };
            info!(%url, "iOS: openURL dispatched");
            Ok(true)
        })
    }
}
