// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Android platform bridge via JNI.
//
// Requires the Android NDK and targets `aarch64-linux-android` or
// `armv7-linux-androideabi`. Device queries call the Android SDK directly
// through JNI. Dialogs need Java-side listeners, so they go through the
// small glue class `org.okbridge.DialogHelper` shipped in
// `android/java/` next to this crate; the host app must compile it in.
//
// ## Handle protocol
//
// Rust objects that cross into Java travel as `long` handles produced by
// `Box::into_raw`:
//
// - UI tasks: `DialogHelper.post(activity, task)` queues the task on the
//   main looper. Java hands it back exactly once, to `nativeRunTask` if the
//   activity is still alive when the looper gets to it, or to
//   `nativeDiscardTask` otherwise.
// - Choice sinks: `DialogHelper.showList` / `showActions` build a
//   non-cancelable `AlertDialog`. Java hands the sink back exactly once, to
//   `nativeOnChoice(sink, which)` on click or `nativeDiscardChoice(sink)` if
//   the dialog goes away unanswered (activity teardown).
//
// If the JNI call that transfers a handle fails, the handle is leaked
// rather than reclaimed: Java may already own it.

#![cfg(target_os = "android")]

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use jni::objects::{JClass, JObject, JObjectArray, JString, JValue};
use jni::sys::{jint, jlong, jsize};
use jni::{JNIEnv, JavaVM};
use tracing::{debug, error, info, warn};

use okbridge_core::BridgeConfig;
use okbridge_core::error::{BridgeError, Result};

use crate::executor::{UiDispatcher, UiTask};
use crate::presenter::{DialogLayout, DialogPresenter};
use crate::token::ChoiceSink;
use crate::traits::*;

// ---------------------------------------------------------------------------
// JNI bootstrap helpers
// ---------------------------------------------------------------------------

/// Binary name of the Java glue class.
const HELPER_CLASS: &str = "org.okbridge.DialogHelper";

/// `Configuration.UI_MODE_TYPE_TELEVISION`.
const UI_MODE_TYPE_TELEVISION: jint = 4;

/// `ConnectivityManager.TYPE_MOBILE`.
const TYPE_MOBILE: jint = 0;

/// `Intent.FLAG_ACTIVITY_NEW_TASK`.
const FLAG_ACTIVITY_NEW_TASK: jint = 0x1000_0000;

/// Convenience: map any `jni::errors::Error` into `BridgeError::Bridge`.
fn jni_err(context: &str, e: jni::errors::Error) -> BridgeError {
    BridgeError::Bridge(format!("{context}: {e}"))
}

/// Run `f` with a [`JNIEnv`] for the current thread and the hosting
/// `Activity`.
///
/// The `JavaVM*` and activity `jobject` come from
/// `ndk_context::android_context()`, set by `android_main` or
/// `ANativeActivity_onCreate`. The current thread is attached if needed.
/// A Java exception left pending by `f` is logged and cleared.
fn with_env<T>(f: impl FnOnce(&mut JNIEnv<'_>, &JObject<'static>) -> Result<T>) -> Result<T> {
    let ctx = ndk_context::android_context();
    if ctx.context().is_null() {
        return Err(BridgeError::ContextUnavailable);
    }
    // SAFETY: `ctx.vm()` returns the `JavaVM*` set by the NDK glue code.
    // The pointer is guaranteed valid for the lifetime of the process.
    let vm = unsafe { JavaVM::from_raw(ctx.vm().cast()) }
        .map_err(|e| jni_err("failed to obtain JavaVM", e))?;
    let mut env = vm
        .attach_current_thread()
        .map_err(|e| jni_err("failed to attach JNI thread", e))?;
    // SAFETY: the NDK guarantees this pointer is a valid global jobject for
    // the hosting Activity.
    let activity = unsafe { JObject::from_raw(ctx.context().cast()) };

    let result = f(&mut env, &activity);
    if result.is_err() && env.exception_check().unwrap_or(false) {
        let _ = env.exception_describe();
        let _ = env.exception_clear();
    }
    result
}

/// Load the glue class through the activity's class loader. `FindClass`
/// on a natively attached thread only sees system classes.
fn helper_class<'local>(env: &mut JNIEnv<'local>, activity: &JObject) -> Result<JClass<'local>> {
    let loader = env
        .call_method(activity, "getClassLoader", "()Ljava/lang/ClassLoader;", &[])
        .map_err(|e| jni_err("getClassLoader", e))?
        .l()
        .map_err(|e| jni_err("getClassLoader->l", e))?;
    let name = env
        .new_string(HELPER_CLASS)
        .map_err(|e| jni_err("new_string(helper class)", e))?;
    let class = env
        .call_method(
            &loader,
            "loadClass",
            "(Ljava/lang/String;)Ljava/lang/Class;",
            &[JValue::Object(&name)],
        )
        .map_err(|e| jni_err("loadClass(DialogHelper)", e))?
        .l()
        .map_err(|e| jni_err("loadClass->l", e))?;
    Ok(JClass::from(class))
}

/// Read a Java string into Rust. Null becomes an error.
fn rust_string(env: &mut JNIEnv<'_>, obj: JObject<'_>, what: &str) -> Result<String> {
    if obj.is_null() {
        return Err(BridgeError::Bridge(format!("{what} returned null")));
    }
    let jstr = JString::from(obj);
    let value: String = env
        .get_string(&jstr)
        .map_err(|e| jni_err(what, e))?
        .into();
    Ok(value)
}

fn string_array<'local>(env: &mut JNIEnv<'local>, items: &[String]) -> Result<JObjectArray<'local>> {
    let len = jsize::try_from(items.len())
        .map_err(|_| BridgeError::Bridge("too many dialog items".into()))?;
    let array = env
        .new_object_array(len, "java/lang/String", JObject::null())
        .map_err(|e| jni_err("new_object_array", e))?;
    for (i, item) in items.iter().enumerate() {
        let value = env
            .new_string(item)
            .map_err(|e| jni_err("new_string(item)", e))?;
        env.set_object_array_element(&array, i as jsize, &value)
            .map_err(|e| jni_err("set_object_array_element", e))?;
    }
    Ok(array)
}

/// `activity.getSystemService(name)`.
fn system_service<'local>(
    env: &mut JNIEnv<'local>,
    activity: &JObject,
    name: &str,
) -> Result<JObject<'local>> {
    let j_name = env
        .new_string(name)
        .map_err(|e| jni_err("new_string(service)", e))?;
    env.call_method(
        activity,
        "getSystemService",
        "(Ljava/lang/String;)Ljava/lang/Object;",
        &[JValue::Object(&j_name)],
    )
    .map_err(|e| jni_err("getSystemService", e))?
    .l()
    .map_err(|e| jni_err("getSystemService->l", e))
}

/// `ConnectivityManager.getActiveNetworkInfo()`, which may be null.
fn active_network<'local>(env: &mut JNIEnv<'local>, activity: &JObject) -> Result<JObject<'local>> {
    let manager = system_service(env, activity, "connectivity")?;
    env.call_method(
        &manager,
        "getActiveNetworkInfo",
        "()Landroid/net/NetworkInfo;",
        &[],
    )
    .map_err(|e| jni_err("getActiveNetworkInfo", e))?
    .l()
    .map_err(|e| jni_err("getActiveNetworkInfo->l", e))
}

fn is_connected(env: &mut JNIEnv<'_>, info: &JObject) -> Result<bool> {
    if info.is_null() {
        return Ok(false);
    }
    env.call_method(info, "isConnected", "()Z", &[])
        .map_err(|e| jni_err("NetworkInfo.isConnected", e))?
        .z()
        .map_err(|e| jni_err("isConnected->z", e))
}

// ---------------------------------------------------------------------------
// UI hand-off -- Handler(mainLooper).post via DialogHelper
// ---------------------------------------------------------------------------

/// Posts tasks onto the activity's main looper.
pub struct AndroidDispatcher {
    alive: AtomicBool,
}

impl AndroidDispatcher {
    fn new() -> Self {
        Self {
            alive: AtomicBool::new(true),
        }
    }

    fn teardown(&self) {
        self.alive.store(false, Ordering::Release);
    }
}

impl UiDispatcher for AndroidDispatcher {
    fn post(&self, task: UiTask) -> Result<()> {
        if !self.is_live() {
            return Err(BridgeError::ContextUnavailable);
        }
        let accepted = with_env(move |env, activity| {
            let class = helper_class(env, activity)?;
            let handle = Box::into_raw(Box::new(task)) as jlong;
            match env.call_static_method(
                &class,
                "post",
                "(Landroid/app/Activity;J)Z",
                &[JValue::Object(activity), JValue::Long(handle)],
            ) {
                Ok(value) => value.z().map_err(|e| jni_err("DialogHelper.post->z", e)),
                Err(e) => {
                    error!(error = %e, "DialogHelper.post failed; UI task leaked");
                    Err(jni_err("DialogHelper.post", e))
                }
            }
        })?;

        if accepted {
            Ok(())
        } else {
            // Java already handed the task to nativeDiscardTask.
            debug!("main looper refused task; activity finishing");
            Err(BridgeError::ContextUnavailable)
        }
    }

    fn is_live(&self) -> bool {
        self.alive.load(Ordering::Acquire) && !ndk_context::android_context().context().is_null()
    }
}

// ---------------------------------------------------------------------------
// NativeDialog -- android.app.AlertDialog via DialogHelper
// ---------------------------------------------------------------------------

/// `AlertDialog` surface. Runs on the main looper only.
pub struct AndroidDialog;

impl NativeDialog for AndroidDialog {
    fn show_dialog(&self, layout: DialogLayout, sink: ChoiceSink) -> Result<()> {
        with_env(move |env, activity| {
            let class = helper_class(env, activity)?;
            let title = env
                .new_string(layout.title())
                .map_err(|e| jni_err("new_string(title)", e))?;

            let shown = match &layout {
                DialogLayout::List { items, .. } => {
                    let items = string_array(env, items)?;
                    let handle = Box::into_raw(Box::new(sink)) as jlong;
                    env.call_static_method(
                        &class,
                        "showList",
                        "(Landroid/app/Activity;Ljava/lang/String;[Ljava/lang/String;J)V",
                        &[
                            JValue::Object(activity),
                            JValue::Object(&title),
                            JValue::Object(&items),
                            JValue::Long(handle),
                        ],
                    )
                }
                DialogLayout::Actions {
                    message,
                    affirmative,
                    dismissive,
                    ..
                } => {
                    let message = env
                        .new_string(message)
                        .map_err(|e| jni_err("new_string(message)", e))?;
                    let positive = env
                        .new_string(affirmative)
                        .map_err(|e| jni_err("new_string(affirmative)", e))?;
                    let negative: JObject = match dismissive {
                        Some(label) => env
                            .new_string(label)
                            .map_err(|e| jni_err("new_string(dismissive)", e))?
                            .into(),
                        None => JObject::null(),
                    };
                    let handle = Box::into_raw(Box::new(sink)) as jlong;
                    env.call_static_method(
                        &class,
                        "showActions",
                        "(Landroid/app/Activity;Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;J)V",
                        &[
                            JValue::Object(activity),
                            JValue::Object(&title),
                            JValue::Object(&message),
                            JValue::Object(&positive),
                            JValue::Object(&negative),
                            JValue::Long(handle),
                        ],
                    )
                }
            };

            shown.map_err(|e| {
                error!(error = %e, "AlertDialog not shown; choice handle leaked");
                jni_err("DialogHelper.show", e)
            })?;
            info!(layout = %layout.kind(), "Android: AlertDialog shown");
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------
// Native entry points called by DialogHelper
// ---------------------------------------------------------------------------

/// Run a task handed back by `DialogHelper.post` on the main looper.
#[unsafe(no_mangle)]
pub extern "system" fn Java_org_okbridge_DialogHelper_nativeRunTask(
    _env: JNIEnv,
    _class: JClass,
    task: jlong,
) {
    if task == 0 {
        return;
    }
    // SAFETY: produced by `Box::into_raw` in `AndroidDispatcher::post`;
    // Java returns each handle exactly once.
    let task: Box<UiTask> = unsafe { Box::from_raw(task as *mut UiTask) };
    if catch_unwind(AssertUnwindSafe(move || (*task)())).is_err() {
        error!("UI task panicked on the main looper");
    }
}

/// Release a task the main looper will never run.
#[unsafe(no_mangle)]
pub extern "system" fn Java_org_okbridge_DialogHelper_nativeDiscardTask(
    _env: JNIEnv,
    _class: JClass,
    task: jlong,
) {
    if task == 0 {
        return;
    }
    // SAFETY: as in `nativeRunTask`.
    let task: Box<UiTask> = unsafe { Box::from_raw(task as *mut UiTask) };
    debug!("discarding UI task; activity gone");
    if catch_unwind(AssertUnwindSafe(move || drop(task))).is_err() {
        error!("panic while discarding UI task");
    }
}

/// Deliver the index of the control the user activated.
#[unsafe(no_mangle)]
pub extern "system" fn Java_org_okbridge_DialogHelper_nativeOnChoice(
    _env: JNIEnv,
    _class: JClass,
    sink: jlong,
    which: jint,
) {
    if sink == 0 {
        return;
    }
    // SAFETY: produced by `Box::into_raw` in `AndroidDialog::show_dialog`;
    // Java returns each handle exactly once.
    let sink: Box<ChoiceSink> = unsafe { Box::from_raw(sink as *mut ChoiceSink) };
    let outcome = catch_unwind(AssertUnwindSafe(move || match usize::try_from(which) {
        Ok(index) => sink.choose(index),
        Err(_) => Err(BridgeError::InvalidChoice {
            index: usize::MAX,
            button_count: sink.button_count(),
        }),
    }));
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, which, "dialog choice rejected"),
        Err(_) => error!("completion token panicked"),
    }
}

/// Release a sink whose dialog went away unanswered.
#[unsafe(no_mangle)]
pub extern "system" fn Java_org_okbridge_DialogHelper_nativeDiscardChoice(
    _env: JNIEnv,
    _class: JClass,
    sink: jlong,
) {
    if sink == 0 {
        return;
    }
    // SAFETY: as in `nativeOnChoice`.
    let sink: Box<ChoiceSink> = unsafe { Box::from_raw(sink as *mut ChoiceSink) };
    debug!(token = %sink.token_id(), "dialog dismissed without a choice");
    if catch_unwind(AssertUnwindSafe(move || drop(sink))).is_err() {
        error!("panic while discarding dialog choice");
    }
}

// ---------------------------------------------------------------------------
// Bridge struct
// ---------------------------------------------------------------------------

/// Android implementation of the platform bridge.
///
/// Holds no JNI state; every call resolves the VM and activity through
/// `ndk_context`.
pub struct AndroidBridge {
    dispatcher: Arc<AndroidDispatcher>,
    presenter: DialogPresenter,
}

impl AndroidBridge {
    /// Create a new Android bridge.
    ///
    /// This does **not** touch JNI; the first JNI call happens lazily.
    pub fn new(config: &BridgeConfig) -> Self {
        let dispatcher = Arc::new(AndroidDispatcher::new());
        let presenter = DialogPresenter::new(dispatcher.clone(), Arc::new(AndroidDialog), config);
        Self {
            dispatcher,
            presenter,
        }
    }
}

impl PlatformBridge for AndroidBridge {
    fn platform_name(&self) -> &str {
        "Android"
    }

    fn dialogs(&self) -> &DialogPresenter {
        &self.presenter
    }

    fn teardown(&self) {
        info!("Android: bridge torn down");
        self.dispatcher.teardown();
    }
}

// ---------------------------------------------------------------------------
// DeviceInfo -- android.os.Build, DisplayMetrics, Settings.Secure, UiModeManager
// ---------------------------------------------------------------------------

impl DeviceInfo for AndroidBridge {
    fn operating_system(&self) -> Result<String> {
        with_env(|env, _activity| {
            let release = env
                .get_static_field("android/os/Build$VERSION", "RELEASE", "Ljava/lang/String;")
                .map_err(|e| jni_err("Build.VERSION.RELEASE", e))?
                .l()
                .map_err(|e| jni_err("RELEASE->l", e))?;
            let release = rust_string(env, release, "Build.VERSION.RELEASE")?;
            Ok(format!("Android {release}"))
        })
    }

    fn device_model(&self) -> Result<String> {
        with_env(|env, _activity| {
            let model = env
                .get_static_field("android/os/Build", "MODEL", "Ljava/lang/String;")
                .map_err(|e| jni_err("Build.MODEL", e))?
                .l()
                .map_err(|e| jni_err("MODEL->l", e))?;
            rust_string(env, model, "Build.MODEL")
        })
    }

    fn display_density(&self) -> Result<f32> {
        with_env(|env, activity| {
            let resources = env
                .call_method(activity, "getResources", "()Landroid/content/res/Resources;", &[])
                .map_err(|e| jni_err("getResources", e))?
                .l()
                .map_err(|e| jni_err("getResources->l", e))?;
            let metrics = env
                .call_method(&resources, "getDisplayMetrics", "()Landroid/util/DisplayMetrics;", &[])
                .map_err(|e| jni_err("getDisplayMetrics", e))?
                .l()
                .map_err(|e| jni_err("getDisplayMetrics->l", e))?;
            env.get_field(&metrics, "density", "F")
                .map_err(|e| jni_err("DisplayMetrics.density", e))?
                .f()
                .map_err(|e| jni_err("density->f", e))
        })
    }

    fn installation_id(&self) -> Result<String> {
        with_env(|env, activity| {
            let resolver = env
                .call_method(
                    activity,
                    "getContentResolver",
                    "()Landroid/content/ContentResolver;",
                    &[],
                )
                .map_err(|e| jni_err("getContentResolver", e))?
                .l()
                .map_err(|e| jni_err("getContentResolver->l", e))?;
            let key = env
                .new_string("android_id")
                .map_err(|e| jni_err("new_string(android_id)", e))?;
            let id = env
                .call_static_method(
                    "android/provider/Settings$Secure",
                    "getString",
                    "(Landroid/content/ContentResolver;Ljava/lang/String;)Ljava/lang/String;",
                    &[JValue::Object(&resolver), JValue::Object(&key)],
                )
                .map_err(|e| jni_err("Settings.Secure.getString", e))?
                .l()
                .map_err(|e| jni_err("getString->l", e))?;
            rust_string(env, id, "Settings.Secure.ANDROID_ID")
        })
    }

    fn is_television(&self) -> Result<bool> {
        with_env(|env, activity| {
            let ui_mode = system_service(env, activity, "uimode")?;
            if ui_mode.is_null() {
                return Ok(false);
            }
            let mode = env
                .call_method(&ui_mode, "getCurrentModeType", "()I", &[])
                .map_err(|e| jni_err("UiModeManager.getCurrentModeType", e))?
                .i()
                .map_err(|e| jni_err("getCurrentModeType->i", e))?;
            Ok(mode == UI_MODE_TYPE_TELEVISION)
        })
    }
}

// ---------------------------------------------------------------------------
// NativeConnectivity -- android.net.ConnectivityManager
// ---------------------------------------------------------------------------

impl NativeConnectivity for AndroidBridge {
    fn has_network_connection(&self) -> Result<bool> {
        with_env(|env, activity| {
            let info = active_network(env, activity)?;
            is_connected(env, &info)
        })
    }

    fn is_metered_connection(&self) -> Result<bool> {
        with_env(|env, activity| {
            let info = active_network(env, activity)?;
            if !is_connected(env, &info)? {
                return Ok(false);
            }
            let kind = env
                .call_method(&info, "getType", "()I", &[])
                .map_err(|e| jni_err("NetworkInfo.getType", e))?
                .i()
                .map_err(|e| jni_err("getType->i", e))?;
            Ok(kind == TYPE_MOBILE)
        })
    }
}

// ---------------------------------------------------------------------------
// NativeUrlOpener -- Intent.ACTION_VIEW
// ---------------------------------------------------------------------------

impl NativeUrlOpener for AndroidBridge {
    fn open_url(&self, url: &str) -> Result<bool> {
        let url = validate_url(url)?;
        with_env(|env, activity| {
            let j_url = env
                .new_string(url)
                .map_err(|e| jni_err("new_string(url)", e))?;
            let uri = env
                .call_static_method(
                    "android/net/Uri",
                    "parse",
                    "(Ljava/lang/String;)Landroid/net/Uri;",
                    &[JValue::Object(&j_url)],
                )
                .map_err(|e| jni_err("Uri.parse", e))?
                .l()
                .map_err(|e| jni_err("Uri.parse->l", e))?;
            let j_action = env
                .new_string("android.intent.action.VIEW")
                .map_err(|e| jni_err("new_string(ACTION_VIEW)", e))?;
            let intent = env
                .new_object(
                    "android/content/Intent",
                    "(Ljava/lang/String;Landroid/net/Uri;)V",
                    &[JValue::Object(&j_action), JValue::Object(&uri)],
                )
                .map_err(|e| jni_err("new Intent", e))?;
            env.call_method(
                &intent,
                "addFlags",
                "(I)Landroid/content/Intent;",
                &[JValue::Int(FLAG_ACTIVITY_NEW_TASK)],
            )
            .map_err(|e| jni_err("addFlags", e))?;

            match env.call_method(
                activity,
                "startActivity",
                "(Landroid/content/Intent;)V",
                &[JValue::Object(&intent)],
            ) {
                Ok(_) => {
                    info!(url, "Android: ACTION_VIEW intent dispatched");
                    Ok(true)
                }
                Err(jni::errors::Error::JavaException) => {
                    // Typically ActivityNotFoundException: nothing handles it.
                    let _ = env.exception_clear();
                    warn!(url, "Android: no activity accepted the URL");
                    Ok(false)
                }
                Err(e) => Err(jni_err("startActivity(ACTION_VIEW)", e)),
            }
        })
    }
}
