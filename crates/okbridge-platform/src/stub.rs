// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Headless bridge for desktop/CI builds where native mobile APIs are
// unavailable.
//
// Dialogs are "shown" on a dedicated UI executor thread and stay pending
// until something (a test, the demo binary, or a responder closure)
// activates one of their controls. Device queries return
// `PlatformUnavailable`; real implementations live in the `ios` and
// `android` modules.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use okbridge_core::BridgeConfig;
use okbridge_core::error::{BridgeError, Result};

use crate::executor::{UiDispatcher, UiExecutor, UiHandle};
use crate::presenter::{DialogLayout, DialogPresenter};
use crate::token::ChoiceSink;
use crate::traits::*;

/// Identifier of a dialog on the headless screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DialogId(pub Uuid);

impl DialogId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DialogId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DialogId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A dialog currently on the headless screen.
#[derive(Debug, Clone, Serialize)]
pub struct PendingDialog {
    pub id: DialogId,
    pub layout: DialogLayout,
    pub shown_at: DateTime<Utc>,
}

/// Ways a user might try to leave a modal without choosing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DismissAttempt {
    /// Back navigation (hardware back, Escape, remote "back").
    Back,
    /// Tap or click outside the dialog.
    OutsideTap,
}

/// Chooses a control for a freshly shown dialog, or `None` to leave it
/// pending.
pub type Responder = Box<dyn Fn(&DialogLayout) -> Option<usize> + Send + Sync>;

struct OnScreen {
    info: PendingDialog,
    sink: ChoiceSink,
}

#[derive(Default)]
struct Screen {
    dialogs: Mutex<Vec<OnScreen>>,
    shown: Condvar,
}

impl Screen {
    fn lock(&self) -> Result<MutexGuard<'_, Vec<OnScreen>>> {
        self.dialogs
            .lock()
            .map_err(|_| BridgeError::Bridge("headless screen lock poisoned".into()))
    }

    /// Remove a dialog; used by clicks on the UI thread.
    fn take(&self, id: DialogId) -> Option<OnScreen> {
        let mut dialogs = self.dialogs.lock().unwrap_or_else(PoisonError::into_inner);
        let pos = dialogs.iter().position(|d| d.info.id == id)?;
        Some(dialogs.remove(pos))
    }
}

/// Programmable stand-in for a native modal dialog facility.
pub struct HeadlessDialog {
    dispatcher: Arc<dyn UiDispatcher>,
    screen: Arc<Screen>,
    responder: Option<Responder>,
}

impl HeadlessDialog {
    /// `dispatcher` must reach the same UI context the presenter posts to;
    /// simulated clicks are delivered through it.
    pub fn new(dispatcher: Arc<dyn UiDispatcher>) -> Self {
        Self {
            dispatcher,
            screen: Arc::new(Screen::default()),
            responder: None,
        }
    }

    /// Answer dialogs automatically as they are shown.
    pub fn with_responder(
        mut self,
        responder: impl Fn(&DialogLayout) -> Option<usize> + Send + Sync + 'static,
    ) -> Self {
        self.responder = Some(Box::new(responder));
        self
    }

    /// Dialogs currently on screen, oldest first.
    pub fn pending(&self) -> Result<Vec<PendingDialog>> {
        Ok(self.screen.lock()?.iter().map(|d| d.info.clone()).collect())
    }

    /// Block until at least one dialog is on screen and return the oldest,
    /// or `None` after `timeout`.
    pub fn wait_for_pending(&self, timeout: Duration) -> Result<Option<PendingDialog>> {
        let guard = self.screen.lock()?;
        let (guard, _) = self
            .screen
            .shown
            .wait_timeout_while(guard, timeout, |dialogs| dialogs.is_empty())
            .map_err(|_| BridgeError::Bridge("headless screen lock poisoned".into()))?;
        Ok(guard.first().map(|d| d.info.clone()))
    }

    /// Simulate the user activating control `index` of dialog `id`.
    ///
    /// The click is delivered on the UI context. Only the first click on a
    /// dialog resolves it; later clicks that were already queued are
    /// ignored.
    pub fn choose(&self, id: DialogId, index: usize) -> Result<()> {
        {
            let dialogs = self.screen.lock()?;
            let entry = dialogs
                .iter()
                .find(|d| d.info.id == id)
                .ok_or_else(|| BridgeError::UnknownDialog(id.to_string()))?;
            let button_count = entry.sink.button_count();
            if index >= button_count {
                return Err(BridgeError::InvalidChoice {
                    index,
                    button_count,
                });
            }
        }

        let screen = Arc::clone(&self.screen);
        self.dispatcher.post(Box::new(move || match screen.take(id) {
            Some(on_screen) => {
                info!(dialog = %id, index, "headless dialog resolved");
                if let Err(e) = on_screen.sink.choose(index) {
                    warn!(dialog = %id, error = %e, "headless dialog rejected choice");
                }
            }
            None => debug!(dialog = %id, "dialog already resolved; click ignored"),
        }))
    }

    /// Take every dialog off screen without resolving it. Their tokens
    /// are abandoned. Returns how many were discarded.
    pub fn discard_all(&self) -> usize {
        let discarded: Vec<OnScreen> = {
            let mut dialogs = self
                .screen
                .dialogs
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            dialogs.drain(..).collect()
        };
        self.screen.shown.notify_all();
        let count = discarded.len();
        for on_screen in discarded {
            debug!(dialog = %on_screen.info.id, "discarding unanswered dialog");
        }
        count
    }

    /// Try to leave dialog `id` without choosing. Always refused: dialogs
    /// are non-cancelable. Returns whether the dialog was dismissed.
    pub fn dismiss(&self, id: DialogId, attempt: DismissAttempt) -> bool {
        info!(dialog = %id, ?attempt, "dismissal ignored on non-cancelable dialog");
        false
    }
}

impl NativeDialog for HeadlessDialog {
    fn show_dialog(&self, layout: DialogLayout, sink: ChoiceSink) -> Result<()> {
        let info = PendingDialog {
            id: DialogId::new(),
            layout,
            shown_at: Utc::now(),
        };
        let id = info.id;
        info!(
            dialog = %id,
            token = %sink.token_id(),
            layout = %info.layout.kind(),
            title = info.layout.title(),
            "headless dialog shown"
        );

        let button_count = sink.button_count();
        let auto = self
            .responder
            .as_ref()
            .and_then(|r| r(&info.layout))
            .filter(|&index| {
                let valid = index < button_count;
                if !valid {
                    warn!(
                        dialog = %id,
                        index,
                        button_count,
                        "responder index out of range; dialog left pending"
                    );
                }
                valid
            });

        self.screen.lock()?.push(OnScreen { info, sink });
        self.screen.shown.notify_all();

        if let Some(index) = auto {
            self.choose(id, index)?;
        }
        Ok(())
    }
}

/// Bridge used on desktop and CI: a UI executor thread plus a headless
/// dialog surface.
pub struct StubBridge {
    executor: UiExecutor,
    dialogs: Arc<HeadlessDialog>,
    presenter: DialogPresenter,
}

impl StubBridge {
    pub fn new(config: &BridgeConfig) -> Result<Self> {
        Self::build(config, HeadlessDialog::new)
    }

    /// Bridge whose dialogs are answered by `responder` as they appear.
    pub fn with_responder(
        config: &BridgeConfig,
        responder: impl Fn(&DialogLayout) -> Option<usize> + Send + Sync + 'static,
    ) -> Result<Self> {
        Self::build(config, |dispatcher| {
            HeadlessDialog::new(dispatcher).with_responder(responder)
        })
    }

    fn build(
        config: &BridgeConfig,
        surface: impl FnOnce(Arc<dyn UiDispatcher>) -> HeadlessDialog,
    ) -> Result<Self> {
        let executor = UiExecutor::spawn(config)?;
        let dialogs = Arc::new(surface(executor.dispatcher()));
        let presenter = DialogPresenter::new(executor.dispatcher(), dialogs.clone(), config);
        Ok(Self {
            executor,
            dialogs,
            presenter,
        })
    }

    /// The headless screen, for driving user interaction.
    pub fn headless(&self) -> &HeadlessDialog {
        &self.dialogs
    }

    pub fn ui_handle(&self) -> UiHandle {
        self.executor.handle()
    }
}

impl PlatformBridge for StubBridge {
    fn platform_name(&self) -> &str {
        "Desktop (stub)"
    }

    fn dialogs(&self) -> &DialogPresenter {
        &self.presenter
    }

    fn teardown(&self) {
        self.executor.teardown();
        let discarded = self.dialogs.discard_all();
        if discarded > 0 {
            info!(discarded, "headless dialogs discarded on teardown");
        }
    }
}

impl DeviceInfo for StubBridge {
    fn operating_system(&self) -> Result<String> {
        warn!("DeviceInfo::operating_system called on stub bridge");
        Err(BridgeError::PlatformUnavailable)
    }

    fn device_model(&self) -> Result<String> {
        warn!("DeviceInfo::device_model called on stub bridge");
        Err(BridgeError::PlatformUnavailable)
    }

    fn display_density(&self) -> Result<f32> {
        Err(BridgeError::PlatformUnavailable)
    }

    fn installation_id(&self) -> Result<String> {
        Err(BridgeError::PlatformUnavailable)
    }

    fn is_television(&self) -> Result<bool> {
        Err(BridgeError::PlatformUnavailable)
    }
}

impl NativeConnectivity for StubBridge {
    fn has_network_connection(&self) -> Result<bool> {
        warn!("NativeConnectivity::has_network_connection called on stub bridge");
        Err(BridgeError::PlatformUnavailable)
    }

    fn is_metered_connection(&self) -> Result<bool> {
        Err(BridgeError::PlatformUnavailable)
    }
}

impl NativeUrlOpener for StubBridge {
    fn open_url(&self, url: &str) -> Result<bool> {
        validate_url(url)?;
        warn!(url, "NativeUrlOpener::open_url called on stub bridge");
        Err(BridgeError::PlatformUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    use okbridge_core::{DialogRequest, ListTitleSource};

    use crate::token::CompletionToken;

    const WAIT: Duration = Duration::from_secs(5);

    fn bridge() -> StubBridge {
        StubBridge::new(&BridgeConfig::default()).expect("stub bridge")
    }

    fn channel_token() -> (CompletionToken, mpsc::Receiver<usize>) {
        let (tx, rx) = mpsc::channel();
        (CompletionToken::new(move |i| tx.send(i).unwrap()), rx)
    }

    /// Block the UI thread until the returned sender is dropped.
    fn park_ui(bridge: &StubBridge) -> mpsc::Sender<()> {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (parked_tx, parked_rx) = mpsc::channel();
        bridge
            .ui_handle()
            .post(Box::new(move || {
                parked_tx.send(()).unwrap();
                let _ = release_rx.recv();
            }))
            .unwrap();
        parked_rx.recv_timeout(WAIT).unwrap();
        release_tx
    }

    #[test]
    fn dialog_stays_pending_until_chosen() {
        let bridge = bridge();
        let (token, rx) = channel_token();
        bridge
            .dialogs()
            .present_parts("Info", "OK?", ["OK"], token)
            .unwrap();

        let shown = bridge
            .headless()
            .wait_for_pending(WAIT)
            .unwrap()
            .expect("dialog shown");
        assert!(rx.try_recv().is_err());

        bridge.headless().choose(shown.id, 0).unwrap();
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), 0);
    }

    #[test]
    fn dismissal_is_refused() {
        let bridge = bridge();
        let (token, rx) = channel_token();
        bridge
            .dialogs()
            .present_parts("Delete?", "This cannot be undone", ["Delete", "Cancel"], token)
            .unwrap();
        let shown = bridge.headless().wait_for_pending(WAIT).unwrap().unwrap();

        assert!(!bridge.headless().dismiss(shown.id, DismissAttempt::Back));
        assert!(!bridge.headless().dismiss(shown.id, DismissAttempt::OutsideTap));
        assert_eq!(bridge.headless().pending().unwrap().len(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn second_click_is_ignored() {
        let bridge = bridge();
        let (token, rx) = channel_token();
        bridge
            .dialogs()
            .present_parts("Pick", "Choose one", ["Red", "Green", "Blue"], token)
            .unwrap();
        let shown = bridge.headless().wait_for_pending(WAIT).unwrap().unwrap();

        // Both clicks are accepted for delivery; only the first resolves.
        let parked = park_ui(&bridge);
        bridge.headless().choose(shown.id, 2).unwrap();
        bridge.headless().choose(shown.id, 0).unwrap();
        drop(parked);

        assert_eq!(rx.recv_timeout(WAIT).unwrap(), 2);

        // A click after resolution finds no dialog.
        let (done_tx, done_rx) = mpsc::channel();
        bridge
            .ui_handle()
            .post(Box::new(move || done_tx.send(()).unwrap()))
            .unwrap();
        done_rx.recv_timeout(WAIT).unwrap();
        assert!(rx.try_recv().is_err());
        assert!(matches!(
            bridge.headless().choose(shown.id, 1),
            Err(BridgeError::UnknownDialog(_))
        ));
    }

    #[test]
    fn out_of_range_click_is_rejected() {
        let bridge = bridge();
        let (token, _rx) = channel_token();
        bridge
            .dialogs()
            .present_parts("Info", "OK?", ["OK"], token)
            .unwrap();
        let shown = bridge.headless().wait_for_pending(WAIT).unwrap().unwrap();

        assert!(matches!(
            bridge.headless().choose(shown.id, 1),
            Err(BridgeError::InvalidChoice {
                index: 1,
                button_count: 1
            })
        ));
        assert_eq!(bridge.headless().pending().unwrap().len(), 1);
    }

    #[test]
    fn responder_answers_automatically() {
        let bridge = StubBridge::with_responder(&BridgeConfig::default(), |layout| {
            Some(layout.button_count() - 1)
        })
        .unwrap();
        let (token, rx) = channel_token();
        bridge
            .dialogs()
            .present_parts("Pick", "Choose one", ["Red", "Green", "Blue", "Cyan"], token)
            .unwrap();
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), 3);
    }

    #[test]
    fn wait_for_pending_times_out_when_empty() {
        let bridge = bridge();
        let none = bridge
            .headless()
            .wait_for_pending(Duration::from_millis(20))
            .unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn device_queries_are_unavailable() {
        let bridge = bridge();
        assert!(matches!(
            bridge.operating_system(),
            Err(BridgeError::PlatformUnavailable)
        ));
        assert!(matches!(
            bridge.open_url(" "),
            Err(BridgeError::InvalidUrl(_))
        ));
        assert!(matches!(
            bridge.open_url("https://example.org"),
            Err(BridgeError::PlatformUnavailable)
        ));

        let snapshot = bridge.snapshot();
        assert_eq!(snapshot.platform, "Desktop (stub)");
        assert!(snapshot.operating_system.is_none());
        assert!(snapshot.is_television.is_none());
    }

    #[test]
    fn out_of_range_responder_leaves_dialog_pending() {
        let bridge = StubBridge::with_responder(&BridgeConfig::default(), |_| Some(5)).unwrap();
        let request = DialogRequest::new("Info", "OK?", ["OK"]).unwrap();
        let layout = DialogLayout::for_request(request, ListTitleSource::Message);
        let (token, rx) = channel_token();

        bridge
            .headless()
            .show_dialog(layout, ChoiceSink::new(token, 1))
            .unwrap();
        let pending = bridge.headless().pending().unwrap();
        assert_eq!(pending.len(), 1);

        bridge.headless().choose(pending[0].id, 0).unwrap();
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), 0);
    }

    #[test]
    fn teardown_abandons_dialogs_on_screen() {
        let bridge = bridge();
        let (abandoned_tx, abandoned_rx) = mpsc::channel();
        let token = CompletionToken::new(|_| panic!("invoked after teardown"))
            .with_abandon_hook(move |id| abandoned_tx.send(id).unwrap());
        let token_id = token.id();
        bridge
            .dialogs()
            .present_parts("Info", "OK?", ["OK"], token)
            .unwrap();
        let shown = bridge.headless().wait_for_pending(WAIT).unwrap().unwrap();

        bridge.teardown();

        assert_eq!(abandoned_rx.recv_timeout(WAIT).unwrap(), token_id);
        assert!(bridge.headless().pending().unwrap().is_empty());
        assert!(matches!(
            bridge.headless().choose(shown.id, 0),
            Err(BridgeError::UnknownDialog(_))
        ));
    }

    #[tokio::test]
    async fn teardown_releases_oneshot_waiter() {
        let bridge = bridge();
        let (token, rx) = CompletionToken::oneshot();
        bridge
            .dialogs()
            .present_parts("Delete?", "Sure?", ["Delete", "Cancel"], token)
            .unwrap();
        bridge.headless().wait_for_pending(WAIT).unwrap().unwrap();

        bridge.teardown();

        let outcome = tokio::time::timeout(WAIT, rx).await.unwrap();
        assert!(outcome.is_err());
    }

    #[test]
    fn teardown_refuses_new_presentations() {
        let bridge = bridge();
        bridge.teardown();
        let (token, rx) = channel_token();
        let err = bridge
            .dialogs()
            .present_parts("Info", "OK?", ["OK"], token)
            .unwrap_err();
        assert!(matches!(err, BridgeError::ContextUnavailable));
        assert!(rx.try_recv().is_err());
    }
}
