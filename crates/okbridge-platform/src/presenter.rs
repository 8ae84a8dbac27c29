// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Dialog presenter.
//
// Accepts a dialog request from any thread, posts its presentation onto
// the UI-owning context, and hands the platform surface a single-use sink
// wired to the caller's completion token.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument, warn};

use okbridge_core::error::{BridgeError, Result};
use okbridge_core::{BridgeConfig, ButtonLayout, DialogRequest, ListTitleSource};

use crate::executor::UiDispatcher;
use crate::token::{ChoiceSink, CompletionToken};
use crate::traits::NativeDialog;

/// Concrete widget plan for one dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "layout", rename_all = "snake_case")]
pub enum DialogLayout {
    /// Selectable list; item `i` reports index `i`.
    List { title: String, items: Vec<String> },
    /// Affirmative control reports 0, the optional dismissive control 1.
    Actions {
        title: String,
        message: String,
        affirmative: String,
        dismissive: Option<String>,
    },
}

impl DialogLayout {
    /// Apply the button layout policy to a request.
    pub fn for_request(request: DialogRequest, list_title: ListTitleSource) -> Self {
        let kind = request.layout();
        let (title, message, buttons) = request.into_parts();
        match kind {
            ButtonLayout::List => Self::List {
                title: match list_title {
                    ListTitleSource::Message => message,
                    ListTitleSource::Title => title,
                },
                items: buttons,
            },
            ButtonLayout::Single | ButtonLayout::Dual => {
                let mut labels = buttons.into_iter();
                Self::Actions {
                    title,
                    message,
                    affirmative: labels.next().unwrap_or_default(),
                    dismissive: labels.next(),
                }
            }
        }
    }

    pub fn kind(&self) -> ButtonLayout {
        match self {
            Self::List { .. } => ButtonLayout::List,
            Self::Actions {
                dismissive: None, ..
            } => ButtonLayout::Single,
            Self::Actions {
                dismissive: Some(_),
                ..
            } => ButtonLayout::Dual,
        }
    }

    /// Text shown in the dialog's title area.
    pub fn title(&self) -> &str {
        match self {
            Self::List { title, .. } | Self::Actions { title, .. } => title,
        }
    }

    /// Body text; list dialogs have none.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::List { .. } => None,
            Self::Actions { message, .. } => Some(message),
        }
    }

    /// Control labels in index order.
    pub fn labels(&self) -> Vec<&str> {
        match self {
            Self::List { items, .. } => items.iter().map(String::as_str).collect(),
            Self::Actions {
                affirmative,
                dismissive,
                ..
            } => std::iter::once(affirmative.as_str())
                .chain(dismissive.as_deref())
                .collect(),
        }
    }

    pub fn button_count(&self) -> usize {
        match self {
            Self::List { items, .. } => items.len(),
            Self::Actions { dismissive, .. } => 1 + usize::from(dismissive.is_some()),
        }
    }

    /// Dialogs are never dismissable except through their own controls.
    pub const fn is_cancelable(&self) -> bool {
        false
    }
}

/// Routes dialog requests onto a platform surface via the UI context.
#[derive(Clone)]
pub struct DialogPresenter {
    dispatcher: Arc<dyn UiDispatcher>,
    surface: Arc<dyn NativeDialog>,
    list_title: ListTitleSource,
}

impl DialogPresenter {
    pub fn new(
        dispatcher: Arc<dyn UiDispatcher>,
        surface: Arc<dyn NativeDialog>,
        config: &BridgeConfig,
    ) -> Self {
        Self {
            dispatcher,
            surface,
            list_title: config.list_title,
        }
    }

    /// Whether presentations are currently accepted.
    pub fn is_live(&self) -> bool {
        self.dispatcher.is_live()
    }

    /// Accept `request` for later presentation on the UI context.
    ///
    /// Returns once the work is queued; the dialog is not necessarily
    /// visible yet. `token` is invoked at most once, on the UI context,
    /// with the index of the activated control. If the UI context is gone,
    /// this returns `ContextUnavailable` and the token is abandoned without
    /// being invoked; the same happens silently if the context is torn
    /// down after acceptance but before the dialog is shown.
    #[instrument(
        skip(self, request, token),
        fields(token = %token.id(), layout = %request.layout())
    )]
    pub fn present(&self, request: DialogRequest, token: CompletionToken) -> Result<()> {
        if !self.dispatcher.is_live() {
            debug!("UI context unavailable; dropping dialog request");
            return Err(BridgeError::ContextUnavailable);
        }

        let surface = Arc::clone(&self.surface);
        let list_title = self.list_title;
        let token_id = token.id();

        self.dispatcher.post(Box::new(move || {
            let button_count = request.button_count();
            let layout = DialogLayout::for_request(request, list_title);
            let kind = layout.kind();
            let sink = ChoiceSink::new(token, button_count);
            match surface.show_dialog(layout, sink) {
                Ok(()) => debug!(token = %token_id, layout = %kind, "dialog shown"),
                Err(e) => warn!(token = %token_id, error = %e, "failed to show dialog"),
            }
        }))?;

        debug!("dialog request accepted");
        Ok(())
    }

    /// Inbound entry point taking the raw request fields. An empty button
    /// list is rejected before anything is posted.
    pub fn present_parts(
        &self,
        title: impl Into<String>,
        message: impl Into<String>,
        buttons: impl IntoIterator<Item = impl Into<String>>,
        token: CompletionToken,
    ) -> Result<()> {
        let request = DialogRequest::new(title, message, buttons)?;
        self.present(request, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    use crate::executor::UiExecutor;

    const WAIT: Duration = Duration::from_secs(5);

    fn request(buttons: &[&str]) -> DialogRequest {
        DialogRequest::new("Title", "Message", buttons.iter().copied()).unwrap()
    }

    /// Surface that records layouts and resolves each dialog with a fixed
    /// index, from the thread it was called on.
    struct FixedChoice {
        index: usize,
        shown: Mutex<Vec<(DialogLayout, Option<String>)>>,
    }

    impl FixedChoice {
        fn new(index: usize) -> Arc<Self> {
            Arc::new(Self {
                index,
                shown: Mutex::new(Vec::new()),
            })
        }
    }

    impl NativeDialog for FixedChoice {
        fn show_dialog(&self, layout: DialogLayout, sink: ChoiceSink) -> Result<()> {
            let thread = std::thread::current().name().map(str::to_owned);
            self.shown.lock().unwrap().push((layout, thread));
            sink.choose(self.index)
        }
    }

    struct FailingSurface;

    impl NativeDialog for FailingSurface {
        fn show_dialog(&self, _layout: DialogLayout, _sink: ChoiceSink) -> Result<()> {
            Err(BridgeError::Bridge("window gone".into()))
        }
    }

    /// Dispatcher that is never live.
    struct DeadDispatcher;

    impl UiDispatcher for DeadDispatcher {
        fn post(&self, _task: crate::executor::UiTask) -> Result<()> {
            Err(BridgeError::ContextUnavailable)
        }

        fn is_live(&self) -> bool {
            false
        }
    }

    #[test]
    fn single_button_plans_single_action() {
        let layout = DialogLayout::for_request(request(&["OK"]), ListTitleSource::Message);
        assert_eq!(
            layout,
            DialogLayout::Actions {
                title: "Title".into(),
                message: "Message".into(),
                affirmative: "OK".into(),
                dismissive: None,
            }
        );
        assert_eq!(layout.kind(), ButtonLayout::Single);
        assert_eq!(layout.button_count(), 1);
    }

    #[test]
    fn two_buttons_plan_dual_action() {
        let layout =
            DialogLayout::for_request(request(&["Delete", "Cancel"]), ListTitleSource::Message);
        assert_eq!(layout.kind(), ButtonLayout::Dual);
        assert_eq!(layout.title(), "Title");
        assert_eq!(layout.message(), Some("Message"));
        assert_eq!(layout.labels(), vec!["Delete", "Cancel"]);
    }

    #[test]
    fn list_layout_uses_message_as_title_by_default() {
        let layout =
            DialogLayout::for_request(request(&["Red", "Green", "Blue"]), ListTitleSource::Message);
        assert_eq!(
            layout,
            DialogLayout::List {
                title: "Message".into(),
                items: vec!["Red".into(), "Green".into(), "Blue".into()],
            }
        );
        assert_eq!(layout.message(), None);
    }

    #[test]
    fn list_layout_can_keep_semantic_title() {
        let layout =
            DialogLayout::for_request(request(&["Red", "Green", "Blue"]), ListTitleSource::Title);
        assert_eq!(layout.title(), "Title");
        assert_eq!(layout.button_count(), 3);
    }

    #[test]
    fn dialogs_are_never_cancelable() {
        for buttons in [&["A"][..], &["A", "B"][..], &["A", "B", "C"][..]] {
            let layout = DialogLayout::for_request(request(buttons), ListTitleSource::Message);
            assert!(!layout.is_cancelable());
        }
    }

    #[test]
    fn layout_serializes_with_tag() {
        let layout = DialogLayout::for_request(request(&["OK"]), ListTitleSource::Message);
        let json = serde_json::to_value(&layout).unwrap();
        assert_eq!(json["layout"], "actions");
        assert_eq!(json["affirmative"], "OK");
    }

    #[test]
    fn present_invokes_token_on_ui_thread() {
        let exec = UiExecutor::spawn(&BridgeConfig::default()).unwrap();
        let surface = FixedChoice::new(1);
        let presenter =
            DialogPresenter::new(exec.dispatcher(), surface.clone(), &BridgeConfig::default());

        let (tx, rx) = mpsc::channel();
        let token = CompletionToken::new(move |i| {
            let thread = std::thread::current().name().map(str::to_owned);
            tx.send((i, thread)).unwrap();
        });
        presenter
            .present(request(&["Delete", "Cancel"]), token)
            .unwrap();

        let (index, thread) = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(index, 1);
        assert_eq!(thread.as_deref(), Some("okbridge-ui"));

        let shown = surface.shown.lock().unwrap();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].1.as_deref(), Some("okbridge-ui"));
    }

    #[test]
    fn present_parts_rejects_empty_buttons_before_posting() {
        let exec = UiExecutor::spawn(&BridgeConfig::default()).unwrap();
        let surface = FixedChoice::new(0);
        let presenter =
            DialogPresenter::new(exec.dispatcher(), surface.clone(), &BridgeConfig::default());

        let invoked = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&invoked);
        let token = CompletionToken::new(move |_| flag.store(true, Ordering::SeqCst));
        let err = presenter
            .present_parts("t", "m", Vec::<String>::new(), token)
            .unwrap_err();
        assert!(matches!(err, BridgeError::EmptyButtons));

        drop(exec);
        assert!(!invoked.load(Ordering::SeqCst));
        assert!(surface.shown.lock().unwrap().is_empty());
    }

    #[test]
    fn dead_context_refuses_and_abandons_token() {
        let presenter = DialogPresenter::new(
            Arc::new(DeadDispatcher),
            FixedChoice::new(0),
            &BridgeConfig::default(),
        );
        let abandoned = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&abandoned);
        let token = CompletionToken::new(|_| panic!("must not be invoked"))
            .with_abandon_hook(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });

        let err = presenter.present(request(&["OK"]), token).unwrap_err();
        assert!(matches!(err, BridgeError::ContextUnavailable));
        assert!(!presenter.is_live());
        assert_eq!(abandoned.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn surface_failure_abandons_token() {
        let exec = UiExecutor::spawn(&BridgeConfig::default()).unwrap();
        let presenter = DialogPresenter::new(
            exec.dispatcher(),
            Arc::new(FailingSurface),
            &BridgeConfig::default(),
        );
        let (tx, rx) = mpsc::channel();
        let token = CompletionToken::new(|_| panic!("must not be invoked"))
            .with_abandon_hook(move |id| tx.send(id).unwrap());
        let id = token.id();

        presenter.present(request(&["OK"]), token).unwrap();
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), id);
    }
}
