// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Completion tokens: the native side's interest in a dialog's outcome.
//
// A token is invoked at most once because `invoke` takes it by value. Its
// continuation runs to completion before anything the token owns is
// released. A token dropped without being invoked is "abandoned"; callers
// that need to observe abandonment attach a hook.

use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

use okbridge_core::error::{BridgeError, Result};

/// Opaque identifier of a pending native-side continuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenId(pub Uuid);

impl TokenId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TokenId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TokenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

type Continuation = Box<dyn FnOnce(usize) + Send + 'static>;
type AbandonHook = Box<dyn FnOnce(TokenId) + Send + 'static>;

/// Single-use handle carrying the continuation that receives the chosen
/// button index.
pub struct CompletionToken {
    id: TokenId,
    continuation: Option<Continuation>,
    on_abandon: Option<AbandonHook>,
}

impl CompletionToken {
    /// Wrap a continuation that will receive the chosen button index.
    pub fn new(continuation: impl FnOnce(usize) + Send + 'static) -> Self {
        Self {
            id: TokenId::new(),
            continuation: Some(Box::new(continuation)),
            on_abandon: None,
        }
    }

    /// Token whose outcome is delivered through a oneshot channel.
    ///
    /// If the token is abandoned the receiver resolves to `RecvError`.
    pub fn oneshot() -> (Self, oneshot::Receiver<usize>) {
        let (tx, rx) = oneshot::channel();
        let token = Self::new(move |index| {
            // Receiver gone means nobody is waiting any more.
            let _ = tx.send(index);
        });
        (token, rx)
    }

    /// Run `hook` if this token is dropped without being invoked.
    pub fn with_abandon_hook(mut self, hook: impl FnOnce(TokenId) + Send + 'static) -> Self {
        self.on_abandon = Some(Box::new(hook));
        self
    }

    pub fn id(&self) -> TokenId {
        self.id
    }

    /// Deliver the chosen index. Consumes the token; the continuation has
    /// returned before the token is released.
    pub fn invoke(mut self, index: usize) {
        self.on_abandon = None;
        if let Some(continuation) = self.continuation.take() {
            debug!(token = %self.id, index, "completion token invoked");
            continuation(index);
        }
    }
}

impl Drop for CompletionToken {
    fn drop(&mut self) {
        if self.continuation.take().is_some() {
            debug!(token = %self.id, "completion token abandoned");
            if let Some(hook) = self.on_abandon.take() {
                hook(self.id);
            }
        }
    }
}

impl std::fmt::Debug for CompletionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionToken")
            .field("id", &self.id)
            .field("pending", &self.continuation.is_some())
            .finish()
    }
}

/// What an on-screen dialog holds: the token plus the number of controls
/// it may legally report.
#[derive(Debug)]
pub struct ChoiceSink {
    token: CompletionToken,
    button_count: usize,
}

impl ChoiceSink {
    pub fn new(token: CompletionToken, button_count: usize) -> Self {
        Self {
            token,
            button_count,
        }
    }

    pub fn button_count(&self) -> usize {
        self.button_count
    }

    pub fn token_id(&self) -> TokenId {
        self.token.id()
    }

    /// Resolve the dialog with the activated control's index.
    ///
    /// An out-of-range index abandons the token instead of invoking it.
    pub fn choose(self, index: usize) -> Result<()> {
        if index >= self.button_count {
            warn!(
                token = %self.token.id(),
                index,
                button_count = self.button_count,
                "dialog reported an out-of-range button"
            );
            return Err(BridgeError::InvalidChoice {
                index,
                button_count: self.button_count,
            });
        }
        self.token.invoke(index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    #[test]
    fn invoke_delivers_index() {
        let (tx, rx) = mpsc::channel();
        let token = CompletionToken::new(move |i| tx.send(i).unwrap());
        token.invoke(1);
        assert_eq!(rx.try_recv().unwrap(), 1);
    }

    #[test]
    fn drop_without_invoke_fires_abandon_hook_once() {
        let abandoned = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&abandoned);
        let token = CompletionToken::new(|_| panic!("must not be invoked"))
            .with_abandon_hook(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        drop(token);
        assert_eq!(abandoned.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn invoked_token_never_reports_abandon() {
        let abandoned = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&abandoned);
        let token = CompletionToken::new(|_| {}).with_abandon_hook(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        token.invoke(0);
        assert_eq!(abandoned.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn abandon_hook_receives_token_id() {
        let (tx, rx) = mpsc::channel();
        let token = CompletionToken::new(|_| {}).with_abandon_hook(move |id| tx.send(id).unwrap());
        let id = token.id();
        drop(token);
        assert_eq!(rx.try_recv().unwrap(), id);
    }

    #[tokio::test]
    async fn oneshot_token_resolves_receiver() {
        let (token, rx) = CompletionToken::oneshot();
        token.invoke(2);
        assert_eq!(rx.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn abandoned_oneshot_token_errors_receiver() {
        let (token, rx) = CompletionToken::oneshot();
        drop(token);
        assert!(rx.await.is_err());
    }

    #[test]
    fn sink_rejects_out_of_range_and_abandons() {
        let abandoned = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&abandoned);
        let token = CompletionToken::new(|_| panic!("must not be invoked"))
            .with_abandon_hook(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        let sink = ChoiceSink::new(token, 2);
        let err = sink.choose(2).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::InvalidChoice {
                index: 2,
                button_count: 2
            }
        ));
        assert_eq!(abandoned.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn sink_accepts_last_index() {
        let (tx, rx) = mpsc::channel();
        let sink = ChoiceSink::new(CompletionToken::new(move |i| tx.send(i).unwrap()), 3);
        sink.choose(2).unwrap();
        assert_eq!(rx.try_recv().unwrap(), 2);
    }

    #[test]
    fn token_ids_are_unique() {
        let a = CompletionToken::new(|_| {});
        let b = CompletionToken::new(|_| {});
        assert_ne!(a.id(), b.id());
    }
}
