// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// UI-owning execution context.
//
// Every dialog operation runs on exactly one thread. Callers on any other
// thread hand work over through a `UiDispatcher`; nothing they do blocks.
// On mobile hosts the dispatcher forwards to the platform main thread
// (see `android` and `ios`). On desktop/CI `UiExecutor` owns a dedicated
// thread fed by an unbounded tokio channel.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{JoinHandle, ThreadId};

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use okbridge_core::BridgeConfig;
use okbridge_core::error::{BridgeError, Result};

/// A unit of work destined for the UI-owning context.
pub type UiTask = Box<dyn FnOnce() + Send + 'static>;

/// Hand-off point onto the UI-owning context.
pub trait UiDispatcher: Send + Sync {
    /// Enqueue `task` without blocking.
    ///
    /// Fails with `ContextUnavailable` (dropping the task) when the context
    /// has been torn down. A task that is accepted may still be discarded
    /// unrun if teardown happens before it reaches the front of the queue.
    fn post(&self, task: UiTask) -> Result<()>;

    /// Whether the context still accepts work.
    fn is_live(&self) -> bool;
}

enum UiMessage {
    Run(UiTask),
    Teardown,
}

/// Cloneable reference to a running [`UiExecutor`].
#[derive(Clone)]
pub struct UiHandle {
    tx: mpsc::UnboundedSender<UiMessage>,
    alive: Arc<AtomicBool>,
    thread_id: ThreadId,
}

impl UiHandle {
    /// True when called from the executor's own thread.
    pub fn is_ui_thread(&self) -> bool {
        std::thread::current().id() == self.thread_id
    }
}

impl UiDispatcher for UiHandle {
    fn post(&self, task: UiTask) -> Result<()> {
        if !self.is_live() {
            return Err(BridgeError::ContextUnavailable);
        }
        // A send error hands the task back inside the error; dropping it
        // here releases whatever the task owned.
        self.tx
            .send(UiMessage::Run(task))
            .map_err(|_| BridgeError::ContextUnavailable)
    }

    fn is_live(&self) -> bool {
        self.alive.load(Ordering::Acquire) && !self.tx.is_closed()
    }
}

/// Single-threaded executor standing in for a platform UI thread.
///
/// Tasks run in FIFO order. [`UiExecutor::teardown`] stops the executor:
/// queued tasks are discarded unrun and later posts are refused. Dropping
/// the executor tears it down and joins the thread.
pub struct UiExecutor {
    handle: UiHandle,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl UiExecutor {
    /// Start the UI thread, named after `config.ui_thread_name`.
    pub fn spawn(config: &BridgeConfig) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let alive = Arc::new(AtomicBool::new(true));
        let loop_alive = Arc::clone(&alive);

        let thread = std::thread::Builder::new()
            .name(config.ui_thread_name.clone())
            .spawn(move || run_ui_loop(rx, loop_alive))?;

        info!(thread = %config.ui_thread_name, "UI executor started");

        Ok(Self {
            handle: UiHandle {
                tx,
                alive,
                thread_id: thread.thread().id(),
            },
            thread: Mutex::new(Some(thread)),
        })
    }

    pub fn handle(&self) -> UiHandle {
        self.handle.clone()
    }

    /// The handle as a shareable dispatcher.
    pub fn dispatcher(&self) -> Arc<dyn UiDispatcher> {
        Arc::new(self.handle.clone())
    }

    pub fn is_live(&self) -> bool {
        self.handle.is_live()
    }

    /// Mark the context as destroyed. Idempotent and non-blocking; safe to
    /// call from the UI thread itself.
    pub fn teardown(&self) {
        if self.handle.alive.swap(false, Ordering::AcqRel) {
            info!("UI executor tearing down");
            // Loop already gone means there is nothing left to wake.
            let _ = self.handle.tx.send(UiMessage::Teardown);
        }
    }
}

impl Drop for UiExecutor {
    fn drop(&mut self) {
        self.teardown();
        if self.handle.is_ui_thread() {
            return;
        }
        let thread = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(thread) = thread {
            if thread.join().is_err() {
                warn!("UI thread exited with a panic");
            }
        }
    }
}

fn run_ui_loop(mut rx: mpsc::UnboundedReceiver<UiMessage>, alive: Arc<AtomicBool>) {
    while let Some(message) = rx.blocking_recv() {
        match message {
            UiMessage::Run(task) => {
                if !alive.load(Ordering::Acquire) {
                    debug!("discarding UI task queued before teardown");
                    continue;
                }
                if std::panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                    error!("UI task panicked; executor continues");
                }
            }
            UiMessage::Teardown => break,
        }
    }

    rx.close();
    let mut discarded = 0usize;
    while let Ok(message) = rx.try_recv() {
        if let UiMessage::Run(task) = message {
            drop(task);
            discarded += 1;
        }
    }
    debug!(discarded, "UI executor stopped");
}
