// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// okbridge demo
//
// Entry point. Loads the bridge config, initialises logging, then walks the
// headless bridge through the three dialog layouts with a scripted user,
// a presentation after teardown, and a device snapshot.

mod config_path;

use std::sync::mpsc;
use std::time::Duration;

use okbridge_core::BridgeConfig;
use okbridge_platform::stub::StubBridge;
use okbridge_platform::{CompletionToken, DialogLayout, PlatformBridge};

/// How long to wait for the scripted user before giving up on a dialog.
const ANSWER_TIMEOUT: Duration = Duration::from_secs(5);

/// A dialog to show and the button the scripted user presses.
struct Scenario {
    title: &'static str,
    message: &'static str,
    buttons: &'static [&'static str],
    answer: usize,
}

const SCENARIOS: &[Scenario] = &[
    Scenario {
        title: "Delete?",
        message: "This cannot be undone",
        buttons: &["Delete", "Cancel"],
        answer: 1,
    },
    Scenario {
        title: "Pick",
        message: "Choose one",
        buttons: &["Red", "Green", "Blue"],
        answer: 2,
    },
    Scenario {
        title: "Info",
        message: "OK?",
        buttons: &["OK"],
        answer: 0,
    },
];

/// Scripted user: finds the scenario whose labels match the dialog on
/// screen and presses its button.
fn scripted_answer(layout: &DialogLayout) -> Option<usize> {
    let labels = layout.labels();
    SCENARIOS
        .iter()
        .find(|s| s.buttons == labels.as_slice())
        .map(|s| s.answer)
}

fn main() {
    let config = BridgeConfig::load_or_default(config_path::config_path(std::env::args().nth(1)));

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .init();

    tracing::info!(list_title = ?config.list_title, "okbridge demo starting");

    let bridge = match StubBridge::with_responder(&config, scripted_answer) {
        Ok(bridge) => bridge,
        Err(e) => {
            tracing::error!(error = %e, "failed to start headless bridge");
            std::process::exit(1);
        }
    };

    for scenario in SCENARIOS {
        let (tx, rx) = mpsc::channel();
        let token = CompletionToken::new(move |index| {
            let _ = tx.send(index);
        });
        if let Err(e) = bridge.dialogs().present_parts(
            scenario.title,
            scenario.message,
            scenario.buttons.iter().copied(),
            token,
        ) {
            tracing::error!(title = scenario.title, error = %e, "presentation rejected");
            continue;
        }
        match rx.recv_timeout(ANSWER_TIMEOUT) {
            Ok(index) => println!(
                "{:<8} -> button {index} ({})",
                scenario.title, scenario.buttons[index]
            ),
            Err(_) => tracing::warn!(title = scenario.title, "dialog never answered"),
        }
    }

    bridge.teardown();
    let token = CompletionToken::new(|_| {}).with_abandon_hook(|id| {
        tracing::info!(token = %id, "token abandoned after teardown");
    });
    match bridge.dialogs().present_parts("Late", "Too late?", ["OK"], token) {
        Ok(()) => tracing::warn!("presentation accepted after teardown"),
        Err(e) => println!("after teardown: {e}"),
    }

    match serde_json::to_string_pretty(&bridge.snapshot()) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!(error = %e, "failed to serialise device snapshot"),
    }
}
