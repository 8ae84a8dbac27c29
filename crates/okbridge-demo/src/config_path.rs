// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Config file resolution for the demo binary.

use std::path::PathBuf;

/// Config file to load: the first command-line argument, else
/// `<config dir>/okbridge/config.json`.
pub fn config_path(arg: Option<String>) -> PathBuf {
    match arg {
        Some(path) => PathBuf::from(path),
        None => config_dir().join("okbridge").join("config.json"),
    }
}

fn config_dir() -> PathBuf {
    // Try XDG config dir, then fallback to home
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".config");
    }
    PathBuf::from(".")
}
