//! File logging. The terminal belongs to the UI, so records go to
//! `$XDG_STATE_HOME/cadenza/cadenza.log` and nowhere else.

use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::xdg_dir;

const FILTER_ENV: &str = "CADENZA_LOG";

pub fn log_path() -> Option<PathBuf> {
    xdg_dir("XDG_STATE_HOME", ".local/state").map(|d| d.join("cadenza.log"))
}

fn open_log() -> Option<(PathBuf, File)> {
    let path = log_path()?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).ok()?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .ok()?;
    Some((path, file))
}

/// Install the global subscriber. Without a writable state directory logging
/// is disabled; the player runs regardless.
pub fn init() -> Option<PathBuf> {
    let (path, file) = open_log()?;
    let filter = EnvFilter::try_from_env(FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .ok()?;
    Some(path)
}
