//! Error types shared across the player.
//!
//! Storage and audio failures never end the session: they are logged and the
//! affected operation degrades.

use std::path::PathBuf;

use thiserror::Error;

/// Failures of the durable track/record store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The database file could not be opened or created.
    #[error("failed to open store at {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// A read or write transaction failed (permissions, disk full, corruption).
    #[error("store query failed: {0}")]
    Query(#[from] rusqlite::Error),

    /// A session record could not be encoded or decoded.
    #[error("record encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// The store thread is gone.
    #[error("store service is not running")]
    Disconnected,
}

/// Failures of the playback pipeline.
#[derive(Debug, Error)]
pub enum AudioError {
    /// The processing graph could not be allocated; playback continues unprocessed.
    #[error("audio graph unavailable: {0}")]
    AudioUnavailable(String),

    /// The output device could not be opened.
    #[error("audio output unavailable: {0}")]
    Output(String),

    /// The bound payload is not decodable audio.
    #[error("failed to decode media: {0}")]
    Decode(String),
}

/// Failures acquiring the keep-display-active lock.
#[derive(Debug, Error)]
pub enum WakeLockError {
    #[error("session bus unavailable: {0}")]
    Bus(#[from] zbus::Error),

    #[error("wake lock service is not running")]
    Disconnected,
}
