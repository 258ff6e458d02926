use std::path::PathBuf;

use serde::Deserialize;

/// Top-level application configuration loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/cadenza/config.toml` or `~/.config/cadenza/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `CADENZA__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
///
/// This is static configuration. User choices made while the player runs
/// (volume, repeat, equalizer gains...) are session records, see `crate::session`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub library: LibraryConfig,
    pub session: SessionConfig,
    pub resilience: ResilienceConfig,
    pub controls: ControlsConfig,
    pub storage: StorageConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Quality factor shared by all equalizer bands.
    pub eq_q: f32,
    /// Time constant of equalizer gain changes (milliseconds).
    pub eq_ramp_ms: u64,
    /// Sample rate the equalizer graph is validated against when it is built.
    pub graph_sample_rate: u32,
    /// Fade-out duration when quitting (milliseconds).
    /// Set to 0 to stop immediately.
    pub quit_fade_out_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            eq_q: 1.0,
            eq_ramp_ms: 80,
            graph_sample_rate: 48_000,
            quit_fade_out_ms: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// File extensions to treat as audio when importing a directory
    /// (case-insensitive, without dot).
    pub extensions: Vec<String>,
    /// Whether to follow symlinks while expanding directories.
    pub follow_links: bool,
    /// Whether to include hidden files/directories (dotfiles).
    pub include_hidden: bool,
    /// Whether to recurse into subdirectories.
    pub recursive: bool,
    /// Optional cap on directory recursion depth.
    pub max_depth: Option<usize>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            extensions: vec![
                "mp3".into(),
                "flac".into(),
                "wav".into(),
                "ogg".into(),
                "m4a".into(),
            ],
            follow_links: true,
            include_hidden: false,
            recursive: true,
            max_depth: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How often the playback position is checkpointed while a track is bound.
    pub checkpoint_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Interval of the "are we still really playing?" check (milliseconds).
    pub check_interval_ms: u64,
    /// Whether to inhibit the screen saver while playing.
    pub wake_lock: bool,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: 1000,
            wake_lock: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    /// Number of seconds to scrub when pressing `H` / `L`.
    pub scrub_seconds: u64,
    /// Volume change per key press (0..1 scale).
    pub volume_step: f32,
    /// Equalizer gain change per key press (dB).
    pub eq_step_db: f32,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            scrub_seconds: 5,
            volume_step: 0.05,
            eq_step_db: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Explicit database path. Defaults to `$XDG_DATA_HOME/cadenza/library.db`.
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// The text rendered inside the top header box.
    pub header_text: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            header_text: " ~ cadenza ~ ".to_string(),
        }
    }
}
