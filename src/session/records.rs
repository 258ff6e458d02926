use serde::{Deserialize, Serialize};

use crate::audio::BAND_COUNT;
use crate::playback::RepeatMode;

/// Store key of the [`Settings`] record.
pub const SETTINGS_KEY: &str = "settings";
/// Store key of the [`PlaybackStateRecord`].
pub const PLAYBACK_STATE_KEY: &str = "playback_state";

/// User choices that survive restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Output volume in `[0, 1]`.
    pub volume: f32,
    pub repeat_mode: RepeatMode,
    pub shuffle: bool,
    pub visualizer_mode_index: usize,
    pub show_visualizer: bool,
    pub equalizer_panel_visible: bool,
    /// Per-band gain in dB, lowest band first.
    pub equalizer_gains: [f32; BAND_COUNT],
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            volume: 0.8,
            repeat_mode: RepeatMode::None,
            shuffle: false,
            visualizer_mode_index: 0,
            show_visualizer: true,
            equalizer_panel_visible: false,
            equalizer_gains: [0.0; BAND_COUNT],
        }
    }
}

/// Where playback was when the session was last checkpointed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackStateRecord {
    /// Persisted-order index of the bound track, `None` when nothing was bound.
    pub last_index: Option<usize>,
    pub last_position_seconds: f64,
}
