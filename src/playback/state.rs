use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where the controller is in a track's lifecycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// No track bound.
    #[default]
    Idle,
    /// Track bound, media not ready yet.
    Loading,
    Playing,
    Paused,
}

impl PlaybackState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Playing => "playing",
            Self::Paused => "paused",
        }
    }
}

/// Stored as an integer (0 = none, 1 = all, 2 = one).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum RepeatMode {
    /// Stop at the end of the displayed list.
    #[default]
    None,
    /// Wrap around to the start of the displayed list.
    All,
    /// Repeat the current track when it ends.
    One,
}

impl RepeatMode {
    /// Cycle `None -> All -> One -> None`.
    pub fn cycle(self) -> Self {
        match self {
            Self::None => Self::All,
            Self::All => Self::One,
            Self::One => Self::None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::None => "off",
            Self::All => "all",
            Self::One => "one",
        }
    }
}

impl From<RepeatMode> for u8 {
    fn from(mode: RepeatMode) -> Self {
        match mode {
            RepeatMode::None => 0,
            RepeatMode::All => 1,
            RepeatMode::One => 2,
        }
    }
}

impl TryFrom<u8> for RepeatMode {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::None),
            1 => Ok(Self::All),
            2 => Ok(Self::One),
            other => Err(format!("invalid repeat mode {other}")),
        }
    }
}

/// Notifications drained by the runtime after each controller call.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    /// The bound track changed. Carries its persisted index, `None` when cleared.
    TrackChanged(Option<usize>),
    StateChanged(PlaybackState),
    Progress {
        position: Duration,
        duration: Option<Duration>,
    },
    /// Volume, repeat, shuffle or equalizer gains changed.
    SettingsChanged,
}
