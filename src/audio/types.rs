//! Audio-related small types and handles.
//!
//! Commands flow from the playback controller to the audio thread; events
//! flow back to the runtime. Every event is tagged with the request id of the
//! load that produced it so late completions can be told apart.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::library::MediaHandle;

/// Monotonically increasing id of a `load`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RequestId(pub u64);

impl RequestId {
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

#[derive(Debug)]
pub enum AudioCmd {
    /// Bind `media` to the output, paused at position 0.
    Load {
        request: RequestId,
        media: MediaHandle,
    },
    /// Start (or continue) playback of the bound media, if it is still `request`.
    Play { request: RequestId },
    /// Pause the bound media.
    Pause,
    /// Jump to an absolute position in the bound media.
    Seek(Duration),
    /// Output volume in `[0, 1]`.
    SetVolume(f32),
    /// Drop the bound media.
    Unload,
    /// Quit the audio thread, optionally fading out over `fade_out_ms` milliseconds.
    Quit { fade_out_ms: u64 },
}

/// Why a play request did not start playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayFailure {
    /// A newer load replaced the media before it could start.
    Superseded,
    /// The payload could not be decoded.
    Decode(String),
    /// No output device.
    Output(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AudioEvent {
    /// Media is decoded and bound. `duration` is `None` when the container
    /// does not report one.
    Ready {
        request: RequestId,
        duration: Option<Duration>,
    },
    PlayFailed {
        request: RequestId,
        failure: PlayFailure,
    },
    Progress {
        request: RequestId,
        position: Duration,
    },
    Ended {
        request: RequestId,
    },
}

impl AudioEvent {
    pub fn request(&self) -> RequestId {
        match self {
            Self::Ready { request, .. }
            | Self::PlayFailed { request, .. }
            | Self::Progress { request, .. }
            | Self::Ended { request } => *request,
        }
    }
}

#[derive(Debug, Clone, Default)]
/// What the audio thread is actually doing, shared with the runtime.
pub struct PlaybackInfo {
    /// Request id of the bound media (if any).
    pub request: Option<RequestId>,
    /// Playback position of the bound media.
    pub position: Duration,
    /// Whether the output is currently producing the bound media.
    pub playing: bool,
    /// The bound media played through to its end.
    pub ended: bool,
}

pub type PlaybackHandle = Arc<Mutex<PlaybackInfo>>;
