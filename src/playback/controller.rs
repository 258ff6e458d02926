use std::sync::mpsc::Sender;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, warn};

use crate::audio::{
    AudioCmd, AudioEvent, AudioGraph, BAND_COUNT, GraphSlot, MAX_GAIN_DB, PlayFailure, RequestId,
};
use crate::config::AudioConfig;
use crate::library::{LibraryManager, prev_in_view_from};

use super::state::{ControllerEvent, PlaybackState, RepeatMode};

/// The playback state machine.
///
/// Owns the command side of the audio thread and the lazily built graph.
/// Every operation is synchronous; results of the audio thread come back
/// through [`PlaybackController::on_audio_event`]. Observers read
/// [`ControllerEvent`]s from [`PlaybackController::drain_events`].
pub struct PlaybackController {
    audio: Sender<AudioCmd>,
    graph: GraphSlot,
    audio_cfg: AudioConfig,
    graph_unavailable: bool,

    state: PlaybackState,
    current: Option<usize>,
    request: RequestId,
    /// Play as soon as the bound media is ready.
    autoplay: bool,
    ready: bool,
    duration: Option<Duration>,
    position: Duration,
    pending_seek: Option<Duration>,

    repeat: RepeatMode,
    shuffle: bool,
    volume: f32,
    eq_gains: [f32; BAND_COUNT],
    rng: StdRng,

    events: Vec<ControllerEvent>,
}

fn duration_from_secs(secs: f64) -> Option<Duration> {
    (secs.is_finite() && secs > 0.0).then(|| Duration::from_secs_f64(secs))
}

impl PlaybackController {
    pub fn new(audio: Sender<AudioCmd>, graph: GraphSlot, audio_cfg: AudioConfig) -> Self {
        Self {
            audio,
            graph,
            audio_cfg,
            graph_unavailable: false,
            state: PlaybackState::Idle,
            current: None,
            request: RequestId::default(),
            autoplay: false,
            ready: false,
            duration: None,
            position: Duration::ZERO,
            pending_seek: None,
            repeat: RepeatMode::default(),
            shuffle: false,
            volume: 1.0,
            eq_gains: [0.0; BAND_COUNT],
            rng: StdRng::from_os_rng(),
            events: Vec::new(),
        }
    }

    /// Deterministic shuffle, for tests.
    #[cfg(test)]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Persisted index of the bound track.
    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub fn request(&self) -> RequestId {
        self.request
    }

    pub fn position(&self) -> Duration {
        self.position
    }

    /// Position to resume from: a queued seek wins over the reported position.
    pub fn resume_position(&self) -> Duration {
        self.pending_seek.unwrap_or(self.position)
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn eq_gains(&self) -> [f32; BAND_COUNT] {
        self.eq_gains
    }

    /// The graph, if a playback attempt has built it.
    pub fn graph(&self) -> Option<&AudioGraph> {
        self.graph.get()
    }

    pub fn drain_events(&mut self) -> Vec<ControllerEvent> {
        std::mem::take(&mut self.events)
    }

    fn send(&self, cmd: AudioCmd) {
        if self.audio.send(cmd).is_err() {
            warn!("audio thread is gone");
        }
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            debug!(from = self.state.label(), to = state.label(), "playback state");
            self.state = state;
            self.events.push(ControllerEvent::StateChanged(state));
        }
    }

    fn push_progress(&mut self) {
        self.events.push(ControllerEvent::Progress {
            position: self.position,
            duration: self.duration,
        });
    }

    /// Build the graph on the first playback attempt, and make sure it runs.
    fn ensure_graph(&mut self) {
        if self.graph_unavailable {
            return;
        }
        match self.graph.get_or_build(&self.audio_cfg, self.eq_gains) {
            Ok(graph) => {
                graph.resume();
            }
            Err(e) => {
                warn!(error = %e, "playing without equalizer");
                self.graph_unavailable = true;
            }
        }
    }

    /// Bind the track at persisted `index`. Out-of-range indices are ignored.
    pub fn load(&mut self, library: &mut LibraryManager, index: usize, autoplay: bool) {
        let Some(media) = library.media_handle(index) else {
            debug!(index, "load ignored: no such track");
            return;
        };
        let known = library
            .get(index)
            .and_then(|t| duration_from_secs(t.duration_seconds));

        self.request = self.request.next();
        self.current = Some(index);
        self.autoplay = autoplay;
        self.ready = false;
        self.duration = known;
        self.position = Duration::ZERO;
        self.pending_seek = None;

        if autoplay {
            self.ensure_graph();
        }
        self.send(AudioCmd::Load {
            request: self.request,
            media,
        });
        self.set_state(PlaybackState::Loading);
        self.events.push(ControllerEvent::TrackChanged(Some(index)));
    }

    /// Bind the track without playing and jump to `position_seconds` once the
    /// media is ready.
    pub fn restore(&mut self, library: &mut LibraryManager, index: usize, position_seconds: f64) {
        if index >= library.len() {
            return;
        }
        self.load(library, index, false);
        let pos = if position_seconds.is_finite() {
            position_seconds.max(0.0)
        } else {
            0.0
        };
        self.pending_seek = Some(Duration::from_secs_f64(pos));
    }

    pub fn play(&mut self) {
        if self.current.is_none() {
            return;
        }
        self.autoplay = true;
        self.ensure_graph();
        match self.state {
            PlaybackState::Idle => {}
            // Ready will start it.
            PlaybackState::Loading => {}
            PlaybackState::Playing | PlaybackState::Paused => {
                self.send(AudioCmd::Play {
                    request: self.request,
                });
                self.set_state(PlaybackState::Playing);
            }
        }
    }

    pub fn pause(&mut self) {
        if self.current.is_none() {
            return;
        }
        self.autoplay = false;
        if let Some(graph) = self.graph.get() {
            graph.suspend();
        }
        if self.state == PlaybackState::Playing {
            self.send(AudioCmd::Pause);
            self.set_state(PlaybackState::Paused);
        }
    }

    pub fn toggle(&mut self) {
        match self.state {
            PlaybackState::Playing => self.pause(),
            PlaybackState::Loading if self.autoplay => self.pause(),
            _ => self.play(),
        }
    }

    /// Jump to `seconds`, clamped to `[0, duration]` (only the lower bound
    /// while the duration is unknown).
    pub fn seek(&mut self, seconds: f64) {
        if self.current.is_none() {
            return;
        }
        let mut secs = if seconds.is_finite() {
            seconds.max(0.0)
        } else {
            0.0
        };
        if let Some(d) = self.duration {
            secs = secs.min(d.as_secs_f64());
        }
        let pos = Duration::from_secs_f64(secs);

        if !self.ready {
            self.pending_seek = Some(pos);
            return;
        }
        self.send(AudioCmd::Seek(pos));
        self.position = pos;
        self.push_progress();
    }

    /// Relative seek from the current position.
    pub fn seek_by(&mut self, delta_seconds: f64) {
        let base = self.resume_position().as_secs_f64();
        self.seek(base + delta_seconds);
    }

    fn apply_pending_seek(&mut self) {
        if let Some(pos) = self.pending_seek.take() {
            self.seek(pos.as_secs_f64());
        }
    }

    /// Step forward: a random library track under shuffle, otherwise the next
    /// displayed track.
    pub fn next(&mut self, library: &mut LibraryManager) {
        if library.is_empty() {
            return;
        }
        if self.shuffle {
            let index = self.rng.random_range(0..library.len());
            self.load(library, index, true);
            return;
        }

        let display = library.display_order();
        if display.is_empty() {
            return;
        }
        let pos = self
            .current
            .and_then(|c| display.iter().position(|&i| i == c));
        let target = match pos {
            Some(p) if p + 1 < display.len() => display[p + 1],
            Some(_) if self.repeat == RepeatMode::All => display[0],
            Some(_) => {
                debug!("end of list");
                self.pause();
                return;
            }
            None => display[0],
        };
        self.load(library, target, true);
    }

    /// Step back in displayed order, wrapping at the start.
    pub fn prev(&mut self, library: &mut LibraryManager) {
        let display = library.display_order();
        if let Some(target) = prev_in_view_from(&display, self.current) {
            self.load(library, target, true);
        }
    }

    fn on_ended(&mut self, library: &mut LibraryManager) {
        if self.repeat == RepeatMode::One && self.current.is_some() {
            self.position = Duration::ZERO;
            self.send(AudioCmd::Seek(Duration::ZERO));
            self.send(AudioCmd::Play {
                request: self.request,
            });
            self.set_state(PlaybackState::Playing);
            self.push_progress();
            return;
        }
        self.next(library);
    }

    /// Apply an audio thread event. Events from superseded loads are dropped.
    pub fn on_audio_event(&mut self, library: &mut LibraryManager, ev: AudioEvent) {
        if self.current.is_none() || ev.request() != self.request {
            debug!(request = ev.request().0, current = self.request.0, "stale audio event");
            return;
        }

        match ev {
            AudioEvent::Ready { duration, .. } => {
                self.ready = true;
                if let Some(d) = duration.filter(|d| !d.is_zero()) {
                    self.duration = Some(d);
                }
                self.apply_pending_seek();
                if self.autoplay {
                    self.send(AudioCmd::Play {
                        request: self.request,
                    });
                    self.set_state(PlaybackState::Playing);
                } else {
                    self.set_state(PlaybackState::Paused);
                }
                self.push_progress();
            }
            AudioEvent::PlayFailed { failure, .. } => match failure {
                PlayFailure::Superseded => debug!("play superseded by a newer load"),
                other => {
                    error!(failure = ?other, track = ?self.current, "playback failed");
                    self.autoplay = false;
                    self.set_state(PlaybackState::Paused);
                }
            },
            AudioEvent::Progress { position, .. } => {
                self.position = position;
                self.push_progress();
            }
            AudioEvent::Ended { .. } => self.on_ended(library),
        }
    }

    /// A duration probe finished for the track at persisted `index`.
    pub fn on_duration_known(&mut self, index: usize, seconds: f64) {
        if self.current != Some(index) || self.duration.is_some() {
            return;
        }
        self.duration = duration_from_secs(seconds);
        self.push_progress();
    }

    /// Keep the bound index pointing at the same track after a delete.
    pub fn on_track_removed(&mut self, index: usize) {
        match self.current {
            Some(c) if c == index => self.clear(),
            Some(c) if index < c => {
                self.current = Some(c - 1);
                self.events.push(ControllerEvent::TrackChanged(self.current));
            }
            _ => {}
        }
    }

    /// Unbind the current track.
    pub fn clear(&mut self) {
        if self.current.is_none() {
            return;
        }
        self.request = self.request.next();
        self.send(AudioCmd::Unload);
        self.current = None;
        self.autoplay = false;
        self.ready = false;
        self.duration = None;
        self.position = Duration::ZERO;
        self.pending_seek = None;
        self.set_state(PlaybackState::Idle);
        self.events.push(ControllerEvent::TrackChanged(None));
    }

    pub fn set_volume(&mut self, volume: f32) {
        let v = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            1.0
        };
        self.volume = v;
        self.send(AudioCmd::SetVolume(v));
        self.events.push(ControllerEvent::SettingsChanged);
    }

    pub fn set_repeat(&mut self, mode: RepeatMode) {
        self.repeat = mode;
        self.events.push(ControllerEvent::SettingsChanged);
    }

    pub fn set_shuffle(&mut self, shuffle: bool) {
        self.shuffle = shuffle;
        self.events.push(ControllerEvent::SettingsChanged);
    }

    /// Store the band gain and ramp the graph to it, if the graph exists.
    pub fn set_eq_gain(&mut self, band: usize, db: f32) {
        let Some(slot) = self.eq_gains.get_mut(band) else {
            return;
        };
        let db = if db.is_finite() {
            db.clamp(-MAX_GAIN_DB, MAX_GAIN_DB)
        } else {
            0.0
        };
        *slot = db;
        if let Some(graph) = self.graph.get() {
            graph.set_gain(band, db);
        }
        self.events.push(ControllerEvent::SettingsChanged);
    }
}
