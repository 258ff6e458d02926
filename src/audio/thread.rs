use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use rodio::{OutputStream, OutputStreamBuilder, Sink};
use tracing::{debug, info, warn};

use crate::error::AudioError;
use crate::library::MediaHandle;

use super::graph::GraphSlot;
use super::sink::create_sink_at;
use super::types::{AudioCmd, AudioEvent, PlayFailure, PlaybackHandle, PlaybackInfo, RequestId};

pub(super) const TICK: Duration = Duration::from_millis(200);

/// Fixed-rate schedule for progress reports and end detection.
///
/// Runs on wall time, so a steady stream of commands cannot hold it back.
pub(super) struct TickClock {
    period: Duration,
    next: Instant,
}

impl TickClock {
    pub(super) fn new(period: Duration, now: Instant) -> Self {
        Self {
            period,
            next: now + period,
        }
    }

    /// How long the command wait may block before the next tick is due.
    pub(super) fn remaining(&self, now: Instant) -> Duration {
        self.next.saturating_duration_since(now)
    }

    /// Whether a tick is due at `now`; schedules the following one if so.
    pub(super) fn poll(&mut self, now: Instant) -> bool {
        if now < self.next {
            return false;
        }
        self.next = now + self.period;
        true
    }
}

/// Media currently bound to the output.
struct Bound {
    request: RequestId,
    media: MediaHandle,
    sink: Sink,
    /// Start position of `sink` when it was rebuilt with `skip_duration`.
    offset: Duration,
    ended: bool,
}

impl Bound {
    fn position(&self) -> Duration {
        self.offset + self.sink.get_pos()
    }

    /// Replace the sink with a fresh one starting at `at`, keeping play/pause.
    fn rebuild(
        &mut self,
        stream: &OutputStream,
        graph: &GraphSlot,
        at: Duration,
        volume: f32,
    ) -> Result<(), AudioError> {
        let resume = !self.sink.is_paused() && !self.ended;
        self.sink.stop();
        let (sink, _) = create_sink_at(stream, &self.media, graph, at)?;
        sink.set_volume(volume);
        if resume {
            sink.play();
        }
        self.sink = sink;
        self.offset = at;
        self.ended = false;
        Ok(())
    }
}

fn ensure_stream(stream: &mut Option<OutputStream>) -> Result<&OutputStream, AudioError> {
    if stream.is_none() {
        let mut opened = OutputStreamBuilder::open_default_stream()
            .map_err(|e| AudioError::Output(e.to_string()))?;
        // rodio logs to stderr when OutputStream is dropped. That's noisy for a TUI app.
        opened.log_on_drop(false);
        info!("audio output opened");
        *stream = Some(opened);
    }
    stream
        .as_ref()
        .ok_or_else(|| AudioError::Output("no output stream".into()))
}

fn fade_out_sink(sink: &Sink, fade_out_ms: u64, volume: f32) {
    if fade_out_ms == 0 {
        sink.set_volume(0.0);
        return;
    }
    let steps: u64 = 20;
    let step_ms = (fade_out_ms / steps).max(1);
    for step in 1..=steps {
        let t = step as f32 / steps as f32;
        sink.set_volume(volume * (1.0 - t));
        thread::sleep(Duration::from_millis(step_ms));
    }
    sink.set_volume(0.0);
}

fn update_info(playback_info: &PlaybackHandle, f: impl FnOnce(&mut PlaybackInfo)) {
    if let Ok(mut info) = playback_info.lock() {
        f(&mut info);
    }
}

/// Refresh the shared info from the bound sink and report progress or the end.
fn tick(bound: Option<&mut Bound>, playback_info: &PlaybackHandle) -> Option<AudioEvent> {
    let b = bound?;
    let request = b.request;
    let position = b.position();
    let active = !b.sink.is_paused() && !b.ended;

    if active && b.sink.empty() {
        b.ended = true;
        update_info(playback_info, |info| {
            info.playing = false;
            info.ended = true;
            info.position = position;
        });
        return Some(AudioEvent::Ended { request });
    }

    update_info(playback_info, |info| {
        info.position = position;
        info.playing = active;
    });
    active.then_some(AudioEvent::Progress { request, position })
}

pub(super) fn spawn_audio_thread(
    rx: Receiver<AudioCmd>,
    events: Sender<AudioEvent>,
    playback_info: PlaybackHandle,
    graph: GraphSlot,
) -> JoinHandle<()> {
    thread::spawn(move || {
        // Opened on the first load, so a missing device only fails playback.
        let mut stream: Option<OutputStream> = None;
        let mut bound: Option<Bound> = None;
        let mut latest: Option<RequestId> = None;
        let mut volume: f32 = 1.0;

        let emit = |ev: AudioEvent| events.send(ev).is_ok();
        let mut clock = TickClock::new(TICK, Instant::now());

        loop {
            if clock.poll(Instant::now()) {
                if let Some(ev) = tick(bound.as_mut(), &playback_info) {
                    if !emit(ev) {
                        break;
                    }
                }
            }

            match rx.recv_timeout(clock.remaining(Instant::now())) {
                Ok(cmd) => match cmd {
                    AudioCmd::Load { request, media } => {
                        if let Some(old) = bound.take() {
                            old.sink.stop();
                        }
                        latest = Some(request);
                        update_info(&playback_info, |info| {
                            *info = PlaybackInfo {
                                request: Some(request),
                                ..PlaybackInfo::default()
                            };
                        });

                        let s = match ensure_stream(&mut stream) {
                            Ok(s) => s,
                            Err(e) => {
                                warn!(error = %e, "cannot open audio output");
                                let failure = PlayFailure::Output(e.to_string());
                                if !emit(AudioEvent::PlayFailed { request, failure }) {
                                    break;
                                }
                                continue;
                            }
                        };

                        match create_sink_at(s, &media, &graph, Duration::ZERO) {
                            Ok((sink, duration)) => {
                                sink.set_volume(volume);
                                debug!(track = media.track_id(), ?duration, "media bound");
                                bound = Some(Bound {
                                    request,
                                    media,
                                    sink,
                                    offset: Duration::ZERO,
                                    ended: false,
                                });
                                if !emit(AudioEvent::Ready { request, duration }) {
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!(track = media.track_id(), error = %e, "cannot decode media");
                                let failure = PlayFailure::Decode(e.to_string());
                                if !emit(AudioEvent::PlayFailed { request, failure }) {
                                    break;
                                }
                            }
                        }
                    }

                    AudioCmd::Play { request } => {
                        if latest != Some(request) {
                            let failure = PlayFailure::Superseded;
                            if !emit(AudioEvent::PlayFailed { request, failure }) {
                                break;
                            }
                            continue;
                        }
                        let (Some(b), Some(s)) = (bound.as_mut(), stream.as_ref()) else {
                            let failure = PlayFailure::Decode("no media bound".into());
                            if !emit(AudioEvent::PlayFailed { request, failure }) {
                                break;
                            }
                            continue;
                        };

                        // Playing again after the end starts over.
                        if b.ended || b.sink.empty() {
                            if let Err(e) = b.rebuild(s, &graph, Duration::ZERO, volume) {
                                warn!(error = %e, "cannot restart media");
                                let failure = PlayFailure::Decode(e.to_string());
                                if !emit(AudioEvent::PlayFailed { request, failure }) {
                                    break;
                                }
                                continue;
                            }
                        }
                        b.sink.play();
                        update_info(&playback_info, |info| {
                            info.playing = true;
                            info.ended = false;
                        });
                    }

                    AudioCmd::Pause => {
                        if let Some(b) = bound.as_ref() {
                            b.sink.pause();
                            update_info(&playback_info, |info| info.playing = false);
                        }
                    }

                    AudioCmd::Seek(pos) => {
                        let (Some(b), Some(s)) = (bound.as_mut(), stream.as_ref()) else {
                            continue;
                        };
                        let seeked = if b.ended || b.sink.empty() {
                            false
                        } else {
                            match b.sink.try_seek(pos) {
                                Ok(()) => true,
                                Err(e) => {
                                    debug!(error = %e, "seek unsupported, rebuilding sink");
                                    false
                                }
                            }
                        };
                        if seeked {
                            b.offset = Duration::ZERO;
                        } else if let Err(e) = b.rebuild(s, &graph, pos, volume) {
                            warn!(error = %e, "seek failed");
                            continue;
                        }
                        update_info(&playback_info, |info| {
                            info.position = pos;
                            info.ended = false;
                        });
                    }

                    AudioCmd::SetVolume(v) => {
                        volume = v.clamp(0.0, 1.0);
                        if let Some(b) = bound.as_ref() {
                            b.sink.set_volume(volume);
                        }
                    }

                    AudioCmd::Unload => {
                        if let Some(old) = bound.take() {
                            old.sink.stop();
                        }
                        latest = None;
                        update_info(&playback_info, |info| *info = PlaybackInfo::default());
                    }

                    AudioCmd::Quit { fade_out_ms } => {
                        if let Some(b) = bound.as_ref() {
                            if !b.sink.is_paused() && !b.ended {
                                fade_out_sink(&b.sink, fade_out_ms, volume);
                            }
                            b.sink.stop();
                        }
                        // Update shared state so the UI/MPRIS don't keep showing Playing.
                        update_info(&playback_info, |info| info.playing = false);
                        break;
                    }
                },
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        if let Some(b) = bound.take() {
            b.sink.stop();
        }
        debug!("audio thread stopped");
    })
}
