//! Keeps playback alive across screen locks, focus changes and output
//! interruptions.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::audio::{GraphState, PlaybackHandle};
use crate::config::ResilienceConfig;
use crate::playback::{PlaybackController, PlaybackState};

mod wake_lock;

pub use wake_lock::{NoopWakeLock, ScreenSaverInhibitor, WakeLock};

/// Watches the controller and the audio thread, and nudges playback back
/// into motion when the two disagree.
pub struct ResilienceMonitor {
    lock: Box<dyn WakeLock>,
    held: bool,
    interval: Duration,
    last_check: Option<Instant>,
    playback: PlaybackHandle,
}

impl ResilienceMonitor {
    pub fn new(lock: Box<dyn WakeLock>, cfg: &ResilienceConfig, playback: PlaybackHandle) -> Self {
        Self {
            lock,
            held: false,
            interval: Duration::from_millis(cfg.check_interval_ms.max(1)),
            last_check: None,
            playback,
        }
    }

    /// Build the monitor with the wake lock the configuration asks for.
    pub fn from_config(cfg: &ResilienceConfig, playback: PlaybackHandle) -> Self {
        let lock: Box<dyn WakeLock> = if cfg.wake_lock {
            Box::new(ScreenSaverInhibitor::spawn())
        } else {
            Box::new(NoopWakeLock)
        };
        Self::new(lock, cfg, playback)
    }

    #[cfg(test)]
    pub fn holds_wake_lock(&self) -> bool {
        self.held
    }

    /// Hold the wake lock exactly while playing.
    pub fn observe(&mut self, state: PlaybackState) {
        let want = state == PlaybackState::Playing;
        if want == self.held {
            return;
        }
        if want {
            self.lock.acquire();
        } else {
            self.lock.release();
        }
        self.held = want;
    }

    /// Periodic check. Returns true when playback had to be recovered.
    pub fn tick(&mut self, now: Instant, ctrl: &mut PlaybackController) -> bool {
        self.observe(ctrl.state());
        if ctrl.state() != PlaybackState::Playing {
            self.last_check = None;
            return false;
        }
        match self.last_check {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last_check = Some(now);
                self.check(ctrl)
            }
        }
    }

    /// The terminal came back into focus: check right away.
    pub fn on_focus_regained(&mut self, ctrl: &mut PlaybackController) -> bool {
        self.observe(ctrl.state());
        self.last_check = Some(Instant::now());
        self.check(ctrl)
    }

    fn check(&mut self, ctrl: &mut PlaybackController) -> bool {
        if ctrl.state() != PlaybackState::Playing {
            return false;
        }
        let mut recovered = false;

        if let Some(graph) = ctrl.graph() {
            if graph.state() == GraphState::Suspended {
                graph.resume();
                info!("audio graph was suspended while playing; resumed");
                recovered = true;
            }
        }

        let stalled = match self.playback.lock() {
            Ok(info) => info.request == Some(ctrl.request()) && !info.playing && !info.ended,
            Err(_) => false,
        };
        if stalled {
            info!("output stopped while playing; re-issuing play");
            ctrl.play();
            recovered = true;
        } else {
            debug!("playback healthy");
        }
        recovered
    }

    /// Release the wake lock before exit.
    pub fn shutdown(&mut self) {
        self.observe(PlaybackState::Idle);
    }
}
