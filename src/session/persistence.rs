use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::library::LibraryManager;
use crate::playback::{ControllerEvent, PlaybackController};
use crate::store::StoreHandle;

use super::records::{PLAYBACK_STATE_KEY, PlaybackStateRecord, SETTINGS_KEY, Settings};

/// Owns the two session records and decides when they are written.
///
/// Settings are written on every change. The playback state is checkpointed
/// when the track changes, periodically while a track is bound, and on
/// [`SessionPersistence::flush`] (focus loss, quit).
pub struct SessionPersistence {
    store: StoreHandle,
    settings: Settings,
    interval: Duration,
    last_checkpoint: Option<Instant>,
}

impl SessionPersistence {
    /// Read the settings record; missing or malformed records fall back to defaults.
    pub fn load(store: StoreHandle, cfg: &SessionConfig) -> Self {
        let settings = store
            .load_record::<Settings>(SETTINGS_KEY)
            .unwrap_or_default();
        Self {
            store,
            settings,
            interval: Duration::from_secs(cfg.checkpoint_interval_secs.max(1)),
            last_checkpoint: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Mutate the settings and persist them if anything changed.
    pub fn update_settings(&mut self, f: impl FnOnce(&mut Settings)) {
        let before = self.settings.clone();
        f(&mut self.settings);
        if self.settings != before {
            self.store.save_record(SETTINGS_KEY, &self.settings);
        }
    }

    /// Apply the stored session: settings first, then the bound track.
    ///
    /// The track is bound without playing; the graph is not built here.
    pub fn restore(&mut self, library: &mut LibraryManager, controller: &mut PlaybackController) {
        let s = self.settings.clone();
        controller.set_volume(s.volume);
        controller.set_repeat(s.repeat_mode);
        controller.set_shuffle(s.shuffle);
        for (band, db) in s.equalizer_gains.iter().enumerate() {
            controller.set_eq_gain(band, *db);
        }

        let Some(saved) = self.store.load_record::<PlaybackStateRecord>(PLAYBACK_STATE_KEY) else {
            return;
        };
        match saved.last_index {
            Some(index) if index < library.len() => {
                info!(
                    index,
                    position = saved.last_position_seconds,
                    "restoring last track"
                );
                controller.restore(library, index, saved.last_position_seconds);
            }
            Some(index) => debug!(index, "saved track no longer exists"),
            None => {}
        }
    }

    /// React to a drained controller event.
    pub fn on_controller_event(&mut self, ev: &ControllerEvent, controller: &PlaybackController) {
        match ev {
            ControllerEvent::TrackChanged(_) => self.checkpoint(controller),
            ControllerEvent::SettingsChanged => {
                let (volume, repeat, shuffle, gains) = (
                    controller.volume(),
                    controller.repeat(),
                    controller.shuffle(),
                    controller.eq_gains(),
                );
                self.update_settings(|s| {
                    s.volume = volume;
                    s.repeat_mode = repeat;
                    s.shuffle = shuffle;
                    s.equalizer_gains = gains;
                });
            }
            ControllerEvent::StateChanged(_) | ControllerEvent::Progress { .. } => {}
        }
    }

    /// Periodic checkpoint while a track is bound.
    pub fn tick(&mut self, now: Instant, controller: &PlaybackController) {
        if controller.current().is_none() {
            return;
        }
        let due = self
            .last_checkpoint
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval);
        if due {
            self.checkpoint_at(now, controller);
        }
    }

    /// Checkpoint now, regardless of the interval.
    pub fn flush(&mut self, controller: &PlaybackController) {
        self.checkpoint(controller);
    }

    fn checkpoint(&mut self, controller: &PlaybackController) {
        self.checkpoint_at(Instant::now(), controller);
    }

    fn checkpoint_at(&mut self, now: Instant, controller: &PlaybackController) {
        let record = PlaybackStateRecord {
            last_index: controller.current(),
            last_position_seconds: controller.resume_position().as_secs_f64(),
        };
        self.store.save_record(PLAYBACK_STATE_KEY, &record);
        self.last_checkpoint = Some(now);
    }
}
