use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use serde_json::json;

use super::*;
use crate::audio::{AudioCmd, AudioEvent, GraphSlot};
use crate::config::{AudioConfig, SessionConfig};
use crate::library::{LibraryManager, Track};
use crate::playback::{PlaybackController, PlaybackState, RepeatMode};
use crate::store::{StoreHandle, StoreService, TrackStore};

fn service() -> StoreService {
    StoreService::spawn(TrackStore::open_in_memory().unwrap())
}

fn library(n: usize) -> LibraryManager {
    let tracks = (0..n)
        .map(|i| Track {
            id: format!("{i:04}"),
            payload: Arc::from(vec![0u8]),
            name: format!("t{i}"),
            artist: "a".into(),
            duration_seconds: 0.0,
        })
        .collect();
    LibraryManager::new(tracks, StoreHandle::detached())
}

fn controller() -> (PlaybackController, Receiver<AudioCmd>) {
    let (tx, rx) = mpsc::channel();
    (
        PlaybackController::new(tx, GraphSlot::new(), AudioConfig::default()),
        rx,
    )
}

fn pump(session: &mut SessionPersistence, ctrl: &mut PlaybackController) {
    for ev in ctrl.drain_events() {
        session.on_controller_event(&ev, ctrl);
    }
}

fn saved_state(store: &StoreHandle) -> Option<PlaybackStateRecord> {
    store.load_record(PLAYBACK_STATE_KEY)
}

#[test]
fn settings_serialize_with_camel_case_keys() {
    let mut s = Settings::default();
    s.repeat_mode = RepeatMode::One;
    s.equalizer_gains[7] = 3.5;

    let v = serde_json::to_value(&s).unwrap();
    assert_eq!(v["repeatMode"], json!(2));
    assert_eq!(v["volume"], json!(0.8_f32));
    assert_eq!(v["shuffle"], json!(false));
    assert_eq!(v["visualizerModeIndex"], json!(0));
    assert_eq!(v["showVisualizer"], json!(true));
    assert_eq!(v["equalizerPanelVisible"], json!(false));
    assert_eq!(v["equalizerGains"].as_array().unwrap().len(), 8);
    assert_eq!(v["equalizerGains"][7], json!(3.5));
}

#[test]
fn playback_state_serializes_null_index() {
    let v = serde_json::to_value(PlaybackStateRecord::default()).unwrap();
    assert_eq!(v, json!({ "lastIndex": null, "lastPositionSeconds": 0.0 }));

    let r: PlaybackStateRecord =
        serde_json::from_value(json!({ "lastIndex": 2, "lastPositionSeconds": 37.5 })).unwrap();
    assert_eq!(r.last_index, Some(2));
    assert_eq!(r.last_position_seconds, 37.5);
}

#[test]
fn partial_settings_fill_defaults_and_bad_repeat_is_rejected() {
    let s: Settings = serde_json::from_value(json!({ "volume": 0.3 })).unwrap();
    assert_eq!(s.volume, 0.3);
    assert_eq!(s.repeat_mode, RepeatMode::None);
    assert!(s.show_visualizer);

    assert!(serde_json::from_value::<Settings>(json!({ "repeatMode": 7 })).is_err());
}

#[test]
fn malformed_settings_record_falls_back_to_defaults() {
    let svc = service();
    let store = svc.handle();
    store.save_record(SETTINGS_KEY, &json!({ "repeatMode": "loud" }));

    let session = SessionPersistence::load(store, &SessionConfig::default());
    assert_eq!(session.settings(), &Settings::default());
    svc.shutdown();
}

#[test]
fn update_settings_persists_changes() {
    let svc = service();
    let store = svc.handle();
    let mut session = SessionPersistence::load(store.clone(), &SessionConfig::default());

    session.update_settings(|s| {
        s.show_visualizer = false;
        s.visualizer_mode_index = 2;
    });

    let reread = SessionPersistence::load(store, &SessionConfig::default());
    assert!(!reread.settings().show_visualizer);
    assert_eq!(reread.settings().visualizer_mode_index, 2);
    svc.shutdown();
}

#[test]
fn restore_applies_settings_then_binds_saved_track() {
    let svc = service();
    let store = svc.handle();
    let saved = Settings {
        volume: 0.4,
        repeat_mode: RepeatMode::All,
        shuffle: true,
        equalizer_gains: [1.0, 2.0, 0.0, 0.0, 0.0, 0.0, -3.0, 0.0],
        ..Settings::default()
    };
    store.save_record(SETTINGS_KEY, &saved);
    store.save_record(
        PLAYBACK_STATE_KEY,
        &PlaybackStateRecord {
            last_index: Some(2),
            last_position_seconds: 37.5,
        },
    );

    let mut lib = library(5);
    let (mut ctrl, rx) = controller();
    let mut session = SessionPersistence::load(store.clone(), &SessionConfig::default());
    session.restore(&mut lib, &mut ctrl);

    assert_eq!(ctrl.volume(), 0.4);
    assert_eq!(ctrl.repeat(), RepeatMode::All);
    assert!(ctrl.shuffle());
    assert_eq!(ctrl.eq_gains()[6], -3.0);
    assert_eq!(ctrl.current(), Some(2));
    assert!(ctrl.graph().is_none());

    // The restore's own track-change checkpoint keeps the saved position.
    pump(&mut session, &mut ctrl);
    let state = saved_state(&store).unwrap();
    assert_eq!(state.last_index, Some(2));
    assert_eq!(state.last_position_seconds, 37.5);

    let request = ctrl.request();
    ctrl.on_audio_event(
        &mut lib,
        AudioEvent::Ready {
            request,
            duration: Some(Duration::from_secs(120)),
        },
    );
    assert_eq!(ctrl.state(), PlaybackState::Paused);
    assert_eq!(ctrl.position(), Duration::from_secs_f64(37.5));
    assert!(
        rx.try_iter()
            .all(|c| !matches!(c, AudioCmd::Play { .. }))
    );
    svc.shutdown();
}

#[test]
fn restore_skips_an_index_past_the_library() {
    let svc = service();
    let store = svc.handle();
    store.save_record(
        PLAYBACK_STATE_KEY,
        &PlaybackStateRecord {
            last_index: Some(9),
            last_position_seconds: 1.0,
        },
    );

    let mut lib = library(3);
    let (mut ctrl, _rx) = controller();
    let mut session = SessionPersistence::load(store, &SessionConfig::default());
    session.restore(&mut lib, &mut ctrl);
    assert_eq!(ctrl.current(), None);
    assert_eq!(ctrl.state(), PlaybackState::Idle);
    svc.shutdown();
}

#[test]
fn deleting_the_current_track_checkpoints_no_index() {
    let svc = service();
    let store = svc.handle();
    let mut lib = library(3);
    let (mut ctrl, _rx) = controller();
    let mut session = SessionPersistence::load(store.clone(), &SessionConfig::default());

    ctrl.load(&mut lib, 1, true);
    pump(&mut session, &mut ctrl);
    assert_eq!(saved_state(&store).unwrap().last_index, Some(1));

    lib.delete(1);
    ctrl.on_track_removed(1);
    pump(&mut session, &mut ctrl);

    let state = saved_state(&store).unwrap();
    assert_eq!(state.last_index, None);
    assert_eq!(state.last_position_seconds, 0.0);
    svc.shutdown();
}

#[test]
fn tick_checkpoints_on_interval_only_while_bound() {
    let svc = service();
    let store = svc.handle();
    let cfg = SessionConfig {
        checkpoint_interval_secs: 5,
    };
    let mut lib = library(2);
    let (mut ctrl, _rx) = controller();
    let mut session = SessionPersistence::load(store.clone(), &cfg);

    let t0 = Instant::now();
    session.tick(t0, &ctrl);
    assert!(saved_state(&store).is_none());

    ctrl.load(&mut lib, 0, true);
    let request = ctrl.request();
    ctrl.on_audio_event(
        &mut lib,
        AudioEvent::Ready {
            request,
            duration: Some(Duration::from_secs(60)),
        },
    );
    session.tick(t0, &ctrl);
    assert_eq!(saved_state(&store).unwrap().last_position_seconds, 0.0);

    ctrl.on_audio_event(
        &mut lib,
        AudioEvent::Progress {
            request,
            position: Duration::from_secs(3),
        },
    );
    session.tick(t0 + Duration::from_secs(2), &ctrl);
    assert_eq!(saved_state(&store).unwrap().last_position_seconds, 0.0);

    session.tick(t0 + Duration::from_secs(5), &ctrl);
    assert_eq!(saved_state(&store).unwrap().last_position_seconds, 3.0);

    ctrl.on_audio_event(
        &mut lib,
        AudioEvent::Progress {
            request,
            position: Duration::from_secs(4),
        },
    );
    session.flush(&ctrl);
    assert_eq!(saved_state(&store).unwrap().last_position_seconds, 4.0);
    svc.shutdown();
}

#[test]
fn controller_setting_changes_are_persisted() {
    let svc = service();
    let store = svc.handle();
    let (mut ctrl, _rx) = controller();
    let mut session = SessionPersistence::load(store.clone(), &SessionConfig::default());

    ctrl.set_repeat(RepeatMode::One);
    ctrl.set_eq_gain(3, 4.0);
    pump(&mut session, &mut ctrl);

    let saved: Settings = store.load_record(SETTINGS_KEY).unwrap();
    assert_eq!(saved.repeat_mode, RepeatMode::One);
    assert_eq!(saved.equalizer_gains[3], 4.0);
    svc.shutdown();
}
