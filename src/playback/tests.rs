use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use super::*;
use crate::audio::{AudioCmd, AudioEvent, GraphSlot, GraphState, PlayFailure, RequestId};
use crate::config::AudioConfig;
use crate::library::{LibraryManager, SortDirection, SortKey, Track};
use crate::store::StoreHandle;

fn library(n: usize) -> LibraryManager {
    let tracks = (0..n)
        .map(|i| Track {
            id: format!("{i:04}"),
            payload: Arc::from(vec![i as u8]),
            name: format!("track {i}"),
            artist: "artist".into(),
            duration_seconds: 0.0,
        })
        .collect();
    LibraryManager::new(tracks, StoreHandle::detached())
}

fn controller() -> (PlaybackController, Receiver<AudioCmd>) {
    let (tx, rx) = mpsc::channel();
    let ctrl = PlaybackController::new(tx, GraphSlot::new(), AudioConfig::default()).with_seed(7);
    (ctrl, rx)
}

fn drain(rx: &Receiver<AudioCmd>) -> Vec<AudioCmd> {
    rx.try_iter().collect()
}

fn ready(ctrl: &mut PlaybackController, lib: &mut LibraryManager, secs: Option<u64>) {
    let request = ctrl.request();
    ctrl.on_audio_event(
        lib,
        AudioEvent::Ready {
            request,
            duration: secs.map(Duration::from_secs),
        },
    );
}

/// Load `index` with autoplay and let it become ready.
fn playing(ctrl: &mut PlaybackController, lib: &mut LibraryManager, index: usize) {
    ctrl.load(lib, index, true);
    ready(ctrl, lib, Some(200));
    assert_eq!(ctrl.state(), PlaybackState::Playing);
}

fn loaded_track(cmd: &AudioCmd) -> Option<String> {
    match cmd {
        AudioCmd::Load { media, .. } => Some(media.track_id().to_string()),
        _ => None,
    }
}

#[test]
fn load_out_of_range_is_a_noop() {
    let mut lib = library(2);
    let (mut ctrl, rx) = controller();
    ctrl.load(&mut lib, 5, true);
    assert_eq!(ctrl.state(), PlaybackState::Idle);
    assert_eq!(ctrl.current(), None);
    assert!(drain(&rx).is_empty());
    assert!(ctrl.drain_events().is_empty());
}

#[test]
fn autoplay_load_plays_when_ready_and_builds_graph() {
    let mut lib = library(3);
    let (mut ctrl, rx) = controller();

    ctrl.load(&mut lib, 1, true);
    assert_eq!(ctrl.state(), PlaybackState::Loading);
    assert!(ctrl.graph().is_some());

    let cmds = drain(&rx);
    assert_eq!(cmds.len(), 1);
    assert_eq!(loaded_track(&cmds[0]).as_deref(), Some("0001"));

    ready(&mut ctrl, &mut lib, Some(180));
    assert_eq!(ctrl.state(), PlaybackState::Playing);
    assert_eq!(ctrl.duration(), Some(Duration::from_secs(180)));
    let cmds = drain(&rx);
    assert!(matches!(cmds.as_slice(), [AudioCmd::Play { request }] if *request == ctrl.request()));

    let events = ctrl.drain_events();
    assert!(events.contains(&ControllerEvent::TrackChanged(Some(1))));
    assert!(events.contains(&ControllerEvent::StateChanged(PlaybackState::Playing)));
}

#[test]
fn play_and_pause_are_noops_when_idle() {
    let (mut ctrl, rx) = controller();
    ctrl.play();
    ctrl.pause();
    ctrl.toggle();
    ctrl.seek(10.0);
    assert_eq!(ctrl.state(), PlaybackState::Idle);
    assert!(drain(&rx).is_empty());
    assert!(ctrl.graph().is_none());
}

#[test]
fn pause_suspends_graph_and_play_resumes_it() {
    let mut lib = library(2);
    let (mut ctrl, rx) = controller();
    playing(&mut ctrl, &mut lib, 0);
    drain(&rx);

    ctrl.pause();
    assert_eq!(ctrl.state(), PlaybackState::Paused);
    assert_eq!(ctrl.graph().unwrap().state(), GraphState::Suspended);
    assert!(matches!(drain(&rx).as_slice(), [AudioCmd::Pause]));

    ctrl.toggle();
    assert_eq!(ctrl.state(), PlaybackState::Playing);
    assert_eq!(ctrl.graph().unwrap().state(), GraphState::Running);
    assert!(matches!(drain(&rx).as_slice(), [AudioCmd::Play { .. }]));
}

#[test]
fn next_wraps_with_repeat_all() {
    let mut lib = library(3);
    let (mut ctrl, rx) = controller();
    ctrl.set_repeat(RepeatMode::All);
    playing(&mut ctrl, &mut lib, 2);
    drain(&rx);

    ctrl.next(&mut lib);
    assert_eq!(ctrl.current(), Some(0));
    assert_eq!(loaded_track(&drain(&rx)[0]).as_deref(), Some("0000"));
}

#[test]
fn next_stops_at_the_end_without_repeat() {
    let mut lib = library(3);
    let (mut ctrl, rx) = controller();
    ctrl.set_repeat(RepeatMode::None);
    playing(&mut ctrl, &mut lib, 2);
    drain(&rx);

    ctrl.next(&mut lib);
    assert_eq!(ctrl.current(), Some(2));
    assert_eq!(ctrl.state(), PlaybackState::Paused);
    assert!(matches!(drain(&rx).as_slice(), [AudioCmd::Pause]));

    ctrl.next(&mut lib);
    assert_eq!(ctrl.current(), Some(2));
    assert!(drain(&rx).iter().all(|c| loaded_track(c).is_none()));
}

#[test]
fn next_follows_displayed_order() {
    let mut lib = library(4);
    lib.set_sort(SortKey::Added, SortDirection::Descending);
    let (mut ctrl, _rx) = controller();
    playing(&mut ctrl, &mut lib, 3);

    ctrl.next(&mut lib);
    assert_eq!(ctrl.current(), Some(2));
}

#[test]
fn next_from_a_hidden_track_goes_to_first_visible() {
    let mut lib = library(5);
    let (mut ctrl, _rx) = controller();
    playing(&mut ctrl, &mut lib, 1);

    lib.set_query("track 3");
    ctrl.next(&mut lib);
    assert_eq!(ctrl.current(), Some(3));
}

#[test]
fn prev_wraps_at_the_start() {
    let mut lib = library(4);
    let (mut ctrl, _rx) = controller();
    playing(&mut ctrl, &mut lib, 0);

    ctrl.prev(&mut lib);
    assert_eq!(ctrl.current(), Some(3));
    ctrl.prev(&mut lib);
    assert_eq!(ctrl.current(), Some(2));
}

#[test]
fn shuffle_draws_from_the_whole_library() {
    let mut lib = library(6);
    let (mut ctrl, _rx) = controller();
    ctrl.set_shuffle(true);
    // Filter hides everything but one track; shuffle ignores it.
    lib.set_query("track 0");
    playing(&mut ctrl, &mut lib, 0);

    let mut seen = std::collections::HashSet::new();
    for _ in 0..200 {
        ctrl.next(&mut lib);
        let c = ctrl.current().unwrap();
        assert!(c < lib.len());
        seen.insert(c);
    }
    assert!(seen.len() > 1);
    assert!(seen.iter().any(|&i| i != 0));
}

#[test]
fn seek_clamps_to_duration() {
    let mut lib = library(1);
    let (mut ctrl, rx) = controller();
    playing(&mut ctrl, &mut lib, 0);
    drain(&rx);

    ctrl.seek(500.0);
    assert_eq!(ctrl.position(), Duration::from_secs(200));
    ctrl.seek(-3.0);
    assert_eq!(ctrl.position(), Duration::ZERO);
    ctrl.seek(42.5);
    assert_eq!(ctrl.position(), Duration::from_secs_f64(42.5));

    let seeks: Vec<Duration> = drain(&rx)
        .into_iter()
        .filter_map(|c| match c {
            AudioCmd::Seek(d) => Some(d),
            _ => None,
        })
        .collect();
    assert_eq!(
        seeks,
        vec![
            Duration::from_secs(200),
            Duration::ZERO,
            Duration::from_secs_f64(42.5)
        ]
    );
}

#[test]
fn seek_with_unknown_duration_only_clamps_below() {
    let mut lib = library(1);
    let (mut ctrl, _rx) = controller();
    ctrl.load(&mut lib, 0, true);
    ready(&mut ctrl, &mut lib, None);

    ctrl.seek(1000.0);
    assert_eq!(ctrl.position(), Duration::from_secs(1000));
    ctrl.seek(-1.0);
    assert_eq!(ctrl.position(), Duration::ZERO);
}

#[test]
fn seek_before_ready_is_queued() {
    let mut lib = library(1);
    let (mut ctrl, rx) = controller();
    ctrl.load(&mut lib, 0, true);
    ctrl.seek(30.0);
    assert!(drain(&rx).iter().all(|c| !matches!(c, AudioCmd::Seek(_))));

    ready(&mut ctrl, &mut lib, Some(100));
    let cmds = drain(&rx);
    assert!(matches!(cmds[0], AudioCmd::Seek(d) if d == Duration::from_secs(30)));
    assert!(matches!(cmds[1], AudioCmd::Play { .. }));
}

#[test]
fn stale_events_are_ignored() {
    let mut lib = library(3);
    let (mut ctrl, rx) = controller();
    ctrl.load(&mut lib, 0, true);
    let old = ctrl.request();
    ctrl.load(&mut lib, 1, true);
    drain(&rx);
    ctrl.drain_events();

    ctrl.on_audio_event(
        &mut lib,
        AudioEvent::Ready {
            request: old,
            duration: Some(Duration::from_secs(9)),
        },
    );
    ctrl.on_audio_event(
        &mut lib,
        AudioEvent::PlayFailed {
            request: old,
            failure: PlayFailure::Decode("bad".into()),
        },
    );
    ctrl.on_audio_event(&mut lib, AudioEvent::Ended { request: old });

    assert_eq!(ctrl.state(), PlaybackState::Loading);
    assert_eq!(ctrl.current(), Some(1));
    assert_eq!(ctrl.duration(), None);
    assert!(drain(&rx).is_empty());
    assert!(ctrl.drain_events().is_empty());
}

#[test]
fn superseded_failure_is_swallowed_and_real_failure_pauses() {
    let mut lib = library(2);
    let (mut ctrl, _rx) = controller();
    playing(&mut ctrl, &mut lib, 0);
    let request = ctrl.request();

    ctrl.on_audio_event(
        &mut lib,
        AudioEvent::PlayFailed {
            request,
            failure: PlayFailure::Superseded,
        },
    );
    assert_eq!(ctrl.state(), PlaybackState::Playing);

    ctrl.on_audio_event(
        &mut lib,
        AudioEvent::PlayFailed {
            request,
            failure: PlayFailure::Output("no device".into()),
        },
    );
    assert_eq!(ctrl.state(), PlaybackState::Paused);
    assert_eq!(ctrl.current(), Some(0));
}

#[test]
fn ended_repeats_one_or_advances() {
    let mut lib = library(3);
    let (mut ctrl, rx) = controller();
    ctrl.set_repeat(RepeatMode::One);
    playing(&mut ctrl, &mut lib, 1);
    drain(&rx);

    let request = ctrl.request();
    ctrl.on_audio_event(&mut lib, AudioEvent::Ended { request });
    assert_eq!(ctrl.current(), Some(1));
    assert_eq!(ctrl.request(), request);
    let cmds = drain(&rx);
    assert!(matches!(cmds[0], AudioCmd::Seek(d) if d.is_zero()));
    assert!(matches!(cmds[1], AudioCmd::Play { .. }));

    ctrl.set_repeat(RepeatMode::None);
    ctrl.on_audio_event(&mut lib, AudioEvent::Ended { request });
    assert_eq!(ctrl.current(), Some(2));
    assert_eq!(ctrl.state(), PlaybackState::Loading);
}

#[test]
fn deleting_the_current_track_goes_idle() {
    let mut lib = library(3);
    let (mut ctrl, rx) = controller();
    playing(&mut ctrl, &mut lib, 1);
    drain(&rx);
    ctrl.drain_events();

    let removed = 1;
    lib.delete(removed);
    ctrl.on_track_removed(removed);

    assert_eq!(ctrl.state(), PlaybackState::Idle);
    assert_eq!(ctrl.current(), None);
    assert!(matches!(drain(&rx).as_slice(), [AudioCmd::Unload]));
    let events = ctrl.drain_events();
    assert!(events.contains(&ControllerEvent::TrackChanged(None)));
    assert!(events.contains(&ControllerEvent::StateChanged(PlaybackState::Idle)));
}

#[test]
fn deleting_an_earlier_track_keeps_the_current_one() {
    let mut lib = library(4);
    let (mut ctrl, _rx) = controller();
    playing(&mut ctrl, &mut lib, 2);

    lib.delete(0);
    ctrl.on_track_removed(0);
    assert_eq!(ctrl.current(), Some(1));
    assert_eq!(lib.get(1).unwrap().id, "0002");

    lib.delete(3 - 1);
    ctrl.on_track_removed(2);
    assert_eq!(ctrl.current(), Some(1));
    assert_eq!(ctrl.state(), PlaybackState::Playing);
}

#[test]
fn restore_binds_and_seeks_without_playing() {
    let mut lib = library(5);
    let (mut ctrl, rx) = controller();

    ctrl.restore(&mut lib, 2, 37.5);
    assert_eq!(ctrl.current(), Some(2));
    assert!(ctrl.graph().is_none());
    let cmds = drain(&rx);
    assert_eq!(cmds.len(), 1);
    assert_eq!(loaded_track(&cmds[0]).as_deref(), Some("0002"));

    ready(&mut ctrl, &mut lib, Some(240));
    assert_eq!(ctrl.state(), PlaybackState::Paused);
    assert_eq!(ctrl.position(), Duration::from_secs_f64(37.5));
    let cmds = drain(&rx);
    assert!(matches!(cmds.as_slice(), [AudioCmd::Seek(d)] if *d == Duration::from_secs_f64(37.5)));
    assert!(ctrl.graph().is_none());
}

#[test]
fn restore_with_invalid_index_does_nothing() {
    let mut lib = library(2);
    let (mut ctrl, rx) = controller();
    ctrl.restore(&mut lib, 2, 10.0);
    assert_eq!(ctrl.current(), None);
    assert!(drain(&rx).is_empty());
}

#[test]
fn duration_probe_fills_unknown_duration_for_current_track() {
    let mut lib = library(2);
    let (mut ctrl, _rx) = controller();
    ctrl.load(&mut lib, 0, false);
    ready(&mut ctrl, &mut lib, None);
    assert_eq!(ctrl.duration(), None);

    ctrl.on_duration_known(1, 50.0);
    assert_eq!(ctrl.duration(), None);
    ctrl.on_duration_known(0, 50.0);
    assert_eq!(ctrl.duration(), Some(Duration::from_secs(50)));
    ctrl.on_duration_known(0, 99.0);
    assert_eq!(ctrl.duration(), Some(Duration::from_secs(50)));
}

#[test]
fn settings_setters_clamp_and_notify() {
    let (mut ctrl, rx) = controller();
    ctrl.set_volume(1.7);
    assert_eq!(ctrl.volume(), 1.0);
    assert!(matches!(drain(&rx).as_slice(), [AudioCmd::SetVolume(v)] if *v == 1.0));

    ctrl.set_eq_gain(2, 20.0);
    assert_eq!(ctrl.eq_gains()[2], 12.0);
    ctrl.set_eq_gain(99, 1.0);

    let events = ctrl.drain_events();
    assert_eq!(
        events,
        vec![ControllerEvent::SettingsChanged, ControllerEvent::SettingsChanged]
    );
}

#[test]
fn graph_starts_with_stored_gains() {
    let mut lib = library(1);
    let (mut ctrl, _rx) = controller();
    ctrl.set_eq_gain(0, -6.0);
    playing(&mut ctrl, &mut lib, 0);
    assert_eq!(ctrl.graph().unwrap().target_gain(0), -6.0);
}

#[test]
fn repeat_mode_round_trips_through_integers() {
    for mode in [RepeatMode::None, RepeatMode::All, RepeatMode::One] {
        let n: u8 = mode.into();
        assert_eq!(RepeatMode::try_from(n), Ok(mode));
    }
    assert!(RepeatMode::try_from(3).is_err());
    assert_eq!(RepeatMode::None.cycle().cycle().cycle(), RepeatMode::None);
    assert_eq!(RequestId::default().next(), RequestId(1));
}
