use super::*;
use std::sync::mpsc;
use std::time::Duration;

fn make_track() -> Track {
    Track {
        id: "0001-0000".to_string(),
        payload: Arc::from(vec![0u8; 4]),
        name: "Test Title".to_string(),
        artist: "Test Artist".to_string(),
        duration_seconds: 2.5,
    }
}

fn handle() -> (MprisHandle, Arc<Mutex<SharedState>>, Receiver<Notify>) {
    let state = Arc::new(Mutex::new(SharedState::default()));
    let (notify_tx, notify_rx) = mpsc::channel::<Notify>();
    let handle = MprisHandle {
        state: state.clone(),
        notify: notify_tx,
        join: None,
    };
    (handle, state, notify_rx)
}

fn player() -> (PlayerIface, Arc<Mutex<SharedState>>, Receiver<ControlCmd>) {
    let state = Arc::new(Mutex::new(SharedState::default()));
    let (tx, rx) = mpsc::channel::<ControlCmd>();
    let iface = PlayerIface {
        tx,
        state: state.clone(),
    };
    (iface, state, rx)
}

#[test]
fn set_track_sets_and_clears_shared_state() {
    let (handle, state, notify) = handle();

    let track = make_track();
    handle.set_track(Some(7), Some(&track));
    {
        let s = state.lock().unwrap();
        assert_eq!(s.title.as_deref(), Some("Test Title"));
        assert_eq!(s.artist, vec!["Test Artist".to_string()]);
        assert_eq!(s.length_micros, Some(2_500_000));
        assert_eq!(
            s.track_id.as_ref().map(|p| p.as_str()),
            Some("/org/mpris/MediaPlayer2/track/7")
        );
    }

    handle.set_track(None, None);
    {
        let s = state.lock().unwrap();
        assert_eq!(s.title, None);
        assert!(s.artist.is_empty());
        assert_eq!(s.length_micros, None);
        assert!(s.track_id.is_none());
    }
    assert_eq!(notify.try_iter().count(), 2);
}

#[test]
fn unknown_duration_leaves_length_unset_until_progress_reports_it() {
    let (handle, state, notify) = handle();
    let mut track = make_track();
    track.duration_seconds = 0.0;

    handle.set_track(Some(0), Some(&track));
    assert_eq!(state.lock().unwrap().length_micros, None);

    handle.set_progress(Duration::from_secs(1), Some(Duration::from_secs(90)), 1.0);
    let s = state.lock().unwrap();
    assert_eq!(s.length_micros, Some(90_000_000));
    assert_eq!(s.position_micros, 1_000_000);
    let sent: Vec<_> = notify.try_iter().collect();
    assert_eq!(sent, vec![Notify::Track, Notify::Track]);
}

#[test]
fn set_playback_notifies_only_on_change() {
    let (handle, _state, notify) = handle();
    handle.set_playback(PlaybackState::Playing);
    handle.set_playback(PlaybackState::Playing);
    handle.set_playback(PlaybackState::Paused);
    assert_eq!(notify.try_iter().count(), 2);
}

#[test]
fn playback_status_maps_controller_states() {
    let (iface, state, _rx) = player();

    for (playback, expected) in [
        (PlaybackState::Idle, "Stopped"),
        (PlaybackState::Loading, "Paused"),
        (PlaybackState::Playing, "Playing"),
        (PlaybackState::Paused, "Paused"),
    ] {
        state.lock().unwrap().playback = playback;
        assert_eq!(iface.playback_status(), expected);
    }
}

#[test]
fn metadata_includes_expected_keys_when_present() {
    let (iface, state, _rx) = player();
    assert!(iface.metadata().is_empty());

    {
        let mut s = state.lock().unwrap();
        s.title = Some("Title".to_string());
        s.artist = vec!["Artist".to_string()];
        s.length_micros = Some(42);
        s.track_id = track_path(1);
    }

    let map = iface.metadata();
    for k in ["mpris:trackid", "xesam:title", "xesam:artist", "mpris:length"] {
        assert!(map.contains_key(k), "missing key: {k}");
    }
}

#[test]
fn methods_forward_control_commands() {
    let (iface, _state, rx) = player();
    iface.play_pause();
    iface.next();
    iface.previous();
    iface.stop();
    iface.seek(-5_000_000);

    let got: Vec<_> = rx.try_iter().collect();
    assert_eq!(
        got,
        vec![
            ControlCmd::PlayPause,
            ControlCmd::Next,
            ControlCmd::Prev,
            ControlCmd::Stop,
            ControlCmd::Seek(-5_000_000),
        ]
    );
}

#[test]
fn set_position_requires_the_current_track_id() {
    let (iface, state, rx) = player();
    state.lock().unwrap().track_id = track_path(3);

    let other = ObjectPath::try_from("/org/mpris/MediaPlayer2/track/4").unwrap();
    iface.set_position(other, 1_000);
    assert!(rx.try_recv().is_err());

    let current = ObjectPath::try_from("/org/mpris/MediaPlayer2/track/3").unwrap();
    iface.set_position(current, 2_000);
    assert_eq!(rx.try_recv().unwrap(), ControlCmd::SetPosition(2_000));
}

#[test]
fn noop_teardown_is_harmless() {
    let mut np = NoopNowPlaying;
    np.set_playback(PlaybackState::Playing);
    np.teardown();
}
