//! MPRIS bridge: exposes transport control and now-playing metadata on the
//! D-Bus session bus.
//!
//! Method calls become [`ControlCmd`]s on the runtime channel. The runtime
//! pushes state through the [`NowPlaying`] trait; the service thread turns
//! those updates into `PropertiesChanged` signals.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use async_io::{Timer, block_on};
use tracing::{debug, info, warn};
use zbus::{Connection, interface};
use zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};

use crate::library::Track;
use crate::playback::PlaybackState;

const OBJECT_PATH: &str = "/org/mpris/MediaPlayer2";
const BUS_NAME: &str = "org.mpris.MediaPlayer2.cadenza";
const NOTIFY_TICK: Duration = Duration::from_millis(100);
const STARTUP_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone, Debug, PartialEq)]
pub enum ControlCmd {
    Quit,
    Play,
    Pause,
    PlayPause,
    Stop,
    Next,
    Prev,
    /// Relative seek, in microseconds.
    Seek(i64),
    /// Absolute position in the current track, in microseconds.
    SetPosition(i64),
}

/// Receiver of now-playing updates.
pub trait NowPlaying {
    /// Metadata of the bound track (persisted index and record), or none.
    fn set_track(&self, index: Option<usize>, track: Option<&Track>);
    fn set_playback(&self, state: PlaybackState);
    fn set_progress(&self, position: Duration, duration: Option<Duration>, rate: f64);
    /// Unregister handlers and stop the service.
    fn teardown(&mut self);
}

/// Used when no session bus is available.
pub struct NoopNowPlaying;

impl NowPlaying for NoopNowPlaying {
    fn set_track(&self, _index: Option<usize>, _track: Option<&Track>) {}
    fn set_playback(&self, _state: PlaybackState) {}
    fn set_progress(&self, _position: Duration, _duration: Option<Duration>, _rate: f64) {}
    fn teardown(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Notify {
    Track,
    Playback,
    Rate,
    Shutdown,
}

#[derive(Debug)]
struct SharedState {
    playback: PlaybackState,
    title: Option<String>,
    artist: Vec<String>,
    length_micros: Option<i64>,
    track_id: Option<OwnedObjectPath>,
    position_micros: i64,
    rate: f64,
}

impl Default for SharedState {
    fn default() -> Self {
        Self {
            playback: PlaybackState::Idle,
            title: None,
            artist: Vec::new(),
            length_micros: None,
            track_id: None,
            position_micros: 0,
            rate: 1.0,
        }
    }
}

fn micros(d: Duration) -> i64 {
    i64::try_from(d.as_micros()).unwrap_or(i64::MAX)
}

fn track_path(index: usize) -> Option<OwnedObjectPath> {
    ObjectPath::try_from(format!("{OBJECT_PATH}/track/{index}"))
        .ok()
        .map(OwnedObjectPath::from)
}

pub struct MprisHandle {
    state: Arc<Mutex<SharedState>>,
    notify: Sender<Notify>,
    join: Option<JoinHandle<()>>,
}

impl MprisHandle {
    fn poke(&self, what: Notify) {
        let _ = self.notify.send(what);
    }
}

impl NowPlaying for MprisHandle {
    fn set_track(&self, index: Option<usize>, track: Option<&Track>) {
        if let Ok(mut s) = self.state.lock() {
            match (index, track) {
                (Some(i), Some(t)) => {
                    s.title = Some(t.name.clone());
                    s.artist = vec![t.artist.clone()];
                    s.length_micros = (t.duration_seconds.is_finite() && t.duration_seconds > 0.0)
                        .then(|| micros(Duration::from_secs_f64(t.duration_seconds)));
                    s.track_id = track_path(i);
                }
                _ => {
                    s.title = None;
                    s.artist.clear();
                    s.length_micros = None;
                    s.track_id = None;
                    s.position_micros = 0;
                }
            }
        }
        self.poke(Notify::Track);
    }

    fn set_playback(&self, state: PlaybackState) {
        let changed = match self.state.lock() {
            Ok(mut s) if s.playback != state => {
                s.playback = state;
                true
            }
            _ => false,
        };
        if changed {
            self.poke(Notify::Playback);
        }
    }

    fn set_progress(&self, position: Duration, duration: Option<Duration>, rate: f64) {
        let mut notify = Vec::new();
        if let Ok(mut s) = self.state.lock() {
            s.position_micros = micros(position);
            if let Some(d) = duration {
                let len = Some(micros(d));
                if s.length_micros != len {
                    s.length_micros = len;
                    notify.push(Notify::Track);
                }
            }
            if s.rate != rate {
                s.rate = rate;
                notify.push(Notify::Rate);
            }
        }
        for n in notify {
            self.poke(n);
        }
    }

    fn teardown(&mut self) {
        self.poke(Notify::Shutdown);
        let Some(join) = self.join.take() else {
            return;
        };
        // The bus may be wedged; don't hold up quitting for long.
        let deadline = Instant::now() + Duration::from_millis(500);
        while !join.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        if join.is_finished() {
            let _ = join.join();
        }
    }
}

struct RootIface {
    tx: Sender<ControlCmd>,
}

#[interface(name = "org.mpris.MediaPlayer2")]
impl RootIface {
    fn raise(&self) {
        // No-op for TUI.
    }

    fn quit(&self) {
        let _ = self.tx.send(ControlCmd::Quit);
    }

    #[zbus(property)]
    fn can_quit(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_raise(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn has_track_list(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn identity(&self) -> &str {
        "cadenza"
    }

    #[zbus(property)]
    fn supported_uri_schemes(&self) -> Vec<String> {
        vec![]
    }

    #[zbus(property)]
    fn supported_mime_types(&self) -> Vec<String> {
        vec![]
    }
}

struct PlayerIface {
    tx: Sender<ControlCmd>,
    state: Arc<Mutex<SharedState>>,
}

fn owned<'a>(v: impl Into<Value<'a>>) -> Option<OwnedValue> {
    OwnedValue::try_from(v.into()).ok()
}

#[interface(name = "org.mpris.MediaPlayer2.Player")]
impl PlayerIface {
    fn next(&self) {
        let _ = self.tx.send(ControlCmd::Next);
    }

    fn previous(&self) {
        let _ = self.tx.send(ControlCmd::Prev);
    }

    fn play(&self) {
        let _ = self.tx.send(ControlCmd::Play);
    }

    fn pause(&self) {
        let _ = self.tx.send(ControlCmd::Pause);
    }

    fn play_pause(&self) {
        let _ = self.tx.send(ControlCmd::PlayPause);
    }

    fn stop(&self) {
        let _ = self.tx.send(ControlCmd::Stop);
    }

    fn seek(&self, offset: i64) {
        let _ = self.tx.send(ControlCmd::Seek(offset));
    }

    fn set_position(&self, track_id: ObjectPath<'_>, position: i64) {
        // Requests for a track other than the current one are ignored.
        let current = self
            .state
            .lock()
            .ok()
            .and_then(|s| s.track_id.clone())
            .map(|p| p.as_str() == track_id.as_str())
            .unwrap_or(false);
        if current && position >= 0 {
            let _ = self.tx.send(ControlCmd::SetPosition(position));
        }
    }

    #[zbus(property)]
    fn playback_status(&self) -> &str {
        let Ok(s) = self.state.lock() else {
            return "Stopped";
        };
        match s.playback {
            PlaybackState::Idle => "Stopped",
            PlaybackState::Playing => "Playing",
            PlaybackState::Loading | PlaybackState::Paused => "Paused",
        }
    }

    #[zbus(property)]
    fn position(&self) -> i64 {
        self.state.lock().map(|s| s.position_micros).unwrap_or(0)
    }

    #[zbus(property)]
    fn rate(&self) -> f64 {
        self.state.lock().map(|s| s.rate).unwrap_or(1.0)
    }

    #[zbus(property)]
    fn minimum_rate(&self) -> f64 {
        1.0
    }

    #[zbus(property)]
    fn maximum_rate(&self) -> f64 {
        1.0
    }

    #[zbus(property)]
    fn can_control(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_play(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_pause(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_seek(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_go_next(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_go_previous(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn metadata(&self) -> HashMap<String, OwnedValue> {
        let mut map = HashMap::new();
        let Ok(s) = self.state.lock() else {
            return map;
        };

        if let Some(v) = s.track_id.clone().and_then(owned) {
            map.insert("mpris:trackid".to_string(), v);
        }
        if let Some(v) = s.title.clone().and_then(owned) {
            map.insert("xesam:title".to_string(), v);
        }
        if !s.artist.is_empty() {
            if let Some(v) = owned(s.artist.clone()) {
                map.insert("xesam:artist".to_string(), v);
            }
        }
        if let Some(v) = s.length_micros.and_then(owned) {
            map.insert("mpris:length".to_string(), v);
        }
        map
    }
}

async fn emit(connection: &Connection, what: Notify) -> zbus::Result<()> {
    let iface_ref = connection
        .object_server()
        .interface::<_, PlayerIface>(OBJECT_PATH)
        .await?;
    let emitter = iface_ref.signal_emitter();
    let iface = iface_ref.get().await;
    match what {
        Notify::Track => iface.metadata_changed(emitter).await,
        Notify::Playback => iface.playback_status_changed(emitter).await,
        Notify::Rate => iface.rate_changed(emitter).await,
        Notify::Shutdown => Ok(()),
    }
}

async fn register(
    tx: Sender<ControlCmd>,
    state: Arc<Mutex<SharedState>>,
) -> zbus::Result<Connection> {
    let connection = Connection::session().await?;
    connection.request_name(BUS_NAME).await?;
    let object_server = connection.object_server();
    object_server
        .at(OBJECT_PATH, RootIface { tx: tx.clone() })
        .await?;
    object_server
        .at(OBJECT_PATH, PlayerIface { tx, state })
        .await?;
    Ok(connection)
}

async fn serve(connection: Connection, notify: Receiver<Notify>) {
    loop {
        Timer::after(NOTIFY_TICK).await;
        loop {
            match notify.try_recv() {
                Ok(Notify::Shutdown) | Err(TryRecvError::Disconnected) => {
                    let object_server = connection.object_server();
                    let _ = object_server.remove::<PlayerIface, _>(OBJECT_PATH).await;
                    let _ = object_server.remove::<RootIface, _>(OBJECT_PATH).await;
                    debug!("MPRIS interfaces removed");
                    return;
                }
                Ok(what) => {
                    if let Err(e) = emit(&connection, what).await {
                        debug!(error = %e, "MPRIS property signal failed");
                    }
                }
                Err(TryRecvError::Empty) => break,
            }
        }
    }
}

/// Start the MPRIS service. Returns `None` when the session bus is unavailable.
pub fn spawn_mpris(tx: Sender<ControlCmd>) -> Option<MprisHandle> {
    let state = Arc::new(Mutex::new(SharedState::default()));
    let (notify_tx, notify_rx) = mpsc::channel::<Notify>();
    let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();

    let state_for_thread = state.clone();
    let join = thread::Builder::new()
        .name("cadenza-mpris".into())
        .spawn(move || {
            block_on(async move {
                let connection = match register(tx, state_for_thread).await {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                serve(connection, notify_rx).await;
            });
        })
        .map_err(|e| warn!(error = %e, "failed to spawn MPRIS thread"))
        .ok()?;

    match ready_rx.recv_timeout(STARTUP_TIMEOUT) {
        Ok(Ok(())) => {
            info!(bus_name = BUS_NAME, "MPRIS service registered");
            Some(MprisHandle {
                state,
                notify: notify_tx,
                join: Some(join),
            })
        }
        Ok(Err(e)) => {
            warn!(error = %e, "MPRIS unavailable");
            None
        }
        Err(_) => {
            warn!("MPRIS registration timed out");
            // Dropping the notify sender stops the thread if it ever registers.
            None
        }
    }
}

#[cfg(test)]
mod tests;
