use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use tracing::{info, warn};

use crate::app::App;
use crate::audio::{AudioEvent, AudioPlayer, GraphSlot};
use crate::config::AppConfig;
use crate::library::{LibraryEvent, LibraryManager, spawn_import};
use crate::mpris::{self, ControlCmd, NoopNowPlaying, NowPlaying};
use crate::playback::PlaybackController;
use crate::resilience::ResilienceMonitor;
use crate::session::SessionPersistence;
use crate::store::{StoreHandle, StoreService, TrackStore};

/// Everything the event loop drives, wired together.
pub struct Runtime {
    pub app: App,
    pub library: LibraryManager,
    pub controller: PlaybackController,
    pub session: SessionPersistence,
    pub resilience: ResilienceMonitor,
    pub now_playing: Box<dyn NowPlaying>,
    pub audio: AudioPlayer,
    pub audio_rx: Receiver<AudioEvent>,
    pub library_tx: Sender<LibraryEvent>,
    pub library_rx: Receiver<LibraryEvent>,
    pub control_tx: Sender<ControlCmd>,
    pub control_rx: Receiver<ControlCmd>,
    store: Option<StoreService>,
}

fn open_store(config: &AppConfig) -> Option<StoreService> {
    let opened = match config.database_path() {
        Some(path) => TrackStore::open(&path).map(|s| {
            info!(path = %path.display(), "library store opened");
            s
        }),
        None => TrackStore::open_in_memory(),
    };
    let store = match opened {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "library store unavailable, this session will not be saved");
            match TrackStore::open_in_memory() {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = %e, "in-memory store unavailable");
                    return None;
                }
            }
        }
    };
    Some(StoreService::spawn(store))
}

/// Build the runtime and restore the previous session. `imports` are
/// queued for import once the loop runs.
pub fn start(config: &AppConfig, imports: Vec<PathBuf>) -> Runtime {
    let store = open_store(config);
    let handle = store
        .as_ref()
        .map(StoreService::handle)
        .unwrap_or_else(StoreHandle::detached);

    let (library_tx, library_rx) = mpsc::channel::<LibraryEvent>();
    let mut library = LibraryManager::new(handle.load_all(), handle.clone());
    library.set_event_sender(library_tx.clone());
    info!(tracks = library.len(), "library loaded");

    let graph = GraphSlot::new();
    let (audio_tx, audio_rx) = mpsc::channel::<AudioEvent>();
    let audio = AudioPlayer::spawn(graph.clone(), audio_tx);
    let mut controller = PlaybackController::new(audio.sender(), graph, config.audio.clone());

    let mut session = SessionPersistence::load(handle, &config.session);
    session.restore(&mut library, &mut controller);

    let resilience = ResilienceMonitor::from_config(&config.resilience, audio.playback_handle());

    let (control_tx, control_rx) = mpsc::channel::<ControlCmd>();
    let now_playing: Box<dyn NowPlaying> = match mpris::spawn_mpris(control_tx.clone()) {
        Some(h) => Box::new(h),
        None => Box::new(NoopNowPlaying),
    };

    if !imports.is_empty() {
        spawn_import(imports, config.library.clone(), library_tx.clone());
    }

    let mut app = App::new();
    app.ensure_visible(&library.display_order());
    app.follow(controller.current(), &library.display_order());

    Runtime {
        app,
        library,
        controller,
        session,
        resilience,
        now_playing,
        audio,
        audio_rx,
        library_tx,
        library_rx,
        control_tx,
        control_rx,
        store,
    }
}

impl Runtime {
    /// Save the session, fade out, and stop every helper thread.
    pub fn shutdown(mut self, config: &AppConfig) {
        self.session.flush(&self.controller);
        self.audio
            .quit_softly(Duration::from_millis(config.audio.quit_fade_out_ms));
        self.now_playing.teardown();
        self.resilience.shutdown();
        if let Some(store) = self.store.take() {
            store.shutdown();
        }
        info!("shut down");
    }
}
