use tracing::debug;

use crate::library::LibraryManager;
use crate::mpris::{ControlCmd, NowPlaying};
use crate::playback::{ControllerEvent, PlaybackController};

const MICROS_PER_SEC: f64 = 1_000_000.0;
/// Playback speed is not adjustable.
const PLAYBACK_RATE: f64 = 1.0;

/// Bind the cursor track, or the first displayed one, and play it.
fn start_from(cursor: Option<usize>, library: &mut LibraryManager, controller: &mut PlaybackController) {
    let display = library.display_order();
    let target = cursor
        .filter(|c| display.contains(c))
        .or_else(|| display.first().copied());
    if let Some(index) = target {
        controller.load(library, index, true);
    }
}

/// Apply a media-session command. Returns true when the player should quit.
pub fn dispatch(
    cmd: ControlCmd,
    cursor: Option<usize>,
    library: &mut LibraryManager,
    controller: &mut PlaybackController,
) -> bool {
    debug!(?cmd, "control command");
    match cmd {
        ControlCmd::Quit => return true,
        ControlCmd::Play => {
            if controller.current().is_none() {
                start_from(cursor, library, controller);
            } else {
                controller.play();
            }
        }
        ControlCmd::Pause => controller.pause(),
        ControlCmd::PlayPause => {
            if controller.current().is_none() {
                start_from(cursor, library, controller);
            } else {
                controller.toggle();
            }
        }
        ControlCmd::Stop => controller.clear(),
        ControlCmd::Next => controller.next(library),
        ControlCmd::Prev => controller.prev(library),
        ControlCmd::Seek(offset) => controller.seek_by(offset as f64 / MICROS_PER_SEC),
        ControlCmd::SetPosition(position) => controller.seek(position as f64 / MICROS_PER_SEC),
    }
    false
}

/// Push the bound track's metadata.
pub fn refresh_track(
    now_playing: &dyn NowPlaying,
    library: &LibraryManager,
    controller: &PlaybackController,
) {
    let current = controller.current();
    now_playing.set_track(current, current.and_then(|i| library.get(i)));
}

pub fn on_controller_event(
    now_playing: &dyn NowPlaying,
    ev: &ControllerEvent,
    library: &LibraryManager,
    controller: &PlaybackController,
) {
    match ev {
        ControllerEvent::TrackChanged(_) => {
            refresh_track(now_playing, library, controller);
            now_playing.set_progress(controller.position(), controller.duration(), PLAYBACK_RATE);
        }
        ControllerEvent::StateChanged(state) => now_playing.set_playback(*state),
        ControllerEvent::Progress { position, duration } => {
            now_playing.set_progress(*position, *duration, PLAYBACK_RATE);
        }
        ControllerEvent::SettingsChanged => {}
    }
}
