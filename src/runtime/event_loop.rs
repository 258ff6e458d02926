use std::io::Stdout;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::debug;

use crate::app::InputMode;
use crate::config::AppConfig;
use crate::library::{Enriched, LibraryEvent, spawn_import};
use crate::mpris::ControlCmd;
use crate::playback::ControllerEvent;
use crate::ui;

use super::mpris_sync;
use super::startup::Runtime;

const INPUT_POLL: Duration = Duration::from_millis(50);

/// State tracked by the event loop across iterations.
#[derive(Default)]
pub struct EventLoopState {
    /// Internal two-key prefix state used for `gg` handling.
    pending_gg: bool,
}

/// Main terminal event loop. Returns `Ok(())` when quitting is requested.
pub fn run(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    config: &AppConfig,
    rt: &mut Runtime,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut state = EventLoopState::default();

    loop {
        while let Ok(ev) = rt.audio_rx.try_recv() {
            rt.controller.on_audio_event(&mut rt.library, ev);
        }
        while let Ok(ev) = rt.library_rx.try_recv() {
            on_library_event(rt, ev);
        }
        while let Ok(cmd) = rt.control_rx.try_recv() {
            if mpris_sync::dispatch(cmd, rt.app.cursor, &mut rt.library, &mut rt.controller) {
                return Ok(());
            }
        }
        pump_controller_events(rt);

        let now = Instant::now();
        rt.session.tick(now, &rt.controller);
        if rt.resilience.tick(now, &mut rt.controller) {
            pump_controller_events(rt);
        }

        let display = rt.library.display_order();
        rt.app.ensure_visible(&display);
        terminal.draw(|f| {
            ui::draw(
                f,
                &ui::View {
                    app: &rt.app,
                    library: &rt.library,
                    controller: &rt.controller,
                    settings: rt.session.settings(),
                    ui: &config.ui,
                    controls: &config.controls,
                    display: &display,
                },
            )
        })?;

        if event::poll(INPUT_POLL)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if handle_key_event(key, config, rt, &mut state) {
                        return Ok(());
                    }
                }
                Event::FocusLost => {
                    debug!("focus lost, checkpointing");
                    rt.session.flush(&rt.controller);
                }
                Event::FocusGained => {
                    rt.resilience.on_focus_regained(&mut rt.controller);
                }
                _ => {}
            }
        }
    }
}

/// Fan controller events out to persistence, the media session and the monitor.
fn pump_controller_events(rt: &mut Runtime) {
    for ev in rt.controller.drain_events() {
        rt.session.on_controller_event(&ev, &rt.controller);
        mpris_sync::on_controller_event(rt.now_playing.as_ref(), &ev, &rt.library, &rt.controller);
        match ev {
            ControllerEvent::StateChanged(s) => rt.resilience.observe(s),
            ControllerEvent::TrackChanged(current) => {
                rt.app.follow(current, &rt.library.display_order());
            }
            _ => {}
        }
    }
}

fn on_library_event(rt: &mut Runtime, ev: LibraryEvent) {
    match ev {
        LibraryEvent::Imported(files) => {
            let added = rt.library.import(files);
            rt.app.set_notice(format!("imported {} tracks", added.len()));
            if rt.app.cursor.is_none() {
                rt.app.cursor = added.first().copied();
            }
        }
        LibraryEvent::Enriched(e) => {
            let Some(applied) = rt.library.apply_enrichment(e) else {
                return;
            };
            let index = match applied {
                Enriched::Duration { index, seconds } => {
                    rt.controller.on_duration_known(index, seconds);
                    index
                }
                Enriched::Tags { index } => index,
            };
            if rt.controller.current() == Some(index) {
                mpris_sync::refresh_track(rt.now_playing.as_ref(), &rt.library, &rt.controller);
            }
        }
    }
}

fn handle_text_input(key: KeyEvent, rt: &mut Runtime, config: &AppConfig) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match (rt.app.mode, key.code) {
        (InputMode::Filter, KeyCode::Esc) => {
            rt.library.clear_query();
            rt.app.leave_input_mode();
        }
        (InputMode::Filter, KeyCode::Enter) => rt.app.leave_input_mode(),
        (InputMode::Filter, KeyCode::Backspace) => rt.library.pop_query_char(),
        (InputMode::Filter, KeyCode::Down) => rt.app.move_next(&rt.library.display_order()),
        (InputMode::Filter, KeyCode::Char('n')) if ctrl => {
            rt.app.move_next(&rt.library.display_order())
        }
        (InputMode::Filter, KeyCode::Up) => rt.app.move_prev(&rt.library.display_order()),
        (InputMode::Filter, KeyCode::Char('p')) if ctrl => {
            rt.app.move_prev(&rt.library.display_order())
        }
        (InputMode::Filter, KeyCode::Char(c)) if !c.is_control() => rt.library.push_query_char(c),

        (InputMode::Import, KeyCode::Esc) => {
            rt.app.import_input.clear();
            rt.app.leave_input_mode();
        }
        (InputMode::Import, KeyCode::Enter) => {
            let paths = rt.app.take_import_paths();
            if !paths.is_empty() {
                rt.app.set_notice(format!("importing from {} location(s)", paths.len()));
                spawn_import(paths, config.library.clone(), rt.library_tx.clone());
            }
        }
        (InputMode::Import, KeyCode::Backspace) => {
            rt.app.import_input.pop();
        }
        (InputMode::Import, KeyCode::Char(c)) if !c.is_control() => rt.app.import_input.push(c),
        _ => {}
    }
}

fn handle_key_event(
    key: KeyEvent,
    config: &AppConfig,
    rt: &mut Runtime,
    state: &mut EventLoopState,
) -> bool {
    if rt.app.mode != InputMode::Normal {
        state.pending_gg = false;
        handle_text_input(key, rt, config);
        return false;
    }

    let display = rt.library.display_order();
    let controls = &config.controls;
    let was_gg = std::mem::take(&mut state.pending_gg);

    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('j') | KeyCode::Down => rt.app.move_next(&display),
        KeyCode::Char('k') | KeyCode::Up => rt.app.move_prev(&display),
        KeyCode::Char('g') => {
            if was_gg {
                rt.app.jump_first(&display);
            } else {
                state.pending_gg = true;
            }
        }
        KeyCode::Char('G') => rt.app.jump_last(&display),
        KeyCode::Enter => {
            if let Some(index) = rt.app.cursor {
                rt.app.follow_playback = true;
                rt.controller.load(&mut rt.library, index, true);
            }
        }
        KeyCode::Char('p') | KeyCode::Char(' ') => {
            let _ = rt.control_tx.send(ControlCmd::PlayPause);
        }
        KeyCode::Char('l') => {
            rt.app.follow_playback = true;
            rt.controller.next(&mut rt.library);
        }
        KeyCode::Char('h') => {
            rt.app.follow_playback = true;
            rt.controller.prev(&mut rt.library);
        }
        KeyCode::Char('L') => rt.controller.seek_by(controls.scrub_seconds as f64),
        KeyCode::Char('H') => rt.controller.seek_by(-(controls.scrub_seconds as f64)),
        KeyCode::Char('/') => rt.app.enter_filter_mode(),
        KeyCode::Esc => rt.library.clear_query(),
        KeyCode::Char('s') => {
            let shuffle = !rt.controller.shuffle();
            rt.controller.set_shuffle(shuffle);
        }
        KeyCode::Char('r') => {
            let mode = rt.controller.repeat().cycle();
            rt.controller.set_repeat(mode);
        }
        KeyCode::Char('o') => {
            let sort = rt.library.sort_key().cycle();
            rt.library.set_sort(sort, rt.library.sort_direction());
        }
        KeyCode::Char('O') => {
            let dir = rt.library.sort_direction().toggle();
            rt.library.set_sort(rt.library.sort_key(), dir);
        }
        KeyCode::Char('d') => {
            if let Some(index) = rt.app.cursor {
                if let Some(track) = rt.library.delete(index) {
                    rt.controller.on_track_removed(index);
                    rt.app.on_track_removed(index, &rt.library.display_order());
                    rt.app.set_notice(format!("deleted {}", track.name));
                }
            }
        }
        KeyCode::Char('i') => rt.app.begin_import(),
        KeyCode::Char('e') => rt.session.update_settings(|s| {
            s.equalizer_panel_visible = !s.equalizer_panel_visible;
        }),
        KeyCode::Char('[') => rt.app.select_band(-1),
        KeyCode::Char(']') => rt.app.select_band(1),
        KeyCode::Char('{') | KeyCode::Char('}') => {
            let band = rt.app.eq_band;
            let step = if key.code == KeyCode::Char('}') {
                controls.eq_step_db
            } else {
                -controls.eq_step_db
            };
            let db = rt.controller.eq_gains()[band] + step;
            rt.controller.set_eq_gain(band, db);
        }
        KeyCode::Char('=') | KeyCode::Char('+') => {
            let v = rt.controller.volume() + controls.volume_step;
            rt.controller.set_volume(v);
        }
        KeyCode::Char('-') => {
            let v = rt.controller.volume() - controls.volume_step;
            rt.controller.set_volume(v);
        }
        KeyCode::Char('v') => rt.session.update_settings(|s| s.show_visualizer = !s.show_visualizer),
        KeyCode::Char('V') => rt.session.update_settings(|s| {
            s.visualizer_mode_index = (s.visualizer_mode_index + 1) % ui::VISUALIZER_MODES.len();
        }),
        KeyCode::Char('K') => rt.app.toggle_metadata_window(),
        _ => {}
    }

    false
}
