//! UI rendering helpers for the terminal user interface.
//!
//! This module contains functions to render the TUI using `ratatui`.

use std::time::{Duration, Instant};

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style, Stylize},
    text::Line,
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, Padding, Paragraph, Wrap},
};

use crate::app::{App, InputMode};
use crate::audio::{BAND_COUNT, BAND_FREQUENCIES, MAX_GAIN_DB};
use crate::config::{ControlsConfig, UiConfig};
use crate::library::LibraryManager;
use crate::playback::PlaybackController;
use crate::session::Settings;

/// Level meter flavours, cycled with `V`.
pub const VISUALIZER_MODES: [&str; 2] = ["rms", "peak"];

const CONTROLS: [(&str, &str); 14] = [
    ("j/k", "up/down"),
    ("gg/G", "top/bottom"),
    ("enter", "play"),
    ("space/p", "play/pause"),
    ("h/l", "prev/next"),
    ("/", "filter"),
    ("o/O", "sort/reverse"),
    ("s", "shuffle"),
    ("r", "repeat"),
    ("i", "import"),
    ("d", "delete"),
    ("e [ ] { }", "equalizer"),
    ("-/=", "volume"),
    ("q", "quit"),
];

/// Everything a frame is drawn from.
pub struct View<'a> {
    pub app: &'a App,
    pub library: &'a LibraryManager,
    pub controller: &'a PlaybackController,
    pub settings: &'a Settings,
    pub ui: &'a UiConfig,
    pub controls: &'a ControlsConfig,
    /// Persisted indices in displayed order.
    pub display: &'a [usize],
}

fn controls_text(scrub_seconds: u64) -> String {
    let mut parts: Vec<String> = CONTROLS
        .iter()
        .map(|(k, v)| format!("[{k}] {v}"))
        .collect();
    parts.insert(5, format!("[H/L] scrub -/+{scrub_seconds}s"));
    parts.join(" | ")
}

/// Format a `Duration` as `MM:SS`.
fn format_mmss(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

fn format_seconds(seconds: f64) -> String {
    if seconds > 0.0 {
        format_mmss(Duration::from_secs_f64(seconds))
    } else {
        "--:--".to_string()
    }
}

/// Compute a centered rectangle with given size constrained to `r`.
fn centered_rect_sized(mut width: u16, mut height: u16, r: Rect) -> Rect {
    width = width.min(r.width.saturating_sub(2)).max(10);
    height = height.min(r.height.saturating_sub(2)).max(5);

    let x = r.x + (r.width.saturating_sub(width) / 2);
    let y = r.y + (r.height.saturating_sub(height) / 2);
    Rect {
        x,
        y,
        width,
        height,
    }
}

fn left_padded(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .title(title)
        .padding(Padding {
            left: 1,
            right: 0,
            top: 0,
            bottom: 0,
        })
}

fn status_text(view: &View) -> String {
    let ctrl = view.controller;
    let mut parts: Vec<String> = Vec::new();

    match ctrl.current().and_then(|i| view.library.get(i)) {
        Some(track) => {
            let elapsed = format_mmss(ctrl.position());
            let total = ctrl
                .duration()
                .map(format_mmss)
                .unwrap_or_else(|| "--:--".to_string());
            parts.push(format!(
                "{}: {} - {} [{elapsed}/{total}]",
                ctrl.state().label(),
                track.artist,
                track.name
            ));
        }
        None => parts.push("idle".to_string()),
    }

    parts.push(format!("VOL {:.0}%", ctrl.volume() * 100.0));
    parts.push(format!("REPEAT {}", ctrl.repeat().label()));
    parts.push(format!(
        "SHUFFLE {}",
        if ctrl.shuffle() { "on" } else { "off" }
    ));
    parts.push(format!(
        "SORT {} {}",
        view.library.sort_key().label(),
        match view.library.sort_direction() {
            crate::library::SortDirection::Ascending => "asc",
            crate::library::SortDirection::Descending => "desc",
        }
    ));

    let q = view.library.query().trim();
    if view.app.mode == InputMode::Filter || !q.is_empty() {
        parts.push(format!("FILTER: {q}"));
    }
    if view.app.mode == InputMode::Import {
        parts.push(format!("IMPORT: {}", view.app.import_input));
    } else if let Some(notice) = &view.app.notice {
        parts.push(notice.clone());
    }

    parts.join(" • ")
}

fn draw_list(frame: &mut Frame, view: &View, area: Rect) {
    let display = view.display;
    let current = view.controller.current();

    // Only build ListItems for the visible window, centered on the cursor.
    let total = display.len();
    let list_height = area.height.saturating_sub(2) as usize;
    let sel_pos = view
        .app
        .cursor
        .and_then(|c| display.iter().position(|&i| i == c))
        .unwrap_or(0);
    let (start, end) = if total <= list_height || list_height == 0 {
        (0, total)
    } else {
        let half = list_height / 2;
        let mut start = sel_pos.saturating_sub(half);
        if start + list_height > total {
            start = total - list_height;
        }
        (start, start + list_height)
    };

    let items: Vec<ListItem> = display[start..end]
        .iter()
        .filter_map(|&i| view.library.get(i).map(|t| (i, t)))
        .map(|(i, t)| {
            let marker = if current == Some(i) { "♪ " } else { "  " };
            let line = format!(
                "{marker}{} - {}  {}",
                t.artist,
                t.name,
                format_seconds(t.duration_seconds)
            );
            if current == Some(i) {
                ListItem::new(line).bold()
            } else {
                ListItem::new(line)
            }
        })
        .collect();

    let title = format!(" tracks ({}/{}) ", total, view.library.len());
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");
    let mut state = ratatui::widgets::ListState::default();
    if total > 0 && view.app.cursor.is_some() {
        state.select(Some(sel_pos - start));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

fn band_label(hz: f32) -> String {
    if hz >= 1000.0 {
        format!("{:>4.0}k", hz / 1000.0)
    } else {
        format!("{hz:>5.0}")
    }
}

fn draw_equalizer(frame: &mut Frame, view: &View, area: Rect) {
    // Show the ramped gains when the graph is live, the stored ones otherwise.
    let gains = match view.controller.graph() {
        Some(g) => g.gains_at(Instant::now()),
        None => view.controller.eq_gains(),
    };
    let width = area.width.saturating_sub(24) as f32;
    let lines: Vec<Line> = (0..BAND_COUNT)
        .map(|band| {
            let db = gains[band];
            let filled = ((db + MAX_GAIN_DB) / (2.0 * MAX_GAIN_DB) * width).round() as usize;
            let bar = "█".repeat(filled);
            let text = format!("{} Hz {:>+5.1} dB {bar}", band_label(BAND_FREQUENCIES[band]), db);
            if band == view.app.eq_band {
                Line::from(text).reversed()
            } else {
                Line::from(text)
            }
        })
        .collect();
    let title = if view.controller.graph().is_some() {
        " equalizer "
    } else {
        " equalizer (inactive) "
    };
    frame.render_widget(Paragraph::new(lines).block(left_padded(title)), area);
}

fn draw_meter(frame: &mut Frame, view: &View, area: Rect) {
    let mode = VISUALIZER_MODES
        .get(view.settings.visualizer_mode_index)
        .copied()
        .unwrap_or(VISUALIZER_MODES[0]);
    let level = view
        .controller
        .graph()
        .map(|g| {
            let tap = g.analysis_tap();
            if mode == "peak" { tap.peak() } else { tap.rms() }
        })
        .filter(|l| l.is_finite())
        .unwrap_or(0.0);
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(format!(" level ({mode}) ")))
        .ratio(f64::from(level.clamp(0.0, 1.0)));
    frame.render_widget(gauge, area);
}

fn draw_metadata(frame: &mut Frame, view: &View, area: Rect) {
    let popup_area = centered_rect_sized(72, 8, area);
    frame.render_widget(Clear, popup_area);

    let meta = match view.app.cursor.and_then(|i| view.library.get(i)) {
        Some(track) => format!(
            "Title: {}\nArtist: {}\nDuration: {}\nId: {}\nSize: {} bytes",
            track.name,
            track.artist,
            format_seconds(track.duration_seconds),
            track.id,
            track.payload.len()
        ),
        None => "No track selected".to_string(),
    };
    let paragraph = Paragraph::new(meta)
        .block(left_padded(" metadata (K closes) "))
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, popup_area);
}

/// Render the entire UI into the provided `frame`.
pub fn draw(frame: &mut Frame, view: &View) {
    let eq_height = if view.settings.equalizer_panel_visible {
        BAND_COUNT as u16 + 2
    } else {
        0
    };
    let meter_height = if view.settings.show_visualizer { 3 } else { 0 };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(4),
            Constraint::Min(1),
            Constraint::Length(eq_height),
            Constraint::Length(meter_height),
            Constraint::Length(4),
        ])
        .split(frame.area());

    let header = Paragraph::new(view.ui.header_text.as_str())
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" cadenza ")
                .title_alignment(Alignment::Center),
        );
    frame.render_widget(header, chunks[0]);

    let status = Paragraph::new(status_text(view))
        .block(left_padded(" status "))
        .wrap(Wrap { trim: true });
    frame.render_widget(status, chunks[1]);

    draw_list(frame, view, chunks[2]);
    if view.app.metadata_window {
        draw_metadata(frame, view, chunks[2]);
    }
    if eq_height > 0 {
        draw_equalizer(frame, view, chunks[3]);
    }
    if meter_height > 0 {
        draw_meter(frame, view, chunks[4]);
    }

    let footer = Paragraph::new(controls_text(view.controls.scrub_seconds))
        .block(left_padded(" controls "))
        .wrap(Wrap { trim: true });
    frame.render_widget(footer, chunks[5]);
}
