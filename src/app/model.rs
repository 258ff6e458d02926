//! View model types: `App` and `InputMode`.

use std::path::PathBuf;

use crate::audio::BAND_COUNT;
use crate::library::{next_in_view_from, prev_in_view_from};

/// What printable keys currently do.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum InputMode {
    #[default]
    Normal,
    /// Keys edit the library query.
    Filter,
    /// Keys edit the import path prompt.
    Import,
}

/// The terminal view model.
#[derive(Debug)]
pub struct App {
    /// Persisted index of the track under the cursor.
    pub cursor: Option<usize>,
    pub mode: InputMode,
    pub import_input: String,
    /// Cursor jumps to the bound track when it changes.
    pub follow_playback: bool,
    pub eq_band: usize,
    pub metadata_window: bool,
    /// One-line message shown in the status box.
    pub notice: Option<String>,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        Self {
            cursor: None,
            mode: InputMode::Normal,
            import_input: String::new(),
            follow_playback: true,
            eq_band: 0,
            metadata_window: false,
            notice: None,
        }
    }

    /// Keep the cursor on a visible row, falling back to the first one.
    pub fn ensure_visible(&mut self, display: &[usize]) {
        let visible = self.cursor.is_some_and(|c| display.contains(&c));
        if !visible {
            self.cursor = display.first().copied();
        }
    }

    pub fn move_next(&mut self, display: &[usize]) {
        self.follow_playback = false;
        if let Some(next) = next_in_view_from(display, self.cursor) {
            self.cursor = Some(next);
        }
    }

    pub fn move_prev(&mut self, display: &[usize]) {
        self.follow_playback = false;
        if let Some(prev) = prev_in_view_from(display, self.cursor) {
            self.cursor = Some(prev);
        }
    }

    pub fn jump_first(&mut self, display: &[usize]) {
        self.follow_playback = false;
        if let Some(&first) = display.first() {
            self.cursor = Some(first);
        }
    }

    pub fn jump_last(&mut self, display: &[usize]) {
        self.follow_playback = false;
        if let Some(&last) = display.last() {
            self.cursor = Some(last);
        }
    }

    /// Move the cursor onto the bound track when following playback.
    pub fn follow(&mut self, current: Option<usize>, display: &[usize]) {
        if !self.follow_playback || self.mode == InputMode::Filter {
            return;
        }
        if let Some(c) = current {
            if display.contains(&c) {
                self.cursor = Some(c);
            }
        }
    }

    /// Keep the cursor on the same logical track after a delete.
    pub fn on_track_removed(&mut self, index: usize, display: &[usize]) {
        self.cursor = match self.cursor {
            Some(c) if c > index => Some(c - 1),
            Some(c) if c == index => None,
            other => other,
        };
        self.ensure_visible(display);
    }

    pub fn enter_filter_mode(&mut self) {
        self.mode = InputMode::Filter;
        self.follow_playback = false;
    }

    pub fn leave_input_mode(&mut self) {
        self.mode = InputMode::Normal;
    }

    pub fn begin_import(&mut self) {
        self.mode = InputMode::Import;
        self.import_input.clear();
    }

    /// Paths typed into the import prompt, one per `;`-separated entry.
    /// A leading `~/` expands to `$HOME`.
    pub fn take_import_paths(&mut self) -> Vec<PathBuf> {
        let input = std::mem::take(&mut self.import_input);
        self.mode = InputMode::Normal;
        let home = std::env::var_os("HOME").map(PathBuf::from);
        input
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| match (s.strip_prefix("~/"), home.as_ref()) {
                (Some(rest), Some(home)) => home.join(rest),
                _ => PathBuf::from(s),
            })
            .collect()
    }

    pub fn select_band(&mut self, delta: isize) {
        let band = self.eq_band as isize + delta;
        self.eq_band = band.clamp(0, BAND_COUNT as isize - 1) as usize;
    }

    pub fn toggle_metadata_window(&mut self) {
        self.metadata_window = !self.metadata_window;
    }

    pub fn set_notice(&mut self, notice: impl Into<String>) {
        self.notice = Some(notice.into());
    }
}
