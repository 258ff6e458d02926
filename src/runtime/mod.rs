use std::env;
use std::path::PathBuf;

use crossterm::event::{DisableFocusChange, EnableFocusChange};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::info;

use crate::logging;

mod event_loop;
mod mpris_sync;
mod settings;
mod startup;


pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let log_path = logging::init();
    info!(log = ?log_path, "cadenza starting");

    let config = settings::load_config();

    // Any arguments are files or directories to import.
    let imports: Vec<PathBuf> = env::args_os().skip(1).map(PathBuf::from).collect();
    let mut rt = startup::start(&config, imports);

    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableFocusChange)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let run_result = event_loop::run(&mut terminal, &config, &mut rt);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableFocusChange, LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    rt.shutdown(&config);
    run_result
}
