use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::LibraryConfig;

use super::model::{ImportedFile, LibraryEvent};

fn is_audio_file(path: &Path, settings: &LibraryConfig) -> bool {
    let exts: Vec<String> = settings
        .extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect();

    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            exts.iter().any(|e| e == &ext)
        })
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Expand the user's import selection into audio file paths.
///
/// Files are taken as given (the user picked them); directories are walked
/// according to `settings` and filtered by extension. Order is stable:
/// selection order, then path order within each directory.
pub fn collect_audio_paths(selection: &[PathBuf], settings: &LibraryConfig) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = Vec::new();

    for root in selection {
        if root.is_file() {
            out.push(root.clone());
            continue;
        }
        if !root.is_dir() {
            warn!(path = %root.display(), "import path does not exist");
            continue;
        }

        let mut walker = WalkDir::new(root)
            .follow_links(settings.follow_links)
            .sort_by_file_name();

        // Non-recursive = only the root directory.
        let depth_cap = if settings.recursive {
            settings.max_depth
        } else {
            Some(1)
        };
        if let Some(d) = depth_cap {
            walker = walker.max_depth(d);
        }

        for entry in walker
            .into_iter()
            .filter_entry(|e| settings.include_hidden || e.depth() == 0 || !is_hidden(e.path()))
            .filter_map(Result::ok)
        {
            let path = entry.path();
            if path.is_file() && is_audio_file(path, settings) {
                out.push(path.to_path_buf());
            }
        }
    }

    out
}

/// Read `paths` into memory. Unreadable files are logged and skipped.
pub fn read_files(paths: &[PathBuf]) -> Vec<ImportedFile> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        match std::fs::read(path) {
            Ok(bytes) => {
                let name = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("UNKNOWN")
                    .to_string();
                files.push(ImportedFile {
                    name,
                    payload: Arc::from(bytes),
                });
            }
            Err(e) => warn!(path = %path.display(), error = %e, "failed to read file for import"),
        }
    }
    files
}

/// Expand and read the selection on a worker thread, then deliver a single
/// `LibraryEvent::Imported` batch.
pub fn spawn_import(selection: Vec<PathBuf>, settings: LibraryConfig, tx: Sender<LibraryEvent>) {
    thread::spawn(move || {
        let paths = collect_audio_paths(&selection, &settings);
        if paths.is_empty() {
            info!("import selection contained no audio files");
            return;
        }
        let files = read_files(&paths);
        debug!(count = files.len(), "import batch read");
        let _ = tx.send(LibraryEvent::Imported(files));
    });
}
