use std::fmt;
use std::io::Cursor;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Artist shown until tag extraction finds a real one.
pub const UNKNOWN_ARTIST: &str = "Unknown artist";

/// A library entry. `payload` holds the imported file's bytes.
#[derive(Clone)]
pub struct Track {
    pub id: String,
    pub payload: Arc<[u8]>,
    pub name: String,
    pub artist: String,
    pub duration_seconds: f64,
}

impl fmt::Debug for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Track")
            .field("id", &self.id)
            .field("payload_len", &self.payload.len())
            .field("name", &self.name)
            .field("artist", &self.artist)
            .field("duration_seconds", &self.duration_seconds)
            .finish()
    }
}

/// Session-local playable view of a track's payload. Never persisted.
#[derive(Clone)]
pub struct MediaHandle {
    track_id: String,
    bytes: Arc<[u8]>,
}

impl MediaHandle {
    pub(super) fn new(track: &Track) -> Self {
        Self {
            track_id: track.id.clone(),
            bytes: track.payload.clone(),
        }
    }

    pub fn track_id(&self) -> &str {
        &self.track_id
    }

    /// A fresh seekable reader over the payload.
    pub fn reader(&self) -> Cursor<Arc<[u8]>> {
        Cursor::new(self.bytes.clone())
    }
}

impl fmt::Debug for MediaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaHandle")
            .field("track_id", &self.track_id)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A file read from disk, not yet part of the library.
#[derive(Clone)]
pub struct ImportedFile {
    /// Placeholder name (usually the file stem).
    pub name: String,
    pub payload: Arc<[u8]>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Library (import) order.
    #[default]
    Added,
    Name,
    Artist,
}

impl SortKey {
    pub fn cycle(self) -> Self {
        match self {
            Self::Added => Self::Name,
            Self::Name => Self::Artist,
            Self::Artist => Self::Added,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Name => "name",
            Self::Artist => "artist",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn toggle(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

/// Millisecond stamp for a new import batch, strictly after `previous`.
///
/// Keeps ids increasing across batches within a session even when two
/// batches land in the same millisecond or the clock steps backwards.
pub fn batch_millis(previous: u64) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();
    now.max(previous.saturating_add(1))
}

/// Build an id for the `position`-th file of an import batch.
///
/// Time prefix first so that lexicographic id order is import order; the batch
/// position and a random suffix keep files of one batch apart.
pub fn new_track_id(batch_millis: u64, position: usize) -> String {
    format!(
        "{:012x}-{:04x}-{:08x}",
        batch_millis,
        position,
        rand::random::<u32>()
    )
}

/// Result of one asynchronous probe. Each variant touches disjoint fields.
#[derive(Debug, Clone, PartialEq)]
pub enum EnrichEvent {
    Duration {
        id: String,
        seconds: f64,
    },
    Tags {
        id: String,
        title: Option<String>,
        artist: Option<String>,
    },
}

/// Completions delivered to the runtime from library worker threads.
pub enum LibraryEvent {
    Imported(Vec<ImportedFile>),
    Enriched(EnrichEvent),
}
