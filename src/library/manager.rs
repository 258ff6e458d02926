use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::mpsc::Sender;

use tracing::{debug, info};

use crate::store::StoreHandle;

use super::enrich::spawn_enrichment;
use super::model::{
    EnrichEvent, ImportedFile, LibraryEvent, MediaHandle, SortDirection, SortKey, Track,
    UNKNOWN_ARTIST, batch_millis, new_track_id,
};
use super::view;

/// Owns the track list in persisted order plus the active filter/sort.
///
/// Every mutation is mirrored to the store; store failures are logged by the
/// store thread and never surface here.
pub struct LibraryManager {
    tracks: Vec<Track>,
    store: StoreHandle,
    events: Option<Sender<LibraryEvent>>,

    query: String,
    sort_key: SortKey,
    sort_direction: SortDirection,

    media: HashMap<String, MediaHandle>,
    tagged: HashSet<String>,
    last_batch_millis: u64,
}

/// Outcome of applying one enrichment completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Enriched {
    /// Duration became known for the track at this persisted index.
    Duration { index: usize, seconds: f64 },
    /// Name/artist changed for the track at this persisted index.
    Tags { index: usize },
}

fn id_millis(id: &str) -> u64 {
    id.get(..12)
        .and_then(|p| u64::from_str_radix(p, 16).ok())
        .unwrap_or(0)
}

impl LibraryManager {
    /// Build the library from stored records. `tracks` may be in any order.
    pub fn new(mut tracks: Vec<Track>, store: StoreHandle) -> Self {
        tracks.sort_by(|a, b| a.id.cmp(&b.id));
        let last_batch_millis = tracks.iter().map(|t| id_millis(&t.id)).max().unwrap_or(0);

        Self {
            tracks,
            store,
            events: None,
            query: String::new(),
            sort_key: SortKey::default(),
            sort_direction: SortDirection::default(),
            media: HashMap::new(),
            tagged: HashSet::new(),
            last_batch_millis,
        }
    }

    /// Channel that receives enrichment completions. Without one, imports
    /// are not enriched.
    pub fn set_event_sender(&mut self, tx: Sender<LibraryEvent>) {
        self.events = Some(tx);
    }

    #[cfg(test)]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == id)
    }

    /// Playable handle for the track at `index`, created on first use.
    pub fn media_handle(&mut self, index: usize) -> Option<MediaHandle> {
        let track = self.tracks.get(index)?;
        let handle = self
            .media
            .entry(track.id.clone())
            .or_insert_with(|| MediaHandle::new(track));
        Some(handle.clone())
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    #[cfg(test)]
    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    pub fn push_query_char(&mut self, c: char) {
        self.query.push(c);
    }

    pub fn pop_query_char(&mut self) {
        self.query.pop();
    }

    pub fn clear_query(&mut self) {
        self.query.clear();
    }

    pub fn sort_key(&self) -> SortKey {
        self.sort_key
    }

    pub fn sort_direction(&self) -> SortDirection {
        self.sort_direction
    }

    pub fn set_sort(&mut self, key: SortKey, direction: SortDirection) {
        self.sort_key = key;
        self.sort_direction = direction;
    }

    /// Persisted indices in displayed (filtered + sorted) order.
    pub fn display_order(&self) -> Vec<usize> {
        view::display_order(&self.tracks, &self.query, self.sort_key, self.sort_direction)
    }

    /// Add a batch of files. Returns the persisted indices of the new tracks.
    pub fn import(&mut self, files: Vec<ImportedFile>) -> Vec<usize> {
        if files.is_empty() {
            return Vec::new();
        }

        self.last_batch_millis = batch_millis(self.last_batch_millis);
        let start = self.tracks.len();
        let mut to_enrich: Vec<(String, Arc<[u8]>)> = Vec::with_capacity(files.len());

        for (position, file) in files.into_iter().enumerate() {
            let track = Track {
                id: new_track_id(self.last_batch_millis, position),
                payload: file.payload,
                name: file.name,
                artist: UNKNOWN_ARTIST.to_string(),
                duration_seconds: 0.0,
            };
            self.store.put(&track);
            to_enrich.push((track.id.clone(), track.payload.clone()));
            self.tracks.push(track);
        }

        info!(count = self.tracks.len() - start, "imported tracks");
        if let Some(tx) = &self.events {
            spawn_enrichment(to_enrich, tx.clone());
        }
        (start..self.tracks.len()).collect()
    }

    /// Remove the track at `index`. Returns the removed track.
    ///
    /// Callers must report the removal to the playback controller so its
    /// current-track pointer stays on the same logical track.
    pub fn delete(&mut self, index: usize) -> Option<Track> {
        if index >= self.tracks.len() {
            return None;
        }
        let track = self.tracks.remove(index);
        self.media.remove(&track.id);
        self.tagged.remove(&track.id);
        self.store.delete(&track.id);
        info!(id = %track.id, name = %track.name, "deleted track");
        Some(track)
    }

    /// Apply a probe result. Each field is filled at most once; results for
    /// deleted tracks are dropped.
    pub fn apply_enrichment(&mut self, ev: EnrichEvent) -> Option<Enriched> {
        match ev {
            EnrichEvent::Duration { id, seconds } => {
                let index = self.index_of(&id)?;
                let track = &mut self.tracks[index];
                if track.duration_seconds > 0.0 || !(seconds > 0.0) {
                    return None;
                }
                track.duration_seconds = seconds;
                self.store.put(track);
                debug!(%id, seconds, "duration probed");
                Some(Enriched::Duration { index, seconds })
            }
            EnrichEvent::Tags { id, title, artist } => {
                let index = self.index_of(&id)?;
                if !self.tagged.insert(id.clone()) {
                    return None;
                }
                let track = &mut self.tracks[index];
                let mut changed = false;
                if let Some(title) = title.filter(|s| !s.trim().is_empty()) {
                    track.name = title;
                    changed = true;
                }
                if let Some(artist) = artist.filter(|s| !s.trim().is_empty()) {
                    track.artist = artist;
                    changed = true;
                }
                if !changed {
                    return None;
                }
                self.store.put(track);
                debug!(%id, "tags applied");
                Some(Enriched::Tags { index })
            }
        }
    }
}
