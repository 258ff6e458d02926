//! Post-import enrichment: duration probing and tag reading.
//!
//! Both passes run on their own threads and report through the runtime's
//! library channel. A failed probe sends nothing, so placeholders stay.

use std::io::Cursor;
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;

use lofty::file::TaggedFile;
use lofty::prelude::*;
use lofty::probe::Probe;
use tracing::debug;

use super::model::{EnrichEvent, LibraryEvent};

fn read_tagged(payload: &Arc<[u8]>) -> Option<TaggedFile> {
    let probe = Probe::new(Cursor::new(payload.clone()))
        .guess_file_type()
        .map_err(|e| debug!(error = %e, "could not guess file type"))
        .ok()?;
    probe
        .read()
        .map_err(|e| debug!(error = %e, "could not parse media"))
        .ok()
}

/// Duration in seconds, if the container reports a non-zero one.
pub fn probe_duration(payload: &Arc<[u8]>) -> Option<f64> {
    let tagged = read_tagged(payload)?;
    let secs = tagged.properties().duration().as_secs_f64();
    (secs > 0.0).then_some(secs)
}

fn non_empty(v: Option<std::borrow::Cow<'_, str>>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Title and artist from the primary (or first) tag.
pub fn read_tags(payload: &Arc<[u8]>) -> Option<(Option<String>, Option<String>)> {
    let tagged = read_tagged(payload)?;
    let tag = tagged.primary_tag().or_else(|| tagged.first_tag())?;
    let title = non_empty(tag.title());
    let artist = non_empty(tag.artist());
    if title.is_none() && artist.is_none() {
        return None;
    }
    Some((title, artist))
}

/// Start the duration pass and the tag pass for a freshly imported batch.
pub fn spawn_enrichment(items: Vec<(String, Arc<[u8]>)>, tx: Sender<LibraryEvent>) {
    let durations = items.clone();
    let duration_tx = tx.clone();
    thread::spawn(move || {
        for (id, payload) in durations {
            match probe_duration(&payload) {
                Some(seconds) => {
                    let ev = EnrichEvent::Duration { id, seconds };
                    if duration_tx.send(LibraryEvent::Enriched(ev)).is_err() {
                        return;
                    }
                }
                None => debug!(%id, "duration probe found nothing"),
            }
        }
    });

    thread::spawn(move || {
        for (id, payload) in items {
            match read_tags(&payload) {
                Some((title, artist)) => {
                    let ev = EnrichEvent::Tags { id, title, artist };
                    if tx.send(LibraryEvent::Enriched(ev)).is_err() {
                        return;
                    }
                }
                None => debug!(%id, "tag read found nothing"),
            }
        }
    });
}
