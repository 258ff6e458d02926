//! Displayed order: the filtered and sorted view used for navigation.

use std::cmp::Ordering;

use super::model::{SortDirection, SortKey, Track};

/// Case-insensitive substring match on name or artist. An empty query
/// matches everything; whitespace is part of the query.
pub fn matches_query(track: &Track, query_lower: &str) -> bool {
    query_lower.is_empty()
        || track.name.to_lowercase().contains(query_lower)
        || track.artist.to_lowercase().contains(query_lower)
}

fn compare(tracks: &[Track], a: usize, b: usize, key: SortKey) -> Ordering {
    let (ta, tb) = (&tracks[a], &tracks[b]);
    match key {
        SortKey::Added => a.cmp(&b),
        SortKey::Name => ta.name.to_lowercase().cmp(&tb.name.to_lowercase()),
        SortKey::Artist => ta.artist.to_lowercase().cmp(&tb.artist.to_lowercase()),
    }
}

/// Indices into `tracks` (persisted order) in displayed order.
pub fn display_order(
    tracks: &[Track],
    query: &str,
    key: SortKey,
    direction: SortDirection,
) -> Vec<usize> {
    let query_lower = query.to_lowercase();
    let mut indices: Vec<usize> = (0..tracks.len())
        .filter(|&i| matches_query(&tracks[i], &query_lower))
        .collect();

    // Direction flips the key only; equal keys stay in id order.
    indices.sort_by(|&a, &b| {
        let ord = compare(tracks, a, b, key);
        let ord = match direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        };
        ord.then_with(|| tracks[a].id.cmp(&tracks[b].id))
            .then_with(|| a.cmp(&b))
    });
    indices
}

/// Index after `current` in `display`, wrapping to the first entry.
/// When `current` is not visible, the first entry.
pub fn next_in_view_from(display: &[usize], current: Option<usize>) -> Option<usize> {
    if display.is_empty() {
        return None;
    }

    let pos = current.and_then(|c| display.iter().position(|&i| i == c));
    match pos {
        Some(p) => Some(display[(p + 1) % display.len()]),
        None => Some(display[0]),
    }
}

/// Index before `current` in `display`, wrapping to the last entry.
/// When `current` is not visible, the last entry.
pub fn prev_in_view_from(display: &[usize], current: Option<usize>) -> Option<usize> {
    if display.is_empty() {
        return None;
    }

    let pos = current.and_then(|c| display.iter().position(|&i| i == c));
    match pos {
        Some(0) => Some(display[display.len() - 1]),
        Some(p) => Some(display[p - 1]),
        None => Some(display[display.len() - 1]),
    }
}
