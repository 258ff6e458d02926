//! Session records and their persistence triggers.

mod persistence;
mod records;

pub use persistence::SessionPersistence;
pub use records::{PLAYBACK_STATE_KEY, PlaybackStateRecord, SETTINGS_KEY, Settings};

#[cfg(test)]
mod tests;
