use std::path::Path;
use std::sync::Arc;

use rusqlite::{Connection, OptionalExtension, params};
#[cfg(test)]
use serde::{Serialize, de::DeserializeOwned};

use crate::error::StorageError;
use crate::library::Track;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS tracks (
        id TEXT PRIMARY KEY,
        payload BLOB NOT NULL,
        name TEXT NOT NULL,
        artist TEXT NOT NULL,
        duration_seconds REAL NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS records (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
"#;

/// Durable track and session-record storage backed by a single SQLite file.
pub struct TrackStore {
    conn: Connection,
}

impl TrackStore {
    /// Open (creating on first use) the store at `path`.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            // A failure here surfaces as an open error just below.
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path).map_err(|source| StorageError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open a store that lives only as long as this process.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(|source| StorageError::Open {
            path: ":memory:".into(),
            source,
        })?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Insert or replace a track record.
    pub fn put(&self, track: &Track) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO tracks (id, payload, name, artist, duration_seconds)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                track.id,
                &track.payload[..],
                track.name,
                track.artist,
                track.duration_seconds
            ],
        )?;
        Ok(())
    }

    /// All track records, in no particular order.
    pub fn get_all(&self) -> Result<Vec<Track>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, payload, name, artist, duration_seconds FROM tracks")?;
        let rows = stmt.query_map([], |row| {
            let payload: Vec<u8> = row.get(1)?;
            Ok(Track {
                id: row.get(0)?,
                payload: Arc::from(payload),
                name: row.get(2)?,
                artist: row.get(3)?,
                duration_seconds: row.get(4)?,
            })
        })?;

        let mut tracks = Vec::new();
        for track in rows {
            tracks.push(track?);
        }
        Ok(tracks)
    }

    pub fn delete(&self, id: &str) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM tracks WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Store a JSON-encoded session record under `key`.
    #[cfg(test)]
    pub fn save_record<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let json = serde_json::to_string(value)?;
        self.save_raw_record(key, &json)
    }

    pub(super) fn save_raw_record(&self, key: &str, json: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO records (key, value) VALUES (?1, ?2)",
            params![key, json],
        )?;
        Ok(())
    }

    /// Load the session record stored under `key`, if any.
    #[cfg(test)]
    pub fn load_record<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.load_raw_record(key)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub(super) fn load_raw_record(&self, key: &str) -> Result<Option<String>, StorageError> {
        let json = self
            .conn
            .query_row(
                "SELECT value FROM records WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(json)
    }
}
