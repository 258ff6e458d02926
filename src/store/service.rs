use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::library::Track;

use super::db::TrackStore;

enum StoreCmd {
    Put(Track),
    Delete(String),
    SaveRecord { key: &'static str, json: String },
    LoadAll(Sender<Result<Vec<Track>, StorageError>>),
    LoadRecord {
        key: &'static str,
        reply: Sender<Result<Option<String>, StorageError>>,
    },
    Shutdown,
}

/// Owns the store thread. Dropping the handles does not stop it; call
/// [`StoreService::shutdown`] to flush pending writes and join.
pub struct StoreService {
    handle: StoreHandle,
    join: Option<JoinHandle<()>>,
}

impl StoreService {
    /// Move `store` onto its own thread. Transactions run in submission order.
    pub fn spawn(store: TrackStore) -> Self {
        let (tx, rx) = mpsc::channel::<StoreCmd>();
        let join = thread::Builder::new()
            .name("cadenza-store".into())
            .spawn(move || run(store, rx))
            .map_err(|e| warn!(error = %e, "failed to spawn store thread"))
            .ok();

        let handle = if join.is_some() {
            StoreHandle { tx: Some(tx) }
        } else {
            StoreHandle::detached()
        };
        Self { handle, join }
    }

    pub fn handle(&self) -> StoreHandle {
        self.handle.clone()
    }

    pub fn shutdown(mut self) {
        if let Some(tx) = &self.handle.tx {
            let _ = tx.send(StoreCmd::Shutdown);
        }
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

fn run(store: TrackStore, rx: Receiver<StoreCmd>) {
    while let Ok(cmd) = rx.recv() {
        match cmd {
            StoreCmd::Put(track) => {
                if let Err(e) = store.put(&track) {
                    warn!(id = %track.id, error = %e, "failed to persist track");
                }
            }
            StoreCmd::Delete(id) => {
                if let Err(e) = store.delete(&id) {
                    warn!(%id, error = %e, "failed to delete track");
                }
            }
            StoreCmd::SaveRecord { key, json } => {
                if let Err(e) = store.save_raw_record(key, &json) {
                    warn!(key, error = %e, "failed to persist record");
                }
            }
            StoreCmd::LoadAll(reply) => {
                let _ = reply.send(store.get_all());
            }
            StoreCmd::LoadRecord { key, reply } => {
                let _ = reply.send(store.load_raw_record(key));
            }
            StoreCmd::Shutdown => break,
        }
    }
    debug!("store thread exiting");
}

/// Cheap, cloneable access to the store thread.
///
/// Writes are fire-and-forget; failures are logged on the store thread. Loads
/// wait for the reply and degrade to empty/`None` on failure. A detached
/// handle (no store at all) turns every operation into a no-op.
#[derive(Clone)]
pub struct StoreHandle {
    tx: Option<Sender<StoreCmd>>,
}

impl StoreHandle {
    pub fn detached() -> Self {
        Self { tx: None }
    }

    fn send(&self, cmd: StoreCmd) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.send(cmd).is_err() {
            warn!("store thread is gone; dropping write");
        }
    }

    pub fn put(&self, track: &Track) {
        self.send(StoreCmd::Put(track.clone()));
    }

    pub fn delete(&self, id: &str) {
        self.send(StoreCmd::Delete(id.to_string()));
    }

    pub fn save_record<T: Serialize>(&self, key: &'static str, value: &T) {
        match serde_json::to_string(value) {
            Ok(json) => self.send(StoreCmd::SaveRecord { key, json }),
            Err(e) => warn!(key, error = %e, "failed to encode record"),
        }
    }

    /// Every stored track, or an empty list when the store cannot be read.
    pub fn load_all(&self) -> Vec<Track> {
        match self.request(StoreCmd::LoadAll) {
            Ok(tracks) => tracks,
            Err(e) => {
                warn!(error = %e, "failed to load library; starting empty");
                Vec::new()
            }
        }
    }

    /// The record stored under `key`, or `None` when missing or unreadable.
    pub fn load_record<T: DeserializeOwned>(&self, key: &'static str) -> Option<T> {
        let json = match self.request(|reply| StoreCmd::LoadRecord { key, reply }) {
            Ok(json) => json?,
            Err(e) => {
                warn!(key, error = %e, "failed to load record");
                return None;
            }
        };
        serde_json::from_str(&json)
            .map_err(|e| warn!(key, error = %e, "ignoring malformed record"))
            .ok()
    }

    fn request<T>(
        &self,
        make: impl FnOnce(Sender<Result<T, StorageError>>) -> StoreCmd,
    ) -> Result<T, StorageError> {
        let tx = self.tx.as_ref().ok_or(StorageError::Disconnected)?;
        let (reply_tx, reply_rx) = mpsc::channel();
        tx.send(make(reply_tx))
            .map_err(|_| StorageError::Disconnected)?;
        reply_rx.recv().map_err(|_| StorageError::Disconnected)?
    }
}
