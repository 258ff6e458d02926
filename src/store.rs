//! Durable persistence for tracks and session records.
//!
//! `TrackStore` is the synchronous SQLite layer; `StoreService` moves it onto
//! a dedicated thread so the runtime never waits on disk I/O for writes.

mod db;
mod service;

pub use db::TrackStore;
pub use service::{StoreHandle, StoreService};

#[cfg(test)]
mod tests;
