use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::*;
use crate::library::Track;

fn track(id: &str, name: &str) -> Track {
    Track {
        id: id.to_string(),
        payload: Arc::from(vec![1u8, 2, 3]),
        name: name.to_string(),
        artist: "Artist".to_string(),
        duration_seconds: 0.0,
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Marker {
    value: u32,
}

#[test]
fn reopening_keeps_schema_and_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("library.db");

    {
        let store = TrackStore::open(&path).unwrap();
        store.put(&track("a", "First")).unwrap();
        store.save_record("marker", &Marker { value: 7 }).unwrap();
    }

    let store = TrackStore::open(&path).unwrap();
    let all = store.get_all().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].name, "First");
    assert_eq!(&all[0].payload[..], &[1, 2, 3]);
    assert_eq!(
        store.load_record::<Marker>("marker").unwrap(),
        Some(Marker { value: 7 })
    );
}

#[test]
fn put_replaces_and_delete_removes() {
    let store = TrackStore::open_in_memory().unwrap();
    store.put(&track("a", "First")).unwrap();
    store.put(&track("b", "Second")).unwrap();

    let mut updated = track("a", "Renamed");
    updated.duration_seconds = 12.5;
    store.put(&updated).unwrap();

    let mut all = store.get_all().unwrap();
    all.sort_by(|x, y| x.id.cmp(&y.id));
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].name, "Renamed");
    assert_eq!(all[0].duration_seconds, 12.5);

    store.delete("a").unwrap();
    let all = store.get_all().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, "b");
}

#[test]
fn missing_record_is_none() {
    let store = TrackStore::open_in_memory().unwrap();
    assert_eq!(store.load_record::<Marker>("nothing").unwrap(), None);
}

#[test]
fn service_applies_writes_in_order() {
    let service = StoreService::spawn(TrackStore::open_in_memory().unwrap());
    let handle = service.handle();

    handle.put(&track("a", "First"));
    handle.put(&track("b", "Second"));
    handle.delete("a");
    handle.save_record("marker", &Marker { value: 3 });

    let all = handle.load_all();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, "b");
    assert_eq!(handle.load_record::<Marker>("marker"), Some(Marker { value: 3 }));

    service.shutdown();
}

#[test]
fn malformed_record_degrades_to_none() {
    let service = StoreService::spawn(TrackStore::open_in_memory().unwrap());
    let handle = service.handle();

    handle.save_record("marker", &"not a marker");
    assert_eq!(handle.load_record::<Marker>("marker"), None);

    service.shutdown();
}

#[test]
fn detached_handle_is_a_no_op() {
    let handle = StoreHandle::detached();
    handle.put(&track("a", "First"));
    handle.delete("a");
    assert!(handle.load_all().is_empty());
    assert_eq!(handle.load_record::<Marker>("marker"), None);
}
