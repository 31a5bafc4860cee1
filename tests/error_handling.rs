//! Error handling and edge case tests.

use pastedb::{
    BackendSelector, BlobId, MemoryBlobStorage, Store, StoreConfig, StoreError,
};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn memory_store() -> (Arc<MemoryBlobStorage>, Store) {
    init_tracing();
    let backend = Arc::new(MemoryBlobStorage::new());
    let store = Store::with_backend(Box::new(Arc::clone(&backend)), None);
    (backend, store)
}

// --- Key Errors ---

#[test]
fn test_create_duplicate_key() {
    let (_, store) = memory_store();
    let id = store.create("k", &json!({"v": 1}), None).unwrap();

    let result = store.create("k", &json!({"v": 2}), None);
    assert!(matches!(result, Err(StoreError::DuplicateKey(ref key)) if key == "k"));

    // First record is untouched
    let record = store.read("k").unwrap();
    assert_eq!(record.id, id);
    assert_eq!(record.data["v"], json!(1));
    assert_eq!(store.count(), 1);
}

#[test]
fn test_missing_key_is_not_an_error() {
    let (_, store) = memory_store();

    assert!(store.read("nope").is_none());
    assert!(!store.update("nope", &json!({"v": 1}), None).unwrap());
    assert!(!store.delete("nope").unwrap());
    assert!(store.list_keys().is_empty());
}

#[test]
fn test_non_object_data_rejected() {
    let (backend, store) = memory_store();

    let result = store.create("k", &json!(["not", "an", "object"]), None);
    assert!(matches!(result, Err(StoreError::InvalidData(_))));
    assert!(backend.is_empty());

    store.create("k", &json!({"v": 1}), None).unwrap();
    let result = store.update("k", &42, None);
    assert!(matches!(result, Err(StoreError::InvalidData(_))));
    assert_eq!(store.read("k").unwrap().data["v"], json!(1));
}

// --- Backend Failures ---

#[test]
fn test_failed_create_leaves_index_untouched() {
    let (backend, store) = memory_store();
    backend.set_fail_create(true);

    let result = store.create("k", &json!({"v": 1}), None);
    assert!(result.is_err());

    backend.set_fail_create(false);
    assert_eq!(store.count(), 0);
    assert!(store.index_id().is_none());
    assert!(backend.is_empty());

    // The key is still free
    store.create("k", &json!({"v": 1}), None).unwrap();
}

#[test]
fn test_failed_update_keeps_old_record() {
    let (backend, store) = memory_store();
    let id = store.create("k", &json!({"v": 1}), None).unwrap();

    backend.set_fail_create(true);
    assert!(store.update("k", &json!({"v": 2}), None).is_err());
    backend.set_fail_create(false);

    let record = store.read("k").unwrap();
    assert_eq!(record.id, id);
    assert_eq!(record.data["v"], json!(1));
}

/// Known weak point: a transient fetch failure is indistinguishable from a
/// missing record. The key is still indexed the whole time.
#[test]
fn test_fetch_failure_reads_as_not_found() {
    let (backend, store) = memory_store();
    store.create("k", &json!({"v": 1}), None).unwrap();

    backend.set_fail_fetch(true);
    assert!(store.read("k").is_none());
    assert!(store.search("1", None).is_empty());
    assert!(!store.update("k", &json!({"v": 2}), None).unwrap());
    assert_eq!(store.list_keys(), vec!["k"]);

    backend.set_fail_fetch(false);
    assert_eq!(store.read("k").unwrap().data["v"], json!(1));
}

#[test]
fn test_corrupt_record_blob_reads_as_not_found() {
    let (backend, store) = memory_store();
    let id = store.create("k", &json!({"v": 1}), None).unwrap();

    backend.put_raw(&id, "<html>502 Bad Gateway</html>");

    assert!(store.read("k").is_none());
    assert_eq!(store.count(), 1);
}

#[test]
fn test_null_timestamps_in_record_blob_still_read() {
    let (backend, store) = memory_store();
    let id = store.create("k", &json!({"v": 1}), None).unwrap();

    backend.put_raw(
        &id,
        r#"{"id": "", "data": {"v": 1}, "created_at": null, "updated_at": null, "metadata": null}"#,
    );

    let record = store.read("k").unwrap();
    assert_eq!(record.id, id);
    assert_eq!(record.created_at.0, 0);
    assert_eq!(record.data["v"], json!(1));
}

#[test]
fn test_delete_failure_is_swallowed() {
    let (backend, store) = memory_store();
    let id = store.create("k", &json!({"v": 1}), None).unwrap();

    backend.set_fail_delete(true);
    assert!(store.delete("k").unwrap());

    assert!(store.read("k").is_none());
    assert!(store.list_keys().is_empty());
    // The blob is orphaned, not referenced
    assert!(backend.contains(&id));
}

#[test]
fn test_backend_without_delete_orphans_blobs() {
    let backend = Arc::new(MemoryBlobStorage::new().without_delete());
    let store = Store::with_backend(Box::new(Arc::clone(&backend)), None);

    let first = store.create("k", &json!({"v": 1}), None).unwrap();
    store.update("k", &json!({"v": 2}), None).unwrap();
    store.delete("k").unwrap();

    assert!(backend.contains(&first));
    assert_eq!(backend.delete_count(), 0);
    assert_eq!(store.count(), 0);
    assert!(store.search("1", None).is_empty());
}

#[test]
fn test_backup_skips_unreadable_records() {
    let (backend, store) = memory_store();
    store.create("good", &json!({"v": 1}), None).unwrap();
    let bad = store.create("bad", &json!({"v": 2}), None).unwrap();
    backend.put_raw(&bad, "garbage");

    let id = store.backup(None).unwrap();
    let backup = store.read_backup(&id).unwrap();

    assert!(backup.records.contains_key("good"));
    assert!(!backup.records.contains_key("bad"));
    assert!(backup.index.contains_key("bad"));
}

// --- Index Load Failures ---

/// Sharp edge: an unreadable index loads as empty, and the next save
/// replaces it, so earlier keys are lost to this instance.
#[test]
fn test_corrupt_index_blob_loads_empty() {
    let backend = Arc::new(MemoryBlobStorage::new());
    let store = Store::with_backend(Box::new(Arc::clone(&backend)), None);
    store.create("a", &json!({"v": 1}), None).unwrap();
    let index_id = BlobId::from(store.index_id().unwrap().as_str());

    backend.put_raw(&index_id, "not json");

    let reopened = Store::with_backend(Box::new(Arc::clone(&backend)), Some(index_id));
    assert_eq!(reopened.count(), 0);
    assert!(reopened.read("a").is_none());

    reopened.create("b", &json!({"v": 2}), None).unwrap();
    assert_eq!(reopened.list_keys(), vec!["b"]);
}

#[test]
fn test_unknown_index_id_loads_empty() {
    let (backend, _) = memory_store();
    let store = Store::with_backend(Box::new(backend), Some(BlobId::from("deadbeef")));

    assert_eq!(store.count(), 0);
}

#[test]
fn test_corrupt_offline_index_loads_empty() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    {
        let store = Store::offline(dir.path()).unwrap();
        store.create("a", &json!({"v": 1}), None).unwrap();
    }
    std::fs::write(dir.path().join("index.json"), "{ truncated").unwrap();

    let store = Store::offline(dir.path()).unwrap();
    assert_eq!(store.count(), 0);
}

#[test]
fn test_offline_backup_cannot_overwrite_store_files() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let live_blob = {
        let store = Store::offline(dir.path()).unwrap();
        let id = store.create("u1", &json!({"name": "Ana"}), None).unwrap();

        let result = store.backup(Some("index.json"));
        assert!(matches!(result, Err(StoreError::InvalidData(_))));

        let blob_name = format!("{}.json", id);
        let result = store.backup(Some(blob_name.as_str()));
        assert!(matches!(result, Err(StoreError::InvalidData(_))));
        id
    };

    let store = Store::offline(dir.path()).unwrap();
    assert_eq!(store.list_keys(), vec!["u1"]);
    let record = store.read("u1").unwrap();
    assert_eq!(record.id, live_blob);
    assert_eq!(record.data["name"], json!("Ana"));
}

#[test]
fn test_offline_read_backup_rejects_outside_paths() {
    let dir = TempDir::new().unwrap();
    let store = Store::offline(dir.path().join("db")).unwrap();
    let outside = dir.path().join("elsewhere.json");
    std::fs::write(&outside, "{}").unwrap();

    let result = store.read_backup(&outside.display().to_string());
    assert!(matches!(result, Err(StoreError::InvalidData(_))));
}

// --- Concurrency Hazards ---

/// Two instances sharing one remote index are not coordinated: the last
/// index save wins and the other instance's key is lost from it.
#[test]
fn test_last_index_writer_wins() {
    let backend = Arc::new(MemoryBlobStorage::new().without_delete());
    let seed = Store::with_backend(Box::new(Arc::clone(&backend)), None);
    seed.create("shared", &json!({"v": 0}), None).unwrap();
    let index_id = BlobId::from(seed.index_id().unwrap().as_str());

    let first = Store::with_backend(Box::new(Arc::clone(&backend)), Some(index_id.clone()));
    let second = Store::with_backend(Box::new(Arc::clone(&backend)), Some(index_id));
    assert_eq!(first.count(), 1);
    assert_eq!(second.count(), 1);

    first.create("from_first", &json!({"v": 1}), None).unwrap();
    second.create("from_second", &json!({"v": 2}), None).unwrap();

    let latest = BlobId::from(second.index_id().unwrap().as_str());
    let observer = Store::with_backend(Box::new(Arc::clone(&backend)), Some(latest));
    assert_eq!(observer.list_keys(), vec!["from_second", "shared"]);
}

// --- Startup ---

#[test]
fn test_no_reachable_backend_is_fatal() {
    init_tracing();
    let a = MemoryBlobStorage::named("a");
    let b = MemoryBlobStorage::named("b");
    a.set_reachable(false);
    b.set_reachable(false);

    let result = BackendSelector::new(Box::new(a))
        .with_alternate(Box::new(b))
        .select();

    assert!(matches!(result, Err(StoreError::NoBackendReachable(ref f)) if f.len() == 2));
}

#[test]
fn test_invalid_paste_url_fails_open() {
    let config = StoreConfig {
        backend: pastedb::BackendConfig::Paste {
            base_url: "::not a url::".into(),
        },
        ..Default::default()
    };

    assert!(matches!(Store::open(config), Err(StoreError::Url(_))));
}
