use super::*;
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Item { id: u32, name: String }

fn keys() -> StorageKeys { StorageKeys::with_prefix("t") }

#[test]
fn key_names_follow_prefix() {
    let k = StorageKeys::with_prefix("lab");
    assert_eq!(k.users, "lab_users");
    assert_eq!(k.current_user, "lab_current_user");
    assert_eq!(k.roles, "lab_roles");
    assert_eq!(k.quarantine, "lab_quarantine");
    assert_eq!(StorageKeys::default().users, "sce_users");
}

#[test]
fn memory_store_set_get_remove() {
    let kv = MemoryStore::new();
    assert!(kv.get("a").unwrap().is_none());
    kv.set("a", "1".into()).unwrap();
    kv.set("b", "2".into()).unwrap();
    assert_eq!(kv.get("a").unwrap().as_deref(), Some("1"));
    assert_eq!(kv.keys(), vec!["a".to_string(), "b".to_string()]);
    assert!(kv.remove("a").unwrap());
    assert!(!kv.remove("a").unwrap());
    assert_eq!(kv.len(), 1);
}

#[test]
fn load_json_distinguishes_absent_and_corrupt() {
    let kv = MemoryStore::new();
    assert_eq!(load_json::<Item>(&kv, "x").unwrap(), None);
    kv.set("x", "{ nope".into()).unwrap();
    match load_json::<Item>(&kv, "x") {
        Err(AuthError::PersistenceCorrupt { key, .. }) => assert_eq!(key, "x"),
        other => panic!("expected corrupt, got {:?}", other),
    }
}

#[test]
fn corrupt_single_value_is_quarantined_and_removed() {
    let kv = MemoryStore::new();
    let k = keys();
    kv.set(&k.current_user, "][".into()).unwrap();
    let got: Option<Item> = load_json_or_quarantine(&kv, &k, &k.current_user);
    assert!(got.is_none());
    assert!(kv.get(&k.current_user).unwrap().is_none());
    let q = quarantined(&kv, &k);
    assert_eq!(q.len(), 1);
    assert_eq!(q[0].source, k.current_user);
    assert_eq!(q[0].raw, "][");
}

#[test]
fn malformed_records_are_split_out_of_collection() {
    let kv = MemoryStore::new();
    let k = keys();
    let raw = json!([
        { "id": 1, "name": "one" },
        { "id": "two", "name": 2 },
        { "id": 3, "name": "three" }
    ]);
    kv.set(&k.users, raw.to_string()).unwrap();

    let items: Vec<Item> = load_records(&kv, &k, &k.users);
    assert_eq!(items.iter().map(|i| i.id).collect::<Vec<_>>(), vec![1, 3]);

    // Collection was rewritten, so a second read quarantines nothing new.
    let again: Vec<Item> = load_records(&kv, &k, &k.users);
    assert_eq!(again, items);
    let q = quarantined(&kv, &k);
    assert_eq!(q.len(), 1);
    assert!(q[0].raw.contains("\"two\""));
}

#[test]
fn non_array_collection_reads_as_empty() {
    let kv = MemoryStore::new();
    let k = keys();
    kv.set(&k.users, r#"{"id":1}"#.into()).unwrap();
    let items: Vec<Item> = load_records(&kv, &k, &k.users);
    assert!(items.is_empty());
    assert_eq!(quarantined(&kv, &k).len(), 1);
}

#[test]
fn file_store_survives_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    {
        let fs = FileStore::open(tmp.path()).unwrap();
        store_json(&fs, "t_users", &vec![Item { id: 7, name: "seven".into() }]).unwrap();
        fs.set("gone", "x".into()).unwrap();
        assert!(fs.remove("gone").unwrap());
    }
    let fs = FileStore::open(tmp.path()).unwrap();
    let items: Vec<Item> = load_json(&fs, "t_users").unwrap().unwrap();
    assert_eq!(items, vec![Item { id: 7, name: "seven".into() }]);
    assert!(fs.get("gone").unwrap().is_none());
}

#[test]
fn file_store_sets_aside_corrupt_snapshot() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("snapshot.bin"), b"\xff\xff\xff garbage").unwrap();
    let fs = FileStore::open(tmp.path()).unwrap();
    assert!(fs.keys().is_empty());
    assert!(tmp.path().join("snapshot.bin.corrupt").exists());
    fs.set("k", "v".into()).unwrap();
    let reopened = FileStore::open(tmp.path()).unwrap();
    assert_eq!(reopened.get("k").unwrap().as_deref(), Some("v"));
}

#[test]
fn failed_snapshot_write_leaves_store_unchanged() {
    let tmp = tempfile::tempdir().unwrap();
    let fs = FileStore::open(tmp.path()).unwrap();
    fs.set("kept", "1".into()).unwrap();

    // A directory where the temp snapshot goes makes every write fail.
    let blocker = tmp.path().join("snapshot.bin.tmp");
    std::fs::create_dir(&blocker).unwrap();
    assert!(fs.set("lost", "2".into()).is_err());
    assert!(fs.get("lost").unwrap().is_none());
    assert!(fs.remove("kept").is_err());
    assert_eq!(fs.get("kept").unwrap().as_deref(), Some("1"));
    assert_eq!(fs.keys(), vec!["kept".to_string()]);

    std::fs::remove_dir(&blocker).unwrap();
    fs.set("lost", "2".into()).unwrap();
    let reopened = FileStore::open(tmp.path()).unwrap();
    assert_eq!(reopened.keys(), vec!["kept".to_string(), "lost".to_string()]);
}
