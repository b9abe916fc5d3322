use super::*;
use crate::index::analysis::AnalysisInput;
use crate::index::descriptor::{DirectionBit, IndexDescriptor, IndexProperty};
use crate::record::Value;
use crate::testutil::{MemoryStore, Row};

fn always_t(_: &IndexDescriptor) -> String {
    "t".to_string()
}

fn row(id: i64, name: &str) -> Row {
    Row::new(vec![Value::I64(id)], vec![Value::Text(name.to_string())])
}

fn name_index() -> IndexDescriptor {
    IndexDescriptor::new(
        "Row",
        vec![IndexProperty { position: 1, direction: DirectionBit::Asc }],
        false,
    )
}

fn input(declared: Vec<IndexDescriptor>, stored: Vec<StoredIndexInfo>) -> AnalysisInput {
    AnalysisInput {
        type_name: "Row".to_string(),
        primary_key: vec![0],
        declared,
        any_existing_is_unique: false,
        free: Vec::new(),
        stored,
        all_clustered: false,
        repair_enabled: true,
        derived_to: Vec::new(),
        current_type_descriptor: always_t,
    }
}

type TestStorage = IndexedStorage<Row, MemoryStore<Row>, MemoryStore<IndexEntryRecord>, MemoryStore<StoredIndexInfo>>;

fn open(master: MemoryStore<Row>, info: MemoryStore<StoredIndexInfo>, declared: Vec<IndexDescriptor>, stored: Vec<StoredIndexInfo>) -> TestStorage {
    let dir = tempfile::tempdir().unwrap();
    IndexedStorage::open(
        master,
        info,
        vec![0],
        input(declared, stored),
        dir.path(),
        None,
        |_descriptor| MemoryStore::<IndexEntryRecord>::new(),
    )
    .unwrap()
}

#[test]
fn test_open_builds_declared_index_and_persists_its_info() {
    let master = MemoryStore::<Row>::new();
    for (id, name) in [(3, "c"), (1, "a"), (2, "b")] {
        master.try_insert(&row(id, name)).unwrap();
    }
    let info = MemoryStore::<StoredIndexInfo>::new();
    let storage = open(master, info.clone(), vec![name_index()], Vec::new());

    assert_eq!(storage.managed().len(), 1);
    let entries = storage.managed()[0].entries().all_sorted();
    assert_eq!(entries.len(), 3);

    let stored = info.all_sorted();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].index_name, name_index().to_name_descriptor());
}

#[test]
fn test_insert_update_delete_drive_the_managed_index() {
    let master = MemoryStore::<Row>::new();
    let info = MemoryStore::<StoredIndexInfo>::new();
    let storage = open(master, info, vec![name_index()], Vec::new());

    let r = row(7, "alice");
    storage.insert(&r).unwrap();
    assert_eq!(storage.managed()[0].entries().all_sorted().len(), 1);

    let updated = row(7, "alicia");
    storage.update(&r, &updated).unwrap();
    let entries = storage.managed()[0].entries().all_sorted();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0 .0[0], Value::Text("alicia".to_string()));

    storage.delete(&updated).unwrap();
    assert!(storage.managed()[0].entries().all_sorted().is_empty());
    assert!(storage.master().try_load(&updated.primary_key()).unwrap().is_none());
}

#[test]
fn test_stale_stored_index_is_removed_and_its_info_dropped() {
    let stale = IndexDescriptor::new(
        "Row",
        vec![IndexProperty { position: 2, direction: DirectionBit::Asc }],
        false,
    );
    let stale_info = StoredIndexInfo::new(&stale, always_t(&stale), 0);
    let info = MemoryStore::<StoredIndexInfo>::new();
    info.try_insert(&stale_info).unwrap();

    let master = MemoryStore::<Row>::new();
    let storage = open(master, info.clone(), Vec::new(), vec![stale_info.clone()]);

    assert!(storage.managed().is_empty());
    assert!(info.try_load(&stale_info.primary_key()).unwrap().is_none());
}

#[test]
fn test_truncate_clears_master_and_every_managed_entry_storage() {
    let master = MemoryStore::<Row>::new();
    let info = MemoryStore::<StoredIndexInfo>::new();
    let storage = open(master, info, vec![name_index()], Vec::new());
    storage.insert(&row(1, "a")).unwrap();
    storage.insert(&row(2, "b")).unwrap();

    storage.truncate().unwrap();
    assert_eq!(storage.master().count().unwrap(), 0);
    assert!(storage.managed()[0].entries().all_sorted().is_empty());
}
