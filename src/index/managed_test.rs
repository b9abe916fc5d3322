use super::*;
use crate::cursor::Cursor;
use crate::index::descriptor::{DirectionBit, IndexProperty};
use crate::record::{PrimaryKey, Record, Value};
use crate::testutil::{MemoryStore, Row};
use crate::Error;

fn descriptor(unique: bool) -> IndexDescriptor {
    IndexDescriptor::new(
        "Row",
        vec![IndexProperty { position: 1, direction: DirectionBit::Asc }],
        unique,
    )
}

fn row(id: i64, name: &str) -> Row {
    Row::new(vec![Value::I64(id)], vec![Value::Text(name.to_string())])
}

fn setup(unique: bool) -> (ManagedIndex<Row, MemoryStore<Row>, MemoryStore<IndexEntryRecord>>, MemoryStore<Row>) {
    let master = MemoryStore::<Row>::new();
    let entries = MemoryStore::<IndexEntryRecord>::new();
    let index = ManagedIndex::new(descriptor(unique), vec![0], entries);
    (index, master)
}

#[test]
fn test_insert_index_entry_projects_name_then_id() {
    let (index, master) = setup(false);
    let r = row(7, "alice");
    master.try_insert(&r).unwrap();
    index.insert_index_entry(&r).unwrap();

    let entries = index.entries().all_sorted();
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0].0 .0,
        vec![Value::Text("alice".to_string()), Value::I64(7)]
    );
}

#[test]
fn test_unique_index_rejects_duplicate_identity() {
    let (index, master) = setup(true);
    let a = row(1, "dup");
    let b = row(2, "dup");
    master.try_insert(&a).unwrap();
    master.try_insert(&b).unwrap();

    index.insert_index_entry(&a).unwrap();
    let err = index.insert_index_entry(&b).unwrap_err();
    assert!(matches!(err, Error::PersistUniqueConstraint(_)));
}

#[test]
fn test_unique_index_allows_reinsert_of_same_row() {
    let (index, master) = setup(true);
    let a = row(1, "solo");
    master.try_insert(&a).unwrap();
    index.insert_index_entry(&a).unwrap();
    index.insert_index_entry(&a).unwrap();
    assert_eq!(index.entries().all_sorted().len(), 1);
}

#[test]
fn test_update_index_entry_moves_the_key() {
    let (index, master) = setup(false);
    let old = row(7, "alice");
    master.try_insert(&old).unwrap();
    index.insert_index_entry(&old).unwrap();

    let new = row(7, "alicia");
    master.try_update(&new).unwrap();
    index.update_index_entry(&new, &old).unwrap();

    let entries = index.entries().all_sorted();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0 .0[0], Value::Text("alicia".to_string()));
}

#[test]
fn test_delete_index_entry_removes_the_key() {
    let (index, master) = setup(false);
    let r = row(7, "alice");
    master.try_insert(&r).unwrap();
    index.insert_index_entry(&r).unwrap();
    index.delete_index_entry(&r).unwrap();
    assert!(index.entries().all_sorted().is_empty());
}

#[test]
fn test_build_index_populates_from_existing_master_rows() {
    let (index, master) = setup(false);
    for (id, name) in [(3, "c"), (1, "a"), (2, "b")] {
        master.try_insert(&row(id, name)).unwrap();
    }
    let dir = tempfile::tempdir().unwrap();
    let stats = index.build_index(&master, dir.path(), None).unwrap();
    assert_eq!(stats.scanned, 3);
    assert_eq!(stats.inserted, 3);

    let entries = index.entries().all_sorted();
    let names: Vec<String> = entries
        .iter()
        .map(|e| match &e.0 .0[0] {
            Value::Text(s) => s.clone(),
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(names, vec!["a", "b", "c"]);
}

#[test]
fn test_build_index_removes_bogus_entries_not_backed_by_any_master() {
    let (index, master) = setup(false);
    master.try_insert(&row(1, "a")).unwrap();
    index.insert_index_entry(&row(1, "a")).unwrap();
    index.insert_index_entry(&row(2, "stale")).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let stats = index.build_index(&master, dir.path(), None).unwrap();
    assert_eq!(stats.deleted, 1);
    assert_eq!(index.entries().all_sorted().len(), 1);
}

#[test]
fn test_build_index_rejects_duplicate_identity_without_writing_any_entry() {
    let (index, master) = setup(true);
    for (id, name) in [(1, "dup"), (2, "dup"), (3, "dup")] {
        master.try_insert(&row(id, name)).unwrap();
    }
    let dir = tempfile::tempdir().unwrap();
    let err = index.build_index(&master, dir.path(), None).unwrap_err();
    assert!(matches!(err, Error::PersistUniqueConstraint(_)));
    assert!(index.entries().all_sorted().is_empty());
}

#[test]
fn test_fetch_one_yields_matching_masters_by_identity() {
    let (index, master) = setup(false);
    for (id, name) in [(1, "a"), (2, "b"), (3, "a")] {
        let r = row(id, name);
        master.try_insert(&r).unwrap();
        index.insert_index_entry(&r).unwrap();
    }
    let mut cursor = index.fetch_one(&master, vec![Value::Text("a".to_string())]).unwrap();
    let mut ids = Vec::new();
    while cursor.has_next().unwrap() {
        let m = cursor.next().unwrap();
        ids.push(match m.property(0) {
            Value::I64(n) => n,
            _ => unreachable!(),
        });
    }
    cursor.close().unwrap();
    ids.sort();
    assert_eq!(ids, vec![1, 3]);
}

#[test]
fn test_fetch_one_repairs_stale_entry_and_still_yields_master() {
    let (index, master) = setup(false);
    let r = row(9, "fresh");
    master.try_insert(&r).unwrap();
    // Simulate a stale entry left over from a previous name, with no entry
    // for the row's current projection present at all.
    index
        .entries()
        .try_insert(&IndexEntryRecord(PrimaryKey(vec![
            Value::Text("old-name".to_string()),
            Value::I64(9),
        ])))
        .unwrap();

    let mut cursor = index
        .fetch_one(&master, vec![Value::Text("old-name".to_string())])
        .unwrap();
    assert!(cursor.has_next().unwrap());
    let m = cursor.next().unwrap();
    assert_eq!(m.property(0), Value::I64(9));
    let repairs = cursor.take_pending_repairs();
    assert_eq!(repairs.len(), 1);
    cursor.close().unwrap();

    for (stale, fresh) in repairs {
        index.apply_repair(stale, fresh).unwrap();
    }
    let entries = index.entries().all_sorted();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0 .0[0], Value::Text("fresh".to_string()));
}
