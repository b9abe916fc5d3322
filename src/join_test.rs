use super::*;
use crate::cursor::IterCursor;
use crate::record::Value;
use crate::testutil::{MemoryStore, Row};

fn user(id: i64, name: &str) -> Row {
    Row::new(vec![Value::I64(id)], vec![Value::Text(name.to_string())])
}

fn profile(user_id: i64, bio: &str) -> Row {
    Row::new(vec![Value::I64(user_id)], vec![Value::Text(bio.to_string())])
}

fn book(id: i64, author_id: i64) -> Row {
    Row::new(vec![Value::I64(id)], vec![Value::I64(author_id)])
}

fn users_source(rows: Vec<Row>) -> IterCursor<Row, std::vec::IntoIter<Result<Row>>> {
    let items: Vec<Result<Row>> = rows.into_iter().map(Ok).collect();
    IterCursor::new(items.into_iter())
}

#[test]
fn test_one_to_one_shape_detected_when_join_columns_are_both_primary_keys() {
    let profiles = MemoryStore::<Row>::new();
    let joiner = Joiner::<Row, Row, _>::new(profiles, vec![(0, 0)], &[0], &[0], false);
    assert!(joiner.is_one_to_one());
}

#[test]
fn test_one_to_many_shape_detected_when_join_column_is_not_bs_primary_key() {
    let books = MemoryStore::<Row>::new();
    let joiner = Joiner::<Row, Row, _>::new(books, vec![(0, 1)], &[0], &[0], false);
    assert!(!joiner.is_one_to_one());
}

#[test]
fn test_one_to_one_cursor_loads_matching_profile_and_drops_unmatched_user() {
    let profiles = MemoryStore::<Row>::new();
    profiles.try_insert(&profile(1, "loves rust")).unwrap();

    let joiner = Joiner::<Row, Row, _>::new(profiles, vec![(0, 0)], &[0], &[0], false);
    let source = users_source(vec![user(1, "alice"), user(2, "bob")]);
    let mut cursor = joiner.one_to_one_cursor(source);

    let mut out = Vec::new();
    while cursor.has_next().unwrap() {
        out.push(cursor.next().unwrap());
    }
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].property(0), Value::I64(1));
    assert_eq!(out[0].property(1), Value::Text("loves rust".to_string()));
}

#[test]
fn test_one_to_one_cursor_writable_restamps_join_column_on_match() {
    let profiles = MemoryStore::<Row>::new();
    profiles.try_insert(&profile(1, "stale bio")).unwrap();

    let joiner = Joiner::<Row, Row, _>::new(profiles.clone(), vec![(0, 0)], &[0], &[0], true);
    let source = users_source(vec![user(1, "alice")]);
    let mut cursor = joiner.one_to_one_cursor(source);

    assert!(cursor.has_next().unwrap());
    let matched = cursor.next().unwrap();
    assert_eq!(matched.property(0), Value::I64(1));

    let stored = profiles.try_load(&matched.primary_key()).unwrap().unwrap();
    assert_eq!(stored.property(0), Value::I64(1));
}

#[test]
fn test_one_to_many_cursor_yields_every_matching_book() {
    let books = MemoryStore::<Row>::new();
    books.try_insert(&book(10, 1)).unwrap();
    books.try_insert(&book(11, 1)).unwrap();
    books.try_insert(&book(12, 2)).unwrap();

    let joiner = Joiner::<Row, Row, _>::new(books, vec![(0, 1)], &[0], &[0], false);
    let source = users_source(vec![user(1, "alice"), user(2, "bob")]);
    let mut cursor = joiner.one_to_many_cursor(source);

    let mut ids = Vec::new();
    while cursor.has_next().unwrap() {
        let b = cursor.next().unwrap();
        ids.push(b.property(0));
    }
    ids.sort_by(|a, b| a.cmp_total(b));
    assert_eq!(ids, vec![Value::I64(10), Value::I64(11), Value::I64(12)]);
}

#[test]
fn test_one_to_many_cursor_yields_nothing_for_author_with_no_books() {
    let books = MemoryStore::<Row>::new();
    books.try_insert(&book(10, 1)).unwrap();

    let joiner = Joiner::<Row, Row, _>::new(books, vec![(0, 1)], &[0], &[0], false);
    let source = users_source(vec![user(99, "nobody")]);
    let mut cursor = joiner.one_to_many_cursor(source);

    assert!(!cursor.has_next().unwrap());
}

#[test]
fn test_chained_joins_feed_one_cursor_into_the_next() {
    // author -> book (one-to-many) -> book's own single-row "detail" (one-to-one)
    let books = MemoryStore::<Row>::new();
    books.try_insert(&book(10, 1)).unwrap();
    books.try_insert(&book(11, 1)).unwrap();

    let details = MemoryStore::<Row>::new();
    details.try_insert(&profile(10, "first edition")).unwrap();
    details.try_insert(&profile(11, "second edition")).unwrap();

    let author_to_book = Joiner::<Row, Row, _>::new(books, vec![(0, 1)], &[0], &[0], false);
    let source = users_source(vec![user(1, "alice")]);
    let book_cursor = author_to_book.one_to_many_cursor(source);

    let book_to_detail = Joiner::<Row, Row, _>::new(details, vec![(0, 0)], &[0], &[0], false);
    let mut detail_cursor = book_to_detail.one_to_one_cursor(book_cursor);

    let mut bios = Vec::new();
    while detail_cursor.has_next().unwrap() {
        bios.push(detail_cursor.next().unwrap().property(1));
    }
    bios.sort_by(|a, b| a.cmp_total(b));
    assert_eq!(
        bios,
        vec![Value::Text("first edition".to_string()), Value::Text("second edition".to_string())]
    );
}
