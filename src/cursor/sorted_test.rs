use super::*;
use crate::cursor::IterCursor;

fn iter_of(items: Vec<i32>) -> IterCursor<i32, std::vec::IntoIter<crate::Result<i32>>> {
    IterCursor::new(items.into_iter().map(Ok).collect::<Vec<_>>().into_iter())
}

fn pairs_of(items: Vec<(i32, &'static str)>) -> IterCursor<(i32, String), std::vec::IntoIter<crate::Result<(i32, String)>>> {
    let items: Vec<crate::Result<(i32, String)>> =
        items.into_iter().map(|(g, v)| Ok((g, v.to_string()))).collect();
    IterCursor::new(items.into_iter())
}

#[test]
fn test_sorts_whole_source_when_no_prefix() {
    let source = iter_of(vec![3, 1, 2]);
    let mut cursor = SortedCursor::new(
        source,
        None::<fn(&i32, &i32) -> Ordering>,
        |a: &i32, b: &i32| a.cmp(b),
    );
    let out = cursor.to_list(None).unwrap();
    assert_eq!(out, vec![1, 2, 3]);
}

#[test]
fn test_chunked_resort_exploits_sorted_prefix() {
    let source = pairs_of(vec![(1, "b"), (1, "a"), (2, "z"), (2, "x")]);
    let mut cursor = SortedCursor::new(
        source,
        Some(|a: &(i32, String), b: &(i32, String)| a.0.cmp(&b.0)),
        |a: &(i32, String), b: &(i32, String)| a.1.cmp(&b.1),
    );
    let out = cursor.to_list(None).unwrap();
    assert_eq!(
        out,
        vec![
            (1, "a".to_string()),
            (1, "b".to_string()),
            (2, "x".to_string()),
            (2, "z".to_string()),
        ]
    );
}

#[test]
fn test_single_chunk_when_every_item_shares_the_prefix() {
    let source = pairs_of(vec![(1, "c"), (1, "a"), (1, "b")]);
    let mut cursor = SortedCursor::new(
        source,
        Some(|a: &(i32, String), b: &(i32, String)| a.0.cmp(&b.0)),
        |a: &(i32, String), b: &(i32, String)| a.1.cmp(&b.1),
    );
    let out = cursor.to_list(None).unwrap();
    assert_eq!(
        out,
        vec![(1, "a".to_string()), (1, "b".to_string()), (1, "c".to_string())]
    );
}

#[test]
fn test_compare_composes_prefix_then_finisher() {
    let source = pairs_of(vec![]);
    let mut cursor = SortedCursor::new(
        source,
        Some(|a: &(i32, String), b: &(i32, String)| a.0.cmp(&b.0)),
        |a: &(i32, String), b: &(i32, String)| a.1.cmp(&b.1),
    );
    let a = (1, "z".to_string());
    let b = (2, "a".to_string());
    assert_eq!(cursor.compare(&a, &b), Ordering::Less);
    let c = (1, "a".to_string());
    let d = (1, "b".to_string());
    assert_eq!(cursor.compare(&c, &d), Ordering::Less);
}

#[test]
fn test_close_is_idempotent_and_empties_remaining_buffer() {
    let source = iter_of(vec![2, 1]);
    let mut cursor = SortedCursor::new(
        source,
        None::<fn(&i32, &i32) -> Ordering>,
        |a: &i32, b: &i32| a.cmp(b),
    );
    assert!(cursor.has_next().unwrap());
    cursor.close().unwrap();
    cursor.close().unwrap();
}
