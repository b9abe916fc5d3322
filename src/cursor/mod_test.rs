use super::*;
use crate::Error;

#[test]
fn test_empty_cursor() {
    let mut c: EmptyCursor<i64> = EmptyCursor::new();
    assert_eq!(c.has_next().unwrap(), false);
    assert!(c.next().is_err());
    c.close().unwrap();
    c.close().unwrap(); // idempotent
}

#[test]
fn test_singleton_cursor() {
    let mut c = SingletonCursor::new(42);
    assert!(c.has_next().unwrap());
    assert_eq!(c.next().unwrap(), 42);
    assert!(!c.has_next().unwrap());
    c.close().unwrap();
}

#[test]
fn test_iter_cursor_drains_in_order() {
    let data: Vec<Result<i64>> = vec![Ok(1), Ok(2), Ok(3)];
    let mut c = IterCursor::new(data.into_iter());
    assert_eq!(c.to_list(None).unwrap(), vec![1, 2, 3]);
}

#[test]
fn test_iter_cursor_closes_on_error() {
    let data: Vec<Result<i64>> =
        vec![Ok(1), Err(Error::FetchGeneric("boom".into())), Ok(3)];
    let mut c = IterCursor::new(data.into_iter());
    assert_eq!(c.next().unwrap(), 1);
    assert!(c.next().is_err());
    // cursor is closed after the error surfaces
    assert_eq!(c.has_next().unwrap(), false);
}

#[test]
fn test_skip_next_default_impl() {
    let data: Vec<Result<i64>> = vec![Ok(1), Ok(2), Ok(3), Ok(4)];
    let mut c = IterCursor::new(data.into_iter());
    assert_eq!(c.skip_next(2).unwrap(), 2);
    assert_eq!(c.next().unwrap(), 3);
}
