use super::*;

#[test]
fn test_err_at_wraps_io_error() {
    let res: Result<Vec<u8>> = err_at!(IOError, std::fs::read("/no/such/file/carbonado"));
    match res {
        Err(Error::IOError(s)) => assert!(s.contains("error_test.rs")),
        other => panic!("expected IOError, got {:?}", other),
    }
}

#[test]
fn test_err_at_msg_form() {
    let res: Result<()> = err_at!(Fatal, msg: "partial write {}/{}", 3, 10);
    match res {
        Err(Error::Fatal(s)) => assert!(s.contains("partial write 3/10")),
        other => panic!("expected Fatal, got {:?}", other),
    }
}

#[test]
fn test_is_fetch() {
    assert!(Error::FetchTimeout("x".into()).is_fetch());
    assert!(!Error::PersistTimeout("x".into()).is_fetch());
}
