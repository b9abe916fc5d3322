//! Error type used throughout this crate.
//!
//! Every fallible call site goes through the [err_at] macro, which stamps the
//! file/line of the call onto the error's context string. `Result<T>` is an
//! alias over [Error] used crate-wide.

use std::{fmt, result};

/// Crate wide Result type.
pub type Result<T> = result::Result<T, Error>;

/// Crate wide Error type.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    // -- host Fetch family
    FetchGeneric(String),
    FetchDeadlock(String),
    FetchTimeout(String),
    FetchInterrupted(String),
    FetchCorruptEncoding(String),
    // -- host Persist family
    PersistGeneric(String),
    PersistDeadlock(String),
    PersistTimeout(String),
    PersistUniqueConstraint(String),
    PersistNoMatchingRecord(String),
    PersistUnsupported(String),
    // -- infrastructure failures raised by this crate's own machinery
    IOError(String),
    Fatal(String),
    ThreadFail(String),
    IPCFail(String),
    DecodeFail(String),
    EncodeFail(String),
    InvalidFile(String),
    FailConvert(String),
    IllegalArgument(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Error::*;

        match self {
            FetchGeneric(s) => write!(f, "FetchGeneric: {}", s),
            FetchDeadlock(s) => write!(f, "FetchDeadlock: {}", s),
            FetchTimeout(s) => write!(f, "FetchTimeout: {}", s),
            FetchInterrupted(s) => write!(f, "FetchInterrupted: {}", s),
            FetchCorruptEncoding(s) => write!(f, "FetchCorruptEncoding: {}", s),
            PersistGeneric(s) => write!(f, "PersistGeneric: {}", s),
            PersistDeadlock(s) => write!(f, "PersistDeadlock: {}", s),
            PersistTimeout(s) => write!(f, "PersistTimeout: {}", s),
            PersistUniqueConstraint(s) => write!(f, "PersistUniqueConstraint: {}", s),
            PersistNoMatchingRecord(s) => write!(f, "PersistNoMatchingRecord: {}", s),
            PersistUnsupported(s) => write!(f, "PersistUnsupported: {}", s),
            IOError(s) => write!(f, "IOError: {}", s),
            Fatal(s) => write!(f, "Fatal: {}", s),
            ThreadFail(s) => write!(f, "ThreadFail: {}", s),
            IPCFail(s) => write!(f, "IPCFail: {}", s),
            DecodeFail(s) => write!(f, "DecodeFail: {}", s),
            EncodeFail(s) => write!(f, "EncodeFail: {}", s),
            InvalidFile(s) => write!(f, "InvalidFile: {}", s),
            FailConvert(s) => write!(f, "FailConvert: {}", s),
            IllegalArgument(s) => write!(f, "IllegalArgument: {}", s),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// True for the family of errors cursor adapters treat as
    /// "close then propagate" rather than anything recoverable in-place.
    pub fn is_fetch(&self) -> bool {
        matches!(
            self,
            Error::FetchGeneric(_)
                | Error::FetchDeadlock(_)
                | Error::FetchTimeout(_)
                | Error::FetchInterrupted(_)
                | Error::FetchCorruptEncoding(_)
        )
    }
}

/// Stamp the call site onto a constructed [Error] variant.
///
/// Two forms:
///
/// ```ignore
/// err_at!(IOError, fs::read(path))?;
/// err_at!(Fatal, msg: "partial write {}/{}", n, len)?;
/// ```
#[macro_export]
macro_rules! err_at {
    ($v:ident, msg: $($arg:expr),+) => {{
        let prefix = format!("{}:{}", file!(), line!());
        Err($crate::Error::$v(format!("{} {}", prefix, format!($($arg),+))))
    }};
    ($v:ident, $e:expr) => {{
        match $e {
            Ok(val) => Ok(val),
            Err(err) => {
                let prefix = format!("{}:{}", file!(), line!());
                Err($crate::Error::$v(format!("{} {}", prefix, err)))
            }
        }
    }};
    ($v:ident, $e:expr, $($arg:expr),+) => {{
        match $e {
            Ok(val) => Ok(val),
            Err(err) => {
                let prefix = format!("{}:{}", file!(), line!());
                let msg = format!($($arg),+);
                Err($crate::Error::$v(format!("{} {} {}", prefix, msg, err)))
            }
        }
    }};
}

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;
