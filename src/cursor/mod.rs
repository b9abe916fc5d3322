//! The [Cursor] contract: a lazy, one-shot, single-consumer pull
//! iterator with guaranteed resource release on both exhaustion and error.
//!
//! Adapters in sibling modules (`setops`, `adapt`, `sorted`) are all built
//! on top of this trait, the same way the reference engine's scan
//! adapters (`BuildScan`, `CompactScan`, …) wrap an inner `Iterator`.

pub mod adapt;
pub mod setops;
pub mod sorted;

use crate::Result;

/// A lazy pull cursor over values of type `S`.
///
/// No thread-safety is promised — a cursor has exactly one consumer.
/// Any fetch failure must leave the cursor closed before the
/// error is returned to the caller; every adapter below honors that by
/// routing its internal fetches through `close_on_err`.
pub trait Cursor<S> {
    /// Returns `true` if another element is available. May perform I/O.
    /// Idempotent: calling it repeatedly without an intervening `next`
    /// does not advance the cursor.
    fn has_next(&mut self) -> Result<bool>;

    /// Returns the next element. Caller must have checked `has_next`;
    /// calling past exhaustion is a logic error but still returns a
    /// `Result` (`FetchGeneric`) rather than panicking.
    fn next(&mut self) -> Result<S>;

    /// Skips up to `n` elements, returning the number actually skipped.
    /// Default implementation repeatedly calls `next`; adapters with a
    /// cheaper skip override it.
    fn skip_next(&mut self, n: usize) -> Result<usize> {
        let mut skipped = 0;
        while skipped < n {
            if !self.has_next()? {
                break;
            }
            self.next()?;
            skipped += 1;
        }
        Ok(skipped)
    }

    /// Releases resources. Idempotent.
    fn close(&mut self) -> Result<()>;

    /// Drains the cursor into a `Vec`, closing it afterwards (even on
    /// error).
    fn to_list(&mut self, limit: Option<usize>) -> Result<Vec<S>> {
        let mut out = Vec::new();
        let res = (|| {
            while limit.map_or(true, |l| out.len() < l) {
                if !self.has_next()? {
                    break;
                }
                out.push(self.next()?);
            }
            Ok(())
        })();
        self.close()?;
        res.map(|_| out)
    }
}

/// A cursor with no elements. Useful as a neutral element for set-algebra
/// composition and as a placeholder when a query plan finds nothing to do.
pub struct EmptyCursor<S> {
    closed: bool,
    _marker: std::marker::PhantomData<S>,
}

impl<S> EmptyCursor<S> {
    pub fn new() -> Self {
        EmptyCursor {
            closed: false,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<S> Default for EmptyCursor<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Cursor<S> for EmptyCursor<S> {
    fn has_next(&mut self) -> Result<bool> {
        Ok(false)
    }

    fn next(&mut self) -> Result<S> {
        err_at!(FetchGeneric, msg: "next() called on exhausted cursor")
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// A cursor over exactly one value.
pub struct SingletonCursor<S> {
    value: Option<S>,
    closed: bool,
}

impl<S> SingletonCursor<S> {
    pub fn new(value: S) -> Self {
        SingletonCursor {
            value: Some(value),
            closed: false,
        }
    }
}

impl<S> Cursor<S> for SingletonCursor<S> {
    fn has_next(&mut self) -> Result<bool> {
        Ok(!self.closed && self.value.is_some())
    }

    fn next(&mut self) -> Result<S> {
        match self.value.take() {
            Some(v) => Ok(v),
            None => err_at!(FetchGeneric, msg: "next() called on exhausted cursor"),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.value = None;
        Ok(())
    }
}

/// Adapts a plain fallible [Iterator] (e.g. a host store's `fetch_after`
/// result) into a [Cursor]. This is the bridge between host-store results
/// and the cursor algebra, the same role the reference engine's
/// `BuildScan` plays over a raw `Iterator<Item = Result<Entry<K, V>>>`.
pub struct IterCursor<S, I: Iterator<Item = Result<S>>> {
    iter: Option<I>,
    peeked: Option<S>,
    closed: bool,
}

impl<S, I: Iterator<Item = Result<S>>> IterCursor<S, I> {
    pub fn new(iter: I) -> Self {
        IterCursor {
            iter: Some(iter),
            peeked: None,
            closed: false,
        }
    }
}

impl<S, I: Iterator<Item = Result<S>>> Cursor<S> for IterCursor<S, I> {
    fn has_next(&mut self) -> Result<bool> {
        if self.closed {
            return Ok(false);
        }
        if self.peeked.is_some() {
            return Ok(true);
        }
        match self.iter.as_mut().and_then(|it| it.next()) {
            Some(Ok(v)) => {
                self.peeked = Some(v);
                Ok(true)
            }
            Some(Err(e)) => {
                self.close()?;
                Err(e)
            }
            None => {
                self.close()?;
                Ok(false)
            }
        }
    }

    fn next(&mut self) -> Result<S> {
        match self.peeked.take() {
            Some(v) => Ok(v),
            None => match self.has_next() {
                Ok(true) => self.next(),
                Ok(false) => err_at!(FetchGeneric, msg: "next() called on exhausted cursor"),
                Err(e) => Err(e),
            },
        }
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.peeked = None;
        self.iter = None;
        Ok(())
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod mod_test;
