//! Sorted cursor: chunked re-sort that exploits an already-sorted
//! prefix to avoid buffering the whole source when possible.

use std::cmp::Ordering;
use std::collections::VecDeque;

use super::adapt::{CancelCheck, NeverCancel, CANCEL_CADENCE};
use super::Cursor;
use crate::Result;

struct Cadence<K: CancelCheck> {
    check: K,
    count: u64,
}

impl<K: CancelCheck> Cadence<K> {
    fn new(check: K) -> Self {
        Cadence { check, count: 0 }
    }

    fn tick(&mut self) -> Result<()> {
        self.count += 1;
        if self.count % CANCEL_CADENCE == 0 && self.check.is_cancelled() {
            return err_at!(FetchInterrupted, msg: "sorted cursor interrupted");
        }
        Ok(())
    }
}

/// Re-sorts a source cursor, exploiting a known already-sorted-by prefix
/// when one is supplied. Without a prefix the whole source is
/// buffered once; with one, only each maximal run of prefix-equal items is
/// buffered at a time.
pub struct SortedCursor<S, C, P, F, K = NeverCancel>
where
    C: Cursor<S>,
    P: FnMut(&S, &S) -> Ordering,
    F: FnMut(&S, &S) -> Ordering,
    K: CancelCheck,
{
    source: C,
    prefix: Option<P>,
    finisher: F,
    buffer: VecDeque<S>,
    pushed_back: Option<S>,
    source_done: bool,
    cadence: Cadence<K>,
}

impl<S, C, P, F> SortedCursor<S, C, P, F, NeverCancel>
where
    C: Cursor<S>,
    P: FnMut(&S, &S) -> Ordering,
    F: FnMut(&S, &S) -> Ordering,
{
    /// `prefix` is `None` when nothing is known to be pre-sorted; the
    /// whole source is then buffered and sorted by `finisher` alone.
    pub fn new(source: C, prefix: Option<P>, finisher: F) -> Self {
        SortedCursor {
            source,
            prefix,
            finisher,
            buffer: VecDeque::new(),
            pushed_back: None,
            source_done: false,
            cadence: Cadence::new(NeverCancel),
        }
    }
}

impl<S, C, P, F, K> SortedCursor<S, C, P, F, K>
where
    C: Cursor<S>,
    P: FnMut(&S, &S) -> Ordering,
    F: FnMut(&S, &S) -> Ordering,
    K: CancelCheck,
{
    pub fn with_cancel(source: C, prefix: Option<P>, finisher: F, check: K) -> Self {
        SortedCursor {
            source,
            prefix,
            finisher,
            buffer: VecDeque::new(),
            pushed_back: None,
            source_done: false,
            cadence: Cadence::new(check),
        }
    }

    /// Lexicographic composition of the prefix comparator (if any) then
    /// the finisher.
    pub fn compare(&mut self, a: &S, b: &S) -> Ordering {
        if let Some(prefix) = self.prefix.as_mut() {
            let rel = prefix(a, b);
            if rel != Ordering::Equal {
                return rel;
            }
        }
        (self.finisher)(a, b)
    }

    fn fill(&mut self) -> Result<bool> {
        if !self.buffer.is_empty() {
            return Ok(true);
        }
        if self.source_done && self.pushed_back.is_none() {
            return Ok(false);
        }

        let filled = match self.prefix.take() {
            None => {
                let mut items: Vec<S> = self.pushed_back.take().into_iter().collect();
                loop {
                    self.cadence.tick()?;
                    if !self.source.has_next()? {
                        self.source_done = true;
                        break;
                    }
                    items.push(self.source.next()?);
                }
                items.sort_by(|a, b| (self.finisher)(a, b));
                let non_empty = !items.is_empty();
                self.buffer = items.into();
                Ok(non_empty)
            }
            Some(mut prefix_cmp) => {
                let result = (|| {
                    let leader = match self.pushed_back.take() {
                        Some(v) => v,
                        None => {
                            if !self.source.has_next()? {
                                self.source_done = true;
                                return Ok(false);
                            }
                            self.source.next()?
                        }
                    };
                    let mut chunk: Vec<S> = vec![leader];
                    loop {
                        self.cadence.tick()?;
                        if !self.source.has_next()? {
                            self.source_done = true;
                            break;
                        }
                        let candidate = self.source.next()?;
                        if prefix_cmp(&chunk[0], &candidate) == Ordering::Equal {
                            chunk.push(candidate);
                        } else {
                            self.pushed_back = Some(candidate);
                            break;
                        }
                    }
                    chunk.sort_by(|a, b| (self.finisher)(a, b));
                    self.buffer = chunk.into();
                    Ok(true)
                })();
                self.prefix = Some(prefix_cmp);
                result
            }
        };
        if filled.is_err() {
            self.close().ok();
        }
        filled
    }
}

impl<S, C, P, F, K> Cursor<S> for SortedCursor<S, C, P, F, K>
where
    C: Cursor<S>,
    P: FnMut(&S, &S) -> Ordering,
    F: FnMut(&S, &S) -> Ordering,
    K: CancelCheck,
{
    fn has_next(&mut self) -> Result<bool> {
        self.fill()
    }

    fn next(&mut self) -> Result<S> {
        if !self.fill()? {
            return err_at!(FetchGeneric, msg: "next() called on exhausted cursor");
        }
        match self.buffer.pop_front() {
            Some(v) => Ok(v),
            None => err_at!(FetchGeneric, msg: "next() called on exhausted cursor"),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.buffer.clear();
        self.source.close()
    }
}

#[cfg(test)]
#[path = "sorted_test.rs"]
mod sorted_test;
