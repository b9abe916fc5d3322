//! Sorted set-algebra cursors: union, intersection, asymmetric
//! difference, and symmetric difference over two cursors that each
//! produce values in the order of a supplied comparator.

use std::cmp::Ordering;

use super::Cursor;
use crate::Result;

/// Shared plumbing: buffer at most one peeked value per side so `has_next`
/// stays idempotent, and close both sides together on any error.
struct Peekable<S, C: Cursor<S>> {
    cursor: C,
    peeked: Option<S>,
    done: bool,
}

impl<S, C: Cursor<S>> Peekable<S, C> {
    fn new(cursor: C) -> Self {
        Peekable {
            cursor,
            peeked: None,
            done: false,
        }
    }

    fn peek(&mut self) -> Result<Option<&S>> {
        if self.done {
            return Ok(None);
        }
        if self.peeked.is_none() {
            if self.cursor.has_next()? {
                self.peeked = Some(self.cursor.next()?);
            } else {
                self.done = true;
            }
        }
        Ok(self.peeked.as_ref())
    }

    fn take(&mut self) -> Result<S> {
        // caller must have just confirmed peek() == Some
        Ok(self.peeked.take().unwrap())
    }

    fn close(&mut self) -> Result<()> {
        self.peeked = None;
        self.done = true;
        self.cursor.close()
    }
}

fn close_both<S, T, L: Cursor<S>, R: Cursor<T>>(
    l: &mut Peekable<S, L>,
    r: &mut Peekable<T, R>,
) -> Result<()> {
    let lr = l.close();
    let rr = r.close();
    lr.and(rr)
}

macro_rules! impl_close {
    ($name:ident) => {
        impl<S, L, R, F> Cursor<S> for $name<S, L, R, F>
        where
            L: Cursor<S>,
            R: Cursor<S>,
            F: FnMut(&S, &S) -> Ordering,
        {
            fn has_next(&mut self) -> Result<bool> {
                self.fill()
            }

            fn next(&mut self) -> Result<S> {
                if self.out.is_none() && !self.fill()? {
                    return err_at!(FetchGeneric, msg: "next() called on exhausted cursor");
                }
                Ok(self.out.take().unwrap())
            }

            fn close(&mut self) -> Result<()> {
                close_both(&mut self.left, &mut self.right)
            }
        }
    };
}

/// Union of two sorted cursors: at each step emit the smaller head; when
/// equal, emit once and advance both.
pub struct UnionCursor<S, L: Cursor<S>, R: Cursor<S>, F: FnMut(&S, &S) -> Ordering> {
    left: Peekable<S, L>,
    right: Peekable<S, R>,
    cmp: F,
    out: Option<S>,
}

impl<S, L: Cursor<S>, R: Cursor<S>, F: FnMut(&S, &S) -> Ordering> UnionCursor<S, L, R, F> {
    pub fn new(left: L, right: R, cmp: F) -> Self {
        UnionCursor {
            left: Peekable::new(left),
            right: Peekable::new(right),
            cmp,
            out: None,
        }
    }

    fn fill(&mut self) -> Result<bool> {
        if self.out.is_some() {
            return Ok(true);
        }
        let res = (|| {
            match (self.left.peek()?, self.right.peek()?) {
                (None, None) => return Ok(false),
                (Some(_), None) => self.out = Some(self.left.take()?),
                (None, Some(_)) => self.out = Some(self.right.take()?),
                (Some(lv), Some(rv)) => match (self.cmp)(lv, rv) {
                    Ordering::Less => self.out = Some(self.left.take()?),
                    Ordering::Greater => self.out = Some(self.right.take()?),
                    Ordering::Equal => {
                        self.out = Some(self.left.take()?);
                        self.right.take()?;
                    }
                },
            }
            Ok(true)
        })();
        if res.is_err() {
            self.close().ok();
        }
        res
    }
}
impl_close!(UnionCursor);

/// Intersection of two sorted cursors.
pub struct IntersectionCursor<S, L: Cursor<S>, R: Cursor<S>, F: FnMut(&S, &S) -> Ordering> {
    left: Peekable<S, L>,
    right: Peekable<S, R>,
    cmp: F,
    out: Option<S>,
}

impl<S, L: Cursor<S>, R: Cursor<S>, F: FnMut(&S, &S) -> Ordering> IntersectionCursor<S, L, R, F> {
    pub fn new(left: L, right: R, cmp: F) -> Self {
        IntersectionCursor {
            left: Peekable::new(left),
            right: Peekable::new(right),
            cmp,
            out: None,
        }
    }

    fn fill(&mut self) -> Result<bool> {
        if self.out.is_some() {
            return Ok(true);
        }
        let res = (|| loop {
            match (self.left.peek()?, self.right.peek()?) {
                (None, _) | (_, None) => return Ok(false),
                (Some(lv), Some(rv)) => match (self.cmp)(lv, rv) {
                    Ordering::Less => {
                        self.left.take()?;
                    }
                    Ordering::Greater => {
                        self.right.take()?;
                    }
                    Ordering::Equal => {
                        let out = self.left.take()?;
                        self.right.take()?;
                        self.out = Some(out);
                        return Ok(true);
                    }
                },
            }
        })();
        if res.is_err() {
            self.close().ok();
        }
        res
    }
}
impl_close!(IntersectionCursor);

/// Asymmetric difference L − R: emit L's head iff it is strictly less than
/// R's head or R is exhausted; equal heads are discarded from both.
pub struct DifferenceCursor<S, L: Cursor<S>, R: Cursor<S>, F: FnMut(&S, &S) -> Ordering> {
    left: Peekable<S, L>,
    right: Peekable<S, R>,
    cmp: F,
    out: Option<S>,
}

impl<S, L: Cursor<S>, R: Cursor<S>, F: FnMut(&S, &S) -> Ordering> DifferenceCursor<S, L, R, F> {
    pub fn new(left: L, right: R, cmp: F) -> Self {
        DifferenceCursor {
            left: Peekable::new(left),
            right: Peekable::new(right),
            cmp,
            out: None,
        }
    }

    fn fill(&mut self) -> Result<bool> {
        if self.out.is_some() {
            return Ok(true);
        }
        let res = (|| loop {
            match (self.left.peek()?, self.right.peek()?) {
                (None, _) => return Ok(false),
                (Some(_), None) => {
                    self.out = Some(self.left.take()?);
                    return Ok(true);
                }
                (Some(lv), Some(rv)) => match (self.cmp)(lv, rv) {
                    Ordering::Less => {
                        self.out = Some(self.left.take()?);
                        return Ok(true);
                    }
                    Ordering::Greater => {
                        self.right.take()?;
                    }
                    Ordering::Equal => {
                        self.left.take()?;
                        self.right.take()?;
                    }
                },
            }
        })();
        if res.is_err() {
            self.close().ok();
        }
        res
    }
}
impl_close!(DifferenceCursor);

/// Outcome of [SymmetricDifferenceCursor::compare_next]: which side the
/// next emitted value would come from, or that both sides are exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextSide {
    Left,
    Right,
    Exhausted,
}

/// Symmetric difference: emits the smaller side's head; values present on
/// both sides are dropped. `compare_next` exposes, without consuming,
/// which side the next value comes from.
pub struct SymmetricDifferenceCursor<S, L: Cursor<S>, R: Cursor<S>, F: FnMut(&S, &S) -> Ordering> {
    left: Peekable<S, L>,
    right: Peekable<S, R>,
    cmp: F,
    out: Option<S>,
}

impl<S, L: Cursor<S>, R: Cursor<S>, F: FnMut(&S, &S) -> Ordering>
    SymmetricDifferenceCursor<S, L, R, F>
{
    pub fn new(left: L, right: R, cmp: F) -> Self {
        SymmetricDifferenceCursor {
            left: Peekable::new(left),
            right: Peekable::new(right),
            cmp,
            out: None,
        }
    }

    /// Which side `next()` would draw from, without consuming anything.
    pub fn compare_next(&mut self) -> Result<NextSide> {
        loop {
            match (self.left.peek()?, self.right.peek()?) {
                (None, None) => return Ok(NextSide::Exhausted),
                (Some(_), None) => return Ok(NextSide::Left),
                (None, Some(_)) => return Ok(NextSide::Right),
                (Some(lv), Some(rv)) => match (self.cmp)(lv, rv) {
                    Ordering::Less => return Ok(NextSide::Left),
                    Ordering::Greater => return Ok(NextSide::Right),
                    Ordering::Equal => {
                        self.left.take()?;
                        self.right.take()?;
                        continue;
                    }
                },
            }
        }
    }

    fn fill(&mut self) -> Result<bool> {
        if self.out.is_some() {
            return Ok(true);
        }
        let res = (|| match self.compare_next()? {
            NextSide::Exhausted => Ok(false),
            NextSide::Left => {
                self.out = Some(self.left.take()?);
                Ok(true)
            }
            NextSide::Right => {
                self.out = Some(self.right.take()?);
                Ok(true)
            }
        })();
        if res.is_err() {
            self.close().ok();
        }
        res
    }
}
impl_close!(SymmetricDifferenceCursor);

#[cfg(test)]
#[path = "setops_test.rs"]
mod setops_test;
