//! Joined cursor factory: given a "B-refers-to-A" join over a set
//! of property pairs, builds a cursor that maps each `A` to its matching
//! `B`(s), layered directly on the transform cursors.

use std::cmp::Ordering;
use std::marker::PhantomData;

use crate::cursor::adapt::{MultiTransformedCursor, TransformedCursor};
use crate::cursor::{Cursor, IterCursor};
use crate::host::Storage;
use crate::record::{PrimaryKey, Record};
use crate::Result;

/// Builds join cursors for one "B-refers-to-A" relationship. Each
/// pair in `pairs` is `(position on A, position on B)` for one join column.
pub struct Joiner<A, B, MB>
where
    A: Record,
    B: Record,
    MB: Storage<B>,
{
    storage: MB,
    pairs: Vec<(usize, usize)>,
    b_primary_key: Vec<usize>,
    one_to_one: bool,
    writable: bool,
    _marker: PhantomData<(A, B)>,
}

fn covers(positions: &[usize], primary_key: &[usize]) -> bool {
    positions.len() == primary_key.len() && primary_key.iter().all(|p| positions.contains(p))
}

impl<A, B, MB> Joiner<A, B, MB>
where
    A: Record,
    B: Record,
    MB: Storage<B>,
{
    /// Decides the join's shape at construction: **one-to-one**
    /// when every joined column is a primary-key property on both `A` and
    /// `B`, **one-to-many** otherwise. `writable` controls whether a
    /// matched `b` has its join columns re-stamped from `a` and persisted,
    /// a cheap back-reference.
    pub fn new(
        storage: MB,
        pairs: Vec<(usize, usize)>,
        a_primary_key: &[usize],
        b_primary_key: &[usize],
        writable: bool,
    ) -> Self {
        let a_positions: Vec<usize> = pairs.iter().map(|(a, _)| *a).collect();
        let b_positions: Vec<usize> = pairs.iter().map(|(_, b)| *b).collect();
        let one_to_one = covers(&a_positions, a_primary_key) && covers(&b_positions, b_primary_key);
        Joiner {
            storage,
            pairs,
            b_primary_key: b_primary_key.to_vec(),
            one_to_one,
            writable,
            _marker: PhantomData,
        }
    }

    pub fn is_one_to_one(&self) -> bool {
        self.one_to_one
    }

    /// The one-to-one shape: behaves as a [TransformedCursor] that
    /// derives `b`'s primary key from `a`'s joined columns, loads it, and
    /// drops `a` when no match exists.
    pub fn one_to_one_cursor<C: Cursor<A>>(
        self,
        source: C,
    ) -> TransformedCursor<A, B, C, impl FnMut(A) -> Result<Option<B>>> {
        let Joiner { storage, pairs, b_primary_key, writable, .. } = self;
        TransformedCursor::new(source, move |a: A| {
            let mut key = Vec::with_capacity(b_primary_key.len());
            for b_pos in &b_primary_key {
                let (a_pos, _) = pairs
                    .iter()
                    .find(|(_, bp)| bp == b_pos)
                    .expect("one-to-one join covers every b primary key position");
                key.push(a.property(*a_pos));
            }
            match storage.try_load(&PrimaryKey(key))? {
                None => Ok(None),
                Some(mut b) => {
                    if writable {
                        for (a_pos, b_pos) in &pairs {
                            b.set_property(*b_pos, a.property(*a_pos));
                        }
                        storage.try_update(&b)?;
                    }
                    Ok(Some(b))
                }
            }
        })
    }

    /// The one-to-many shape: behaves as a [MultiTransformedCursor] that
    /// scans every `b` whose join columns equal `a`'s, optionally
    /// re-stamping each one it yields.
    #[allow(clippy::type_complexity)]
    pub fn one_to_many_cursor<C: Cursor<A>>(
        self,
        source: C,
    ) -> MultiTransformedCursor<
        A,
        B,
        C,
        IterCursor<B, std::vec::IntoIter<Result<B>>>,
        impl FnMut(A) -> Result<IterCursor<B, std::vec::IntoIter<Result<B>>>>,
    > {
        let Joiner { storage, pairs, writable, .. } = self;
        MultiTransformedCursor::new(source, move |a: A| {
            let mut matches = Vec::new();
            for item in storage.fetch_after(None)? {
                let mut b = item?;
                let is_match = pairs.iter().all(|(a_pos, b_pos)| {
                    b.property(*b_pos).cmp_total(&a.property(*a_pos)) == Ordering::Equal
                });
                if !is_match {
                    continue;
                }
                if writable {
                    for (a_pos, b_pos) in &pairs {
                        b.set_property(*b_pos, a.property(*a_pos));
                    }
                    storage.try_update(&b)?;
                }
                matches.push(Ok(b));
            }
            Ok(IterCursor::new(matches.into_iter()))
        })
    }
}

#[cfg(test)]
#[path = "join_test.rs"]
mod join_test;
