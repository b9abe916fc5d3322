//! Derived-index trigger: when a source record `S` changes,
//! re-projects the index entries of every dependent record `D` that joins
//! back to it, without running `D` through its own mutation trigger.

use std::cmp::Ordering;
use std::rc::Rc;

use crate::host::{Storage, Trigger};
use crate::index::entry::IndexEntryOps;
use crate::index::managed::IndexEntryRecord;
use crate::record::{PrimaryKey, Record, Value};
use crate::{err_at, Result};

/// Drives index-entry maintenance on a dependent type `D` whose indexed
/// property mirrors a value read from a source type `S` it joins back to.
/// Boxed as `Trigger<S>` by the facade, so `D`, `DS` and `ES` stay private
/// to the concrete instance.
pub struct DerivedIndexTrigger<S, D, DS, ES>
where
    S: Record,
    D: Record,
    DS: Storage<D>,
    ES: Storage<IndexEntryRecord>,
{
    dependents: DS,
    entries: ES,
    join_property: usize,
    derived_property: usize,
    source_join_value: fn(&S) -> Value,
    source_value_of: fn(&S) -> Value,
    ops: Vec<Rc<IndexEntryOps>>,
    _marker: std::marker::PhantomData<S>,
}

impl<S, D, DS, ES> DerivedIndexTrigger<S, D, DS, ES>
where
    S: Record,
    D: Record,
    DS: Storage<D>,
    ES: Storage<IndexEntryRecord>,
{
    /// `join_property` is the position on `D` that carries the value
    /// joining it back to `S`; `derived_property` is the position on `D`
    /// caching the value read from `S`. `source_join_value`/`source_value_of`
    /// read, respectively, the value `D.join_property` must match and the
    /// fresh value to cache there, off of an `S` record.
    pub fn new(
        dependents: DS,
        entries: ES,
        join_property: usize,
        derived_property: usize,
        source_join_value: fn(&S) -> Value,
        source_value_of: fn(&S) -> Value,
        ops: Vec<Rc<IndexEntryOps>>,
    ) -> Self {
        DerivedIndexTrigger {
            dependents,
            entries,
            join_property,
            derived_property,
            source_join_value,
            source_value_of,
            ops,
            _marker: std::marker::PhantomData,
        }
    }

    fn dependents_for(&self, join_value: &Value) -> Result<Vec<D>> {
        let mut out = Vec::new();
        for item in self.dependents.fetch_after(None)? {
            let d = item?;
            if d.property(self.join_property).cmp_total(join_value) == Ordering::Equal {
                out.push(d);
            }
        }
        out.sort_by(|a, b| a.primary_key().cmp_total(&b.primary_key()));
        Ok(out)
    }

    fn project_all(&self, d: &D) -> Vec<PrimaryKey> {
        self.ops.iter().map(|ops| ops.copy_from_master(d)).collect()
    }

    fn capture(&self, s: &S) -> Result<Vec<(PrimaryKey, Vec<PrimaryKey>)>> {
        let join_value = (self.source_join_value)(s);
        let deps = self.dependents_for(&join_value)?;
        Ok(deps
            .iter()
            .map(|d| (d.primary_key(), self.project_all(d)))
            .collect())
    }

    /// Re-projects every dependent captured by `before`, patching the entry
    /// for each D-index that changed. `fresh_value`, when given, is
    /// stamped onto `D.derived_property` first; a delete hook passes `None`
    /// since there is no new value to cache.
    fn reconcile(
        &self,
        s: &S,
        before: Vec<(PrimaryKey, Vec<PrimaryKey>)>,
        fresh_value: Option<Value>,
    ) -> Result<()> {
        let join_value = (self.source_join_value)(s);
        let after = self.dependents_for(&join_value)?;
        if after.len() != before.len() {
            return err_at!(
                PersistGeneric,
                msg: "derived-index trigger: dependent set changed from {} to {} concurrently",
                before.len(),
                after.len()
            );
        }

        for (d, (_, old_keys)) in after.into_iter().zip(before.into_iter()) {
            let d = match &fresh_value {
                Some(v) => {
                    let mut patched = d;
                    patched.set_property(self.derived_property, v.clone());
                    self.dependents.try_update(&patched)?;
                    patched
                }
                None => d,
            };
            let new_keys = self.project_all(&d);
            for (old, new) in old_keys.iter().zip(new_keys.iter()) {
                if old.cmp_total(new) != Ordering::Equal {
                    self.entries.try_delete(old)?;
                }
                self.entries.try_insert(&IndexEntryRecord(new.clone()))?;
            }
        }
        Ok(())
    }
}

impl<S, D, DS, ES> Trigger<S> for DerivedIndexTrigger<S, D, DS, ES>
where
    S: Record,
    D: Record,
    DS: Storage<D>,
    ES: Storage<IndexEntryRecord>,
{
    type State = Vec<(PrimaryKey, Vec<PrimaryKey>)>;

    fn before_insert(&self, s: &S) -> Result<Self::State> {
        self.capture(s)
    }

    fn after_insert(&self, s: &S, state: Self::State) -> Result<()> {
        self.reconcile(s, state, Some((self.source_value_of)(s)))
    }

    fn before_update(&self, old: &S, _new: &S) -> Result<Self::State> {
        self.capture(old)
    }

    fn after_update(&self, _old: &S, new: &S, state: Self::State) -> Result<()> {
        self.reconcile(new, state, Some((self.source_value_of)(new)))
    }

    fn before_delete(&self, s: &S) -> Result<Self::State> {
        self.capture(s)
    }

    fn after_delete(&self, s: &S, state: Self::State) -> Result<()> {
        self.reconcile(s, state, None)
    }
}

#[cfg(test)]
#[path = "derived_test.rs"]
mod derived_test;
