//! Indexed-storage facade: reconciles index analysis against
//! a master [Storage] at construction, then becomes the single entry point
//! mutations must go through so managed and derived index
//! entries stay in sync.
//!
//! The host contract has no `addTrigger`/`removeTrigger` registration
//! point of its own — this facade *is* that dispatch point: callers
//! mutate through [IndexedStorage::insert]/[update](IndexedStorage::update)/
//! [delete](IndexedStorage::delete) instead of the master directly.

use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::filter::Filter;
use crate::host::{Storage, Trigger};
use crate::index::analysis::{analyze, AnalysisInput};
use crate::index::descriptor::IndexDescriptor;
use crate::index::managed::{IndexEntryRecord, ManagedIndex};
use crate::index::stored_info::StoredIndexInfo;
use crate::record::{PrimaryKey, Record};
use crate::Result;

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// State threaded by a boxed derived-index trigger: per dependent,
/// its primary key and the index-entry keys captured before mutation.
type DerivedState = Vec<(PrimaryKey, Vec<PrimaryKey>)>;

/// Owns the master storage and every index reconciled against it at
/// construction. `ES` is the entry-storage type shared by every
/// managed index of this master type; `IS` stores [StoredIndexInfo].
pub struct IndexedStorage<R, MS, ES, IS>
where
    R: Record,
    MS: Storage<R>,
    ES: Storage<IndexEntryRecord>,
    IS: Storage<StoredIndexInfo>,
{
    type_name: String,
    master: MS,
    #[allow(dead_code)]
    info: IS,
    managed: Vec<ManagedIndex<R, MS, ES>>,
    derived: Vec<Box<dyn Trigger<R, State = DerivedState>>>,
    queryable: Vec<IndexDescriptor>,
}

impl<R, MS, ES, IS> IndexedStorage<R, MS, ES, IS>
where
    R: Record + 'static,
    MS: Storage<R>,
    ES: Storage<IndexEntryRecord>,
    IS: Storage<StoredIndexInfo>,
{
    /// Runs index analysis, drops `remove`, builds `add`, and leaves every
    /// descriptor in `managed` ready to drive mutation routing. `entries_for`
    /// opens or creates the entry storage for one descriptor; installing
    /// derived triggers is a separate call to
    /// [Self::install_derived_trigger] since a dependency's storages
    /// belong to a different record type than `R`.
    pub fn open(
        master: MS,
        info: IS,
        master_primary_key: Vec<usize>,
        input: AnalysisInput,
        tmp_dir: impl Into<PathBuf>,
        desired_speed: Option<Duration>,
        entries_for: impl Fn(&IndexDescriptor) -> ES,
    ) -> Result<Self> {
        let type_name = input.type_name.clone();
        let tmp_dir = tmp_dir.into();
        let analysis = analyze(&input);

        for descriptor in &analysis.remove {
            entries_for(descriptor).truncate()?;
            let blank = StoredIndexInfo::new(descriptor, String::new(), 0);
            info.try_delete(&blank.primary_key())?;
            log::info!(
                "indexed storage {}: removed stale index {}",
                type_name,
                descriptor.to_name_descriptor()
            );
        }

        let mut managed = Vec::with_capacity(analysis.managed.len());
        for descriptor in &analysis.managed {
            let entries = entries_for(descriptor);
            managed.push(ManagedIndex::new(descriptor.clone(), master_primary_key.clone(), entries));
        }

        for descriptor in &analysis.add {
            let name = descriptor.to_name_descriptor();
            let idx = managed
                .iter()
                .find(|m| m.descriptor().to_name_descriptor() == name)
                .expect("add is always a subset of managed");
            let stats = idx.build_index(&master, tmp_dir.clone(), desired_speed)?;
            log::info!(
                "indexed storage {}: built {} ({} entries)",
                type_name,
                name,
                stats.inserted
            );
            let type_descriptor = (input.current_type_descriptor)(descriptor);
            let stored = StoredIndexInfo::new(descriptor, type_descriptor, now_millis());
            if info.try_load(&stored.primary_key())?.is_none() {
                info.try_insert(&stored)?;
            }
        }

        let queryable = analysis.queryable.clone();
        Ok(IndexedStorage {
            type_name,
            master,
            info,
            managed,
            derived: Vec::new(),
            queryable,
        })
    }

    /// Installs one derived-index trigger for a derived-to
    /// dependency of this type.
    pub fn install_derived_trigger(&mut self, trigger: Box<dyn Trigger<R, State = DerivedState>>) {
        self.derived.push(trigger);
    }

    pub fn master(&self) -> &MS {
        &self.master
    }

    pub fn managed(&self) -> &[ManagedIndex<R, MS, ES>] {
        &self.managed
    }

    /// The set a query planner may pick from.
    pub fn queryable(&self) -> &[IndexDescriptor] {
        &self.queryable
    }

    pub fn insert(&self, r: &R) -> Result<()> {
        let managed_states: Vec<_> = self
            .managed
            .iter()
            .map(|m| m.before_insert(r))
            .collect::<Result<Vec<_>>>()?;
        let derived_states: Vec<_> = self
            .derived
            .iter()
            .map(|d| d.before_insert(r))
            .collect::<Result<Vec<_>>>()?;
        self.master.try_insert(r)?;
        for (m, s) in self.managed.iter().zip(managed_states) {
            m.after_insert(r, s)?;
        }
        for (d, s) in self.derived.iter().zip(derived_states) {
            d.after_insert(r, s)?;
        }
        Ok(())
    }

    pub fn update(&self, old: &R, new: &R) -> Result<()> {
        let managed_states: Vec<_> = self
            .managed
            .iter()
            .map(|m| m.before_update(old, new))
            .collect::<Result<Vec<_>>>()?;
        let derived_states: Vec<_> = self
            .derived
            .iter()
            .map(|d| d.before_update(old, new))
            .collect::<Result<Vec<_>>>()?;
        self.master.try_update(new)?;
        for (m, s) in self.managed.iter().zip(managed_states) {
            m.after_update(old, new, s)?;
        }
        for (d, s) in self.derived.iter().zip(derived_states) {
            d.after_update(old, new, s)?;
        }
        Ok(())
    }

    pub fn delete(&self, r: &R) -> Result<()> {
        let managed_states: Vec<_> = self
            .managed
            .iter()
            .map(|m| m.before_delete(r))
            .collect::<Result<Vec<_>>>()?;
        let derived_states: Vec<_> = self
            .derived
            .iter()
            .map(|d| d.before_delete(r))
            .collect::<Result<Vec<_>>>()?;
        self.master.try_delete(&r.primary_key())?;
        for (m, s) in self.managed.iter().zip(managed_states) {
            m.after_delete(r, s)?;
        }
        for (d, s) in self.derived.iter().zip(derived_states) {
            d.after_delete(r, s)?;
        }
        Ok(())
    }

    /// Truncates the master then every managed index-entry
    /// storage, in that order.
    pub fn truncate(&self) -> Result<()> {
        self.master.truncate()?;
        for m in &self.managed {
            m.entries().truncate()?;
        }
        Ok(())
    }

    pub fn prepare(&self) -> R {
        self.master.prepare()
    }

    /// Planning a filter against the queryable set
    /// and compiling it to a cursor chain is the external query engine's
    /// job; this hands back an unfiltered master scan for
    /// the engine to drive further.
    pub fn query(&self, _filter: &Filter) -> Result<Box<dyn Iterator<Item = Result<R>>>> {
        self.master.fetch_after(None)
    }
}

#[cfg(test)]
#[path = "facade_test.rs"]
mod facade_test;
