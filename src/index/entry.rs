//! Index-entry model: given an [IndexDescriptor], derive the shape
//! of its synthetic index-entry record and the operations needed to keep
//! it consistent with a master record.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::index::descriptor::IndexDescriptor;
use crate::record::{PrimaryKey, Record};

/// Operations derived from an [IndexDescriptor] for a given master type.
/// `M` is the master record type; the index-entry record itself
/// is represented directly as a [PrimaryKey] (index properties followed by
/// the master's primary-key properties) since that's all an entry is.
pub struct IndexEntryOps {
    pub descriptor: IndexDescriptor,
    master_primary_key: Vec<usize>,
}

impl IndexEntryOps {
    pub fn new(descriptor: IndexDescriptor, master_primary_key: Vec<usize>) -> Self {
        IndexEntryOps {
            descriptor,
            master_primary_key,
        }
    }

    /// Projects a master record into its index-entry key: indexed
    /// properties (in descriptor order) followed by the master's primary
    /// key.
    pub fn copy_from_master<M: Record>(&self, master: &M) -> PrimaryKey {
        let mut values = Vec::with_capacity(self.descriptor.properties.len() + self.master_primary_key.len());
        for p in &self.descriptor.properties {
            values.push(master.property(p.position));
        }
        for pos in &self.master_primary_key {
            values.push(master.property(*pos));
        }
        PrimaryKey(values)
    }

    /// Extracts the trailing master-primary-key suffix of an entry back
    /// into a [PrimaryKey] usable to load the master.
    pub fn copy_to_master_primary_key(&self, entry: &PrimaryKey) -> PrimaryKey {
        let start = self.descriptor.properties.len();
        PrimaryKey(entry.0[start..].to_vec())
    }

    /// True iff every indexed + PK property in `entry` agrees with the
    /// freshly-projected value from `master`.
    pub fn is_consistent<M: Record>(&self, entry: &PrimaryKey, master: &M) -> bool {
        self.copy_from_master(master).cmp_total(entry) == Ordering::Equal
    }

    /// Total order over entries honoring each property's declared
    /// direction. Float bit-pattern ordering and
    /// unsigned-lexicographic byte ordering come from [Value::cmp_directed].
    pub fn compare(&self, a: &PrimaryKey, b: &PrimaryKey) -> Ordering {
        let dirs = self
            .descriptor
            .properties
            .iter()
            .map(|p| p.direction.into())
            .chain(self.master_primary_key.iter().map(|_| crate::record::Direction::Asc));
        for ((av, bv), dir) in a.0.iter().zip(b.0.iter()).zip(dirs) {
            match av.cmp_directed(bv, dir) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        a.0.len().cmp(&b.0.len())
    }

    /// Identity suitable for keying a storage-of-entry lookup — the
    /// index's stable name descriptor.
    pub fn reference_class(&self) -> String {
        self.descriptor.to_name_descriptor()
    }
}

/// Generator cache keyed by descriptor, shared across a process. Held
/// behind `Rc<RefCell<..>>`/`Weak` rather than the host's soft-value map
/// since this crate runs single-process, single-allocator.
#[derive(Default)]
pub struct EntryOpsCache {
    cache: RefCell<HashMap<String, Weak<IndexEntryOps>>>,
}

impl EntryOpsCache {
    pub fn new() -> Self {
        EntryOpsCache::default()
    }

    pub fn get_or_build(
        &self,
        descriptor: &IndexDescriptor,
        master_primary_key: &[usize],
    ) -> Rc<IndexEntryOps> {
        let key = descriptor.to_name_descriptor();
        if let Some(existing) = self.cache.borrow().get(&key).and_then(Weak::upgrade) {
            return existing;
        }
        let built = Rc::new(IndexEntryOps::new(descriptor.clone(), master_primary_key.to_vec()));
        self.cache.borrow_mut().insert(key, Rc::downgrade(&built));
        built
    }
}

#[cfg(test)]
#[path = "entry_test.rs"]
mod entry_test;
