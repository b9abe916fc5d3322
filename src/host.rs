//! The host-store contract — narrow traits this crate consumes from
//! whatever primary record store it is layered over. The store itself, its
//! transaction manager, and its query planner are out of scope; these
//! traits exist only to pin down what this crate needs from them.

use crate::record::{PrimaryKey, Record};
use crate::Result;

/// Isolation level requested when entering a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    None,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

/// A transaction handle over the host store.
pub trait Transaction {
    fn set_for_update(&mut self) -> Result<()>;
    fn commit(self: Box<Self>) -> Result<()>;
    fn exit(self: Box<Self>) -> Result<()>;
}

/// Per-record-type storage surface the host exposes.
pub trait Storage<R: Record> {
    type Txn: Transaction;

    fn enter_transaction(&self, level: IsolationLevel) -> Result<Self::Txn>;
    fn enter_top_transaction(&self, level: IsolationLevel) -> Result<Self::Txn>;

    fn prepare(&self) -> R;

    fn try_load(&self, pk: &PrimaryKey) -> Result<Option<R>>;
    fn try_insert(&self, r: &R) -> Result<bool>;
    fn try_update(&self, r: &R) -> Result<bool>;
    fn try_delete(&self, pk: &PrimaryKey) -> Result<bool>;

    fn truncate(&self) -> Result<()>;
    fn count(&self) -> Result<u64>;

    /// Ascending primary-key scan starting strictly after `prev`, or from
    /// the beginning when `prev` is `None`.
    fn fetch_after(&self, prev: Option<&PrimaryKey>) -> Result<Box<dyn Iterator<Item = Result<R>>>>;
}

/// Before/after mutation hook registered on a [Storage]. `S` is the state
/// type threaded from a before-hook to its matching after-hook.
pub trait Trigger<R: Record> {
    type State;

    fn before_insert(&self, r: &R) -> Result<Self::State>;
    fn after_insert(&self, r: &R, state: Self::State) -> Result<()>;

    fn before_update(&self, old: &R, new: &R) -> Result<Self::State>;
    fn after_update(&self, old: &R, new: &R, state: Self::State) -> Result<()>;

    fn before_delete(&self, r: &R) -> Result<Self::State>;
    fn after_delete(&self, r: &R, state: Self::State) -> Result<()>;
}

/// Optional capability: the host may already provide some indexes for free.
pub trait IndexInfoCapability {
    fn free_indexes(&self, type_name: &str) -> Result<Vec<String>>;
    fn is_all_clustered(&self, type_name: &str) -> Result<bool>;
}

#[cfg(test)]
#[path = "host_test.rs"]
mod host_test;
