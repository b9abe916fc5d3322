//! Carbonado is a secondary-index engine layered over a primary record
//! store, together with the streaming cursor algebra used to execute
//! queries against it.
//!
//! An index is maintained as a set of index-entry records kept
//! consistent with a master record type through before/after mutation
//! triggers. Index lifecycle is reconciled on open between
//! what a record type *declares* it wants, what is *persisted*, and what
//! the underlying store already provides for free. Query execution
//! is left to an external planner; this crate hands it a lazy, pull-based
//! cursor algebra to compose plans over: sorted set operations,
//! filtering, transformation, grouping, joins, and external merge-sort.
//!
//! The host-record contract this crate consumes — and does not provide —
//! lives in [host].

#[macro_use]
mod error;

pub mod cursor;
pub mod derived;
pub mod facade;
pub mod filter;
pub mod host;
pub mod index;
pub mod join;
pub mod record;
pub mod sortbuf;

#[cfg(test)]
mod testutil;

pub use crate::derived::DerivedIndexTrigger;
pub use crate::error::{Error, Result};
pub use crate::facade::IndexedStorage;
pub use crate::filter::{ChainedProperty, CompareOp, Filter, FilterVisitor};
pub use crate::host::{IndexInfoCapability, IsolationLevel, Storage, Transaction, Trigger};
pub use crate::join::Joiner;
pub use crate::record::{Direction, PrimaryKey, Record, RecordShape, Value};
