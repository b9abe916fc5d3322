//! Secondary-index data model and maintenance.

pub mod analysis;
pub mod descriptor;
pub mod entry;
pub mod managed;
pub mod stored_info;

pub use analysis::{analyze, AnalysisInput, DerivedToDependency, IndexAnalysis};
pub use descriptor::{DirectionBit, IndexDescriptor, IndexProperty};
pub use entry::{EntryOpsCache, IndexEntryOps};
pub use managed::{BuildStats, ManagedIndex};
pub use stored_info::{type_descriptor, PropertyType, StoredIndexInfo};
