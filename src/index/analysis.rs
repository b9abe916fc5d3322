//! Index analysis: computes the Desired/Existing/Free/Bogus/
//! Queryable/Managed/Remove/Add sets for one master record type.

use std::collections::HashSet;

use crate::index::descriptor::IndexDescriptor;
use crate::index::stored_info::StoredIndexInfo;

/// A chained property on another type whose derived/indexed expression
/// reads a join property back to this master.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedToDependency {
    pub dependent_type: String,
    pub join_property: usize,
    pub derived_property: usize,
}

/// Inputs to [analyze].
pub struct AnalysisInput {
    pub type_name: String,
    pub primary_key: Vec<usize>,
    /// Indexes declared on the record, plus alternate keys and synthetic
    /// join indexes, before `reduce`/`uniquify`.
    pub declared: Vec<IndexDescriptor>,
    /// Already-unique existing descriptors trigger `uniquify` on desired.
    pub any_existing_is_unique: bool,
    pub free: Vec<String>,
    pub stored: Vec<StoredIndexInfo>,
    pub all_clustered: bool,
    pub repair_enabled: bool,
    pub derived_to: Vec<DerivedToDependency>,
    /// Returns the *current* type descriptor for a descriptor (used to
    /// detect schema drift against `stored`'s recorded type descriptor).
    pub current_type_descriptor: fn(&IndexDescriptor) -> String,
}

#[derive(Debug, Clone)]
pub struct IndexAnalysis {
    pub desired: Vec<IndexDescriptor>,
    pub existing: Vec<IndexDescriptor>,
    pub bogus: Vec<IndexDescriptor>,
    pub free: Vec<String>,
    pub queryable: Vec<IndexDescriptor>,
    pub managed: Vec<IndexDescriptor>,
    pub remove: Vec<IndexDescriptor>,
    pub add: Vec<IndexDescriptor>,
    pub all_clustered: bool,
    pub derived_to: Vec<DerivedToDependency>,
}

fn name(d: &IndexDescriptor) -> String {
    d.to_name_descriptor()
}

fn by_name(items: &[IndexDescriptor]) -> HashSet<String> {
    items.iter().map(name).collect()
}

fn minus(a: &[IndexDescriptor], b: &[IndexDescriptor]) -> Vec<IndexDescriptor> {
    let bn = by_name(b);
    a.iter().filter(|d| !bn.contains(&name(d))).cloned().collect()
}

fn union(a: &[IndexDescriptor], b: &[IndexDescriptor]) -> Vec<IndexDescriptor> {
    let mut out = a.to_vec();
    let an = by_name(a);
    for d in b {
        if !an.contains(&name(d)) {
            out.push(d.clone());
        }
    }
    out
}

fn intersect(a: &[IndexDescriptor], b: &[IndexDescriptor]) -> Vec<IndexDescriptor> {
    let bn = by_name(b);
    a.iter().filter(|d| bn.contains(&name(d))).cloned().collect()
}

/// Computes the six sets plus derived-to dependencies.
pub fn analyze(input: &AnalysisInput) -> IndexAnalysis {
    let mut desired = IndexDescriptor::reduce(input.declared.clone());
    if input.any_existing_is_unique {
        desired = desired
            .into_iter()
            .map(|d| d.uniquify(&input.primary_key))
            .collect();
    }

    let mut existing = Vec::new();
    let mut bogus = Vec::new();
    for info in &input.stored {
        match info.parsed_descriptor() {
            Ok(parsed) => {
                let current = (input.current_type_descriptor)(&parsed);
                if current == info.index_type_descriptor {
                    existing.push(parsed);
                } else {
                    bogus.push(parsed);
                }
            }
            Err(_) => continue,
        }
    }

    let free_names: HashSet<String> = input.free.iter().cloned().collect();
    let is_free = |d: &IndexDescriptor| free_names.contains(&d.to_name_descriptor());

    let mut free_descs: Vec<IndexDescriptor> = desired
        .iter()
        .chain(existing.iter())
        .filter(|d| is_free(d))
        .cloned()
        .collect();
    // A free index with no counterpart in `desired`/`existing` (never
    // declared, or declared under a name that no longer parses to one of
    // them) is reconstructed straight from its name descriptor so it still
    // surfaces as queryable.
    let known = by_name(&free_descs);
    for n in &input.free {
        if known.contains(n) {
            continue;
        }
        if let Ok(parsed) = IndexDescriptor::parse_name_descriptor(n) {
            free_descs.push(parsed);
        }
    }

    let queryable = if input.repair_enabled {
        union(&desired, &free_descs)
    } else {
        union(&intersect(&desired, &existing), &free_descs)
    };

    let managed = if input.repair_enabled {
        minus(&desired, &free_descs)
    } else {
        minus(&union(&desired, &existing), &free_descs)
    };

    let remove = if input.repair_enabled {
        let mut r = minus(&existing, &desired);
        r = minus(&r, &free_descs);
        union(&r, &bogus)
    } else {
        Vec::new()
    };

    let add = if input.repair_enabled {
        let mut a = minus(&desired, &existing);
        a = minus(&a, &free_descs);
        a
    } else {
        Vec::new()
    };

    IndexAnalysis {
        desired,
        existing,
        bogus,
        free: input.free.clone(),
        queryable,
        managed,
        remove,
        add,
        all_clustered: input.all_clustered,
        derived_to: input.derived_to.clone(),
    }
}

#[cfg(test)]
#[path = "analysis_test.rs"]
mod analysis_test;
