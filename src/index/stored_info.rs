//! Persisted index metadata: the `StoredIndexInfo` record and
//! the index *type* descriptor used to detect schema drift.

use crate::index::descriptor::IndexDescriptor;
use crate::record::{PrimaryKey, Record, Value};

/// A declared property type, used to build a type descriptor string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    Bool,
    I64,
    F64,
    Text,
    Bytes,
    List,
}

impl PropertyType {
    fn tag(self) -> char {
        match self {
            PropertyType::Bool => 'b',
            PropertyType::I64 => 'i',
            PropertyType::F64 => 'f',
            PropertyType::Text => 't',
            PropertyType::Bytes => 'y',
            PropertyType::List => 'l',
        }
    }
}

/// Textual encoding of per-property declared types for one index. Two
/// descriptors with the same name but a different type descriptor
/// indicate the schema drifted underneath a persisted index.
pub fn type_descriptor(types: &[PropertyType]) -> String {
    types.iter().map(|t| t.tag()).collect()
}

/// A persisted record of one active index. Its primary key is the
/// name descriptor; range scans over all indexes of a master type use the
/// half-open interval on that key sharing the type-name prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredIndexInfo {
    pub index_name: String,
    pub index_type_descriptor: String,
    pub creation_timestamp: i64,
    pub version_number: i32,
}

impl StoredIndexInfo {
    pub fn new(descriptor: &IndexDescriptor, type_descriptor: String, creation_timestamp: i64) -> Self {
        StoredIndexInfo {
            index_name: descriptor.to_name_descriptor(),
            index_type_descriptor: type_descriptor,
            creation_timestamp,
            version_number: 1,
        }
    }

    pub fn primary_key(&self) -> PrimaryKey {
        PrimaryKey(vec![Value::Text(self.index_name.clone())])
    }

    pub fn parsed_descriptor(&self) -> crate::Result<IndexDescriptor> {
        IndexDescriptor::parse_name_descriptor(&self.index_name)
    }

    /// Half-open key range `[<type_name>~, <type_name>~\u{10ffff})`
    /// used to enumerate the `StoredIndexInfo` rows of one master
    /// type.
    pub fn scan_range_for(type_name: &str) -> (String, String) {
        let lo = format!("{}~", type_name);
        let hi = format!("{}~\u{10ffff}", type_name);
        (lo, hi)
    }
}

impl Record for StoredIndexInfo {
    fn primary_key(&self) -> PrimaryKey {
        StoredIndexInfo::primary_key(self)
    }

    fn property(&self, pos: usize) -> Value {
        match pos {
            0 => Value::Text(self.index_name.clone()),
            1 => Value::Text(self.index_type_descriptor.clone()),
            2 => Value::I64(self.creation_timestamp),
            3 => Value::I64(self.version_number as i64),
            _ => Value::Null,
        }
    }

    fn set_property(&mut self, pos: usize, value: Value) {
        match (pos, value) {
            (0, Value::Text(s)) => self.index_name = s,
            (1, Value::Text(s)) => self.index_type_descriptor = s,
            (2, Value::I64(n)) => self.creation_timestamp = n,
            (3, Value::I64(n)) => self.version_number = n as i32,
            _ => (),
        }
    }
}

#[cfg(test)]
#[path = "stored_info_test.rs"]
mod stored_info_test;
