//! Index descriptors: an ordered property/direction tuple plus a
//! uniqueness flag, with the `reduce`/`uniquify` invariants from the data
//! model.

use crate::record::Direction;

/// One property of an index key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexProperty {
    pub position: usize,
    pub direction: DirectionBit,
}

/// Direction bit carried per index property; canonicalized to `Asc` at the
/// descriptor level — `Desc` only ever appears on index entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionBit {
    Asc,
    Desc,
}

impl From<DirectionBit> for Direction {
    fn from(b: DirectionBit) -> Direction {
        match b {
            DirectionBit::Asc => Direction::Asc,
            DirectionBit::Desc => Direction::Desc,
        }
    }
}

/// An index over a master record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    pub type_name: String,
    pub properties: Vec<IndexProperty>,
    pub unique: bool,
}

impl IndexDescriptor {
    pub fn new(type_name: impl Into<String>, properties: Vec<IndexProperty>, unique: bool) -> Self {
        IndexDescriptor {
            type_name: type_name.into(),
            properties,
            unique,
        }
    }

    fn is_prefix_of(&self, other: &IndexDescriptor) -> bool {
        self.properties.len() < other.properties.len()
            && self
                .properties
                .iter()
                .zip(other.properties[..self.properties.len()].iter())
                .all(|(a, b)| a.position == b.position)
    }

    /// Removes indexes that are a strict prefix of another index in the
    /// same set.
    pub fn reduce(indexes: Vec<IndexDescriptor>) -> Vec<IndexDescriptor> {
        let mut keep = Vec::with_capacity(indexes.len());
        'outer: for (i, idx) in indexes.iter().enumerate() {
            for (j, other) in indexes.iter().enumerate() {
                if i != j && idx.is_prefix_of(other) {
                    continue 'outer;
                }
            }
            keep.push(idx.clone());
        }
        keep
    }

    /// Appends the primary-key properties to the index key if they are not
    /// already a suffix, so every key is unique.
    pub fn uniquify(mut self, primary_key: &[usize]) -> IndexDescriptor {
        let already_has_pk = primary_key.iter().all(|pk_pos| {
            self.properties.iter().any(|p| p.position == *pk_pos)
        });
        if !already_has_pk {
            for pos in primary_key {
                self.properties.push(IndexProperty {
                    position: *pos,
                    direction: DirectionBit::Asc,
                });
            }
        }
        self
    }

    /// Index name descriptor: `<type>~<U|N><dir><pos>...`.
    pub fn to_name_descriptor(&self) -> String {
        let mut s = format!(
            "{}~{}",
            self.type_name,
            if self.unique { "U" } else { "N" }
        );
        for p in &self.properties {
            let d = match p.direction {
                DirectionBit::Asc => '+',
                DirectionBit::Desc => '-',
            };
            s.push(d);
            s.push_str(&p.position.to_string());
        }
        s
    }

    /// Parses a name descriptor produced by [Self::to_name_descriptor].
    pub fn parse_name_descriptor(s: &str) -> crate::Result<IndexDescriptor> {
        let (type_name, rest) = match s.split_once('~') {
            Some(pair) => pair,
            None => return err_at!(DecodeFail, msg: "malformed index descriptor {:?}", s),
        };
        let mut chars = rest.chars();
        let unique = match chars.next() {
            Some('U') => true,
            Some('N') => false,
            _ => return err_at!(DecodeFail, msg: "malformed uniqueness marker in {:?}", s),
        };
        let remainder: String = chars.collect();
        let mut properties = Vec::new();
        let mut cur_dir: Option<DirectionBit> = None;
        let mut cur_num = String::new();
        for c in remainder.chars() {
            match c {
                '+' | '-' => {
                    if let Some(dir) = cur_dir.take() {
                        properties.push(IndexProperty {
                            position: err_at!(DecodeFail, cur_num.parse::<usize>())?,
                            direction: dir,
                        });
                        cur_num.clear();
                    }
                    cur_dir = Some(if c == '+' { DirectionBit::Asc } else { DirectionBit::Desc });
                }
                d if d.is_ascii_digit() => cur_num.push(d),
                _ => return err_at!(DecodeFail, msg: "unexpected char {:?} in {:?}", c, s),
            }
        }
        if let Some(dir) = cur_dir {
            properties.push(IndexProperty {
                position: err_at!(DecodeFail, cur_num.parse::<usize>())?,
                direction: dir,
            });
        }
        Ok(IndexDescriptor {
            type_name: type_name.to_string(),
            properties,
            unique,
        })
    }
}

#[cfg(test)]
#[path = "descriptor_test.rs"]
mod descriptor_test;
