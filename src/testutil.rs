//! In-memory host-store stand-in used only by this crate's own tests. It
//! implements the host-store contract literally (a `BTreeMap` keyed by primary
//! key) so that cursor/index tests can exercise real `Storage`/`Trigger`
//! flows without depending on an actual production store.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::host::{IsolationLevel, Storage, Transaction};
use crate::record::{PrimaryKey, Record, Value};
use crate::Result;

/// A generic row: a primary key tuple followed by arbitrary properties.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub pk_width: usize,
    pub props: Vec<Value>,
}

impl Row {
    pub fn new(pk: Vec<Value>, rest: Vec<Value>) -> Row {
        let pk_width = pk.len();
        let mut props = pk;
        props.extend(rest);
        Row { pk_width, props }
    }
}

impl Record for Row {
    fn primary_key(&self) -> PrimaryKey {
        PrimaryKey(self.props[..self.pk_width].to_vec())
    }

    fn property(&self, pos: usize) -> Value {
        self.props[pos].clone()
    }

    fn set_property(&mut self, pos: usize, value: Value) {
        self.props[pos] = value;
    }
}

pub struct MemoryStore<R: Record> {
    rows: Rc<RefCell<BTreeMap<usize, R>>>,
    next_id: Rc<RefCell<usize>>,
}

impl<R: Record> Clone for MemoryStore<R> {
    fn clone(&self) -> Self {
        MemoryStore {
            rows: Rc::clone(&self.rows),
            next_id: Rc::clone(&self.next_id),
        }
    }
}

pub struct NoopTxn;

impl Transaction for NoopTxn {
    fn set_for_update(&mut self) -> Result<()> {
        Ok(())
    }
    fn commit(self: Box<Self>) -> Result<()> {
        Ok(())
    }
    fn exit(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

impl<R: Record + 'static> MemoryStore<R> {
    pub fn new() -> Self {
        MemoryStore {
            rows: Rc::new(RefCell::new(BTreeMap::new())),
            next_id: Rc::new(RefCell::new(0)),
        }
    }

    fn find(&self, pk: &PrimaryKey) -> Option<usize> {
        self.rows
            .borrow()
            .iter()
            .find(|(_, r)| r.primary_key().cmp_total(pk) == std::cmp::Ordering::Equal)
            .map(|(id, _)| *id)
    }

    pub fn all_sorted(&self) -> Vec<R> {
        let mut out: Vec<R> = self.rows.borrow().values().cloned().collect();
        out.sort_by(|a, b| a.primary_key().cmp_total(&b.primary_key()));
        out
    }
}

impl<R: Record + 'static> Storage<R> for MemoryStore<R> {
    type Txn = NoopTxn;

    fn enter_transaction(&self, _level: IsolationLevel) -> Result<Self::Txn> {
        Ok(NoopTxn)
    }
    fn enter_top_transaction(&self, _level: IsolationLevel) -> Result<Self::Txn> {
        Ok(NoopTxn)
    }

    fn prepare(&self) -> R {
        unimplemented!("test store requires callers to build rows directly")
    }

    fn try_load(&self, pk: &PrimaryKey) -> Result<Option<R>> {
        Ok(self.find(pk).map(|id| self.rows.borrow()[&id].clone()))
    }

    fn try_insert(&self, r: &R) -> Result<bool> {
        if self.find(&r.primary_key()).is_some() {
            return Ok(false);
        }
        let mut id = self.next_id.borrow_mut();
        self.rows.borrow_mut().insert(*id, r.clone());
        *id += 1;
        Ok(true)
    }

    fn try_update(&self, r: &R) -> Result<bool> {
        match self.find(&r.primary_key()) {
            Some(id) => {
                self.rows.borrow_mut().insert(id, r.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn try_delete(&self, pk: &PrimaryKey) -> Result<bool> {
        match self.find(pk) {
            Some(id) => {
                self.rows.borrow_mut().remove(&id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn truncate(&self) -> Result<()> {
        self.rows.borrow_mut().clear();
        Ok(())
    }

    fn count(&self) -> Result<u64> {
        Ok(self.rows.borrow().len() as u64)
    }

    fn fetch_after(&self, prev: Option<&PrimaryKey>) -> Result<Box<dyn Iterator<Item = Result<R>>>> {
        let all = self.all_sorted();
        let start = match prev {
            None => 0,
            Some(pk) => all
                .iter()
                .position(|r| r.primary_key().cmp_total(pk) == std::cmp::Ordering::Greater)
                .unwrap_or(all.len()),
        };
        Ok(Box::new(all.into_iter().skip(start).map(Ok)))
    }
}
