//! Per-index runtime: mutation triggers, one-shot build/repair,
//! the cached single-entry query, and stale-entry repair on read.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::cursor::Cursor;
use crate::host::{Storage, Trigger};
use crate::index::descriptor::IndexDescriptor;
use crate::index::entry::IndexEntryOps;
use crate::record::{PrimaryKey, Record, Value};
use crate::sortbuf::{Codec, MergeSortBuffer, SortBufferConfig};
use crate::{err_at, Error, Result};

/// The synthetic record stored for one index entry: its primary key *is*
/// the projected index key (indexed properties + master primary key)
/// with no additional payload.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntryRecord(pub PrimaryKey);

impl Record for IndexEntryRecord {
    fn primary_key(&self) -> PrimaryKey {
        self.0.clone()
    }

    fn property(&self, pos: usize) -> Value {
        self.0 .0[pos].clone()
    }

    fn set_property(&mut self, pos: usize, value: Value) {
        self.0 .0[pos] = value;
    }
}

/// Binary `Codec` for [IndexEntryRecord] used by the build pipeline's sort
/// buffer: a tag byte per [Value] variant followed by its payload,
/// length-prefixed for variable-width variants.
#[derive(Clone, Copy, Default)]
pub struct EntryCodec;

impl Codec<PrimaryKey> for EntryCodec {
    fn encode(&self, item: &PrimaryKey) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        encode_values(&item.0, &mut buf);
        Ok(buf)
    }

    fn decode(&self, buf: &[u8]) -> Result<PrimaryKey> {
        let mut pos = 0usize;
        let values = decode_values(buf, &mut pos)?;
        Ok(PrimaryKey(values))
    }
}

fn encode_values(values: &[Value], buf: &mut Vec<u8>) {
    buf.extend_from_slice(&(values.len() as u32).to_le_bytes());
    for v in values {
        encode_value(v, buf);
    }
}

fn encode_value(v: &Value, buf: &mut Vec<u8>) {
    match v {
        Value::Null => buf.push(0),
        Value::Bool(b) => {
            buf.push(1);
            buf.push(*b as u8);
        }
        Value::I64(n) => {
            buf.push(2);
            buf.extend_from_slice(&n.to_le_bytes());
        }
        Value::F64(f) => {
            buf.push(3);
            buf.extend_from_slice(&f.to_bits().to_le_bytes());
        }
        Value::Text(s) => {
            buf.push(4);
            buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
            buf.extend_from_slice(s.as_bytes());
        }
        Value::Bytes(b) => {
            buf.push(5);
            buf.extend_from_slice(&(b.len() as u32).to_le_bytes());
            buf.extend_from_slice(b);
        }
        Value::List(items) => {
            buf.push(6);
            encode_values(items, buf);
        }
    }
}

fn decode_values(buf: &[u8], pos: &mut usize) -> Result<Vec<Value>> {
    let count = read_u32(buf, pos)? as usize;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(decode_value(buf, pos)?);
    }
    Ok(out)
}

fn decode_value(buf: &[u8], pos: &mut usize) -> Result<Value> {
    let tag = read_u8(buf, pos)?;
    Ok(match tag {
        0 => Value::Null,
        1 => Value::Bool(read_u8(buf, pos)? != 0),
        2 => Value::I64(i64::from_le_bytes(read_n(buf, pos)?)),
        3 => Value::F64(f64::from_bits(u64::from_le_bytes(read_n(buf, pos)?))),
        4 => {
            let len = read_u32(buf, pos)? as usize;
            let bytes = read_bytes(buf, pos, len)?;
            Value::Text(err_at!(DecodeFail, String::from_utf8(bytes.to_vec()))?)
        }
        5 => {
            let len = read_u32(buf, pos)? as usize;
            Value::Bytes(read_bytes(buf, pos, len)?.to_vec())
        }
        6 => Value::List(decode_values(buf, pos)?),
        other => return err_at!(DecodeFail, msg: "unknown value tag {}", other),
    })
}

fn read_u8(buf: &[u8], pos: &mut usize) -> Result<u8> {
    let byte = read_bytes(buf, pos, 1)?[0];
    Ok(byte)
}

fn read_u32(buf: &[u8], pos: &mut usize) -> Result<u32> {
    Ok(u32::from_le_bytes(read_n(buf, pos)?))
}

fn read_n<const N: usize>(buf: &[u8], pos: &mut usize) -> Result<[u8; N]> {
    let slice = read_bytes(buf, pos, N)?;
    let mut arr = [0u8; N];
    arr.copy_from_slice(slice);
    Ok(arr)
}

fn read_bytes<'a>(buf: &'a [u8], pos: &mut usize, len: usize) -> Result<&'a [u8]> {
    if *pos + len > buf.len() {
        return err_at!(DecodeFail, msg: "entry codec truncated at {}", pos);
    }
    let slice = &buf[*pos..*pos + len];
    *pos += len;
    Ok(slice)
}

/// Build-pipeline counters, returned from
/// [ManagedIndex::build_index].
#[derive(Debug, Clone, Default)]
pub struct BuildStats {
    pub scanned: u64,
    pub skipped_corrupt: u64,
    pub inserted: u64,
    pub deleted: u64,
    pub elapsed: Duration,
}

/// Per-index runtime, owning the index-entry storage and driving mutation
/// triggers, build/repair and queries against it.
pub struct ManagedIndex<R, MS, ES>
where
    R: Record,
    MS: Storage<R>,
    ES: Storage<IndexEntryRecord>,
{
    descriptor: IndexDescriptor,
    ops: Rc<IndexEntryOps>,
    entries: ES,
    query_compiled: RefCell<bool>,
    _marker: std::marker::PhantomData<(R, MS)>,
}

impl<R, MS, ES> ManagedIndex<R, MS, ES>
where
    R: Record,
    MS: Storage<R>,
    ES: Storage<IndexEntryRecord>,
{
    pub fn new(descriptor: IndexDescriptor, master_primary_key: Vec<usize>, entries: ES) -> Self {
        let ops = Rc::new(IndexEntryOps::new(descriptor.clone(), master_primary_key));
        ManagedIndex {
            descriptor,
            ops,
            entries,
            query_compiled: RefCell::new(false),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn descriptor(&self) -> &IndexDescriptor {
        &self.descriptor
    }

    pub fn entries(&self) -> &ES {
        &self.entries
    }

    fn identity_len(&self) -> usize {
        self.descriptor.properties.len()
    }

    /// Finds the full entry key whose identity prefix matches
    /// `identity_values`, scanning entries in ascending order and stopping
    /// as soon as the prefix sorts past the target.
    fn find_by_identity(&self, identity_values: &[Value]) -> Result<Option<PrimaryKey>> {
        let mut iter = self.entries.fetch_after(None)?;
        for item in iter.by_ref() {
            let entry = item?;
            let key = entry.primary_key();
            let mut relation = Ordering::Equal;
            for (v, target) in key.0.iter().zip(identity_values.iter()) {
                relation = v.cmp_total(target);
                if relation != Ordering::Equal {
                    break;
                }
            }
            match relation {
                Ordering::Less => continue,
                Ordering::Equal => return Ok(Some(key)),
                Ordering::Greater => return Ok(None),
            }
        }
        Ok(None)
    }

    /// Inserts the index entry projected from `m`, enforcing uniqueness
    /// first when the index is declared unique.
    pub fn insert_index_entry(&self, m: &R) -> Result<()> {
        let entry_key = self.ops.copy_from_master(m);
        if self.descriptor.unique {
            let identity_len = self.identity_len();
            if let Some(existing_key) = self.find_by_identity(&entry_key.0[..identity_len])? {
                if existing_key.cmp_total(&entry_key) != Ordering::Equal {
                    return err_at!(
                        PersistUniqueConstraint,
                        msg: "duplicate key for unique index {}",
                        self.descriptor.to_name_descriptor()
                    );
                }
                return Ok(());
            }
        }
        let rec = IndexEntryRecord(entry_key.clone());
        if self.entries.try_insert(&rec)? {
            return Ok(());
        }
        match self.entries.try_load(&entry_key)? {
            Some(existing) if existing.primary_key().cmp_total(&entry_key) == Ordering::Equal => Ok(()),
            _ => {
                self.entries.try_delete(&entry_key)?;
                self.entries.try_insert(&rec)?;
                Ok(())
            }
        }
    }

    /// Moves the index entry from `old`'s projection to `new`'s, a no-op
    /// when the projection didn't change.
    pub fn update_index_entry(&self, new: &R, old: &R) -> Result<()> {
        let old_key = self.ops.copy_from_master(old);
        let new_key = self.ops.copy_from_master(new);
        if old_key.cmp_total(&new_key) == Ordering::Equal {
            return Ok(());
        }
        self.entries.try_delete(&old_key)?;
        self.insert_index_entry(new)
    }

    /// Deletes the index entry projected from `m`.
    pub fn delete_index_entry(&self, m: &R) -> Result<()> {
        let entry_key = self.ops.copy_from_master(m);
        self.entries.try_delete(&entry_key)?;
        Ok(())
    }

    /// One-shot build/repair pipeline. `desired_speed`, when set, is
    /// a per-item throttle pace applied after every processed entry.
    pub fn build_index(
        &self,
        master: &MS,
        tmp_dir: impl Into<PathBuf>,
        desired_speed: Option<Duration>,
    ) -> Result<BuildStats> {
        let mut stats = BuildStats::default();
        let start = Instant::now();

        let mut probe = master.fetch_after(None)?;
        if probe.next().is_none() {
            return Ok(stats);
        }
        drop(probe);

        let config = SortBufferConfig::new(tmp_dir.into());
        let ops = self.ops.clone();
        let mut buffer = MergeSortBuffer::new(
            config,
            move |a: &PrimaryKey, b: &PrimaryKey| ops.compare(a, b),
            EntryCodec,
        );

        let mut last_good: Option<PrimaryKey> = None;
        let mut skip_count = 0usize;
        'scan: loop {
            let iter = master.fetch_after(last_good.as_ref())?;
            let mut iter = iter.skip(skip_count);
            for item in iter.by_ref() {
                match item {
                    Ok(record) => {
                        stats.scanned += 1;
                        last_good = Some(record.primary_key());
                        buffer.add(self.ops.copy_from_master(&record))?;
                    }
                    Err(Error::FetchCorruptEncoding(msg)) => {
                        log::warn!(
                            "build {}: corrupt record after {:?}: {}",
                            self.descriptor.to_name_descriptor(),
                            last_good,
                            msg
                        );
                        stats.skipped_corrupt += 1;
                        skip_count += 1;
                        continue 'scan;
                    }
                    Err(e) => return Err(e),
                }
            }
            break;
        }

        let identity_len = self.identity_len();

        // Uniqueness is verified over the whole sorted run before any entry
        // is written, so a constraint violation leaves `self.entries`
        // untouched rather than partially built.
        let mut new_cursor = buffer.iter()?;
        let mut sorted_keys: Vec<PrimaryKey> = Vec::new();
        let mut prev_new: Option<PrimaryKey> = None;
        while new_cursor.has_next()? {
            let new_key = new_cursor.next()?;
            if self.descriptor.unique {
                if let Some(prev) = &prev_new {
                    if prev.0[..identity_len] == new_key.0[..identity_len] {
                        new_cursor.close()?;
                        return err_at!(
                            PersistUniqueConstraint,
                            msg: "duplicate key during build of {}",
                            self.descriptor.to_name_descriptor()
                        );
                    }
                }
            }
            prev_new = Some(new_key.clone());
            sorted_keys.push(new_key);
        }
        new_cursor.close()?;

        let mut existing_iter = self.entries.fetch_after(None)?;
        let mut existing_head = existing_iter.next().transpose()?;
        let mut processed = 0u64;

        for new_key in sorted_keys {
            while let Some(cur) = &existing_head {
                let existing_key = cur.primary_key();
                if existing_key.cmp_total(&new_key) == Ordering::Less {
                    self.entries.try_delete(&existing_key)?;
                    stats.deleted += 1;
                    existing_head = existing_iter.next().transpose()?;
                } else {
                    break;
                }
            }

            let matched = matches!(&existing_head, Some(cur) if cur.primary_key().cmp_total(&new_key) == Ordering::Equal);
            if matched {
                existing_head = existing_iter.next().transpose()?;
            } else {
                self.entries.try_insert(&IndexEntryRecord(new_key))?;
                stats.inserted += 1;
            }

            processed += 1;
            if processed % 128 == 0 {
                log::debug!(
                    "build {}: {} entries processed",
                    self.descriptor.to_name_descriptor(),
                    processed
                );
            }
            if let Some(pace) = desired_speed {
                std::thread::sleep(pace);
            }
        }

        while let Some(cur) = existing_head.take() {
            self.entries.try_delete(&cur.primary_key())?;
            stats.deleted += 1;
            existing_head = existing_iter.next().transpose()?;
        }

        buffer.close()?;
        stats.elapsed = start.elapsed();
        log::info!(
            "build {}: scanned={} inserted={} deleted={} skipped_corrupt={} in {:?}",
            self.descriptor.to_name_descriptor(),
            stats.scanned,
            stats.inserted,
            stats.deleted,
            stats.skipped_corrupt,
            stats.elapsed
        );
        Ok(stats)
    }

    /// Returns a cursor over masters matching `identity_values` on the
    /// index's declared properties. Compiled exactly once per
    /// `ManagedIndex`, mirroring a `OnceCell`.
    pub fn fetch_one<'a>(&'a self, master: &'a MS, identity_values: Vec<Value>) -> Result<IndexedCursor<'a, R, MS, ES>> {
        *self.query_compiled.borrow_mut() = true;
        let entries_iter = self.entries.fetch_after(None)?;
        Ok(IndexedCursor {
            ops: self.ops.clone(),
            master,
            entries: &self.entries,
            entries_iter,
            identity: identity_values,
            exhausted: false,
            closed: false,
            pending: None,
            pending_repairs: Vec::new(),
        })
    }

    /// Applies one repair scheduled by an [IndexedCursor]: delete the
    /// stale entry (if still present) and insert the fresh projection.
    pub fn apply_repair(&self, stale: PrimaryKey, fresh: PrimaryKey) -> Result<()> {
        self.entries.try_delete(&stale)?;
        self.entries.try_insert(&IndexEntryRecord(fresh))?;
        Ok(())
    }
}

impl<R, MS, ES> Trigger<R> for ManagedIndex<R, MS, ES>
where
    R: Record,
    MS: Storage<R>,
    ES: Storage<IndexEntryRecord>,
{
    type State = Option<PrimaryKey>;

    fn before_insert(&self, _r: &R) -> Result<Self::State> {
        Ok(None)
    }

    fn after_insert(&self, r: &R, _state: Self::State) -> Result<()> {
        self.insert_index_entry(r)
    }

    fn before_update(&self, old: &R, _new: &R) -> Result<Self::State> {
        Ok(Some(self.ops.copy_from_master(old)))
    }

    fn after_update(&self, old: &R, new: &R, state: Self::State) -> Result<()> {
        let old_key = state.unwrap_or_else(|| self.ops.copy_from_master(old));
        let new_key = self.ops.copy_from_master(new);
        if old_key.cmp_total(&new_key) == Ordering::Equal {
            return Ok(());
        }
        self.entries.try_delete(&old_key)?;
        self.insert_index_entry(new)
    }

    fn before_delete(&self, r: &R) -> Result<Self::State> {
        Ok(Some(self.ops.copy_from_master(r)))
    }

    fn after_delete(&self, r: &R, state: Self::State) -> Result<()> {
        let key = state.unwrap_or_else(|| self.ops.copy_from_master(r));
        self.entries.try_delete(&key)?;
        Ok(())
    }
}

/// Stale-entry-repairing cursor over masters matching a compiled identity
/// prefix. Collects repairs for the caller to apply
/// outside the read transaction via [ManagedIndex::apply_repair].
pub struct IndexedCursor<'a, R: Record, MS: Storage<R>, ES: Storage<IndexEntryRecord>> {
    ops: Rc<IndexEntryOps>,
    master: &'a MS,
    entries: &'a ES,
    entries_iter: Box<dyn Iterator<Item = Result<IndexEntryRecord>>>,
    identity: Vec<Value>,
    exhausted: bool,
    closed: bool,
    pending: Option<R>,
    pending_repairs: Vec<(PrimaryKey, PrimaryKey)>,
}

impl<'a, R: Record, MS: Storage<R>, ES: Storage<IndexEntryRecord>> IndexedCursor<'a, R, MS, ES> {
    /// Drains the repairs accumulated so far, for the caller to apply
    /// transactionally outside this read.
    pub fn take_pending_repairs(&mut self) -> Vec<(PrimaryKey, PrimaryKey)> {
        std::mem::take(&mut self.pending_repairs)
    }

    fn advance_to_match(&mut self) -> Result<Option<IndexEntryRecord>> {
        loop {
            let entry = match self.entries_iter.next() {
                Some(Ok(e)) => e,
                Some(Err(e)) => {
                    self.exhausted = true;
                    return Err(e);
                }
                None => {
                    self.exhausted = true;
                    return Ok(None);
                }
            };
            let key = entry.primary_key();
            let mut relation = Ordering::Equal;
            for (v, target) in key.0.iter().zip(self.identity.iter()) {
                relation = v.cmp_total(target);
                if relation != Ordering::Equal {
                    break;
                }
            }
            match relation {
                Ordering::Less => continue,
                Ordering::Equal => return Ok(Some(entry)),
                Ordering::Greater => {
                    self.exhausted = true;
                    return Ok(None);
                }
            }
        }
    }
}

impl<'a, R: Record, MS: Storage<R>, ES: Storage<IndexEntryRecord>> Cursor<R> for IndexedCursor<'a, R, MS, ES> {
    fn has_next(&mut self) -> Result<bool> {
        if self.closed || self.exhausted {
            return Ok(false);
        }
        if self.pending.is_some() {
            return Ok(true);
        }
        loop {
            let entry = match self.advance_to_match()? {
                Some(e) => e,
                None => return Ok(false),
            };
            let master_pk = self.ops.copy_to_master_primary_key(&entry.primary_key());
            match self.master.try_load(&master_pk)? {
                None => {
                    log::warn!(
                        "index {}: entry with no matching master, dropping",
                        self.ops.reference_class()
                    );
                    continue;
                }
                Some(m) => {
                    if self.ops.is_consistent(&entry.primary_key(), &m) {
                        self.pending = Some(m);
                        return Ok(true);
                    }
                    let expected = self.ops.copy_from_master(&m);
                    match self.entries.try_load(&expected)? {
                        Some(_) => continue,
                        None => {
                            self.pending_repairs.push((entry.primary_key(), expected));
                            self.pending = Some(m);
                            return Ok(true);
                        }
                    }
                }
            }
        }
    }

    fn next(&mut self) -> Result<R> {
        match self.pending.take() {
            Some(m) => Ok(m),
            None => match self.has_next()? {
                true => self.next(),
                false => err_at!(FetchGeneric, msg: "next() called on exhausted cursor"),
            },
        }
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
#[path = "managed_test.rs"]
mod managed_test;
