//! SortBuffer and external merge-sort: an in-memory array buffer
//! that spills sorted runs to the process-wide [workfile] pool once it
//! outgrows a configurable capacity, and merges runs back in order on
//! `iter()` via a k-way merge.

pub mod workfile;

use std::cmp::Ordering;
use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use crate::cursor::Cursor;
use crate::{err_at, Error, Result};
use workfile::{FileHandle, WorkFilePool};

/// Serializes/deserializes buffer elements to the work-file wire format.
/// Kept separate from `S` itself (mirrors the host's `cbordata`-based
/// `Cbor`/`FromCbor` split) so callers can reuse one codec across many
/// buffer instances.
pub trait Codec<S> {
    fn encode(&self, item: &S) -> Result<Vec<u8>>;
    fn decode(&self, buf: &[u8]) -> Result<S>;
}

/// Tunables for [MergeSortBuffer].
#[derive(Debug, Clone)]
pub struct SortBufferConfig {
    pub dir: PathBuf,
    pub initial_capacity: usize,
    pub max_capacity: usize,
    pub file_cap: usize,
}

impl SortBufferConfig {
    pub const INITIAL_CAPACITY: usize = 64;
    pub const MAX_CAPACITY: usize = 8192;
    pub const FILE_CAP: usize = 100;

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        SortBufferConfig {
            dir: dir.into(),
            initial_capacity: Self::INITIAL_CAPACITY,
            max_capacity: Self::MAX_CAPACITY,
            file_cap: Self::FILE_CAP,
        }
    }

    pub fn set_initial_capacity(&mut self, n: usize) -> &mut Self {
        self.initial_capacity = n;
        self
    }

    pub fn set_max_capacity(&mut self, n: usize) -> &mut Self {
        self.max_capacity = n;
        self
    }

    pub fn set_file_cap(&mut self, n: usize) -> &mut Self {
        self.file_cap = n;
        self
    }
}

struct Run {
    handle: Option<FileHandle>,
    len: usize,
}

/// An in-memory-then-spilling sort buffer.
pub struct MergeSortBuffer<S, F, C>
where
    F: FnMut(&S, &S) -> Ordering,
    C: Codec<S>,
{
    config: SortBufferConfig,
    cmp: F,
    codec: C,
    mem: Vec<S>,
    cap: usize,
    runs: Vec<Run>,
    pool: Option<WorkFilePool>,
    user_id: usize,
    sorted: bool,
}

impl<S, F, C> MergeSortBuffer<S, F, C>
where
    F: FnMut(&S, &S) -> Ordering,
    C: Codec<S>,
{
    pub fn new(config: SortBufferConfig, cmp: F, codec: C) -> Self {
        let cap = config.initial_capacity;
        MergeSortBuffer {
            config,
            cmp,
            codec,
            mem: Vec::with_capacity(cap),
            cap,
            runs: Vec::new(),
            pool: None,
            user_id: WorkFilePool::next_user_id(),
            sorted: false,
        }
    }

    fn pool(&mut self) -> Result<WorkFilePool> {
        if self.pool.is_none() {
            self.pool = Some(WorkFilePool::for_dir(&self.config.dir)?);
        }
        Ok(self.pool.as_ref().unwrap().clone())
    }

    /// Adds a value to the buffer, spilling a sorted run to a work file
    /// once the in-memory array reaches its current capacity.
    pub fn add(&mut self, value: S) -> Result<()> {
        self.sorted = false;
        self.mem.push(value);
        if self.mem.len() >= self.cap {
            if self.cap < self.config.max_capacity {
                self.cap = (self.cap * 2).min(self.config.max_capacity);
            } else {
                self.spill()?;
            }
        }
        Ok(())
    }

    fn spill(&mut self) -> Result<()> {
        if self.mem.is_empty() {
            return Ok(());
        }
        let (mem, cmp) = (&mut self.mem, &mut self.cmp);
        mem.sort_by(|a, b| cmp(a, b));
        let batch: Vec<S> = std::mem::take(&mut self.mem);
        let len = batch.len();

        let pool = self.pool()?;
        let mut handle = pool.acquire(self.user_id)?;
        for item in &batch {
            let bytes = self.codec.encode(item)?;
            write_record(&mut handle.file, &bytes)?;
        }
        err_at!(IOError, handle.file.flush())?;

        self.runs.push(Run {
            handle: Some(handle),
            len,
        });

        if self.runs.len() >= self.config.file_cap {
            self.compact()?;
        }
        Ok(())
    }

    /// Merges every run whose length is at or below the mean run length
    /// into a single new run, keeping the in-use file count bounded.
    fn compact(&mut self) -> Result<()> {
        if self.runs.is_empty() {
            return Ok(());
        }
        let mean = self.runs.iter().map(|r| r.len).sum::<usize>() / self.runs.len();
        let (small, big): (Vec<usize>, Vec<usize>) = (0..self.runs.len())
            .partition(|&i| self.runs[i].len <= mean);
        if small.len() < 2 {
            return Ok(());
        }

        // acquire the pool (needs exclusive &mut self) before taking any
        // field-level borrows of self.runs/self.codec below.
        let pool = self.pool()?;
        let mut out = pool.acquire(self.user_id)?;

        let mut readers: Vec<RunReader<'_, S, C>> = Vec::new();
        for &i in &small {
            let handle = self.runs[i].handle.as_mut().unwrap();
            err_at!(IOError, handle.file.seek(SeekFrom::Start(0)))?;
            readers.push(RunReader::new(&mut handle.file, &self.codec));
        }

        let mut merged_len = 0usize;
        let mut heads: Vec<Option<S>> = Vec::with_capacity(readers.len());
        for r in readers.iter_mut() {
            heads.push(r.next()?);
        }
        loop {
            let mut min_idx: Option<usize> = None;
            for (i, h) in heads.iter().enumerate() {
                if let Some(v) = h {
                    min_idx = match min_idx {
                        None => Some(i),
                        Some(bi) => {
                            let bv = heads[bi].as_ref().unwrap();
                            if (self.cmp)(v, bv) == Ordering::Less {
                                Some(i)
                            } else {
                                Some(bi)
                            }
                        }
                    };
                }
            }
            let idx = match min_idx {
                Some(i) => i,
                None => break,
            };
            let value = heads[idx].take().unwrap();
            let bytes = self.codec.encode(&value)?;
            write_record(&mut out.file, &bytes)?;
            merged_len += 1;
            heads[idx] = readers[idx].next()?;
        }
        err_at!(IOError, out.file.flush())?;
        drop(readers);

        let mut new_runs = Vec::with_capacity(self.runs.len() - small.len() + 1);
        for (i, run) in self.runs.drain(..).enumerate() {
            if small.contains(&i) {
                run.handle.unwrap().release();
            } else {
                new_runs.push(run);
            }
        }
        let _ = big;
        new_runs.push(Run {
            handle: Some(out),
            len: merged_len,
        });
        self.runs = new_runs;
        Ok(())
    }

    /// Sorts the residual in-memory array. The sorted runs already on disk
    /// stay sorted from when they were spilled.
    pub fn sort(&mut self) -> Result<()> {
        let (mem, cmp) = (&mut self.mem, &mut self.cmp);
        mem.sort_by(|a, b| cmp(a, b));
        self.sorted = true;
        Ok(())
    }

    /// Returns a cursor that merges the in-memory array with every spilled
    /// run, in comparator order.
    pub fn iter(&mut self) -> Result<MergeSortCursor<'_, S, F>> {
        if !self.sorted {
            self.sort()?;
        }
        let mut sources: Vec<Source<'_, S>> = Vec::new();
        sources.push(Source::Mem {
            items: self.mem.drain(..).collect::<Vec<_>>().into_iter(),
        });
        for run in self.runs.iter_mut() {
            let handle = run.handle.as_mut().unwrap();
            err_at!(IOError, handle.file.seek(SeekFrom::Start(0)))?;
            sources.push(Source::File(RunReader::new(
                &mut handle.file,
                &self.codec as &dyn Codec<S>,
            )));
        }
        let heads = (0..sources.len()).map(|_| None).collect();
        Ok(MergeSortCursor {
            cmp: &mut self.cmp,
            sources,
            heads,
            started: false,
            closed: false,
        })
    }

    pub fn close(mut self) -> Result<()> {
        for run in self.runs.drain(..) {
            if let Some(h) = run.handle {
                h.release();
            }
        }
        if let Some(pool) = self.pool.take() {
            pool.unregister(self.user_id);
        }
        Ok(())
    }

    pub fn len_hint(&self) -> usize {
        self.mem.len() + self.runs.iter().map(|r| r.len).sum::<usize>()
    }
}

enum Source<'a, S> {
    Mem { items: std::vec::IntoIter<S> },
    File(RunReader<'a, S, dyn Codec<S> + 'a>),
}

// RunReader is generic over a Codec reference; to keep Source's variant
// simple we store a boxed codec-reading closure instead of a trait object
// directly (trait objects over `Codec<S>` work fine since its methods
// don't require Sized).
struct RunReader<'a, S, Cd: Codec<S> + ?Sized> {
    file: &'a mut fs::File,
    codec: &'a Cd,
    _marker: std::marker::PhantomData<S>,
}

impl<'a, S, Cd: Codec<S> + ?Sized> RunReader<'a, S, Cd> {
    fn new(file: &'a mut fs::File, codec: &'a Cd) -> Self {
        RunReader {
            file,
            codec,
            _marker: std::marker::PhantomData,
        }
    }

    fn next(&mut self) -> Result<Option<S>> {
        match read_record(self.file)? {
            Some(bytes) => Ok(Some(self.codec.decode(&bytes)?)),
            None => Ok(None),
        }
    }
}

impl<'a, S> Source<'a, S> {
    fn next(&mut self) -> Result<Option<S>> {
        match self {
            Source::Mem { items } => Ok(items.next()),
            Source::File(r) => r.next(),
        }
    }
}

/// Merges sources in comparator order; ties favor the lowest source index
/// (stable per-run order).
pub struct MergeSortCursor<'a, S, F: FnMut(&S, &S) -> Ordering> {
    cmp: &'a mut F,
    sources: Vec<Source<'a, S>>,
    heads: Vec<Option<S>>,
    started: bool,
    closed: bool,
}

impl<'a, S, F: FnMut(&S, &S) -> Ordering> MergeSortCursor<'a, S, F> {
    fn ensure_started(&mut self) -> Result<()> {
        if !self.started {
            for (i, s) in self.sources.iter_mut().enumerate() {
                self.heads[i] = s.next()?;
            }
            self.started = true;
        }
        Ok(())
    }

    fn min_index(&mut self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, h) in self.heads.iter().enumerate() {
            if let Some(v) = h {
                best = match best {
                    None => Some(i),
                    Some(bi) => {
                        let bv = self.heads[bi].as_ref().unwrap();
                        if (self.cmp)(v, bv) == Ordering::Less {
                            Some(i)
                        } else {
                            Some(bi)
                        }
                    }
                };
            }
        }
        best
    }
}

impl<'a, S, F: FnMut(&S, &S) -> Ordering> Cursor<S> for MergeSortCursor<'a, S, F> {
    fn has_next(&mut self) -> Result<bool> {
        self.ensure_started()?;
        Ok(self.min_index().is_some())
    }

    fn next(&mut self) -> Result<S> {
        self.ensure_started()?;
        let idx = match self.min_index() {
            Some(i) => i,
            None => return err_at!(FetchGeneric, msg: "next() called on exhausted cursor"),
        };
        let value = self.heads[idx].take().unwrap();
        self.heads[idx] = self.sources[idx].next()?;
        Ok(value)
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

fn write_record(file: &mut fs::File, bytes: &[u8]) -> Result<()> {
    let len = bytes.len() as u32;
    err_at!(IOError, file.write_all(&len.to_le_bytes()))?;
    err_at!(IOError, file.write_all(bytes))?;
    Ok(())
}

fn read_record(file: &mut fs::File) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match file.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return err_at!(IOError, Err(e)),
    }
    let len = u32::from_le_bytes(len_buf) as usize;
    let mut buf = vec![0u8; len];
    err_at!(IOError, file.read_exact(&mut buf))?;
    Ok(Some(buf))
}
