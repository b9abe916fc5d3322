//! Process-wide work-file pool, keyed by canonical temp-directory
//! path. Buffers acquire a scratch file when they spill, release it
//! (truncated) back to the free list when done, and unregister from the
//! pool's user set so a process-exit shutdown hook knows when it is safe
//! to drop the remaining free files.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use lazy_static::lazy_static;

use crate::{err_at, Error, Result};

lazy_static! {
    static ref POOLS: Mutex<HashMap<PathBuf, std::sync::Arc<PoolInner>>> =
        Mutex::new(HashMap::new());
}

static NEXT_USER_ID: AtomicUsize = AtomicUsize::new(1);

struct PoolInner {
    dir: PathBuf,
    free: Mutex<Vec<PathBuf>>,
    users: Mutex<std::collections::HashSet<usize>>,
    idle: Condvar,
    next_file_id: AtomicUsize,
}

/// Handle to a pooled scratch file, plus the user-id this buffer was
/// registered under so it can `release`/`unregister` later.
pub struct FileHandle {
    pub path: PathBuf,
    pub file: fs::File,
    user_id: usize,
    pool: std::sync::Arc<PoolInner>,
}

/// A process-wide pool of scratch files for one canonical temp directory.
#[derive(Clone)]
pub struct WorkFilePool {
    inner: std::sync::Arc<PoolInner>,
}

impl WorkFilePool {
    /// Looks up (or lazily creates) the pool for `dir`'s canonical path.
    pub fn for_dir<P: AsRef<Path>>(dir: P) -> Result<WorkFilePool> {
        let canon = err_at!(IOError, fs::canonicalize(dir.as_ref()))?;
        let mut pools = POOLS.lock().unwrap();
        let inner = pools
            .entry(canon.clone())
            .or_insert_with(|| {
                std::sync::Arc::new(PoolInner {
                    dir: canon.clone(),
                    free: Mutex::new(Vec::new()),
                    users: Mutex::new(std::collections::HashSet::new()),
                    idle: Condvar::new(),
                    next_file_id: AtomicUsize::new(0),
                })
            })
            .clone();
        Ok(WorkFilePool { inner })
    }

    /// Registers `user_id` as an active user of this pool and returns a
    /// pooled (or newly created) scratch file opened for read-write.
    pub fn acquire(&self, user_id: usize) -> Result<FileHandle> {
        self.inner.users.lock().unwrap().insert(user_id);

        let existing = self.inner.free.lock().unwrap().pop();
        let path = match existing {
            Some(p) => p,
            None => {
                let id = self.inner.next_file_id.fetch_add(1, AtomicOrdering::SeqCst);
                let rnd: u32 = rand::random();
                self.inner.dir.join(format!("mergesort-{}-{:x}", id, rnd))
            }
        };

        let file = err_at!(
            IOError,
            fs::OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(&path)
        )?;

        Ok(FileHandle {
            path,
            file,
            user_id,
            pool: self.inner.clone(),
        })
    }

    /// Removes `user_id` from the active-user set and wakes any shutdown
    /// waiter.
    pub fn unregister(&self, user_id: usize) {
        self.inner.users.lock().unwrap().remove(&user_id);
        self.inner.idle.notify_all();
    }

    /// Signals every registered user to stop, waits up to `timeout` for the
    /// user set to drain, then deletes the remaining free files so the OS
    /// can reclaim them.
    pub fn shutdown(&self, timeout: Duration) {
        let users = self.inner.users.lock().unwrap();
        let (mut guard, _result) = self
            .inner
            .idle
            .wait_timeout_while(users, timeout, |u| !u.is_empty())
            .unwrap();
        guard.clear();
        drop(guard);

        let mut free = self.inner.free.lock().unwrap();
        for path in free.drain(..) {
            fs::remove_file(path).ok();
        }
    }

    pub fn next_user_id() -> usize {
        NEXT_USER_ID.fetch_add(1, AtomicOrdering::SeqCst)
    }
}

impl FileHandle {
    /// Truncates the file to zero length and returns it to the pool's free
    /// list (best-effort: on I/O error the file is simply discarded).
    pub fn release(mut self) {
        use std::io::{Seek, SeekFrom};
        if self.file.set_len(0).is_ok() && self.file.seek(SeekFrom::Start(0)).is_ok() {
            self.pool.free.lock().unwrap().push(self.path.clone());
        } else {
            fs::remove_file(&self.path).ok();
        }
    }
}

#[cfg(test)]
#[path = "workfile_test.rs"]
mod workfile_test;
