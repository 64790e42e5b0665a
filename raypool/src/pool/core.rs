use super::worker::Worker;
use super::{PoolBuilder, PoolHandle, Shared};
use crate::error::Result;

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use tracing::debug;

/// A fixed-size pool of worker threads.
///
/// A pool sized `n` owns `n - 1` worker threads: the thread dispatching
/// work always participates as the `n`th. All dispatch operations are
/// provided by [`PoolHandle`], which `ThreadPool` dereferences to.
///
/// Dropping the pool shuts it down in an orderly fashion:
/// 1. Sets the shutdown flag and wakes every worker
/// 2. Joins all worker threads
/// 3. Runs any async jobs that were published but never picked up
///
/// # Examples
///
/// ```rust
/// use raypool::ThreadPool;
///
/// let pool = ThreadPool::new(4).unwrap();
/// assert_eq!(pool.running_threads(), 4);
/// ```
pub struct ThreadPool {
    /// Dispatch handle sharing the scheduler state with the workers.
    handle: PoolHandle,

    /// Pool-owned worker threads.
    workers: Vec<Worker>,
}

impl ThreadPool {
    /// Creates a pool in which `threads` threads participate.
    ///
    /// Equivalent to `PoolBuilder::new().threads(threads).build()`.
    pub fn new(threads: usize) -> Result<Self> {
        PoolBuilder::new().threads(threads).build()
    }

    /// Returns a builder for configuring a pool.
    pub fn builder() -> PoolBuilder {
        PoolBuilder::new()
    }

    /// Spawns `threads - 1` workers named after `thread_name`.
    ///
    /// If a worker fails to spawn, the ones already running are shut down
    /// and joined before the error is returned.
    pub(crate) fn start(threads: usize, thread_name: &str) -> Result<Self> {
        let shared = Arc::new(Shared::new());
        let mut pool = Self {
            handle: PoolHandle::new(shared.clone()),
            workers: Vec::with_capacity(threads - 1),
        };

        for id in 0..threads - 1 {
            let worker = Worker::spawn(id, format!("{thread_name}-{id}"), shared.clone())?;
            pool.workers.push(worker);
        }
        shared.set_workers(pool.workers.len());

        debug!(threads, "thread pool started");
        Ok(pool)
    }

    /// Returns the pool's dispatch handle.
    pub fn handle(&self) -> &PoolHandle {
        &self.handle
    }
}

impl Deref for ThreadPool {
    type Target = PoolHandle;

    fn deref(&self) -> &PoolHandle {
        &self.handle
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        let shared = self.handle.shared();

        shared.shutdown();
        let panicked = self
            .workers
            .iter_mut()
            .map(Worker::join)
            .filter(|clean| !clean)
            .count();
        shared.set_workers(0);

        // Async jobs nobody picked up still owe their waiters a result.
        let mut drained = 0usize;
        while shared.work_or_return() {
            drained += 1;
        }

        debug!(
            workers = self.workers.len(),
            panicked,
            drained,
            "thread pool shut down"
        );
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<_> = self.workers.iter().map(Worker::id).collect();

        f.debug_struct("ThreadPool")
            .field("workers", &ids)
            .field("disabled", &self.handle.is_disabled())
            .finish()
    }
}
