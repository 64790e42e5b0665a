use super::Shared;
use crate::error::{PoolError, Result};
use crate::utils::panic_message;

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{trace, warn};

/// A pool-owned worker thread.
///
/// Workers hold the pool mutex whenever they are not executing a job
/// step, and repeatedly perform scheduling steps until shutdown:
/// 1. Run a step of the most recent job with work
/// 2. Otherwise, sleep until work is published or a job finishes
pub(crate) struct Worker {
    /// Index of the worker, used for its thread name.
    id: usize,

    /// Join handle, taken when the worker is joined.
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawns worker `id` as a named OS thread.
    pub(crate) fn spawn(id: usize, name: String, shared: Arc<Shared>) -> Result<Self> {
        let thread = thread::Builder::new()
            .name(name)
            .spawn(move || run(id, &shared))
            .map_err(|source| PoolError::Spawn { index: id, source })?;

        Ok(Self {
            id,
            thread: Some(thread),
        })
    }

    /// Waits for the worker thread to exit.
    ///
    /// This should only be called after shutdown has been requested.
    /// Returns `false` if the thread terminated by panicking.
    pub(crate) fn join(&mut self) -> bool {
        let Some(thread) = self.thread.take() else {
            return true;
        };

        match thread.join() {
            Ok(()) => true,
            Err(payload) => {
                warn!(
                    worker = self.id,
                    panic = panic_message(&*payload),
                    "worker thread panicked"
                );
                false
            }
        }
    }

    pub(crate) fn id(&self) -> usize {
        self.id
    }
}

/// The worker loop: schedule until shutdown.
fn run(id: usize, shared: &Shared) {
    trace!(worker = id, "worker started");

    let mut guard = shared.lock();
    while !guard.is_shutdown() {
        guard = shared.work_or_wait(guard, false);
    }
    drop(guard);

    trace!(worker = id, "worker exiting");
}

#[cfg(test)]
mod tests {
    use super::Worker;

    use std::thread;

    #[test]
    fn join_reports_panicked_worker() {
        let mut worker = Worker {
            id: 3,
            thread: Some(thread::spawn(|| panic!("worker blew up"))),
        };

        assert!(!worker.join());
        // Already joined.
        assert!(worker.join());
    }

    #[test]
    fn join_clean_exit() {
        let mut worker = Worker {
            id: 0,
            thread: Some(thread::spawn(|| {})),
        };

        assert!(worker.join());
    }
}
