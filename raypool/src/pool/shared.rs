use crate::job::{JobList, ParallelJob};
use crate::utils::lock;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use tracing::{info, trace};

/// Scheduler state protected by the pool mutex.
pub(crate) struct State {
    /// Published jobs, most recent first.
    pub(crate) jobs: JobList,

    /// When set, pool workers stop picking up work.
    ///
    /// Enqueuing threads are exempt so that a dispatcher can always
    /// finish its own job.
    disabled: bool,

    /// Set once when the pool is dropped.
    shutdown: bool,
}

impl State {
    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown
    }
}

/// State shared between the pool, its workers and every handle.
///
/// One mutex guards the job list, the flags and the bookkeeping of every
/// job. One condition variable is broadcast whenever new work is
/// published, a job finishes, or the flags change.
pub(crate) struct Shared {
    state: Mutex<State>,

    /// Broadcast on publish, on job completion and on flag changes.
    job_list_condition: Condvar,

    /// Number of pool-owned worker threads currently running.
    workers: AtomicUsize,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(State {
                jobs: JobList::new(),
                disabled: false,
                shutdown: false,
            }),
            job_list_condition: Condvar::new(),
            workers: AtomicUsize::new(0),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }

    pub(crate) fn workers(&self) -> usize {
        self.workers.load(Ordering::Acquire)
    }

    pub(crate) fn set_workers(&self, workers: usize) {
        self.workers.store(workers, Ordering::Release);
    }

    /// Blocks on the job list condition, releasing the mutex meanwhile.
    fn wait<'a>(&'a self, guard: MutexGuard<'a, State>) -> MutexGuard<'a, State> {
        self.job_list_condition
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes `job` at the head of the job list.
    ///
    /// Sleeping threads are woken, and the mutex is returned still held so
    /// the caller can start helping before the workers drain the job.
    pub(crate) fn add_to_job_list(&self, job: Arc<dyn ParallelJob>) -> MutexGuard<'_, State> {
        let mut guard = self.lock();

        guard.jobs.push_front(job);
        trace!(published = guard.jobs.len(), "job published");

        self.job_list_condition.notify_all();
        guard
    }

    /// Performs a single scheduling step.
    ///
    /// Runs one step of the most recently published job that has work, or
    /// sleeps until something changes if there is none. Pool workers
    /// (`is_enqueuing_thread == false`) only sleep while the pool is
    /// disabled.
    pub(crate) fn work_or_wait<'a>(
        &'a self,
        guard: MutexGuard<'a, State>,
        is_enqueuing_thread: bool,
    ) -> MutexGuard<'a, State> {
        if !is_enqueuing_thread && guard.disabled {
            return self.wait(guard);
        }

        match guard.jobs.find_work() {
            Some(job) => self.execute(guard, job),
            None => self.wait(guard),
        }
    }

    /// Runs one step of any job with work, without ever sleeping.
    ///
    /// Returns `false` if no published job had work. The step may belong
    /// to a job unrelated to the caller.
    pub(crate) fn work_or_return(&self) -> bool {
        let guard = self.lock();

        match guard.jobs.find_work() {
            Some(job) => {
                drop(self.execute(guard, job));
                true
            }
            None => false,
        }
    }

    /// Runs one step of `job` and settles its bookkeeping.
    ///
    /// `job` is dropped before the returned guard is released, so once an
    /// owner observes its job finished no other thread holds a reference.
    fn execute<'a>(
        &'a self,
        guard: MutexGuard<'a, State>,
        job: Arc<dyn ParallelJob>,
    ) -> MutexGuard<'a, State> {
        job.header().begin_step();
        job.run_step(guard);

        let guard = self.lock();
        job.header().end_step();
        if job.finished() {
            self.job_list_condition.notify_all();
        }

        guard
    }

    pub(crate) fn set_disabled(&self, disabled: bool) {
        let mut guard = self.lock();
        if guard.disabled == disabled {
            return;
        }

        guard.disabled = disabled;
        info!(disabled, "pool worker participation changed");

        self.job_list_condition.notify_all();
    }

    pub(crate) fn is_disabled(&self) -> bool {
        self.lock().disabled
    }

    /// Asks every worker to exit its loop.
    pub(crate) fn shutdown(&self) {
        self.lock().shutdown = true;
        self.job_list_condition.notify_all();
    }
}
