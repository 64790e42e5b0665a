//! Schedulable jobs.
//!
//! A job is a unit of resumable, chunkable work published to the pool's
//! job list. The scheduler only knows two things about a job:
//! - whether it still has work to hand out ([`ParallelJob::have_work`]),
//! - how to hand out and execute the next piece ([`ParallelJob::run_step`]).
//!
//! Concrete jobs are:
//! - [`ForLoop1D`]: a chunked index range,
//! - [`ForLoop2D`]: a tiled integer rectangle,
//! - [`AsyncTask`]: a one-shot closure producing a value.

pub(crate) mod async_job;
pub(crate) mod for_loop;
pub(crate) mod list;

pub use async_job::AsyncJob;

pub(crate) use async_job::AsyncTask;
pub(crate) use for_loop::{ForLoop1D, ForLoop2D, PanicSlot};
pub(crate) use list::JobList;

use crate::pool::State;

use std::sync::MutexGuard;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Slot value of a job that is not linked into any list.
const UNLINKED: usize = usize::MAX;

/// Scheduler bookkeeping embedded in every job.
///
/// All fields are only read or written while the pool mutex is held.
/// They are atomics so that jobs can be shared through `Arc`; the mutex
/// provides the ordering, hence `Relaxed` accesses.
pub(crate) struct JobHeader {
    /// Number of threads currently executing a step of this job.
    active_workers: AtomicUsize,

    /// Index of the job's node in the [`JobList`], or [`UNLINKED`].
    slot: AtomicUsize,
}

impl JobHeader {
    pub(crate) fn new() -> Self {
        Self {
            active_workers: AtomicUsize::new(0),
            slot: AtomicUsize::new(UNLINKED),
        }
    }

    pub(crate) fn active_workers(&self) -> usize {
        self.active_workers.load(Ordering::Relaxed)
    }

    pub(crate) fn begin_step(&self) {
        self.active_workers.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn end_step(&self) {
        let previous = self.active_workers.fetch_sub(1, Ordering::Relaxed);
        assert!(previous > 0, "job step finished without having started");
    }

    /// Returns `true` once the job has been taken off the job list.
    pub(crate) fn is_removed(&self) -> bool {
        self.slot().is_none()
    }

    fn slot(&self) -> Option<usize> {
        match self.slot.load(Ordering::Relaxed) {
            UNLINKED => None,
            slot => Some(slot),
        }
    }

    fn set_slot(&self, slot: Option<usize>) {
        self.slot.store(slot.unwrap_or(UNLINKED), Ordering::Relaxed);
    }
}

/// A unit of work the scheduler can dispatch.
///
/// Implementors must uphold the following contract:
/// - `have_work` and `run_step` are only called with the pool mutex held,
/// - `run_step` releases the mutex (by dropping `guard`) before doing any
///   real work, and does not lock it again,
/// - once `have_work` returns `false` the job has been removed from the
///   job list.
pub(crate) trait ParallelJob: Send + Sync {
    /// Scheduler bookkeeping for this job.
    fn header(&self) -> &JobHeader;

    /// Returns `true` if another step can be dispatched.
    fn have_work(&self) -> bool;

    /// Claims the next step, releases the pool mutex and executes it.
    fn run_step(&self, guard: MutexGuard<'_, State>);

    /// Returns `true` when no work remains and no step is in flight.
    ///
    /// Only meaningful while holding the pool mutex.
    fn finished(&self) -> bool {
        !self.have_work() && self.header().active_workers() == 0
    }
}
