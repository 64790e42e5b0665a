use super::{JobHeader, ParallelJob};
use crate::pool::{PoolHandle, State};
use crate::utils::{lock, panic_message};

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use tracing::warn;

/// Boxed body of an asynchronous job.
type AsyncFn<T> = Box<dyn FnOnce() -> T + Send>;

/// What running an async body produced.
enum Outcome<T> {
    Value(T),
    Panicked(String),
}

/// A one-shot job computing a single value.
///
/// The job offers exactly one step. `started` flips inside
/// [`run_step`](ParallelJob::run_step), under the pool mutex and after the
/// job has been unlinked, so no two threads can ever run the body.
pub(crate) struct AsyncTask<T> {
    header: JobHeader,

    /// Set once the body has been claimed; only touched under the pool mutex.
    started: AtomicBool,

    /// The body, taken by whichever thread runs it.
    func: Mutex<Option<AsyncFn<T>>>,

    /// Result slot, filled once the body returns.
    result: Mutex<Option<Outcome<T>>>,

    /// Signalled when `result` is filled.
    ready: Condvar,
}

impl<T: Send> AsyncTask<T> {
    pub(crate) fn new(func: AsyncFn<T>) -> Self {
        Self {
            header: JobHeader::new(),
            started: AtomicBool::new(false),
            func: Mutex::new(Some(func)),
            result: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    /// Runs the body on the calling thread without publishing the job.
    pub(crate) fn run_inline(&self) {
        self.started.store(true, Ordering::Relaxed);
        self.execute();
    }

    /// Executes the body, stores its outcome and wakes all waiters.
    fn execute(&self) {
        let Some(func) = lock(&self.func).take() else {
            return;
        };

        let outcome = match panic::catch_unwind(AssertUnwindSafe(func)) {
            Ok(value) => Outcome::Value(value),
            Err(payload) => {
                let message = panic_message(&*payload).to_owned();
                warn!(panic = %message, "async job panicked");
                Outcome::Panicked(message)
            }
        };

        let mut result = lock(&self.result);
        *result = Some(outcome);
        self.ready.notify_all();
    }

    fn is_ready(&self) -> bool {
        lock(&self.result).is_some()
    }

    /// Applies `f` to the outcome if the body has completed.
    fn peek<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        lock(&self.result).as_ref().map(|outcome| unwrap_outcome(outcome, f))
    }

    /// Blocks on the completion condition until the outcome is available.
    fn block_until_ready(&self) -> MutexGuard<'_, Option<Outcome<T>>> {
        let mut result = lock(&self.result);
        while result.is_none() {
            result = self
                .ready
                .wait(result)
                .unwrap_or_else(PoisonError::into_inner);
        }
        result
    }
}

impl<T: Send> ParallelJob for AsyncTask<T> {
    fn header(&self) -> &JobHeader {
        &self.header
    }

    fn have_work(&self) -> bool {
        !self.started.load(Ordering::Relaxed)
    }

    fn run_step(&self, mut guard: MutexGuard<'_, State>) {
        guard.jobs.remove(self);
        self.started.store(true, Ordering::Relaxed);

        drop(guard);
        self.execute();
    }
}

fn unwrap_outcome<T, R>(outcome: &Outcome<T>, f: impl FnOnce(&T) -> R) -> R {
    match outcome {
        Outcome::Value(value) => f(value),
        Outcome::Panicked(message) => panic!("async job panicked: {message}"),
    }
}

/// A handle to a value being computed by [`PoolHandle::run_async`].
///
/// `AsyncJob` is a future in the promise sense: the body runs on some pool
/// thread (or inline, on a single-threaded pool) and the handle lets any
/// number of threads wait for and read the result. Handles are cheap to
/// clone and all clones observe the same value.
///
/// Waiting never idles a thread while work is pending: [`wait`](Self::wait)
/// keeps executing published jobs, which may include unrelated ones, until
/// the result is ready or nothing is left to help with. This is what lets
/// a job block on another job even when it is running on the only thread
/// available.
///
/// If the body panics, the panic is captured and every attempt to read the
/// result panics with the same message.
pub struct AsyncJob<T> {
    task: Arc<AsyncTask<T>>,
    pool: PoolHandle,
}

impl<T: Send + 'static> AsyncJob<T> {
    pub(crate) fn new(task: Arc<AsyncTask<T>>, pool: PoolHandle) -> Self {
        Self { task, pool }
    }

    /// Returns `true` if the result is available. Never blocks.
    pub fn is_ready(&self) -> bool {
        self.task.is_ready()
    }

    /// Blocks until the result is available.
    ///
    /// While the result is missing, the calling thread executes pending
    /// pool work. Once no work is left anywhere, it sleeps until the thread
    /// running this job signals completion.
    pub fn wait(&self) {
        while !self.is_ready() && self.pool.try_make_progress() {}

        drop(self.task.block_until_ready());
    }

    /// Waits for the result and returns a copy of it.
    ///
    /// # Panics
    ///
    /// Panics if the job's body panicked.
    pub fn get_result(&self) -> T
    where
        T: Clone,
    {
        self.with_result(T::clone)
    }

    /// Waits for the result and passes a reference to it to `f`.
    ///
    /// Useful for results that are expensive or impossible to clone.
    /// `f` runs while the result slot is locked, so it must not query this
    /// job again.
    ///
    /// # Panics
    ///
    /// Panics if the job's body panicked.
    pub fn with_result<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.wait();

        let result = self.task.block_until_ready();
        match result.as_ref() {
            Some(outcome) => unwrap_outcome(outcome, f),
            None => unreachable!("result is present once ready"),
        }
    }

    /// Polls for the result while the caller holds an unrelated lock.
    ///
    /// If the result is ready it is returned immediately and `guard` is
    /// handed back untouched. Otherwise `guard` is released, one unit of
    /// pool work is attempted, `mutex` is locked again and the result is
    /// returned if it became ready in the meantime.
    ///
    /// Releasing the caller's lock while helping prevents deadlocks between
    /// the caller's locking domain and the pool's.
    pub fn try_get_result<'a, U>(
        &self,
        mutex: &'a Mutex<U>,
        guard: MutexGuard<'a, U>,
    ) -> (MutexGuard<'a, U>, Option<T>)
    where
        T: Clone,
    {
        if let Some(value) = self.task.peek(T::clone) {
            return (guard, Some(value));
        }

        drop(guard);
        self.pool.try_make_progress();
        let guard = lock(mutex);

        (guard, self.task.peek(T::clone))
    }
}

impl<T> Clone for AsyncJob<T> {
    fn clone(&self) -> Self {
        Self {
            task: self.task.clone(),
            pool: self.pool.clone(),
        }
    }
}

impl<T> fmt::Debug for AsyncJob<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ready = lock(&self.task.result).is_some();
        f.debug_struct("AsyncJob").field("ready", &ready).finish()
    }
}
