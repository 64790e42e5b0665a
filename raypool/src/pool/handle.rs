use super::Shared;
use crate::bounds::{Bounds2i, Point2i};
use crate::job::{AsyncJob, AsyncTask, ForLoop1D, ForLoop2D, PanicSlot, ParallelJob};
use crate::thread_local::ThreadLocal;

use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Barrier};

/// Number of chunks handed out per participating thread.
///
/// Splitting a loop into more pieces than threads evens out chunks of
/// uneven duration, while keeping per-chunk synchronization cheap.
const OVERSUBSCRIPTION: i64 = 8;

/// Upper bound on the side of a 2-D tile.
const MAX_TILE_SIZE: i64 = 32;

/// A cloneable handle for dispatching work to a [`ThreadPool`].
///
/// Every dispatch entry point lives here. Handles are cheap to clone and
/// can be moved into `'static` closures, e.g. to dispatch nested work from
/// inside a [`run_async`](Self::run_async) body.
///
/// A handle stays usable after its [`ThreadPool`] has been dropped: with no
/// workers left, the dispatching thread simply does all the work itself.
///
/// [`ThreadPool`]: super::ThreadPool
#[derive(Clone)]
pub struct PoolHandle {
    shared: Arc<Shared>,
}

impl PoolHandle {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.shared
    }

    /// Number of pool-owned worker threads.
    pub fn size(&self) -> usize {
        self.shared.workers()
    }

    /// Number of threads taking part in parallel work.
    ///
    /// This is the worker count plus one for the dispatching thread, which
    /// always participates.
    pub fn running_threads(&self) -> usize {
        self.size() + 1
    }

    /// Calls `func` on chunks covering `[start, end)`.
    ///
    /// The range is split into chunks of
    /// `max(1, (end - start) / (8 * running_threads))` indices; `func`
    /// receives each chunk as a half-open `(chunk_start, chunk_end)` pair.
    /// Every index is covered by exactly one call. Chunks run concurrently
    /// on the pool's workers and on the calling thread, which helps until
    /// the whole range is done.
    ///
    /// Does nothing for an empty range.
    ///
    /// # Panics
    ///
    /// If `func` panics, the rest of that chunk is skipped, while every
    /// other chunk still runs. The first panic is re-raised here once the
    /// loop has finished.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use raypool::{AtomicDouble, ThreadPool};
    ///
    /// let pool = ThreadPool::new(4).unwrap();
    /// let sum = AtomicDouble::new(0.0);
    ///
    /// pool.parallel_for(0, 100, |start, end| {
    ///     sum.add((start..end).map(|i| i as f64).sum());
    /// });
    ///
    /// assert_eq!(sum.get(), 4950.0);
    /// ```
    pub fn parallel_for<F>(&self, start: i64, end: i64, func: F)
    where
        F: Fn(i64, i64) + Sync,
    {
        if start >= end {
            return;
        }

        let threads = self.running_threads() as i64;
        let chunk_size = (end.saturating_sub(start) / (OVERSUBSCRIPTION * threads)).max(1);

        let job = Arc::new(ForLoop1D::new(start, end, chunk_size, &func));
        self.run_to_completion(&job);
        job.panics.resume();
    }

    /// Calls `func` once for every index in `[start, end)`.
    ///
    /// Scheduling is the same as [`parallel_for`](Self::parallel_for).
    ///
    /// # Panics
    ///
    /// A panic only skips the index that raised it; every other index is
    /// still visited. The first panic is re-raised here afterwards.
    pub fn parallel_for_each<F>(&self, start: i64, end: i64, func: F)
    where
        F: Fn(i64) + Sync,
    {
        let panics = PanicSlot::default();

        self.parallel_for(start, end, |chunk_start, chunk_end| {
            for index in chunk_start..chunk_end {
                panics.catch(|| func(index));
            }
        });
        panics.resume();
    }

    /// Calls `func` on square tiles covering `extent`.
    ///
    /// Tiles have a side of `sqrt(area / (8 * running_threads))`, clamped
    /// to `[1, 32]`, and are clipped at the extent's edges. Every point of
    /// `extent` belongs to exactly one tile.
    ///
    /// An empty extent is a no-op; a single-point extent is processed
    /// inline.
    ///
    /// # Panics
    ///
    /// Re-raises the first panic of `func` once all tiles have run.
    pub fn parallel_for_2d<F>(&self, extent: Bounds2i, func: F)
    where
        F: Fn(Bounds2i) + Sync,
    {
        if extent.is_empty() {
            return;
        }
        if extent.area() == 1 {
            func(extent);
            return;
        }

        let threads = self.running_threads() as i64;
        let tile_area = extent.area() / (OVERSUBSCRIPTION * threads);
        let tile_size = ((tile_area as f64).sqrt() as i64).clamp(1, MAX_TILE_SIZE) as i32;

        let job = Arc::new(ForLoop2D::new(extent, tile_size, &func));
        self.run_to_completion(&job);
        job.panics.resume();
    }

    /// Calls `func` once for every point of `extent`.
    ///
    /// Scheduling is the same as [`parallel_for_2d`](Self::parallel_for_2d).
    ///
    /// # Panics
    ///
    /// A panic only skips the point that raised it. The first panic is
    /// re-raised here once every other point has been visited.
    pub fn parallel_for_2d_points<F>(&self, extent: Bounds2i, func: F)
    where
        F: Fn(Point2i) + Sync,
    {
        let panics = PanicSlot::default();

        self.parallel_for_2d(extent, |tile| {
            for point in tile {
                panics.catch(|| func(point));
            }
        });
        panics.resume();
    }

    /// Runs `func` in the background and returns a handle to its result.
    ///
    /// On a pool without workers the closure runs to completion before
    /// this returns, since no other thread would ever pick it up.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use raypool::ThreadPool;
    ///
    /// let pool = ThreadPool::new(2).unwrap();
    /// let job = pool.run_async(|| 6 * 7);
    ///
    /// assert_eq!(job.get_result(), 42);
    /// ```
    pub fn run_async<F, T>(&self, func: F) -> AsyncJob<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let task = Arc::new(AsyncTask::new(Box::new(func)));

        if self.running_threads() == 1 {
            task.run_inline();
        } else {
            drop(self.shared.add_to_job_list(task.clone()));
        }

        AsyncJob::new(task, self.clone())
    }

    /// Runs `func` exactly once on every worker thread and on the caller.
    ///
    /// Intended for per-thread initialization. Each participant blocks on
    /// a barrier sized `size() + 1` after calling `func`, which forces
    /// every invocation onto a distinct thread.
    ///
    /// # Panics
    ///
    /// Panics if the pool is disabled: gated workers would never reach the
    /// barrier. A panic in `func` is re-raised here after all participants
    /// have passed the barrier.
    pub fn for_each_thread<F>(&self, func: F)
    where
        F: Fn() + Sync,
    {
        assert!(
            !self.is_disabled(),
            "for_each_thread called while the pool is disabled"
        );

        let participants = self.running_threads();
        let barrier = Barrier::new(participants);

        self.parallel_for_each(0, participants as i64, |_| {
            let outcome = panic::catch_unwind(AssertUnwindSafe(&func));
            barrier.wait();

            if let Err(payload) = outcome {
                panic::resume_unwind(payload);
            }
        });
    }

    /// Runs one step of any published job, without blocking.
    ///
    /// Returns `false` if no job currently has work. The step may belong to
    /// a job unrelated to the caller; threads that must wait for something
    /// call this to make progress instead of idling.
    pub fn try_make_progress(&self) -> bool {
        self.shared.work_or_return()
    }

    /// Stops pool workers from picking up work.
    ///
    /// Threads dispatching work keep executing it, so dispatch calls still
    /// complete, on the calling thread alone. Used to hand the hardware
    /// threads to another execution context for a while.
    pub fn disable(&self) {
        self.shared.set_disabled(true);
    }

    /// Lets pool workers pick up work again.
    pub fn reenable(&self) {
        self.shared.set_disabled(false);
    }

    /// Returns `true` while the pool is disabled.
    pub fn is_disabled(&self) -> bool {
        self.shared.is_disabled()
    }

    /// Creates per-thread storage sized for this pool.
    pub fn thread_local<T, F>(&self, create: F) -> ThreadLocal<T>
    where
        T: Send,
        F: Fn() -> T + Send + Sync + 'static,
    {
        ThreadLocal::with_threads(self.running_threads(), create)
    }

    /// Publishes a borrowed job and helps until it has finished.
    fn run_to_completion<'a, J>(&self, job: &Arc<J>)
    where
        J: ParallelJob + 'a,
    {
        let scoped: Arc<dyn ParallelJob + 'a> = job.clone();

        // Safety: the job may borrow data living for `'a`, but no reference
        // to it survives this call. The list drops its reference when the
        // job runs out of work, and every thread executing a step drops its
        // reference before releasing the pool mutex (see
        // `Shared::execute`). This loop only exits after observing, under
        // that mutex, that no work is left and no step is in flight.
        let erased = unsafe {
            mem::transmute::<Arc<dyn ParallelJob + 'a>, Arc<dyn ParallelJob + 'static>>(scoped)
        };

        let mut guard = self.shared.add_to_job_list(erased);
        while !job.finished() {
            guard = self.shared.work_or_wait(guard, true);
        }
    }
}

impl fmt::Debug for PoolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolHandle")
            .field("running_threads", &self.running_threads())
            .field("disabled", &self.is_disabled())
            .finish()
    }
}
