use super::{JobHeader, ParallelJob};
use crate::bounds::{Bounds2i, Point2i};
use crate::pool::State;
use crate::utils::{lock, panic_message};

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard};

use tracing::warn;

/// First panic raised by any chunk of a loop.
///
/// Chunks run on arbitrary threads; a panic is caught where it happens and
/// re-raised on the dispatching thread once the loop has finished.
#[derive(Default)]
pub(crate) struct PanicSlot {
    payload: Mutex<Option<Box<dyn Any + Send>>>,
}

impl PanicSlot {
    /// Runs `f`, capturing a panic instead of unwinding.
    pub(crate) fn catch(&self, f: impl FnOnce()) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
            warn!(panic = panic_message(&*payload), "parallel loop body panicked");

            let mut slot = lock(&self.payload);
            if slot.is_none() {
                *slot = Some(payload);
            }
        }
    }

    /// Re-raises the captured panic, if any.
    pub(crate) fn resume(&self) {
        let payload = lock(&self.payload).take();
        if let Some(payload) = payload {
            panic::resume_unwind(payload);
        }
    }
}

/// A chunked loop over the half-open index range `[next_index, end_index)`.
///
/// Each step hands out up to `chunk_size` consecutive indices. The job
/// removes itself from the job list as soon as the last chunk has been
/// claimed, even though that chunk may still be running.
pub(crate) struct ForLoop1D<'a> {
    header: JobHeader,
    func: &'a (dyn Fn(i64, i64) + Sync),
    /// Start of the next chunk; only touched under the pool mutex.
    next_index: AtomicI64,
    end_index: i64,
    chunk_size: i64,
    pub(crate) panics: PanicSlot,
}

impl<'a> ForLoop1D<'a> {
    pub(crate) fn new(
        start: i64,
        end: i64,
        chunk_size: i64,
        func: &'a (dyn Fn(i64, i64) + Sync),
    ) -> Self {
        debug_assert!(chunk_size > 0);

        Self {
            header: JobHeader::new(),
            func,
            next_index: AtomicI64::new(start),
            end_index: end,
            chunk_size,
            panics: PanicSlot::default(),
        }
    }
}

impl ParallelJob for ForLoop1D<'_> {
    fn header(&self) -> &JobHeader {
        &self.header
    }

    fn have_work(&self) -> bool {
        self.next_index.load(Ordering::Relaxed) < self.end_index
    }

    fn run_step(&self, mut guard: MutexGuard<'_, State>) {
        let index_start = self.next_index.load(Ordering::Relaxed);
        let index_end = index_start
            .saturating_add(self.chunk_size)
            .min(self.end_index);
        self.next_index.store(index_end, Ordering::Relaxed);

        if !self.have_work() {
            guard.jobs.remove(self);
        }

        drop(guard);
        self.panics.catch(|| (self.func)(index_start, index_end));
    }
}

/// A loop over square tiles of an integer rectangle.
///
/// Tiles are handed out row by row: the cursor advances along x and wraps
/// to the start of the next tile row. Tiles on the right and bottom edges
/// are clipped to the extent.
pub(crate) struct ForLoop2D<'a> {
    header: JobHeader,
    func: &'a (dyn Fn(Bounds2i) + Sync),
    extent: Bounds2i,
    tile_size: i32,
    /// Corner of the next tile; only touched under the pool mutex.
    next_x: AtomicI32,
    next_y: AtomicI32,
    pub(crate) panics: PanicSlot,
}

impl<'a> ForLoop2D<'a> {
    pub(crate) fn new(extent: Bounds2i, tile_size: i32, func: &'a (dyn Fn(Bounds2i) + Sync)) -> Self {
        debug_assert!(tile_size > 0);

        Self {
            header: JobHeader::new(),
            func,
            extent,
            tile_size,
            next_x: AtomicI32::new(extent.p_min.x),
            next_y: AtomicI32::new(extent.p_min.y),
            panics: PanicSlot::default(),
        }
    }
}

impl ParallelJob for ForLoop2D<'_> {
    fn header(&self) -> &JobHeader {
        &self.header
    }

    fn have_work(&self) -> bool {
        self.next_y.load(Ordering::Relaxed) < self.extent.p_max.y
    }

    fn run_step(&self, mut guard: MutexGuard<'_, State>) {
        let start = Point2i::new(
            self.next_x.load(Ordering::Relaxed),
            self.next_y.load(Ordering::Relaxed),
        );
        let end = Point2i::new(
            start.x.saturating_add(self.tile_size).min(self.extent.p_max.x),
            start.y.saturating_add(self.tile_size).min(self.extent.p_max.y),
        );
        let tile = Bounds2i {
            p_min: start,
            p_max: end,
        };

        if end.x >= self.extent.p_max.x {
            self.next_x.store(self.extent.p_min.x, Ordering::Relaxed);
            self.next_y.store(end.y, Ordering::Relaxed);
        } else {
            self.next_x.store(end.x, Ordering::Relaxed);
        }

        if !self.have_work() {
            guard.jobs.remove(self);
        }

        drop(guard);
        self.panics.catch(|| (self.func)(tile));
    }
}
