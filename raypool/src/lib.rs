//! # raypool
//!
//! **raypool** is the concurrency core of an offline renderer: a cooperative
//! thread pool through which every stage (tile rendering, light
//! preprocessing, BVH construction, asynchronous scene loading) dispatches
//! its work.
//!
//! It provides:
//!
//! - A **thread pool** whose dispatching threads help execute work instead
//!   of blocking, which keeps nested and recursive dispatch deadlock-free
//! - **Parallel loops** over 1-D index ranges and 2-D pixel rectangles
//! - **Async jobs**: closures run in the background whose result can be
//!   awaited from any thread
//! - **Per-thread storage** for scratch buffers and per-thread results
//! - **Atomic floats** for lock-free accumulation
//!
//! ## Quick Start
//!
//! ```rust
//! use raypool::{AtomicFloat, Bounds2i, Point2i, ThreadPool};
//!
//! let pool = ThreadPool::new(4).unwrap();
//!
//! // Render a 64x64 image in tiles.
//! let image = Bounds2i::new(Point2i::new(0, 0), Point2i::new(64, 64));
//! let energy = AtomicFloat::new(0.0);
//! pool.parallel_for_2d(image, |tile| {
//!     energy.add(tile.area() as f32);
//! });
//! assert_eq!(energy.get(), 4096.0);
//!
//! // Load something in the background.
//! let scene = pool.run_async(|| String::from("cornell-box"));
//! assert_eq!(scene.get_result(), "cornell-box");
//! ```
//!
//! ## Modules
//!
//! - [`atomic`]: Lock-free `f32` / `f64` accumulators
//! - [`bounds`]: Integer points and rectangles for 2-D dispatch
//! - [`thread_local`]: Per-thread storage
//!
//! The pool itself is configured through [`PoolBuilder`] and driven through
//! [`PoolHandle`], which [`ThreadPool`] dereferences to.

mod error;
mod job;
mod pool;
mod utils;

pub mod atomic;
pub mod bounds;
pub mod thread_local;

pub use atomic::{AtomicDouble, AtomicFloat};
pub use bounds::{Bounds2i, Point2i};
pub use error::{PoolError, Result};
pub use job::AsyncJob;
pub use pool::builder::THREADS_ENV;
pub use pool::{PoolBuilder, PoolHandle, ThreadPool};
pub use thread_local::ThreadLocal;

use std::thread;

/// Number of hardware threads available to the process, at least `1`.
pub fn available_cores() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
