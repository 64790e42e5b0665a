//! The thread pool and its scheduling protocol.
//!
//! This module is composed of:
//! - [`shared`]: the job list, the pool mutex and the wake/notify protocol
//!   used by every participating thread,
//! - [`worker`]: the loop run by pool-owned threads,
//! - [`handle`]: the dispatch API ([`PoolHandle`]),
//! - [`core`]: the owning [`ThreadPool`] and its shutdown sequence,
//! - [`builder`]: pool configuration.
//!
//! A thread that dispatches work never just waits for it: it publishes a
//! job and then helps execute published jobs until its own has finished.

pub(crate) mod builder;
pub(crate) mod core;
pub(crate) mod handle;
pub(crate) mod shared;
pub(crate) mod worker;

pub use builder::PoolBuilder;
pub use core::ThreadPool;
pub use handle::PoolHandle;

pub(crate) use shared::{Shared, State};
