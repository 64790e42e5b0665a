//! Errors raised while configuring or starting a thread pool.
//!
//! Scheduling itself has no recoverable failures: contract violations
//! panic. Only pool construction can fail at runtime.

use std::io;

use thiserror::Error;

/// Errors returned by [`PoolBuilder::build`](crate::PoolBuilder::build).
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool was configured with zero participating threads.
    #[error("a thread pool needs at least one participating thread")]
    NoThreads,

    /// An environment variable held a value that could not be parsed.
    #[error("invalid value {value:?} for environment variable {var}")]
    InvalidEnv {
        /// Name of the variable.
        var: &'static str,
        /// The raw value that was rejected.
        value: String,
    },

    /// The operating system refused to spawn a worker thread.
    #[error("failed to spawn worker thread {index}")]
    Spawn {
        /// Index of the worker that could not be started.
        index: usize,
        #[source]
        source: io::Error,
    },
}

/// Result alias used by the pool construction API.
pub type Result<T> = std::result::Result<T, PoolError>;
