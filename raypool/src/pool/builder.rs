use super::ThreadPool;
use crate::available_cores;
use crate::error::{PoolError, Result};

use std::env;

/// Environment variable read by [`PoolBuilder::from_env`].
pub const THREADS_ENV: &str = "RAYPOOL_NUM_THREADS";

/// Default prefix of worker thread names.
const DEFAULT_THREAD_NAME: &str = "raypool-worker";

/// Builder for configuring and creating a [`ThreadPool`].
///
/// # Examples
///
/// ```rust
/// use raypool::PoolBuilder;
///
/// let pool = PoolBuilder::new()
///     .threads(4)
///     .thread_name("render")
///     .build()
///     .unwrap();
///
/// assert_eq!(pool.size(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct PoolBuilder {
    /// Number of participating threads, including the dispatching one.
    threads: usize,

    /// Prefix of worker thread names.
    thread_name: String,
}

impl PoolBuilder {
    /// Creates a builder with default configuration.
    ///
    /// By default one thread participates per available core.
    pub fn new() -> Self {
        Self {
            threads: available_cores(),
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
        }
    }

    /// Creates a builder configured from the environment.
    ///
    /// `RAYPOOL_NUM_THREADS` overrides the thread count when set to a
    /// positive integer; `0` keeps the default of one thread per core.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidEnv`] if the variable is set to anything
    /// other than a non-negative integer.
    pub fn from_env() -> Result<Self> {
        let builder = Self::new();

        match env::var(THREADS_ENV) {
            Ok(value) => match value.trim().parse::<usize>() {
                Ok(0) => Ok(builder),
                Ok(threads) => Ok(builder.threads(threads)),
                Err(_) => Err(PoolError::InvalidEnv {
                    var: THREADS_ENV,
                    value,
                }),
            },
            Err(env::VarError::NotPresent) => Ok(builder),
            Err(env::VarError::NotUnicode(value)) => Err(PoolError::InvalidEnv {
                var: THREADS_ENV,
                value: value.to_string_lossy().into_owned(),
            }),
        }
    }

    /// Sets the number of participating threads.
    ///
    /// The pool spawns `threads - 1` workers, since the dispatching thread
    /// always takes part.
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Sets the prefix of worker thread names.
    ///
    /// Workers are named `"{prefix}-{index}"`.
    pub fn thread_name(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name = prefix.into();
        self
    }

    /// Builds the pool, spawning its worker threads.
    ///
    /// # Errors
    ///
    /// - [`PoolError::NoThreads`] if the thread count is zero
    /// - [`PoolError::Spawn`] if a worker thread cannot be started
    pub fn build(self) -> Result<ThreadPool> {
        if self.threads == 0 {
            return Err(PoolError::NoThreads);
        }

        ThreadPool::start(self.threads, &self.thread_name)
    }
}

impl Default for PoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}
