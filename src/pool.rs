//! A worker pool shared by the sampler and the validator.

use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::warn;

/// A fixed-size set of worker threads for batch work: fork over disjoint items, join, and
/// collect the results in input order.
///
/// A pool for one thread, or a pool whose threads couldn't be started, runs every batch on the
/// calling thread instead.
pub struct WorkerPool {
    pool: Option<ThreadPool>,
}

impl WorkerPool {
    /// Starts `threads` workers, or none if `threads <= 1`.
    pub fn new(threads: usize) -> Self {
        if threads <= 1 {
            return WorkerPool { pool: None };
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("agree-lattice-{}", i))
            .build();
        match pool {
            Ok(pool) => WorkerPool { pool: Some(pool) },
            Err(error) => {
                warn!(threads, %error, "could not start worker pool, running single-threaded");
                WorkerPool { pool: None }
            }
        }
    }

    /// A pool that never spawns threads.
    pub fn sequential() -> Self {
        WorkerPool { pool: None }
    }

    /// The number of threads batches are spread across.
    pub fn threads(&self) -> usize {
        self.pool
            .as_ref()
            .map_or(1, ThreadPool::current_num_threads)
    }

    /// Applies `f` to every item. The output is in the same order as `items` no matter which
    /// worker finished first.
    pub fn map<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        match &self.pool {
            None => items.iter().map(f).collect(),
            Some(pool) => pool.install(|| items.par_iter().map(f).collect()),
        }
    }

    /// Applies `f` to consecutive chunks of at most `chunk_size` items, returning one result per
    /// chunk in order.
    pub fn map_chunks<T, R, F>(&self, items: &[T], chunk_size: usize, f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&[T]) -> R + Sync + Send,
    {
        let chunk_size = chunk_size.max(1);
        match &self.pool {
            None => items.chunks(chunk_size).map(f).collect(),
            Some(pool) => pool.install(|| items.par_chunks(chunk_size).map(f).collect()),
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads())
            .finish()
    }
}
