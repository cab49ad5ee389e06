//! Fixed-size worker pool for root-parallel search.

use rayon::ThreadPool;
use rayon::prelude::*;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::debug;

/// Runs one task per determinization on dedicated threads.
///
/// The owner creates the pool when root parallelization is switched on and
/// must tear it down with [`WorkerPool::shutdown`].
pub struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    /// Builds a pool with `threads` workers; zero picks one per core.
    pub fn new(threads: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("mcts-worker-{index}"))
            .build()?;
        debug!(threads = pool.current_num_threads(), "worker pool started");
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs `task(0..tasks)` and blocks until every task has finished.
    ///
    /// Results come back in task order. A panicking task yields `Err` with
    /// the panic message and leaves the other tasks untouched.
    pub fn run_all<T, F>(&self, tasks: usize, task: F) -> Vec<Result<T, String>>
    where
        T: Send,
        F: Fn(usize) -> T + Send + Sync,
    {
        self.pool.install(|| {
            (0..tasks)
                .into_par_iter()
                .map(|index| {
                    panic::catch_unwind(AssertUnwindSafe(|| task(index))).map_err(panic_message)
                })
                .collect()
        })
    }

    pub fn shutdown(self) {
        debug!(threads = self.threads(), "worker pool shut down");
        drop(self.pool);
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads())
            .finish()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
