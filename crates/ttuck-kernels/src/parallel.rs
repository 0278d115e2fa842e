//! Per-sample parallelism over batches using Rayon
//!
//! Forward and gradient passes are maps (or folds) over independent samples
//! reading shared, immutable projections. Batches below
//! [`ParallelConfig::min_parallel_batch`] run sequentially; without the
//! `parallel` feature everything runs sequentially.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Configuration for parallel batch passes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelConfig {
    /// Minimum batch size to use parallel processing (default: 256)
    pub min_parallel_batch: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            min_parallel_batch: 256,
        }
    }
}

impl ParallelConfig {
    /// Never go parallel
    pub fn sequential() -> Self {
        Self {
            min_parallel_batch: usize::MAX,
        }
    }

    pub fn with_min_parallel_batch(mut self, min: usize) -> Self {
        self.min_parallel_batch = min;
        self
    }

    /// Whether a batch of this size takes the parallel path
    pub fn use_parallel(&self, batch: usize) -> bool {
        cfg!(feature = "parallel") && batch >= self.min_parallel_batch
    }
}

/// Map `f` over sample indices 0..batch, preserving order
pub(crate) fn map_samples<T, F>(batch: usize, config: &ParallelConfig, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Send + Sync,
{
    #[cfg(feature = "parallel")]
    {
        if config.use_parallel(batch) {
            return (0..batch).into_par_iter().map(f).collect();
        }
    }
    #[cfg(not(feature = "parallel"))]
    let _ = config;
    (0..batch).map(f).collect()
}

/// Fold samples 0..batch into per-worker accumulators and merge them
pub(crate) fn fold_samples<A, I, F, R>(
    batch: usize,
    config: &ParallelConfig,
    init: I,
    fold: F,
    reduce: R,
) -> A
where
    A: Send,
    I: Fn() -> A + Send + Sync,
    F: Fn(A, usize) -> A + Send + Sync,
    R: Fn(A, A) -> A + Send + Sync,
{
    #[cfg(feature = "parallel")]
    {
        if config.use_parallel(batch) {
            return (0..batch)
                .into_par_iter()
                .fold(&init, &fold)
                .reduce(&init, &reduce);
        }
    }
    #[cfg(not(feature = "parallel"))]
    let _ = (config, &reduce);
    (0..batch).fold(init(), fold)
}
