//! Parallel processing configuration
//!
//! The pipelines are sequential window by window. `--parallel` only spreads
//! the per-cell time reduction across Rayon's global thread pool.

use crate::errors::{PrecipError, Result};
use rayon::ThreadPoolBuilder;
use tracing::info;

/// Configuration for parallel processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParallelConfig {
    pub enabled: bool,
    pub num_threads: Option<usize>,
}

impl ParallelConfig {
    /// Create a new parallel configuration
    pub fn new(enabled: bool, num_threads: Option<usize>) -> Self {
        Self {
            enabled,
            num_threads,
        }
    }

    /// Reductions run on the calling thread
    pub fn sequential() -> Self {
        Self {
            enabled: false,
            num_threads: None,
        }
    }

    /// Create a configuration that uses all available CPU cores
    pub fn all_cores() -> Self {
        Self {
            enabled: true,
            num_threads: Some(num_cpus::get()),
        }
    }

    /// Create a configuration that uses a specific number of threads
    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            enabled: true,
            num_threads: Some(num_threads),
        }
    }

    /// Set up the global Rayon thread pool with the specified configuration
    ///
    /// A no-op when parallelism is disabled.
    pub fn setup_global_pool(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if let Some(num_threads) = self.num_threads {
            ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .build_global()
                .map_err(|e| {
                    PrecipError::ThreadPoolError(format!(
                        "Failed to initialize thread pool with {} threads: {}",
                        num_threads, e
                    ))
                })?;
            info!(threads = num_threads, "Configured parallel processing");
        } else {
            info!(
                threads = rayon::current_num_threads(),
                "Using default thread pool configuration"
            );
        }

        Ok(())
    }
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self::sequential()
    }
}
