//! Batch request parameters.

use std::path::{Path, PathBuf};
use std::time::Duration;

use emulator_common::SimId;
use emulator_core::config::{EmulationInput, SimulationSettings};
use emulator_core::damage::CritMode;

use crate::error::{BatchError, BatchResult};

/// Default worker count when none is given.
pub const DEFAULT_POOL_SIZE: usize = 4;

/// Upper bound on worker threads.
pub const MAX_POOL_SIZE: usize = 256;

/// One batch of independent runs over the same input.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    /// Input cloned into every run.
    pub input: EmulationInput,
    /// Worker threads.
    pub pool_size: usize,
    /// Number of runs.
    pub run_count: u32,
    /// Wall-clock bound per run.
    pub per_task_timeout: Option<Duration>,
    /// Root directory for artifacts.
    pub output_dir: PathBuf,
    /// Seed of run 0; run `n` uses `base_seed + n`.
    pub base_seed: u64,
    /// Crit mode forced onto every run.
    pub crit_mode: CritMode,
    /// Also write each run's frame log.
    pub write_logs: bool,
}

impl BatchRequest {
    /// Creates a request with one run per default worker.
    #[must_use]
    pub fn new(input: EmulationInput, output_dir: impl AsRef<Path>) -> Self {
        let base_seed = input.settings.seed;
        Self {
            input,
            pool_size: DEFAULT_POOL_SIZE,
            run_count: 1,
            per_task_timeout: None,
            output_dir: output_dir.as_ref().to_path_buf(),
            base_seed,
            crit_mode: CritMode::Stochastic,
            write_logs: false,
        }
    }

    /// Sets the number of worker threads.
    #[must_use]
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Sets the number of runs.
    #[must_use]
    pub fn with_run_count(mut self, run_count: u32) -> Self {
        self.run_count = run_count;
        self
    }

    /// Sets the per-run timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.per_task_timeout = Some(timeout);
        self
    }

    /// Sets the base seed.
    #[must_use]
    pub fn with_base_seed(mut self, seed: u64) -> Self {
        self.base_seed = seed;
        self
    }

    /// Sets the crit mode of every run.
    #[must_use]
    pub fn with_crit_mode(mut self, crit_mode: CritMode) -> Self {
        self.crit_mode = crit_mode;
        self
    }

    /// Enables frame log artifacts.
    #[must_use]
    pub fn with_logs(mut self, write_logs: bool) -> Self {
        self.write_logs = write_logs;
        self
    }

    /// Returns the seed of one run.
    #[must_use]
    pub fn seed_for(&self, sim_id: SimId) -> u64 {
        self.base_seed.wrapping_add(u64::from(sim_id.raw()))
    }

    /// Returns the settings of one run.
    #[must_use]
    pub fn settings_for(&self, sim_id: SimId) -> SimulationSettings {
        self.input
            .settings
            .with_crit_mode(self.crit_mode)
            .with_seed(self.seed_for(sim_id))
    }

    /// Returns the worker count actually used.
    #[must_use]
    pub fn effective_pool_size(&self) -> usize {
        self.pool_size.min(self.run_count as usize).max(1)
    }

    /// Checks the request and its input.
    pub fn validate(&self) -> BatchResult<()> {
        if self.pool_size == 0 || self.pool_size > MAX_POOL_SIZE {
            return Err(BatchError::InvalidRequest(format!(
                "pool size must be in 1..={MAX_POOL_SIZE}, got {}",
                self.pool_size
            )));
        }
        if self.run_count == 0 {
            return Err(BatchError::InvalidRequest("run count must be positive".into()));
        }
        if self.per_task_timeout.is_some_and(|t| t.is_zero()) {
            return Err(BatchError::InvalidRequest("timeout must be positive".into()));
        }
        self.input.validate()?;
        Ok(())
    }
}
