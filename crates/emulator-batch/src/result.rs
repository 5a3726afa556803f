//! Per-run results and the batch summary.

use std::path::PathBuf;

use emulator_common::{BatchUid, Document, SchemaVersion, SimId, WorkerError};
use emulator_core::summary::RunSummary;
use serde::{Deserialize, Serialize};

/// Outcome class of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimStatus {
    /// Run completed.
    Success,
    /// Run panicked, failed or could not write its artifacts.
    Failure,
    /// Run exceeded its timeout.
    Timeout,
}

/// Result of one run inside a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Run identifier.
    pub sim_id: SimId,
    /// Outcome class.
    pub status: SimStatus,
    /// Crit RNG seed used.
    pub seed: u64,
    /// Metrics of a successful run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunSummary>,
    /// Failure or timeout message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Directory holding the run's artifacts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
    /// Wall time spent.
    pub elapsed_ms: u64,
}

impl SimulationResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(sim_id: SimId, seed: u64, summary: RunSummary, elapsed_ms: u64) -> Self {
        Self {
            sim_id,
            status: SimStatus::Success,
            seed,
            summary: Some(summary),
            error: None,
            artifact: None,
            elapsed_ms,
        }
    }

    /// Creates a failed result from a worker error.
    #[must_use]
    pub fn failure(sim_id: SimId, seed: u64, error: &WorkerError, elapsed_ms: u64) -> Self {
        Self {
            sim_id,
            status: SimStatus::Failure,
            seed,
            summary: None,
            error: Some(error.to_string()),
            artifact: None,
            elapsed_ms,
        }
    }

    /// Creates a timed-out result.
    #[must_use]
    pub fn timeout(sim_id: SimId, seed: u64, message: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            sim_id,
            status: SimStatus::Timeout,
            seed,
            summary: None,
            error: Some(message.into()),
            artifact: None,
            elapsed_ms,
        }
    }

    /// Returns true for a successful run.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == SimStatus::Success
    }

    /// Returns the run's DPS if it succeeded.
    #[must_use]
    pub fn dps(&self) -> Option<f64> {
        self.summary.as_ref().map(|summary| summary.dps)
    }
}

/// Short per-run record of the batch summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimRecord {
    /// Run identifier.
    pub sim_id: SimId,
    /// Outcome class.
    pub status: SimStatus,
}

/// Distribution of DPS over successful runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DpsStats {
    /// Sample count.
    pub samples: usize,
    /// Mean.
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    /// Lowest sample.
    pub min: f64,
    /// Median.
    pub median: f64,
    /// Highest sample.
    pub max: f64,
}

impl DpsStats {
    /// Computes statistics, or `None` for an empty sample.
    #[must_use]
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let variance = sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        Some(Self {
            samples: sorted.len(),
            mean,
            std_dev: variance.sqrt(),
            min: sorted[0],
            median,
            max: sorted[sorted.len() - 1],
        })
    }
}

/// Aggregate of a whole batch, written as `summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Format version.
    pub version: SchemaVersion,
    /// Batch identifier.
    pub batch_uid: BatchUid,
    /// Runs requested.
    pub total: usize,
    /// Successful runs.
    pub succeeded: usize,
    /// Failed runs.
    pub failed: usize,
    /// Timed-out runs.
    pub timed_out: usize,
    /// `succeeded / total`.
    pub success_ratio: f64,
    /// DPS over successful runs.
    pub dps: Option<DpsStats>,
    /// One record per run, ordered by sim ID.
    pub runs: Vec<SimRecord>,
}

impl BatchSummary {
    /// Summarizes results ordered by sim ID.
    #[must_use]
    pub fn from_results(batch_uid: BatchUid, results: &[SimulationResult]) -> Self {
        let count = |status| results.iter().filter(|r| r.status == status).count();
        let succeeded = count(SimStatus::Success);
        let samples: Vec<f64> = results.iter().filter_map(SimulationResult::dps).collect();

        Self {
            version: Document::BatchSummary.current(),
            batch_uid,
            total: results.len(),
            succeeded,
            failed: count(SimStatus::Failure),
            timed_out: count(SimStatus::Timeout),
            success_ratio: if results.is_empty() {
                0.0
            } else {
                succeeded as f64 / results.len() as f64
            },
            dps: DpsStats::from_samples(&samples),
            runs: results
                .iter()
                .map(|r| SimRecord {
                    sim_id: r.sim_id,
                    status: r.status,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary_with_dps(dps: f64) -> RunSummary {
        RunSummary {
            dps,
            ..RunSummary::default()
        }
    }

    #[test]
    fn test_dps_stats() {
        let stats = DpsStats::from_samples(&[300.0, 100.0, 200.0]).expect("non-empty");
        assert_eq!(stats.samples, 3);
        assert_eq!(stats.mean, 200.0);
        assert_eq!(stats.min, 100.0);
        assert_eq!(stats.median, 200.0);
        assert_eq!(stats.max, 300.0);
        assert!((stats.std_dev - (20_000.0_f64 / 3.0).sqrt()).abs() < 1e-9);

        let even = DpsStats::from_samples(&[1.0, 2.0, 3.0, 4.0]).expect("non-empty");
        assert_eq!(even.median, 2.5);
        assert!(DpsStats::from_samples(&[]).is_none());
    }

    #[test]
    fn test_batch_summary_counts() {
        let results = vec![
            SimulationResult::success(SimId::new(0), 0, summary_with_dps(100.0), 5),
            SimulationResult::failure(
                SimId::new(1),
                1,
                &WorkerError::Panicked {
                    sim_id: SimId::new(1),
                    message: "boom".into(),
                },
                5,
            ),
            SimulationResult::timeout(SimId::new(2), 2, "too slow", 50),
            SimulationResult::success(SimId::new(3), 3, summary_with_dps(300.0), 5),
        ];
        let summary = BatchSummary::from_results(BatchUid::new(), &results);

        assert_eq!(summary.total, 4);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.timed_out, 1);
        assert_eq!(summary.success_ratio, 0.5);
        assert_eq!(summary.dps.expect("two samples").mean, 200.0);
        assert_eq!(summary.runs[2].status, SimStatus::Timeout);
    }

    #[test]
    fn test_result_json_shape() {
        let result = SimulationResult::timeout(SimId::new(4), 9, "too slow", 10);
        let json = serde_json::to_value(&result).expect("serializes");
        assert_eq!(json["sim_id"], 4);
        assert_eq!(json["status"], "timeout");
        assert_eq!(json["seed"], 9);
        assert!(json.get("summary").is_none());
    }
}
