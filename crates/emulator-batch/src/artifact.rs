//! On-disk layout of batch artifacts.
//!
//! ```text
//! <output_dir>/<batch_uid>/summary.json
//! <output_dir>/<batch_uid>/<sim_id>/result.json
//! <output_dir>/<batch_uid>/<sim_id>/log.json     (optional)
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use emulator_common::{BatchUid, Document, SchemaVersion, SimId};
use emulator_core::event_log::EventLog;
use emulator_core::scheduler::SkippedAction;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BatchError, BatchResult};
use crate::result::{BatchSummary, SimulationResult};

/// File name of a run result.
pub const RESULT_FILE: &str = "result.json";

/// File name of a run's frame log.
pub const LOG_FILE: &str = "log.json";

/// File name of the batch summary.
pub const SUMMARY_FILE: &str = "summary.json";

/// Contents of `result.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunArtifact {
    /// Format version.
    pub version: SchemaVersion,
    /// Result record.
    #[serde(flatten)]
    pub result: SimulationResult,
    /// Actions the run skipped.
    #[serde(default)]
    pub skipped: Vec<SkippedAction>,
}

/// Returns the directory of a batch.
#[must_use]
pub fn batch_dir(output_dir: &Path, batch_uid: BatchUid) -> PathBuf {
    output_dir.join(batch_uid.to_string())
}

/// Returns the directory of one run.
#[must_use]
pub fn sim_dir(batch_dir: &Path, sim_id: SimId) -> PathBuf {
    batch_dir.join(sim_id.to_string())
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> BatchError + '_ {
    move |source| BatchError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> BatchResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).map_err(io_error(path))?;
    debug!("Wrote {}", path.display());
    Ok(())
}

/// Creates the batch directory.
pub fn create_batch_dir(output_dir: &Path, batch_uid: BatchUid) -> BatchResult<PathBuf> {
    let dir = batch_dir(output_dir, batch_uid);
    fs::create_dir_all(&dir).map_err(io_error(&dir))?;
    Ok(dir)
}

/// Writes a run's `result.json` and, if given, its frame log.
///
/// Sets `result.artifact` to the run directory.
pub fn write_run(
    batch_dir: &Path,
    result: &mut SimulationResult,
    skipped: Vec<SkippedAction>,
    log: Option<&EventLog>,
) -> BatchResult<()> {
    let dir = sim_dir(batch_dir, result.sim_id);
    fs::create_dir_all(&dir).map_err(io_error(&dir))?;
    result.artifact = Some(dir.clone());

    let artifact = RunArtifact {
        version: Document::RunArtifact.current(),
        result: result.clone(),
        skipped,
    };
    write_json(&dir.join(RESULT_FILE), &artifact)?;

    if let Some(log) = log {
        write_json(&dir.join(LOG_FILE), &log.to_document())?;
    }
    Ok(())
}

/// Writes `summary.json`.
pub fn write_summary(batch_dir: &Path, summary: &BatchSummary) -> BatchResult<PathBuf> {
    let path = batch_dir.join(SUMMARY_FILE);
    write_json(&path, summary)?;
    Ok(path)
}

/// Reads a run's `result.json`, rejecting other major versions.
pub fn read_run(path: &Path) -> BatchResult<RunArtifact> {
    let text = fs::read_to_string(path).map_err(io_error(path))?;
    let artifact: RunArtifact = serde_json::from_str(&text)?;
    artifact.version.ensure_readable(Document::RunArtifact)?;
    Ok(artifact)
}

/// Reads a batch `summary.json`, rejecting other major versions.
pub fn read_summary(path: &Path) -> BatchResult<BatchSummary> {
    let text = fs::read_to_string(path).map_err(io_error(path))?;
    let summary: BatchSummary = serde_json::from_str(&text)?;
    summary.version.ensure_readable(Document::BatchSummary)?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::SimStatus;

    #[test]
    fn test_run_artifact_layout() {
        let temp = tempfile::tempdir().expect("temp dir");
        let uid = BatchUid::new();
        let dir = create_batch_dir(temp.path(), uid).expect("created");
        assert_eq!(dir, temp.path().join(uid.to_string()));

        let mut result = SimulationResult::timeout(SimId::new(2), 44, "too slow", 10);
        write_run(&dir, &mut result, Vec::new(), Some(&EventLog::new())).expect("written");

        let run_dir = dir.join("2");
        assert_eq!(result.artifact.as_deref(), Some(run_dir.as_path()));
        assert!(run_dir.join(LOG_FILE).exists());

        let artifact = read_run(&run_dir.join(RESULT_FILE)).expect("readable");
        assert_eq!(artifact.version, Document::RunArtifact.current());
        assert_eq!(artifact.result.status, SimStatus::Timeout);
        assert_eq!(artifact.result.seed, 44);
    }

    #[test]
    fn test_summary_file() {
        let temp = tempfile::tempdir().expect("temp dir");
        let uid = BatchUid::new();
        let dir = create_batch_dir(temp.path(), uid).expect("created");
        let summary = BatchSummary::from_results(uid, &[]);
        let path = write_summary(&dir, &summary).expect("written");

        assert_eq!(read_summary(&path).expect("readable"), summary);
    }

    #[test]
    fn test_read_rejects_other_major_version() {
        let temp = tempfile::tempdir().expect("temp dir");
        let dir = temp.path();
        let mut result = SimulationResult::timeout(SimId::new(0), 1, "slow", 1);
        write_run(dir, &mut result, Vec::new(), None).expect("written");

        let path = dir.join("0").join(RESULT_FILE);
        let text = fs::read_to_string(&path).expect("readable");
        let mut doc: serde_json::Value = serde_json::from_str(&text).expect("json");
        doc["version"]["major"] = serde_json::json!(9);
        fs::write(&path, doc.to_string()).expect("rewritten");

        assert!(matches!(read_run(&path), Err(BatchError::Version(_))));
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let temp = tempfile::tempdir().expect("temp dir");
        assert!(matches!(
            read_run(&temp.path().join("missing.json")),
            Err(BatchError::Io { .. })
        ));
    }
}
