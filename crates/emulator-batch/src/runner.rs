//! The batch runner.
//!
//! `run` fans `run_count` tasks out to a fixed pool of worker threads and
//! collects exactly one [`SimulationResult`] per task. Workers report a
//! [`WorkerError`] instead of a result when they could not produce one; the
//! collector records it as a failed run and keeps the error in the report.
//!
//! The collector doubles as a watchdog: a task that outlives its timeout
//! plus [`WATCHDOG_GRACE`] is recorded as timed out and a replacement worker
//! takes its seat. The abandoned worker exits once its task returns, so at
//! most `pool_size` tasks run at a time. If every worker has exited with
//! runs still missing, those runs are recorded as [`WorkerError::Lost`].

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, RecvTimeoutError};
use emulator_common::{BatchUid, SimId, WorkerError};
use emulator_core::motion::KitRegistry;
use emulator_core::progress::{
    progress_channel, ProgressEvent, ProgressReceiver, ProgressSender, DEFAULT_PROGRESS_CAPACITY,
};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::artifact;
use crate::error::BatchResult;
use crate::request::BatchRequest;
use crate::result::{BatchSummary, SimulationResult};
use crate::worker::{
    default_executor, spawn_worker, Executor, InFlight, Task, TaskReport, WorkerContext,
};

/// Extra time the watchdog grants past the cooperative deadline.
pub const WATCHDOG_GRACE: Duration = Duration::from_millis(500);

/// How often the collector checks the in-flight table.
pub const WATCHDOG_INTERVAL: Duration = Duration::from_millis(50);

/// Everything a finished batch produced.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Batch identifier.
    pub batch_uid: BatchUid,
    /// Artifact directory.
    pub dir: PathBuf,
    /// One result per run, ordered by sim ID.
    pub results: Vec<SimulationResult>,
    /// Aggregate.
    pub summary: BatchSummary,
    /// Worker errors behind the failed runs, in the order they arrived.
    pub errors: Vec<WorkerError>,
}

/// Runs batches of emulations.
#[derive(Clone)]
pub struct BatchRunner {
    executor: Arc<Executor>,
    watchdog_grace: Duration,
}

impl std::fmt::Debug for BatchRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRunner")
            .field("watchdog_grace", &self.watchdog_grace)
            .finish_non_exhaustive()
    }
}

impl BatchRunner {
    /// Creates a runner using the given motion kits.
    #[must_use]
    pub fn new(kits: KitRegistry) -> Self {
        Self::with_executor(default_executor(Arc::new(kits)))
    }

    /// Creates a runner with a custom executor.
    #[must_use]
    pub fn with_executor(executor: Arc<Executor>) -> Self {
        Self {
            executor,
            watchdog_grace: WATCHDOG_GRACE,
        }
    }

    /// Sets the watchdog grace period.
    #[must_use]
    pub fn with_watchdog_grace(mut self, grace: Duration) -> Self {
        self.watchdog_grace = grace;
        self
    }

    /// Runs a batch without progress reporting.
    pub fn run(&self, request: &BatchRequest) -> BatchResult<BatchReport> {
        self.run_with_progress(request, &ProgressSender::disconnected())
    }

    /// Runs a batch, reporting one update per finished run.
    pub fn run_with_progress(
        &self,
        request: &BatchRequest,
        progress: &ProgressSender,
    ) -> BatchResult<BatchReport> {
        request.validate()?;
        let batch_uid = BatchUid::new();
        let dir = artifact::create_batch_dir(&request.output_dir, batch_uid)?;
        let pool_size = request.effective_pool_size();
        let total = request.run_count as usize;
        info!(
            "Batch {} started: {} runs on {} workers",
            batch_uid, total, pool_size
        );

        let ctx = Arc::new(WorkerContext {
            executor: Arc::clone(&self.executor),
            batch_dir: dir.clone(),
            timeout: request.per_task_timeout,
            write_logs: request.write_logs,
            in_flight: Mutex::new(InFlight::default()),
        });

        let (task_tx, task_rx) = unbounded();
        let (result_tx, result_rx) = unbounded();
        for raw in 0..request.run_count {
            let sim_id = SimId::new(raw);
            let mut input = request.input.clone();
            input.settings = request.settings_for(sim_id);
            let task = Task {
                sim_id,
                seed: request.seed_for(sim_id),
                input,
            };
            if task_tx.send(task).is_err() {
                break;
            }
        }
        drop(task_tx);

        let mut workers = Vec::with_capacity(pool_size);
        for index in 0..pool_size {
            workers.push(spawn_worker(
                index,
                Arc::clone(&ctx),
                task_rx.clone(),
                result_tx.clone(),
            )?);
        }

        progress.start(total as u64, format!("Batch {batch_uid}"));
        let watchdog_limit = request.per_task_timeout.map(|t| t + self.watchdog_grace);
        let mut results: BTreeMap<SimId, SimulationResult> = BTreeMap::new();
        let mut errors: Vec<WorkerError> = Vec::new();

        while results.len() < total {
            match result_rx.recv_timeout(WATCHDOG_INTERVAL) {
                Ok(report) => {
                    let result = record_report(&dir, report, &mut errors);
                    debug!("Simulation {} finished: {:?}", result.sim_id, result.status);
                    results.insert(result.sim_id, result);
                    report_progress(progress, results.len(), total);
                },
                // The collector holds a sender, so the channel never disconnects
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {
                    if workers.iter().all(JoinHandle::is_finished) {
                        for report in result_rx.try_iter() {
                            let result = record_report(&dir, report, &mut errors);
                            results.insert(result.sim_id, result);
                        }
                        for raw in 0..request.run_count {
                            let sim_id = SimId::new(raw);
                            if !results.contains_key(&sim_id) {
                                let error = WorkerError::Lost { sim_id };
                                warn!("{}", error);
                                let report = TaskReport {
                                    sim_id,
                                    seed: request.seed_for(sim_id),
                                    elapsed_ms: 0,
                                    outcome: Err(error),
                                };
                                results.insert(sim_id, record_report(&dir, report, &mut errors));
                            }
                        }
                        report_progress(progress, results.len(), total);
                        break;
                    }
                },
            }

            let Some(limit) = watchdog_limit else {
                continue;
            };
            let expired = ctx.in_flight.lock().abandon_expired(limit, Instant::now());
            for (sim_id, elapsed) in expired {
                warn!(
                    "Watchdog: simulation {} exceeded {:?}, abandoning",
                    sim_id, limit
                );
                let mut result = SimulationResult::timeout(
                    sim_id,
                    request.seed_for(sim_id),
                    format!("watchdog: no result after {} ms", elapsed.as_millis()),
                    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                );
                if let Err(e) = artifact::write_run(&dir, &mut result, Vec::new(), None) {
                    warn!("Failed to write timeout artifact: {}", e);
                }
                results.insert(sim_id, result);
                report_progress(progress, results.len(), total);

                let index = workers.len();
                workers.push(spawn_worker(
                    index,
                    Arc::clone(&ctx),
                    task_rx.clone(),
                    result_tx.clone(),
                )?);
            }
        }
        drop(result_tx);
        drop(task_rx);

        join_finished(workers);

        let results: Vec<SimulationResult> = results.into_values().collect();
        let summary = BatchSummary::from_results(batch_uid, &results);
        artifact::write_summary(&dir, &summary)?;
        progress.done();

        info!(
            "Batch {} finished: {}/{} succeeded, {} failed, {} timed out",
            batch_uid, summary.succeeded, summary.total, summary.failed, summary.timed_out
        );
        Ok(BatchReport {
            batch_uid,
            dir,
            results,
            summary,
            errors,
        })
    }
}

/// Turns a worker report into the run's result. Failed runs get their
/// `result.json` written here and their error kept.
fn record_report(
    dir: &std::path::Path,
    report: TaskReport,
    errors: &mut Vec<WorkerError>,
) -> SimulationResult {
    let error = report.outcome.as_ref().err().cloned();
    let mut result = report.into_result();
    if let Some(error) = error {
        if let Err(e) = artifact::write_run(dir, &mut result, Vec::new(), None) {
            warn!("Failed to write failure artifact: {}", e);
        }
        errors.push(error);
    }
    result
}

fn report_progress(progress: &ProgressSender, done: usize, total: usize) {
    progress.update(done as u64, total as u64, format!("{done}/{total} runs"));
}

/// Joins workers that have exited. Abandoned workers are left detached.
fn join_finished(workers: Vec<JoinHandle<()>>) {
    for handle in workers {
        if handle.is_finished() {
            if handle.join().is_err() {
                warn!("Worker thread panicked outside a task");
            }
        } else {
            debug!("Detaching worker still busy with an abandoned task");
        }
    }
}

// ============================================================================
// Background
// ============================================================================

/// A batch in flight on a background thread.
#[derive(Debug)]
pub struct BatchHandle {
    thread: JoinHandle<BatchResult<BatchReport>>,
    progress: ProgressReceiver,
}

/// Starts a batch on its own thread.
#[must_use]
pub fn spawn_batch(runner: BatchRunner, request: BatchRequest) -> BatchHandle {
    let (tx, rx) = progress_channel(DEFAULT_PROGRESS_CAPACITY);
    let thread = thread::spawn(move || runner.run_with_progress(&request, &tx));
    BatchHandle {
        thread,
        progress: rx,
    }
}

impl BatchHandle {
    /// Returns progress events queued since the last poll.
    #[must_use]
    pub fn poll(&self) -> Vec<ProgressEvent> {
        self.progress.poll()
    }

    /// Waits up to `timeout` for the next progress event.
    pub fn next_event(&self, timeout: Duration) -> Option<ProgressEvent> {
        self.progress.recv_timeout(timeout)
    }

    /// Blocks until the batch ends.
    pub fn wait(self) -> BatchResult<BatchReport> {
        match self.thread.join() {
            Ok(result) => result,
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }
}
