//! Worker threads.
//!
//! Each worker pulls [`Task`]s from a shared channel, runs them inside
//! `catch_unwind`, writes the artifacts of finished runs and sends a
//! [`TaskReport`] back to the collector. A worker whose task the watchdog
//! has already given up on drops the result and exits: its replacement
//! holds the seat in the pool.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use emulator_common::{EmulationError, EmulationResult, SimId, WorkerError};
use emulator_core::config::EmulationInput;
use emulator_core::event_log::EventLog;
use emulator_core::motion::KitRegistry;
use emulator_core::scheduler::{Emulation, EmulationOutput, SkippedAction};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::artifact;
use crate::error::{BatchError, BatchResult};
use crate::result::SimulationResult;

/// Runs one emulation. Swappable for tests and instrumentation.
pub type Executor =
    dyn Fn(EmulationInput, Option<Instant>) -> EmulationResult<EmulationOutput> + Send + Sync;

/// Returns the executor that runs the real emulation.
#[must_use]
pub fn default_executor(kits: Arc<KitRegistry>) -> Arc<Executor> {
    Arc::new(move |input: EmulationInput, deadline: Option<Instant>| {
        let mut emulation = Emulation::new(input, &kits)?;
        if let Some(deadline) = deadline {
            emulation = emulation.with_deadline(deadline);
        }
        emulation.run()
    })
}

/// One queued run.
#[derive(Debug, Clone)]
pub struct Task {
    /// Run identifier.
    pub sim_id: SimId,
    /// Seed written into the input settings.
    pub seed: u64,
    /// Input owned by this run.
    pub input: EmulationInput,
}

/// Start times of running tasks, shared with the watchdog.
#[derive(Debug, Default)]
pub struct InFlight {
    started: BTreeMap<SimId, Instant>,
    abandoned: BTreeSet<SimId>,
}

impl InFlight {
    /// Returns true if nothing is running.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.started.is_empty()
    }

    /// Removes and returns tasks running for longer than `limit`.
    ///
    /// Their late results will be discarded.
    pub fn abandon_expired(&mut self, limit: Duration, now: Instant) -> Vec<(SimId, Duration)> {
        let expired: Vec<(SimId, Duration)> = self
            .started
            .iter()
            .map(|(id, started)| (*id, now.saturating_duration_since(*started)))
            .filter(|(_, elapsed)| *elapsed > limit)
            .collect();
        for (id, _) in &expired {
            self.started.remove(id);
            self.abandoned.insert(*id);
        }
        expired
    }

    pub(crate) fn begin(&mut self, sim_id: SimId) {
        self.started.insert(sim_id, Instant::now());
    }

    /// Returns false if the watchdog already gave up on the task.
    pub(crate) fn finish(&mut self, sim_id: SimId) -> bool {
        self.started.remove(&sim_id);
        !self.abandoned.remove(&sim_id)
    }
}

/// State shared by every worker of a batch.
pub struct WorkerContext {
    /// Runs one emulation.
    pub executor: Arc<Executor>,
    /// Artifact directory of the batch.
    pub batch_dir: PathBuf,
    /// Cooperative per-run timeout.
    pub timeout: Option<Duration>,
    /// Write frame logs.
    pub write_logs: bool,
    /// Running tasks.
    pub in_flight: Mutex<InFlight>,
}

impl std::fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerContext")
            .field("batch_dir", &self.batch_dir)
            .field("timeout", &self.timeout)
            .field("write_logs", &self.write_logs)
            .finish_non_exhaustive()
    }
}

/// What a worker sends back for one task.
#[derive(Debug, Clone)]
pub struct TaskReport {
    /// Run identifier.
    pub sim_id: SimId,
    /// Seed the run used.
    pub seed: u64,
    /// Wall time of the run.
    pub elapsed_ms: u64,
    /// The run's result, or why the worker could not produce one.
    pub outcome: Result<SimulationResult, WorkerError>,
}

impl TaskReport {
    /// Flattens the report into a result record.
    #[must_use]
    pub fn into_result(self) -> SimulationResult {
        match self.outcome {
            Ok(result) => result,
            Err(e) => SimulationResult::failure(self.sim_id, self.seed, &e, self.elapsed_ms),
        }
    }
}

/// Starts a worker thread.
pub fn spawn_worker(
    index: usize,
    ctx: Arc<WorkerContext>,
    tasks: Receiver<Task>,
    results: Sender<TaskReport>,
) -> BatchResult<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("emulator-worker-{index}"))
        .spawn(move || worker_loop(&ctx, &tasks, &results))
        .map_err(BatchError::Spawn)
}

fn worker_loop(ctx: &WorkerContext, tasks: &Receiver<Task>, results: &Sender<TaskReport>) {
    for task in tasks {
        let sim_id = task.sim_id;
        ctx.in_flight.lock().begin(sim_id);
        let output = run_task(ctx, task);

        if !ctx.in_flight.lock().finish(sim_id) {
            debug!("Discarding late result of simulation {}, worker exiting", sim_id);
            break;
        }
        let report = write_task(ctx, output);
        if results.send(report).is_err() {
            debug!("Collector gone, worker exiting");
            break;
        }
    }
}

/// A run whose artifacts are not written yet.
#[derive(Debug)]
pub struct TaskOutput {
    /// Run identifier.
    pub sim_id: SimId,
    /// Seed the run used.
    pub seed: u64,
    /// Wall time of the run.
    pub elapsed_ms: u64,
    /// Result record with what the run skipped and logged, or the failure.
    pub outcome: Result<FinishedRun, WorkerError>,
}

/// A run that finished or timed out.
#[derive(Debug)]
pub struct FinishedRun {
    /// Result record.
    pub result: SimulationResult,
    /// Actions the run skipped.
    pub skipped: Vec<SkippedAction>,
    /// Frame log, kept when logs are enabled.
    pub log: Option<EventLog>,
}

/// Runs a task, capturing panics and errors.
pub fn run_task(ctx: &WorkerContext, task: Task) -> TaskOutput {
    let Task { sim_id, seed, input } = task;
    let started = Instant::now();
    let deadline = ctx.timeout.map(|timeout| started + timeout);

    let outcome = catch_unwind(AssertUnwindSafe(|| (ctx.executor)(input, deadline)));
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let outcome = classify(sim_id, outcome).map(|run| match run {
        Ok(output) => FinishedRun {
            result: SimulationResult::success(sim_id, seed, output.summary, elapsed_ms),
            skipped: output.skipped,
            log: ctx.write_logs.then_some(output.log),
        },
        Err(e) => {
            warn!("Simulation {} timed out: {}", sim_id, e);
            FinishedRun {
                result: SimulationResult::timeout(sim_id, seed, e.to_string(), elapsed_ms),
                skipped: Vec::new(),
                log: None,
            }
        },
    });
    if let Err(e) = &outcome {
        warn!("{}", e);
    }

    TaskOutput {
        sim_id,
        seed,
        elapsed_ms,
        outcome,
    }
}

/// Writes a finished run's artifacts. A write failure becomes
/// [`WorkerError::Artifact`].
pub fn write_task(ctx: &WorkerContext, output: TaskOutput) -> TaskReport {
    let TaskOutput {
        sim_id,
        seed,
        elapsed_ms,
        outcome,
    } = output;
    let outcome = outcome.and_then(|run| {
        let FinishedRun {
            mut result,
            skipped,
            log,
        } = run;
        match artifact::write_run(&ctx.batch_dir, &mut result, skipped, log.as_ref()) {
            Ok(()) => Ok(result),
            Err(e) => {
                let error = WorkerError::Artifact {
                    sim_id,
                    message: e.to_string(),
                };
                warn!("{}", error);
                Err(error)
            },
        }
    });
    TaskReport {
        sim_id,
        seed,
        elapsed_ms,
        outcome,
    }
}

/// Splits a run outcome into success, timeout and worker failure.
fn classify(
    sim_id: SimId,
    outcome: Result<EmulationResult<EmulationOutput>, Box<dyn Any + Send>>,
) -> Result<Result<EmulationOutput, EmulationError>, WorkerError> {
    match outcome {
        Ok(Ok(output)) => Ok(Ok(output)),
        Ok(Err(e @ EmulationError::Timeout { .. })) => Ok(Err(e)),
        Ok(Err(e)) => Err(WorkerError::Failed {
            sim_id,
            message: e.to_string(),
        }),
        Err(payload) => Err(WorkerError::Panicked {
            sim_id,
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::SimStatus;
    use emulator_common::{ActionKind, Element};
    use emulator_core::config::{
        ActionSpec, CharacterConfig, SimulationSettings, TargetData, TeamSlot, WeaponType,
    };

    fn input() -> EmulationInput {
        let empty = || TeamSlot::Unconfigured {
            reason: "empty".into(),
            name: None,
        };
        EmulationInput::new(
            vec![
                TeamSlot::Character(Box::new(CharacterConfig::new(
                    "Beidou",
                    Element::Electro,
                    WeaponType::Claymore,
                ))),
                empty(),
                empty(),
                empty(),
            ],
            vec![ActionSpec::new("Beidou", ActionKind::Skill)],
            TargetData::default(),
            SimulationSettings::default(),
        )
    }

    fn panicking(_: EmulationInput, _: Option<Instant>) -> EmulationResult<EmulationOutput> {
        panic!("kit table corrupted")
    }

    fn timing_out(_: EmulationInput, _: Option<Instant>) -> EmulationResult<EmulationOutput> {
        Err(EmulationError::Timeout {
            frame: 10,
            elapsed_ms: 5,
        })
    }

    fn context(dir: &std::path::Path, executor: Arc<Executor>) -> WorkerContext {
        WorkerContext {
            executor,
            batch_dir: dir.to_path_buf(),
            timeout: None,
            write_logs: true,
            in_flight: Mutex::new(InFlight::default()),
        }
    }

    fn task(id: u32) -> Task {
        Task {
            sim_id: SimId::new(id),
            seed: u64::from(id),
            input: input(),
        }
    }

    #[test]
    fn test_successful_task_writes_artifacts() {
        let temp = tempfile::tempdir().expect("temp dir");
        let ctx = context(
            temp.path(),
            default_executor(Arc::new(KitRegistry::with_defaults())),
        );

        let result = write_task(&ctx, run_task(&ctx, task(0)))
            .outcome
            .expect("run succeeds");
        assert_eq!(result.status, SimStatus::Success);
        assert!(result.summary.as_ref().is_some_and(|s| s.total_damage > 0));
        assert!(temp.path().join("0").join(artifact::RESULT_FILE).exists());
        assert!(temp.path().join("0").join(artifact::LOG_FILE).exists());
    }

    #[test]
    fn test_panic_becomes_failure() {
        let temp = tempfile::tempdir().expect("temp dir");
        let ctx = context(temp.path(), Arc::new(panicking));

        let report = write_task(&ctx, run_task(&ctx, task(1)));
        match &report.outcome {
            Err(WorkerError::Panicked { sim_id, message }) => {
                assert_eq!(*sim_id, SimId::new(1));
                assert_eq!(message, "kit table corrupted");
            },
            other => panic!("expected a panic report, got {other:?}"),
        }
        assert!(!temp.path().join("1").exists(), "failures are written by the collector");

        let result = report.into_result();
        assert_eq!(result.status, SimStatus::Failure);
        assert_eq!(result.seed, 1);
        assert!(result
            .error
            .as_deref()
            .is_some_and(|e| e.contains("kit table corrupted")));
    }

    #[test]
    fn test_unwritable_artifact_is_worker_error() {
        let temp = tempfile::tempdir().expect("temp dir");
        let blocker = temp.path().join("blocker");
        std::fs::write(&blocker, "not a directory").expect("write");
        let ctx = context(
            &blocker,
            default_executor(Arc::new(KitRegistry::with_defaults())),
        );

        let report = write_task(&ctx, run_task(&ctx, task(3)));
        assert!(matches!(
            report.outcome,
            Err(WorkerError::Artifact { sim_id, .. }) if sim_id == SimId::new(3)
        ));
    }

    #[test]
    fn test_abandoned_worker_gives_up_its_seat() {
        let temp = tempfile::tempdir().expect("temp dir");
        let ctx = Arc::new(context(
            temp.path(),
            default_executor(Arc::new(KitRegistry::with_defaults())),
        ));
        let (task_tx, task_rx) = crossbeam_channel::unbounded();
        let (result_tx, result_rx) = crossbeam_channel::unbounded();
        for id in 0..3 {
            task_tx.send(task(id)).expect("queued");
        }
        drop(task_tx);

        // Mark the first task abandoned before the worker reports it
        ctx.in_flight.lock().abandoned.insert(SimId::new(0));
        let worker = spawn_worker(0, Arc::clone(&ctx), task_rx.clone(), result_tx)
            .expect("spawned");
        worker.join().expect("worker exits cleanly");

        assert!(result_rx.try_recv().is_err(), "late result is dropped");
        assert_eq!(task_rx.len(), 2, "remaining tasks are left for the replacement");
    }

    #[test]
    fn test_timeout_error_becomes_timeout() {
        let temp = tempfile::tempdir().expect("temp dir");
        let ctx = context(temp.path(), Arc::new(timing_out));
        let result = run_task(&ctx, task(2)).outcome.expect("timeouts are results").result;
        assert_eq!(result.status, SimStatus::Timeout);
    }

    #[test]
    fn test_in_flight_abandons_expired() {
        let mut table = InFlight::default();
        table.begin(SimId::new(0));
        table.begin(SimId::new(1));

        let later = Instant::now() + Duration::from_secs(10);
        let expired = table.abandon_expired(Duration::from_secs(5), later);
        assert_eq!(expired.len(), 2);
        assert!(table.is_empty());

        assert!(!table.finish(SimId::new(0)), "late result is discarded");
        table.begin(SimId::new(2));
        assert!(table.finish(SimId::new(2)));
    }
}
