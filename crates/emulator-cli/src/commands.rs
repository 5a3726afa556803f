//! Subcommands.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{debug, info, warn};

use emulator_batch::{spawn_batch, BatchRequest, BatchRunner};
use emulator_core::background::spawn_emulation;
use emulator_core::config::EmulationInput;
use emulator_core::damage::CritMode;
use emulator_core::motion::KitRegistry;
use emulator_core::progress::ProgressEvent;
use emulator_core::scheduler::Emulation;

use crate::config::EmulatorConfig;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Crit handling selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CritArg {
    /// Every hit deals its expected value
    Expected,
    /// Crits are rolled from the seeded RNG
    Stochastic,
}

impl From<CritArg> for CritMode {
    fn from(arg: CritArg) -> Self {
        match arg {
            CritArg::Expected => Self::Expected,
            CritArg::Stochastic => Self::Stochastic,
        }
    }
}

/// The three JSON input documents.
#[derive(Parser, Debug)]
pub struct InputArgs {
    /// Team document (4 slots)
    #[arg(long)]
    pub team: PathBuf,

    /// Action sequence document
    #[arg(long)]
    pub actions: PathBuf,

    /// Target document
    #[arg(long)]
    pub target: PathBuf,

    /// Directory of extra TOML motion kits
    #[arg(long)]
    pub kits: Option<PathBuf>,
}

impl InputArgs {
    fn load(&self, config: &EmulatorConfig) -> Result<(EmulationInput, KitRegistry)> {
        let read = |path: &Path| {
            fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
        };
        let input = EmulationInput::from_json_documents(
            &read(&self.team)?,
            &read(&self.actions)?,
            &read(&self.target)?,
            config.settings(),
        )?;
        let kits = load_kits(self.kits.as_deref().or(config.kit_dir.as_deref()))?;
        Ok((input, kits))
    }
}

fn load_kits(dir: Option<&Path>) -> Result<KitRegistry> {
    let mut kits = KitRegistry::with_defaults();
    if let Some(dir) = dir {
        let count = kits
            .load_dir(dir)
            .with_context(|| format!("Failed to load kits from {}", dir.display()))?;
        info!("Loaded {} kits from {}", count, dir.display());
    }
    Ok(kits)
}

fn report(event: &ProgressEvent, print: bool) {
    if print {
        println!("{}", event.to_wire());
    } else if let ProgressEvent::Update(progress) = event {
        debug!("{} ({:.0}%)", progress.msg, progress.fraction() * 100.0);
    }
}

// ============================================================================
// Run
// ============================================================================

/// Run a single emulation and write its frame log
#[derive(Parser, Debug)]
pub struct Run {
    #[command(flatten)]
    pub input: InputArgs,

    /// Crit handling
    #[arg(long, value_enum)]
    pub crit: Option<CritArg>,

    /// Crit RNG seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Frame log output path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print progress events as JSON lines
    #[arg(long)]
    pub progress: bool,
}

impl Run {
    pub fn execute(self, mut config: EmulatorConfig) -> Result<()> {
        if let Some(crit) = self.crit {
            config.crit_mode = crit.into();
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        let (input, kits) = self.input.load(&config)?;
        let emulation = Emulation::new(input, &kits)?;

        let handle = spawn_emulation(emulation);
        let print = self.progress || config.print_progress;
        loop {
            match handle.next_event(POLL_INTERVAL) {
                Some(event) => {
                    report(&event, print);
                    if event.is_done() {
                        break;
                    }
                }
                None if handle.is_finished() => break,
                None => {}
            }
        }
        let output = handle.wait()?;

        for skipped in &output.skipped {
            warn!(
                "Skipped action #{} at frame {}: {}",
                skipped.index, skipped.frame, skipped.reason
            );
        }
        let path = self.output.unwrap_or(config.log_path);
        output
            .log
            .write_json(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Frame log written to {}", path.display());

        println!("{}", serde_json::to_string_pretty(&output.summary)?);
        Ok(())
    }
}

// ============================================================================
// Batch
// ============================================================================

/// Run many seeded emulations in parallel
#[derive(Parser, Debug)]
pub struct Batch {
    #[command(flatten)]
    pub input: InputArgs,

    /// Number of runs
    #[arg(short = 'n', long)]
    pub runs: Option<u32>,

    /// Worker threads
    #[arg(short, long)]
    pub pool: Option<usize>,

    /// Per-run timeout in seconds (0 = none)
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Seed of run 0
    #[arg(long)]
    pub seed: Option<u64>,

    /// Crit handling (stochastic unless given)
    #[arg(long, value_enum, default_value = "stochastic")]
    pub crit: CritArg,

    /// Artifact root directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Also write every run's frame log
    #[arg(long)]
    pub logs: bool,

    /// Print progress events as JSON lines
    #[arg(long)]
    pub progress: bool,
}

impl Batch {
    pub fn execute(self, mut config: EmulatorConfig) -> Result<()> {
        if let Some(runs) = self.runs {
            config.run_count = runs;
        }
        if let Some(pool) = self.pool {
            config.pool_size = pool;
        }
        if let Some(timeout) = self.timeout_secs {
            config.task_timeout_secs = timeout;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        config.validate();

        let (input, kits) = self.input.load(&config)?;
        let mut request = BatchRequest::new(input, &config.output_dir)
            .with_pool_size(config.pool_size)
            .with_run_count(config.run_count)
            .with_base_seed(config.seed)
            .with_crit_mode(self.crit.into())
            .with_logs(self.logs || config.batch_logs);
        request.per_task_timeout = config.task_timeout();

        let handle = spawn_batch(BatchRunner::new(kits), request);
        let print = self.progress || config.print_progress;
        while let Some(event) = handle.next_event(Duration::from_secs(3600)) {
            report(&event, print);
            if event.is_done() {
                break;
            }
        }
        let report = handle.wait()?;

        info!("Artifacts written to {}", report.dir.display());
        println!("{}", serde_json::to_string_pretty(&report.summary)?);
        Ok(())
    }
}

// ============================================================================
// Kits / Config
// ============================================================================

/// List available motion kits
#[derive(Parser, Debug)]
pub struct Kits {
    /// Directory of extra TOML motion kits
    #[arg(long)]
    pub kits: Option<PathBuf>,
}

impl Kits {
    pub fn execute(self, config: &EmulatorConfig) -> Result<()> {
        let kits = load_kits(self.kits.as_deref().or(config.kit_dir.as_deref()))?;
        for name in kits.names() {
            println!("{name}");
        }
        Ok(())
    }
}

/// Write the effective configuration to a TOML file
#[derive(Parser, Debug)]
pub struct InitConfig {
    /// Destination (defaults to the user config path)
    pub path: Option<PathBuf>,
}

impl InitConfig {
    pub fn execute(self, config: &EmulatorConfig) -> Result<()> {
        let path = self.path.unwrap_or_else(EmulatorConfig::config_path);
        config
            .save_to(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("{}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[derive(Parser, Debug)]
    struct Harness {
        #[command(flatten)]
        input: InputArgs,
    }

    fn write_inputs(dir: &Path) -> InputArgs {
        let team = r#"[
            {"slot": "character", "name": "Yoimiya", "element": "pyro", "weapon_type": "bow"},
            {"slot": "unconfigured", "reason": "empty"},
            {"slot": "unconfigured", "reason": "empty"},
            {"slot": "unconfigured", "reason": "empty"}
        ]"#;
        let actions = r#"[{"character": "Yoimiya", "action": "skill"}]"#;
        let target = r#"{"level": 90, "resists": {}}"#;
        fs::write(dir.join("team.json"), team).expect("write");
        fs::write(dir.join("actions.json"), actions).expect("write");
        fs::write(dir.join("target.json"), target).expect("write");
        InputArgs {
            team: dir.join("team.json"),
            actions: dir.join("actions.json"),
            target: dir.join("target.json"),
            kits: None,
        }
    }

    #[test]
    fn test_input_args_parse() {
        Harness::command().debug_assert();
        let parsed = Harness::try_parse_from([
            "test", "--team", "t.json", "--actions", "a.json", "--target", "x.json",
        ])
        .expect("parses");
        assert_eq!(parsed.input.team, PathBuf::from("t.json"));
        assert!(parsed.input.kits.is_none());
    }

    #[test]
    fn test_inputs_load_from_files() {
        let temp = tempfile::tempdir().expect("temp dir");
        let args = write_inputs(temp.path());
        let (input, kits) = args.load(&EmulatorConfig::default()).expect("loads");
        assert_eq!(input.team.len(), 4);
        assert!(kits.contains("bow"));
    }

    #[test]
    fn test_missing_file_names_path() {
        let temp = tempfile::tempdir().expect("temp dir");
        let mut args = write_inputs(temp.path());
        args.team = temp.path().join("missing.json");
        let err = args
            .load(&EmulatorConfig::default())
            .expect_err("missing file");
        assert!(err.to_string().contains("missing.json"));
    }

    #[test]
    fn test_run_writes_log() {
        let temp = tempfile::tempdir().expect("temp dir");
        let log = temp.path().join("log.json");
        let run = Run {
            input: write_inputs(temp.path()),
            crit: Some(CritArg::Expected),
            seed: None,
            output: Some(log.clone()),
            progress: false,
        };
        run.execute(EmulatorConfig::default()).expect("runs");
        let text = fs::read_to_string(log).expect("log written");
        assert!(text.contains("\"damage\""));
    }

    #[test]
    fn test_batch_writes_summary() {
        let temp = tempfile::tempdir().expect("temp dir");
        let out = temp.path().join("out");
        let batch = Batch {
            input: write_inputs(temp.path()),
            runs: Some(3),
            pool: Some(2),
            timeout_secs: Some(0),
            seed: Some(5),
            crit: CritArg::Stochastic,
            output_dir: Some(out.clone()),
            logs: false,
            progress: false,
        };
        batch.execute(EmulatorConfig::default()).expect("runs");

        let batch_dirs: Vec<_> = fs::read_dir(&out).expect("output dir").collect();
        assert_eq!(batch_dirs.len(), 1);
        let dir = batch_dirs[0].as_ref().expect("entry").path();
        assert!(dir.join("summary.json").exists());
        assert!(dir.join("2").join("result.json").exists());
    }
}
