//! Emulator configuration.
//!
//! Provides defaults for simulation, batch and output settings. The
//! configuration is a TOML file; command-line flags override it.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use emulator_common::FRAMES_PER_SECOND;
use emulator_core::config::SimulationSettings;
use emulator_core::damage::{CritMode, ResistanceModel};

/// Configuration file name.
const CONFIG_FILE: &str = "emulator.toml";

/// Emulator configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    // === Simulation Settings ===
    /// How crits are decided
    pub crit_mode: CritMode,
    /// Crit RNG seed
    pub seed: u64,
    /// Resistance formula
    pub resistance_model: ResistanceModel,
    /// Frame bound of a single run
    pub max_frames: u32,
    /// Frames between progress updates
    pub progress_interval: u32,
    /// Frames between character swaps
    pub swap_cooldown: u32,
    /// Frames between a skill hit and its particles arriving
    pub particle_delay: u32,

    // === Batch Settings ===
    /// Worker threads
    pub pool_size: usize,
    /// Runs per batch
    pub run_count: u32,
    /// Per-run timeout in seconds (0 = none)
    pub task_timeout_secs: u64,
    /// Root directory for batch artifacts
    pub output_dir: PathBuf,
    /// Write a frame log for every batch run
    pub batch_logs: bool,

    // === Data ===
    /// Directory of extra TOML motion kits
    pub kit_dir: Option<PathBuf>,

    // === Output ===
    /// Frame log path of a single run
    pub log_path: PathBuf,
    /// Emit progress events on stdout
    pub print_progress: bool,
    /// Log as JSON lines instead of text
    pub json_logs: bool,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        let settings = SimulationSettings::default();
        Self {
            // Simulation
            crit_mode: settings.crit_mode,
            seed: settings.seed,
            resistance_model: settings.resistance_model,
            max_frames: settings.max_frames,
            progress_interval: settings.progress_interval,
            swap_cooldown: settings.swap_cooldown,
            particle_delay: settings.particle_delay,

            // Batch
            pool_size: 4,
            run_count: 100,
            task_timeout_secs: 30,
            output_dir: PathBuf::from("batch_output"),
            batch_logs: false,

            // Data
            kit_dir: None,

            // Output
            log_path: PathBuf::from("emulation_log.json"),
            print_progress: false,
            json_logs: false,
        }
    }
}

impl EmulatorConfig {
    /// Load configuration from the default file location.
    /// Returns default config if file doesn't exist.
    pub fn load() -> Self {
        Self::load_from(Self::config_path())
    }

    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Failed to read config file: {e}");
                return Self::default();
            },
        };

        match toml::from_str(&contents) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            },
            Err(e) => {
                warn!("Failed to parse config file: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, contents)?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn config_path() -> PathBuf {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
            .map_or_else(
                || PathBuf::from(CONFIG_FILE),
                |dir| dir.join("emulator").join(CONFIG_FILE),
            )
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        // Simulation
        self.max_frames = self
            .max_frames
            .clamp(FRAMES_PER_SECOND, 3600 * FRAMES_PER_SECOND);
        self.progress_interval = self.progress_interval.clamp(1, self.max_frames);
        self.swap_cooldown = self.swap_cooldown.min(10 * FRAMES_PER_SECOND);
        self.particle_delay = self.particle_delay.min(10 * FRAMES_PER_SECOND);

        // Batch
        self.pool_size = self.pool_size.clamp(1, emulator_batch::MAX_POOL_SIZE);
        self.run_count = self.run_count.clamp(1, 1_000_000);
        self.task_timeout_secs = self.task_timeout_secs.min(86_400);
    }

    /// Returns the simulation settings described by this config.
    #[must_use]
    pub fn settings(&self) -> SimulationSettings {
        SimulationSettings {
            crit_mode: self.crit_mode,
            seed: self.seed,
            resistance_model: self.resistance_model,
            max_frames: self.max_frames,
            progress_interval: self.progress_interval,
            swap_cooldown: self.swap_cooldown,
            particle_delay: self.particle_delay,
        }
    }

    /// Returns the per-run timeout, if any.
    #[must_use]
    pub fn task_timeout(&self) -> Option<Duration> {
        (self.task_timeout_secs > 0).then(|| Duration::from_secs(self.task_timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = EmulatorConfig::default();
        assert_eq!(config.crit_mode, CritMode::Expected);
        assert_eq!(config.max_frames, 36_000);
        assert_eq!(config.pool_size, 4);
        assert_eq!(config.settings(), SimulationSettings::default());
    }

    #[test]
    fn test_config_validation() {
        let mut config = EmulatorConfig::default();

        config.max_frames = 1;
        config.progress_interval = 0;
        config.pool_size = 0;
        config.run_count = 0;

        config.validate();

        assert_eq!(config.max_frames, FRAMES_PER_SECOND);
        assert_eq!(config.progress_interval, 1);
        assert_eq!(config.pool_size, 1);
        assert_eq!(config.run_count, 1);
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("nested").join("emulator.toml");

        let mut config = EmulatorConfig::default();
        config.crit_mode = CritMode::Stochastic;
        config.seed = 12345;
        config.kit_dir = Some(PathBuf::from("kits"));

        config.save_to(&config_path).expect("Failed to save config");

        let loaded = EmulatorConfig::load_from(&config_path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_load_missing_file() {
        let config = EmulatorConfig::load_from("/nonexistent/path/emulator.toml");
        assert_eq!(config, EmulatorConfig::default());
    }

    #[test]
    fn test_config_load_partial_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("emulator.toml");
        fs::write(&config_path, "seed = 7\nrun_count = 10\n").expect("write");

        let config = EmulatorConfig::load_from(&config_path);
        assert_eq!(config.seed, 7);
        assert_eq!(config.run_count, 10);
        assert_eq!(config.pool_size, 4);
    }

    #[test]
    fn test_config_load_invalid_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("emulator.toml");
        fs::write(&config_path, "seed = \"not a number\"").expect("write");

        assert_eq!(EmulatorConfig::load_from(&config_path), EmulatorConfig::default());
    }

    #[test]
    fn test_task_timeout() {
        let mut config = EmulatorConfig::default();
        assert_eq!(config.task_timeout(), Some(Duration::from_secs(30)));
        config.task_timeout_secs = 0;
        assert_eq!(config.task_timeout(), None);
    }
}
