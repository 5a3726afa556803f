//! Error types for the emulator.
//!
//! Only [`ConfigError`] is fatal to a run. [`ActionError`] and
//! [`ResourceError`] reject a single action and the run carries on;
//! [`WorkerError`] fails one batch task without touching its siblings.

use thiserror::Error;

use crate::{ActionKind, Frame, SimId};

/// Malformed or incomplete team, action, target or settings data.
///
/// Detected before the first frame is simulated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Team does not have the fixed number of slots
    #[error("team must have exactly {expected} slots, got {actual}")]
    TeamSize {
        /// Required slot count
        expected: usize,
        /// Slot count found
        actual: usize,
    },

    /// Every slot is unconfigured
    #[error("team has no configured characters")]
    EmptyTeam,

    /// Two configured slots share a name
    #[error("duplicate character name: {0}")]
    DuplicateCharacter(String),

    /// A character record failed validation
    #[error("invalid character {name}: {reason}")]
    InvalidCharacter {
        /// Character name
        name: String,
        /// What was wrong
        reason: String,
    },

    /// Character references a kit that is not registered
    #[error("character {character} uses unknown kit {kit}")]
    UnknownKit {
        /// Character name
        character: String,
        /// Kit name
        kit: String,
    },

    /// The action sequence is empty
    #[error("action sequence is empty")]
    EmptyActions,

    /// An action entry failed validation
    #[error("invalid action #{index}: {reason}")]
    InvalidAction {
        /// Position in the sequence
        index: usize,
        /// What was wrong
        reason: String,
    },

    /// Target data failed validation
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// Simulation settings failed validation
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Input document could not be parsed
    #[error("failed to parse {document}: {message}")]
    Parse {
        /// Which document (team, actions, target)
        document: &'static str,
        /// Parser message
        message: String,
    },
}

/// An action that cannot execute at the frame it reached the queue head.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// No team slot carries this name
    #[error("character {0} is not on the team")]
    UnknownCharacter(String),

    /// The slot exists but is unconfigured
    #[error("character slot {0} is unconfigured")]
    UnconfiguredCharacter(String),

    /// The character's kit has no motion data for this action
    #[error("{character} cannot perform {action}")]
    NotUnlocked {
        /// Character name
        character: String,
        /// Requested action
        action: ActionKind,
    },
}

/// An action rejected for lack of a resource.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResourceError {
    /// Burst requested without full energy
    #[error("{character} has {current:.1}/{required:.1} energy")]
    InsufficientEnergy {
        /// Character name
        character: String,
        /// Energy held
        current: f64,
        /// Energy required
        required: f64,
    },

    /// Elemental skill still cooling down
    #[error("{character} skill on cooldown for {remaining} more frames")]
    SkillOnCooldown {
        /// Character name
        character: String,
        /// Frames left
        remaining: Frame,
    },

    /// Elemental burst still cooling down
    #[error("{character} burst on cooldown for {remaining} more frames")]
    BurstOnCooldown {
        /// Character name
        character: String,
        /// Frames left
        remaining: Frame,
    },
}

/// Failure of one batch task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerError {
    /// The run panicked
    #[error("simulation {sim_id} panicked: {message}")]
    Panicked {
        /// Task identifier
        sim_id: SimId,
        /// Panic payload, if it was a string
        message: String,
    },

    /// The run returned an error
    #[error("simulation {sim_id} failed: {message}")]
    Failed {
        /// Task identifier
        sim_id: SimId,
        /// Error message
        message: String,
    },

    /// Writing the run's artifacts failed
    #[error("simulation {sim_id} could not write artifacts: {message}")]
    Artifact {
        /// Task identifier
        sim_id: SimId,
        /// I/O or serialization message
        message: String,
    },

    /// Every worker exited before the task reported back
    #[error("simulation {sim_id} lost: no worker left to run it")]
    Lost {
        /// Task identifier
        sim_id: SimId,
    },
}

impl WorkerError {
    /// Returns the failed task.
    #[must_use]
    pub const fn sim_id(&self) -> SimId {
        match self {
            Self::Panicked { sim_id, .. }
            | Self::Failed { sim_id, .. }
            | Self::Artifact { sim_id, .. }
            | Self::Lost { sim_id } => *sim_id,
        }
    }
}

/// Run-level failure of a single emulation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EmulationError {
    /// Inputs were rejected before the run started
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The run passed its deadline
    #[error("emulation timed out at frame {frame} after {elapsed_ms} ms")]
    Timeout {
        /// Frame reached when the deadline passed
        frame: Frame,
        /// Wall time spent
        elapsed_ms: u64,
    },

    /// A frame was recorded out of order
    #[error("frame {frame} recorded after frame {last}")]
    OutOfOrderFrame {
        /// Frame being recorded
        frame: Frame,
        /// Last recorded frame
        last: Frame,
    },
}

/// Result type alias for configuration checks.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type alias for emulation runs.
pub type EmulationResult<T> = Result<T, EmulationError>;
