//! ID types for characters, targets and simulation runs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Team slot of a character (0-3).
///
/// Slots are stable for the whole run, so the id doubles as an index into
/// the team.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CharacterId(u8);

impl CharacterId {
    /// Creates a character ID from a slot index.
    #[must_use]
    pub const fn new(slot: u8) -> Self {
        Self(slot)
    }

    /// Returns the slot index.
    #[must_use]
    pub const fn slot(self) -> usize {
        self.0 as usize
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for CharacterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "slot{}", self.0)
    }
}

/// Identifier for an enemy target.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TargetId(u16);

impl TargetId {
    /// Creates a target ID from a raw value.
    #[must_use]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// The single target every run fights.
    pub const PRIMARY: Self = Self(0);
}

/// Identifier of one run inside a batch.
///
/// Batch runs are numbered `0..run_count`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SimId(u32);

impl SimId {
    /// Creates a sim ID from a raw value.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for SimId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier of a batch, used as its artifact directory name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchUid(Uuid);

impl BatchUid {
    /// Creates a new random batch UID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BatchUid {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BatchUid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}
