//! Versions of the documents the emulator writes and reads back.
//!
//! Every persisted document carries the [`SchemaVersion`] it was written
//! with. Readers accept any version with the same major number as the one
//! this build writes.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A persisted document kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Document {
    /// Frame log of one run (`character` and `damage` domains).
    FrameLog,
    /// Per-run `result.json` of a batch.
    RunArtifact,
    /// Batch `summary.json`.
    BatchSummary,
    /// TOML motion kit file.
    KitFile,
}

impl Document {
    /// Returns the version this build writes.
    #[must_use]
    pub const fn current(self) -> SchemaVersion {
        match self {
            Self::FrameLog | Self::RunArtifact | Self::BatchSummary | Self::KitFile => {
                SchemaVersion::new(1, 0, 0)
            },
        }
    }

    /// Returns a short name for messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::FrameLog => "frame log",
            Self::RunArtifact => "run artifact",
            Self::BatchSummary => "batch summary",
            Self::KitFile => "kit file",
        }
    }
}

/// A document version that cannot be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// Not of the form `major[.minor[.patch]]`
    #[error("malformed version '{0}'")]
    Malformed(String),

    /// Written by an incompatible build
    #[error("unsupported {} version {found} (this build reads {}.x)", .document.name(), .current.major)]
    Unsupported {
        /// Document being read
        document: Document,
        /// Version found in the document
        found: SchemaVersion,
        /// Version this build writes
        current: SchemaVersion,
    },
}

/// Document schema version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Incremented on breaking layout changes
    pub major: u16,
    /// Incremented when fields are added
    pub minor: u16,
    /// Incremented on fixes that keep the layout
    pub patch: u16,
}

impl SchemaVersion {
    /// Creates a version.
    #[must_use]
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Checks that a document of `document` kind written with this version
    /// can be read by this build.
    pub fn ensure_readable(self, document: Document) -> Result<(), VersionError> {
        let current = document.current();
        if self.major == current.major {
            Ok(())
        } else {
            Err(VersionError::Unsupported {
                document,
                found: self,
                current,
            })
        }
    }
}

impl FromStr for SchemaVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || VersionError::Malformed(s.to_string());
        let mut parts = s.trim().split('.');
        let mut next = |required: bool| match parts.next() {
            Some(part) => part.parse::<u16>().map_err(|_| malformed()),
            None if required => Err(malformed()),
            None => Ok(0),
        };
        let version = Self::new(next(true)?, next(false)?, next(false)?);
        if parts.next().is_some() {
            return Err(malformed());
        }
        Ok(version)
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_versions() {
        assert_eq!("1.2.3".parse(), Ok(SchemaVersion::new(1, 2, 3)));
        assert_eq!("2".parse(), Ok(SchemaVersion::new(2, 0, 0)));
        assert_eq!(" 1.4 ".parse(), Ok(SchemaVersion::new(1, 4, 0)));
        assert!(matches!(
            "1.x".parse::<SchemaVersion>(),
            Err(VersionError::Malformed(_))
        ));
        assert!("1.0.0.0".parse::<SchemaVersion>().is_err());
        assert!("".parse::<SchemaVersion>().is_err());
    }

    #[test]
    fn test_newer_minor_is_readable() {
        let newer = SchemaVersion::new(1, 7, 2);
        assert_eq!(newer.ensure_readable(Document::RunArtifact), Ok(()));
    }

    #[test]
    fn test_other_major_is_rejected() {
        let err = SchemaVersion::new(2, 0, 0)
            .ensure_readable(Document::KitFile)
            .expect_err("major mismatch");
        assert_eq!(err.to_string(), "unsupported kit file version 2.0.0 (this build reads 1.x)");
    }
}
