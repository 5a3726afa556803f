//! # Emulator Common
//!
//! Shared vocabulary for the emulator crates.
//!
//! This crate provides the types every other crate speaks in:
//! - Frame time base
//! - ID types (CharacterId, TargetId, SimId, BatchUid)
//! - Elements and action kinds
//! - Error types for configuration, actions, resources and workers
//! - Schema versions for written artifacts

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod element;
pub mod error;
pub mod frame;
pub mod ids;
pub mod version;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::element::*;
    pub use crate::error::*;
    pub use crate::frame::*;
    pub use crate::ids::*;
    pub use crate::version::*;
}

pub use prelude::*;
