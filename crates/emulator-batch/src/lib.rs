//! # Emulator Batch
//!
//! Runs many independent emulations of the same input in parallel.
//!
//! This crate provides:
//! - Batch requests (pool size, run count, seeds, timeout, output dir)
//! - A fixed worker pool fed over a crossbeam channel
//! - Panic capture and a watchdog for stuck runs
//! - Per-run `result.json` artifacts and a batch `summary.json`
//! - DPS statistics across runs

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod artifact;
pub mod error;
pub mod request;
pub mod result;
pub mod runner;
pub mod worker;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::artifact::*;
    pub use crate::error::*;
    pub use crate::request::*;
    pub use crate::result::*;
    pub use crate::runner::*;
    pub use crate::worker::*;
}

pub use prelude::*;
