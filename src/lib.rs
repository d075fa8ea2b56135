//! Parallel per-key counting over large tab-separated files.
//!
//! A file is cut into line-aligned byte ranges ([`chunk`]), each range is
//! counted on its own worker thread ([`worker`]), and the partial
//! [`Tally`]s are summed into one ([`tally::reduce`]). [`run()`] ties it
//! together and reports progress while the workers run.

pub mod chunk;
pub mod config;
pub mod error;
pub mod logging;
pub mod progress;
pub mod run;
pub mod tally;
pub mod timing;
pub mod worker;

pub use chunk::{plan_chunks, ChunkPlan, FileChunk};
pub use config::{Cli, CountConfig};
pub use error::{CountError, ParseFailure, Result};
pub use run::{run, RunSummary};
pub use tally::Tally;
