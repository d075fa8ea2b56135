//! Error types for planning, counting and orchestration.

use std::io;
use std::num::ParseIntError;
use std::path::PathBuf;
use std::str::Utf8Error;

use thiserror::Error;

use crate::chunk::FileChunk;

pub type Result<T, E = CountError> = std::result::Result<T, E>;

/// Everything that can abort a counting run.
///
/// A run never recovers from any of these: the first error reaching the
/// orchestrator ends the run and every partial tally is discarded.
#[derive(Error, Debug)]
pub enum CountError {
    #[error("cannot plan chunks for {}: {source}", path.display())]
    Planning {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot read chunk {chunk} of {}: {source}", path.display())]
    Read {
        path: PathBuf,
        chunk: FileChunk,
        #[source]
        source: io::Error,
    },

    #[error("malformed line at byte {offset} of {}: {failure}", path.display())]
    Parse {
        path: PathBuf,
        offset: u64,
        #[source]
        failure: ParseFailure,
    },

    #[error("chunk {chunk} is not line-aligned at byte {offset}")]
    Misaligned { chunk: FileChunk, offset: u64 },

    #[error("total for key {key:?} does not fit in 64 bits")]
    Overflow { key: String },

    #[error("worker for chunk {chunk} exited without a result")]
    WorkerLost { chunk: FileChunk },

    #[error("cannot start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Why a single line could not be turned into a `(key, count)` pair.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    #[error("expected 4 tab-separated fields, found {found}")]
    FieldCount { found: usize },

    #[error("count field {value:?} is not a non-negative integer")]
    Count {
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("key is not valid UTF-8")]
    Key(#[source] Utf8Error),
}
