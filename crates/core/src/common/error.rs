//! Error type for the stats core.
//!
//! Construction and file-backed operations report through [`StatsError`];
//! everything on the hot accounting path is infallible. Open failures on
//! optional sinks (miss dump, addr2line table) are downgraded by the callers
//! rather than propagated, per the degraded-but-live policy.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the stats core.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("block size {0} is not a power of two")]
    BlockSizeNotPowerOfTwo(u64),

    #[error("failed to open {}: {source}", .path.display())]
    IoOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV header is missing required column `{0}`")]
    CsvMissingColumn(&'static str),

    #[error("CSV row {line}: failed to parse `{field}` from \"{value}\"")]
    CsvParse {
        line: usize,
        field: &'static str,
        value: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
