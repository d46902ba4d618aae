//! Statistics and accounting core for an offline memory-reference cache
//! simulator.
//!
//! The host simulator routes each memory reference through a hierarchy of
//! caching devices; this crate holds the per-device accounting and the
//! trace-wide analysis tools. It implements the following:
//! 1. **Engine:** Per-cache hit/miss/compulsory/invalidation counters with
//!    warmup snapshots, miss dumping, and formatted reporting.
//! 2. **First-touch detection:** A coalescing block-interval set answering
//!    "was this address ever observed" in logarithmic time.
//! 3. **Working set:** Periodic sampling of distinct lines touched, in-cache
//!    and as a standalone trace tool.
//! 4. **Instruction counting:** A sharded, reducible trace-wide top-K
//!    referenced-instruction report.
//! 5. **Symbolization:** A side-car CSV mapping addresses to source lines,
//!    enriching the histogram reports.

/// Common types (memory references, addresses, errors).
pub mod common;
/// Engine and tool configuration (serde-backed, JSON interchange).
pub mod config;
/// Per-device statistics engine and metric access.
pub mod engine;
/// Coalescing block-interval set (first-touch detector).
pub mod intervals;
/// Side-car CSV parsing and address-to-line symbolization.
pub mod symbols;
/// Partial top-K selection over address histograms.
pub mod topk;
/// Trace-wide analysis tools (instruction counting).
pub mod tools;
/// Working-set sampling, in-cache and standalone.
pub mod working_set;

/// One memory reference plus its classification.
pub use crate::common::memref::{Addr, MemRef, RefKind};
/// Error type shared by construction and file-backed operations.
pub use crate::common::error::StatsError;
/// Per-device stats engine; construct with `CacheStats::new`.
pub use crate::engine::{CacheStats, InvalidationKind, Metric};
