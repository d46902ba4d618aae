//! Common types shared across the stats core.

/// Error types for construction and file-backed operations.
pub mod error;
/// Memory reference record and classification predicates.
pub mod memref;

pub use error::StatsError;
pub use memref::{Addr, MemRef, RefKind};
