//! Trace-wide analysis tools.

/// Top referenced-instruction report with per-shard accumulation.
pub mod instr_count;

pub use instr_count::{InstrCountTool, ShardData, ShardHandle};
