//! Configuration for the stats engine and the analysis tools.
//!
//! This module defines the configuration structures used to parameterize the
//! stats core. It provides:
//! 1. **Defaults:** Baseline constants (line size, sampling interval, report
//!    depth).
//! 2. **Structures:** Per-device stats knobs plus the two standalone tool
//!    configs.
//!
//! Configuration is supplied as JSON by the host simulator, or use the
//! `Default` impls directly.

use std::path::PathBuf;

use serde::Deserialize;

/// Default configuration constants.
mod defaults {
    /// Default cache line size in bytes.
    ///
    /// Matches typical modern processor cache line sizes.
    pub const LINE_SIZE: u64 = 64;

    /// Default working-set sampling window, in instructions.
    pub const WORKING_SET_RESET_INTERVAL: u64 = 100_000_000;

    /// Default number of histogram entries reported.
    pub const REPORT_TOP: usize = 10;
}

/// Per-device stats engine configuration.
///
/// One instance parameterizes one [`CacheStats`](crate::engine::CacheStats).
/// Optional paths left as `None` disable the corresponding capability.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceStatsConfig {
    /// Cache line size in bytes; must be a power of two.
    #[serde(default = "DeviceStatsConfig::default_line_size")]
    pub line_size: u64,

    /// Dump one CSV row per miss to this file. `None` disables dumping.
    #[serde(default)]
    pub miss_file: Option<PathBuf>,

    /// Side-car CSV mapping addresses to source lines, used to symbolize the
    /// miss histogram. Loaded lazily on first report.
    #[serde(default)]
    pub addr2line_file: Option<PathBuf>,

    /// Report the warmup snapshot block (set when a warmup reset is driven).
    #[serde(default)]
    pub warmup_enabled: bool,

    /// This device participates in coherence; splits the invalidation report
    /// into parent and write invalidations.
    #[serde(default)]
    pub coherent: bool,

    /// Record a per-PC histogram of data-reference misses.
    #[serde(default)]
    pub record_miss_pcs: bool,

    /// Sample the working-set size of this device.
    #[serde(default)]
    pub record_working_set: bool,

    /// Number of entries rendered from the miss histogram.
    #[serde(default = "DeviceStatsConfig::default_report_top")]
    pub report_top: usize,
}

impl DeviceStatsConfig {
    fn default_line_size() -> u64 {
        defaults::LINE_SIZE
    }

    fn default_report_top() -> usize {
        defaults::REPORT_TOP
    }
}

impl Default for DeviceStatsConfig {
    fn default() -> Self {
        Self {
            line_size: defaults::LINE_SIZE,
            miss_file: None,
            addr2line_file: None,
            warmup_enabled: false,
            coherent: false,
            record_miss_pcs: false,
            record_working_set: false,
            report_top: defaults::REPORT_TOP,
        }
    }
}

/// Standalone working-set tool configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkingSetConfig {
    /// Cache line size in bytes; must be a power of two.
    #[serde(default = "WorkingSetConfig::default_line_size")]
    pub line_size: u64,

    /// Flush the sampling window every this many instructions.
    #[serde(default = "WorkingSetConfig::default_reset_interval")]
    pub reset_interval: u64,
}

impl WorkingSetConfig {
    fn default_line_size() -> u64 {
        defaults::LINE_SIZE
    }

    fn default_reset_interval() -> u64 {
        defaults::WORKING_SET_RESET_INTERVAL
    }
}

impl Default for WorkingSetConfig {
    fn default() -> Self {
        Self {
            line_size: defaults::LINE_SIZE,
            reset_interval: defaults::WORKING_SET_RESET_INTERVAL,
        }
    }
}

/// Instruction-count tool configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct InstrCountConfig {
    /// Side-car CSV mapping addresses to source lines. `None` reports raw
    /// addresses only.
    #[serde(default)]
    pub addr2line_file: Option<PathBuf>,

    /// Write `instr_counts.csv` into this directory at report time.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Number of top instruction addresses reported.
    #[serde(default = "InstrCountConfig::default_report_top")]
    pub report_top: usize,
}

impl InstrCountConfig {
    fn default_report_top() -> usize {
        defaults::REPORT_TOP
    }
}

impl Default for InstrCountConfig {
    fn default() -> Self {
        Self {
            addr2line_file: None,
            output_dir: None,
            report_top: defaults::REPORT_TOP,
        }
    }
}
