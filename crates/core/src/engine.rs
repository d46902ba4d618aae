//! Per-device statistics engine.
//!
//! This module tracks accounting for one caching device. It provides:
//! 1. **Counters:** Hits, misses, compulsory (first-touch) misses, child
//!    hits, and invalidation counts, with warmup snapshot twins.
//! 2. **Miss dump:** One CSV row per miss appended to a configured sink.
//! 3. **Miss histogram:** Per-PC counts of data-reference misses with a
//!    symbolized top-K report.
//! 4. **Working set:** Periodic sampling of the distinct lines the device
//!    touched.
//! 5. **Reporting:** The formatted block consumed by downstream scripts.
//!
//! One engine instance is owned by one cache and accessed sequentially with
//! the reference stream feeding that cache; there is no internal locking.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use crate::common::error::StatsError;
use crate::common::memref::{Addr, MemRef};
use crate::config::DeviceStatsConfig;
use crate::intervals::IntervalSet;
use crate::symbols::Addr2LineTable;
use crate::topk::top_k;
use crate::working_set::WorkingSetSampler;

/// Invalidation event classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvalidationKind {
    /// Eviction forced by an inclusive parent.
    Inclusive,
    /// Invalidation caused by a write on another coherent device.
    Coherence,
}

/// Named counters exposed through [`CacheStats::get_metric`].
///
/// The enumeration is a stable external contract; names the engine does not
/// track read as zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Metric {
    Hits,
    Misses,
    HitsAtReset,
    MissesAtReset,
    CompulsoryMisses,
    ChildHits,
    ChildHitsAtReset,
    InclusiveInvalidates,
    CoherenceInvalidates,
    PrefetchHits,
    PrefetchMisses,
    Flushes,
}

/// Statistics engine for a single caching device.
pub struct CacheStats {
    success: bool,

    num_hits: u64,
    num_misses: u64,
    num_compulsory_misses: u64,
    num_child_hits: u64,
    num_inclusive_invalidates: u64,
    num_coherence_invalidates: u64,

    // Values captured by the last warmup reset.
    num_hits_at_reset: u64,
    num_misses_at_reset: u64,
    num_child_hits_at_reset: u64,

    warmup_enabled: bool,
    coherent: bool,
    record_miss_pcs: bool,
    report_top: usize,

    miss_hist: HashMap<Addr, u64>,
    touched: IntervalSet,
    working_set: Option<WorkingSetSampler<IntervalSet>>,

    dump: Option<BufWriter<File>>,
    addr2line_file: Option<PathBuf>,
    symbols: Option<Addr2LineTable>,
}

impl CacheStats {
    /// Creates an engine from its configuration.
    ///
    /// A miss-dump path that fails to open leaves the engine live but
    /// degraded: dumping is disabled and [`is_ok`](Self::is_ok) reports
    /// false.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::BlockSizeNotPowerOfTwo`] when the configured
    /// line size is not a power of two.
    pub fn new(config: &DeviceStatsConfig) -> Result<Self, StatsError> {
        let touched = IntervalSet::new(config.line_size)?;
        let working_set = if config.record_working_set {
            Some(WorkingSetSampler::new(
                config.line_size,
                IntervalSet::new(config.line_size)?,
            )?)
        } else {
            None
        };

        let mut success = true;
        let dump = match &config.miss_file {
            None => None,
            Some(path) => match File::create(path) {
                Ok(file) => Some(BufWriter::new(file)),
                Err(e) => {
                    log::warn!("failed to open miss dump {}: {e}; dumping disabled", path.display());
                    success = false;
                    None
                }
            },
        };

        Ok(Self {
            success,
            num_hits: 0,
            num_misses: 0,
            num_compulsory_misses: 0,
            num_child_hits: 0,
            num_inclusive_invalidates: 0,
            num_coherence_invalidates: 0,
            num_hits_at_reset: 0,
            num_misses_at_reset: 0,
            num_child_hits_at_reset: 0,
            warmup_enabled: config.warmup_enabled,
            coherent: config.coherent,
            record_miss_pcs: config.record_miss_pcs,
            report_top: config.report_top,
            miss_hist: HashMap::new(),
            touched,
            working_set,
            dump,
            addr2line_file: config.addr2line_file.clone(),
            symbols: None,
        })
    }

    /// False when an optional capability failed to come up at construction.
    pub fn is_ok(&self) -> bool {
        self.success
    }

    /// Records one access resolved by the owning cache.
    ///
    /// Misses feed the dump sink, the per-PC histogram (data references
    /// only) and the first-touch detector; every access feeds the working-set
    /// window when sampling is enabled.
    pub fn access(&mut self, memref: &MemRef, hit: bool) {
        if hit {
            self.num_hits += 1;
        } else {
            self.num_misses += 1;
            if self.dump.is_some() {
                self.dump_miss(memref);
            }
            if self.record_miss_pcs && !memref.kind.is_instr() {
                *self.miss_hist.entry(memref.pc).or_insert(0) += 1;
            }
            let (found, hint) = self.touched.lookup(memref.addr);
            if !found {
                self.num_compulsory_misses += 1;
                self.touched.insert(memref.addr, &hint);
            }
        }
        if let Some(ws) = self.working_set.as_mut() {
            ws.touch(memref.addr);
        }
    }

    /// Records an access served on behalf of a child device. Only hits count;
    /// the miss was already counted by [`access`](Self::access).
    pub fn child_access(&mut self, _memref: &MemRef, hit: bool) {
        if hit {
            self.num_child_hits += 1;
        }
    }

    /// Records an invalidation event.
    pub fn invalidate(&mut self, kind: InvalidationKind) {
        match kind {
            InvalidationKind::Inclusive => self.num_inclusive_invalidates += 1,
            InvalidationKind::Coherence => self.num_coherence_invalidates += 1,
        }
    }

    /// Warmup boundary: snapshots the live counters into their `*_at_reset`
    /// twins and zeros the live counters.
    ///
    /// The first-touch detector and the miss histogram survive the reset:
    /// compulsory misses are a trace-wide property, not a warmup property.
    pub fn reset(&mut self) {
        self.num_hits_at_reset = self.num_hits;
        self.num_misses_at_reset = self.num_misses;
        self.num_child_hits_at_reset = self.num_child_hits;
        self.num_hits = 0;
        self.num_misses = 0;
        self.num_compulsory_misses = 0;
        self.num_child_hits = 0;
        self.num_inclusive_invalidates = 0;
        self.num_coherence_invalidates = 0;
    }

    /// Closes the working-set window at `instr_count`, driven periodically by
    /// the host simulator. A no-op when sampling is disabled.
    pub fn flush_working_set(&mut self, instr_count: u64) {
        if let Some(ws) = self.working_set.as_mut() {
            ws.flush(instr_count);
        }
    }

    /// Reads a named counter. Names the engine does not track are reported
    /// and read as zero.
    pub fn get_metric(&self, metric: Metric) -> u64 {
        match metric {
            Metric::Hits => self.num_hits,
            Metric::Misses => self.num_misses,
            Metric::HitsAtReset => self.num_hits_at_reset,
            Metric::MissesAtReset => self.num_misses_at_reset,
            Metric::CompulsoryMisses => self.num_compulsory_misses,
            Metric::ChildHits => self.num_child_hits,
            Metric::ChildHitsAtReset => self.num_child_hits_at_reset,
            Metric::InclusiveInvalidates => self.num_inclusive_invalidates,
            Metric::CoherenceInvalidates => self.num_coherence_invalidates,
            Metric::PrefetchHits | Metric::PrefetchMisses | Metric::Flushes => {
                log::error!("metric {metric:?} is not tracked by this device");
                0
            }
        }
    }

    /// Number of coalesced intervals in the first-touch detector.
    pub fn touched_intervals(&self) -> Vec<(Addr, Addr)> {
        self.touched.intervals().collect()
    }

    fn dump_miss(&mut self, memref: &MemRef) {
        debug_assert!(
            memref.kind.is_instr() || memref.kind.is_data() || memref.kind.is_prefetch(),
            "miss dump for non-access kind {:?}",
            memref.kind
        );
        let pc = if memref.kind.is_instr() {
            memref.addr
        } else {
            memref.pc
        };
        if let Some(dump) = self.dump.as_mut() {
            if let Err(e) = writeln!(dump, "{:#x},{:#x}", pc, memref.addr) {
                log::warn!("miss dump write failed: {e}; dumping disabled");
                self.dump = None;
                self.success = false;
            }
        }
    }

    /// Renders the full report into `out`.
    ///
    /// Order: warmup snapshot (when enabled), counts, rates, child stats,
    /// miss histogram (when recorded), working-set history (when sampled).
    pub fn write_stats<W: Write>(
        &mut self,
        prefix: &str,
        instr_count: u64,
        out: &mut W,
    ) -> io::Result<()> {
        if self.warmup_enabled {
            self.write_warmup(prefix, out)?;
        }
        self.write_counts(prefix, out)?;
        self.write_rates(prefix, out)?;
        self.write_child_stats(prefix, out)?;
        if self.record_miss_pcs {
            self.write_miss_hist(prefix, out)?;
        }
        if self.working_set.is_some() {
            self.write_working_set(prefix, instr_count, out)?;
        }
        Ok(())
    }

    /// Prints the report to stderr.
    pub fn print_stats(&mut self, prefix: &str, instr_count: u64) {
        if let Err(e) = self.write_stats(prefix, instr_count, &mut io::stderr().lock()) {
            log::error!("failed to write stats report: {e}");
        }
    }

    fn write_warmup<W: Write>(&self, prefix: &str, out: &mut W) -> io::Result<()> {
        write_count_line(out, prefix, "Warmup hits:", 18, 20, self.num_hits_at_reset)?;
        write_count_line(out, prefix, "Warmup misses:", 18, 20, self.num_misses_at_reset)
    }

    fn write_counts<W: Write>(&self, prefix: &str, out: &mut W) -> io::Result<()> {
        write_count_line(out, prefix, "Hits:", 18, 20, self.num_hits)?;
        write_count_line(out, prefix, "Misses:", 18, 20, self.num_misses)?;
        write_count_line(
            out,
            prefix,
            "Compulsory misses:",
            18,
            20,
            self.num_compulsory_misses,
        )?;
        if self.coherent {
            write_count_line(
                out,
                prefix,
                "Parent invalidations:",
                21,
                17,
                self.num_inclusive_invalidates,
            )?;
            write_count_line(
                out,
                prefix,
                "Write invalidations:",
                20,
                18,
                self.num_coherence_invalidates,
            )
        } else {
            write_count_line(
                out,
                prefix,
                "Invalidations:",
                18,
                20,
                self.num_inclusive_invalidates,
            )
        }
    }

    fn write_rates<W: Write>(&self, prefix: &str, out: &mut W) -> io::Result<()> {
        let total = self.num_hits + self.num_misses;
        if total == 0 {
            return Ok(());
        }
        let label = if self.num_child_hits != 0 {
            "Local miss rate:"
        } else {
            "Miss rate:"
        };
        let rate = self.num_misses as f64 * 100.0 / total as f64;
        writeln!(out, "{prefix}{label:<18}{:>20.2}%", rate)
    }

    fn write_child_stats<W: Write>(&self, prefix: &str, out: &mut W) -> io::Result<()> {
        if self.num_child_hits == 0 {
            return Ok(());
        }
        write_count_line(out, prefix, "Child hits:", 18, 20, self.num_child_hits)?;
        let total = self.num_hits + self.num_child_hits + self.num_misses;
        let rate = self.num_misses as f64 * 100.0 / total as f64;
        writeln!(out, "{prefix}{:<18}{:>20.2}%", "Total miss rate:", rate)
    }

    fn write_miss_hist<W: Write>(&mut self, prefix: &str, out: &mut W) -> io::Result<()> {
        self.load_symbols();
        writeln!(out, "{prefix}Top data instr misses:")?;
        for (pc, count) in top_k(&self.miss_hist, self.report_top) {
            let hex = format!("{pc:#x}");
            writeln!(out, "{prefix}  {hex:<16}{count:>18}")?;
            if let Some(info) = self.symbols.as_ref().and_then(|t| t.get(pc)) {
                writeln!(out, "{prefix}    {}:{} {}", info.path, info.line, info.symbol)?;
            }
        }
        Ok(())
    }

    fn write_working_set<W: Write>(
        &mut self,
        prefix: &str,
        instr_count: u64,
        out: &mut W,
    ) -> io::Result<()> {
        let Some(ws) = self.working_set.as_mut() else {
            return Ok(());
        };
        ws.finalize(instr_count);
        writeln!(out, "{prefix}Working set:")?;
        for (&at, &lines) in ws.history() {
            writeln!(out, "{prefix}  {at:<16}{lines:>18}")?;
        }
        Ok(())
    }

    /// Loads the addr2line table on first use; a failed load downgrades to
    /// unsymbolized output.
    fn load_symbols(&mut self) {
        let Some(path) = self.addr2line_file.take() else {
            return;
        };
        match Addr2LineTable::load(&path) {
            Ok(table) => self.symbols = Some(table),
            Err(e) => log::warn!("symbolization disabled: {e}"),
        }
    }
}

/// Writes one `{prefix}{label:<lw}{count:>cw}` report line with the count
/// comma-grouped.
fn write_count_line<W: Write>(
    out: &mut W,
    prefix: &str,
    label: &str,
    label_width: usize,
    count_width: usize,
    count: u64,
) -> io::Result<()> {
    let grouped = group_thousands(count);
    writeln!(
        out,
        "{prefix}{label:<label_width$}{grouped:>count_width$}"
    )
}

/// Formats `n` with comma thousands separators.
fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
