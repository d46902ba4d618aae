//! Working-set size sampling.
//!
//! This module tracks the number of distinct cache lines touched within a
//! window of instruction count. It provides:
//! 1. **Sampler:** A window of distinct line-aligned addresses with periodic
//!    flush into a time-keyed history.
//! 2. **Window representations:** A coalescing interval set for the in-cache
//!    sampler, a hash set for the standalone tool.
//! 3. **Tool:** The trace-wide analysis splitting instruction and data
//!    working sets.
//!
//! The periodic flush turns the distinct-touch set into a coarse time series
//! of working-set size.

use std::collections::{BTreeMap, HashSet};
use std::io::{self, Write};

use crate::common::error::StatsError;
use crate::common::memref::{Addr, MemRef, RefKind};
use crate::config::WorkingSetConfig;
use crate::intervals::IntervalSet;

/// A set of line-aligned addresses that reports first touches.
pub trait DistinctWindow {
    /// Records `line_addr`; returns true when it was not yet present.
    fn first_touch(&mut self, line_addr: Addr) -> bool;

    /// Empties the window.
    fn clear(&mut self);
}

impl DistinctWindow for HashSet<Addr> {
    fn first_touch(&mut self, line_addr: Addr) -> bool {
        self.insert(line_addr)
    }

    fn clear(&mut self) {
        HashSet::clear(self);
    }
}

impl DistinctWindow for IntervalSet {
    fn first_touch(&mut self, line_addr: Addr) -> bool {
        self.record(line_addr)
    }

    fn clear(&mut self) {
        IntervalSet::clear(self);
    }
}

/// Distinct-touch counter with periodic flush and time-keyed history.
///
/// The window representation is pluggable: the in-cache sampler uses an
/// [`IntervalSet`] (dense device footprints coalesce well), the standalone
/// tool a hash set.
#[derive(Debug)]
pub struct WorkingSetSampler<S> {
    window: S,
    line_size: u64,
    line_mask: u64,
    cardinality: u64,
    history: BTreeMap<u64, u64>,
}

impl<S: DistinctWindow> WorkingSetSampler<S> {
    /// Creates a sampler over `window` with the given line size.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::BlockSizeNotPowerOfTwo`] unless `line_size` is a
    /// power of two.
    pub fn new(line_size: u64, window: S) -> Result<Self, StatsError> {
        if !line_size.is_power_of_two() {
            return Err(StatsError::BlockSizeNotPowerOfTwo(line_size));
        }
        Ok(Self {
            window,
            line_size,
            line_mask: !(line_size - 1),
            cardinality: 0,
            history: BTreeMap::new(),
        })
    }

    /// Records the line containing `addr` in the current window.
    pub fn touch(&mut self, addr: Addr) {
        if self.window.first_touch(addr & self.line_mask) {
            self.cardinality += 1;
        }
    }

    /// Records every line overlapped by `[addr, addr + size)`.
    ///
    /// The range is decomposed into line-aligned steps, guarding against
    /// wrap at the top of the address space.
    pub fn touch_range(&mut self, addr: Addr, size: u64) {
        let limit = addr.saturating_add(size);
        let mut line = addr & self.line_mask;
        while line < limit {
            self.touch(line);
            match line.checked_add(self.line_size) {
                Some(next) => line = next,
                None => break,
            }
        }
    }

    /// Closes the current window at `instr_count`.
    ///
    /// Stores the window cardinality under the instruction count and empties
    /// the window. A repeated flush at an instruction count already present
    /// in the history leaves the window intact.
    pub fn flush(&mut self, instr_count: u64) {
        if self.history.contains_key(&instr_count) {
            return;
        }
        self.history.insert(instr_count, self.cardinality);
        self.window.clear();
        self.cardinality = 0;
    }

    /// Adds the end-of-run entry at `instr_count` unless one exists, without
    /// clearing the window.
    pub fn finalize(&mut self, instr_count: u64) {
        self.history.entry(instr_count).or_insert(self.cardinality);
    }

    /// Distinct lines touched in the current (unflushed) window.
    pub fn cardinality(&self) -> u64 {
        self.cardinality
    }

    /// Flushed samples, keyed by instruction count.
    pub fn history(&self) -> &BTreeMap<u64, u64> {
        &self.history
    }
}

/// Trace-wide working-set analysis with separate instruction and data sets.
#[derive(Debug)]
pub struct WorkingSetTool {
    instr: WorkingSetSampler<HashSet<Addr>>,
    data: WorkingSetSampler<HashSet<Addr>>,
    reset_interval: u64,
    instruction_count: u64,
    samples_since_flush: u64,
}

impl WorkingSetTool {
    /// Creates the tool from its configuration.
    pub fn new(config: &WorkingSetConfig) -> Result<Self, StatsError> {
        Ok(Self {
            instr: WorkingSetSampler::new(config.line_size, HashSet::new())?,
            data: WorkingSetSampler::new(config.line_size, HashSet::new())?,
            reset_interval: config.reset_interval,
            instruction_count: 0,
            samples_since_flush: 0,
        })
    }

    /// Consumes one trace reference.
    ///
    /// Instruction fetches advance the instruction clock; instruction and
    /// data references land in their respective windows; other kinds only
    /// drive the flush check.
    pub fn process_memref(&mut self, memref: &MemRef) {
        if memref.kind.is_instr() {
            self.instruction_count += 1;
            self.samples_since_flush += 1;
        }
        match memref.kind {
            RefKind::InstrFetch | RefKind::PrefetchInstr => {
                self.instr.touch_range(memref.addr, memref.size);
            }
            RefKind::DataRead | RefKind::DataWrite | RefKind::Prefetch => {
                self.data.touch_range(memref.addr, memref.size);
            }
            _ => {}
        }
        if self.samples_since_flush >= self.reset_interval {
            self.instr.flush(self.instruction_count);
            self.data.flush(self.instruction_count);
            self.samples_since_flush = 0;
        }
    }

    /// Instructions seen so far.
    pub fn instruction_count(&self) -> u64 {
        self.instruction_count
    }

    /// Instruction working-set history, keyed by instruction count.
    pub fn instr_history(&self) -> &BTreeMap<u64, u64> {
        self.instr.history()
    }

    /// Data working-set history, keyed by instruction count.
    pub fn data_history(&self) -> &BTreeMap<u64, u64> {
        self.data.history()
    }

    /// Renders both histories, adding the end-of-run sample first.
    pub fn write_results<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        self.instr.finalize(self.instruction_count);
        self.data.finalize(self.instruction_count);
        writeln!(out, "Working set:")?;
        writeln!(out, "  Instructions:")?;
        for (&instr_count, &lines) in self.instr.history() {
            writeln!(out, "  {instr_count:<16}{lines:>18}")?;
        }
        writeln!(out, "  Data:")?;
        for (&instr_count, &lines) in self.data.history() {
            writeln!(out, "  {instr_count:<16}{lines:>18}")?;
        }
        Ok(())
    }

    /// Prints the report to stderr.
    pub fn print_results(&mut self) {
        if let Err(e) = self.write_results(&mut io::stderr().lock()) {
            log::error!("failed to write working-set report: {e}");
        }
    }
}
