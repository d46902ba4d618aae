//! Trace-wide instruction reference counting.
//!
//! This module counts how often each instruction address is fetched across
//! the whole trace. It provides:
//! 1. **Shards:** Per-worker accumulation with no locking on the hot path;
//!    only the shard registry is mutex-guarded.
//! 2. **Reduction:** A deterministic sum of the shard maps, run after all
//!    producers have finished.
//! 3. **Reporting:** Unique-instruction count, symbolized top-K, and an
//!    optional `instr_counts.csv` export.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::common::error::StatsError;
use crate::common::memref::{Addr, MemRef};
use crate::config::InstrCountConfig;
use crate::symbols::Addr2LineTable;
use crate::topk::top_k;

/// Accumulated state of one trace shard.
#[derive(Debug, Default, Clone)]
pub struct ShardData {
    /// Fetch count per instruction address.
    pub instr_map: HashMap<Addr, u64>,
    /// Failure description, if the shard's worker hit one.
    pub error: Option<String>,
}

/// Owned handle for one shard, held by exactly one worker.
#[derive(Debug)]
pub struct ShardHandle {
    index: usize,
    /// Shard state; updated lock-free by the owning worker.
    pub data: ShardData,
}

/// Trace-wide top-K referenced-instruction tool.
pub struct InstrCountTool {
    addr2line_file: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    report_top: usize,

    // Guards only registration and the exit hand-off; shard bodies are owned
    // by their workers in between.
    shards: Mutex<BTreeMap<usize, ShardData>>,
    serial: ShardData,
    reduced: ShardData,
}

impl InstrCountTool {
    /// Creates the tool from its configuration.
    pub fn new(config: &InstrCountConfig) -> Self {
        Self {
            addr2line_file: config.addr2line_file.clone(),
            output_dir: config.output_dir.clone(),
            report_top: config.report_top,
            shards: Mutex::new(BTreeMap::new()),
            serial: ShardData::default(),
            reduced: ShardData::default(),
        }
    }

    /// Registers shard `shard_index` and returns its handle.
    ///
    /// Registration takes the registry lock; the returned handle is owned by
    /// the calling worker and updated without locking.
    pub fn parallel_shard_init(&self, shard_index: usize) -> ShardHandle {
        let mut shards = self.shards.lock().expect("shard registry poisoned");
        shards.insert(shard_index, ShardData::default());
        ShardHandle {
            index: shard_index,
            data: ShardData::default(),
        }
    }

    /// Accumulates one reference into `shard`. Only instruction fetches
    /// count.
    pub fn parallel_shard_memref(shard: &mut ShardData, memref: &MemRef) {
        if memref.kind.is_instr() {
            *shard.instr_map.entry(memref.addr).or_insert(0) += 1;
        }
    }

    /// Returns the shard's state to the registry once its worker is done
    /// producing. The reduction reads it from there.
    pub fn parallel_shard_exit(&self, shard: ShardHandle) {
        let mut shards = self.shards.lock().expect("shard registry poisoned");
        shards.insert(shard.index, shard.data);
    }

    /// Serial path: accumulates into the built-in serial shard.
    pub fn process_memref(&mut self, memref: &MemRef) {
        Self::parallel_shard_memref(&mut self.serial, memref);
    }

    /// Merges all shard maps into the reduced map.
    ///
    /// With no registered shards the serial shard becomes the result.
    /// Summation is exact and order-independent. Must run after every shard
    /// producer has exited.
    pub fn reduce_results(&mut self) {
        let shards = self.shards.lock().expect("shard registry poisoned");
        if shards.is_empty() {
            self.reduced = self.serial.clone();
            return;
        }
        self.reduced = ShardData::default();
        for shard in shards.values() {
            for (&addr, &count) in &shard.instr_map {
                *self.reduced.instr_map.entry(addr).or_insert(0) += count;
            }
        }
    }

    /// Reduced fetch counts; valid after [`reduce_results`](Self::reduce_results).
    pub fn reduced_map(&self) -> &HashMap<Addr, u64> {
        &self.reduced.instr_map
    }

    /// Reduces, renders the report into `out`, and exports the CSV when an
    /// output directory is configured.
    ///
    /// A symbol table that fails to load downgrades the report to raw
    /// addresses instead of failing it.
    pub fn write_results<W: Write>(&mut self, out: &mut W) -> Result<(), StatsError> {
        self.reduce_results();

        let symbols = match &self.addr2line_file {
            None => None,
            Some(path) => match Addr2LineTable::load(path) {
                Ok(table) => Some(table),
                Err(e) => {
                    log::warn!("symbolization disabled: {e}");
                    None
                }
            },
        };

        writeln!(out, "Instruction count tool results:")?;
        writeln!(
            out,
            "instructions: {} unique instructions",
            self.reduced.instr_map.len()
        )?;
        let top = top_k(&self.reduced.instr_map, self.report_top);
        writeln!(out, "instructions top {}", top.len())?;
        for (addr, count) in top {
            let hex = format!("{addr:#x}");
            writeln!(out, "{hex:>18}: {count}")?;
            if let Some(info) = symbols.as_ref().and_then(|t| t.get(addr)) {
                writeln!(out, "    {}:{} {}", info.path, info.line, info.symbol)?;
            }
        }

        if self.output_dir.is_some() {
            self.write_instr_info_file(symbols.as_ref())?;
        }
        Ok(())
    }

    /// Prints the report to stderr.
    pub fn print_results(&mut self) {
        if let Err(e) = self.write_results(&mut io::stderr().lock()) {
            log::error!("failed to write instruction count report: {e}");
        }
    }

    /// Writes `instr_counts.csv` into the output directory, one row per
    /// reduced instruction address in address order. Addresses without debug
    /// info get `unknown,0,unknown`.
    fn write_instr_info_file(&self, symbols: Option<&Addr2LineTable>) -> Result<(), StatsError> {
        let Some(dir) = &self.output_dir else {
            return Ok(());
        };
        if self.reduced.instr_map.is_empty() {
            return Ok(());
        }
        fs::create_dir_all(dir)?;
        let path = dir.join("instr_counts.csv");
        let file = File::create(&path).map_err(|source| StatsError::IoOpen {
            path: path.clone(),
            source,
        })?;
        let mut out = BufWriter::new(file);

        writeln!(out, "addr,count,path,line,symbol")?;
        let mut rows: Vec<(Addr, u64)> = self
            .reduced
            .instr_map
            .iter()
            .map(|(&a, &c)| (a, c))
            .collect();
        rows.sort_unstable_by_key(|&(addr, _)| addr);
        for (addr, count) in rows {
            match symbols.and_then(|t| t.get(addr)) {
                Some(info) => writeln!(
                    out,
                    "{addr},{count},{},{},{}",
                    info.path, info.line, info.symbol
                )?,
                None => writeln!(out, "{addr},{count},unknown,0,unknown")?,
            }
        }
        out.flush()?;
        Ok(())
    }
}
