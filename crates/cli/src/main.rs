//! Trace replay driver for the cachetrace analysis tools.
//!
//! This binary replays a textual reference trace through the trace-wide
//! tools. It performs:
//! 1. **Instruction counting:** Top-K referenced instructions, optionally
//!    symbolized and exported as CSV; `--jobs` shards the trace across
//!    worker threads.
//! 2. **Working-set analysis:** Instruction and data working-set histories
//!    sampled over the instruction clock.
//!
//! Tool knobs come from flags or from a JSON config file (`--config`); flags
//! win where both are given.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::thread;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use cachetrace_core::config::{InstrCountConfig, WorkingSetConfig};
use cachetrace_core::tools::InstrCountTool;
use cachetrace_core::working_set::WorkingSetTool;

mod trace;

#[derive(Parser, Debug)]
#[command(
    name = "cachetrace",
    author,
    version,
    about = "Offline memory-reference trace analysis",
    long_about = "Replay a textual reference trace through the trace-wide analysis tools.\n\nExamples:\n  cachetrace instr-count trace.txt --top 20\n  cachetrace instr-count trace.txt --addr2line symbols.csv --output-dir out/ --jobs 4\n  cachetrace working-set trace.txt --line-size 64 --reset-interval 1000000"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Count instruction fetches trace-wide and report the top addresses.
    InstrCount {
        /// Trace file to replay.
        trace: PathBuf,

        /// JSON config file (flags override its fields).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Address-to-source-line CSV for symbolized output.
        #[arg(long)]
        addr2line: Option<PathBuf>,

        /// Write instr_counts.csv into this directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Number of top addresses to report.
        #[arg(long)]
        top: Option<usize>,

        /// Worker threads; above 1 the trace is sharded round-robin.
        #[arg(long, default_value_t = 1)]
        jobs: usize,
    },

    /// Sample instruction and data working-set sizes over the trace.
    WorkingSet {
        /// Trace file to replay.
        trace: PathBuf,

        /// JSON config file (flags override its fields).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Cache line size in bytes (power of two).
        #[arg(long)]
        line_size: Option<u64>,

        /// Flush the sampling window every this many instructions.
        #[arg(long)]
        reset_interval: Option<u64>,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::InstrCount {
            trace,
            config,
            addr2line,
            output_dir,
            top,
            jobs,
        } => cmd_instr_count(trace, config, addr2line, output_dir, top, jobs),
        Commands::WorkingSet {
            trace,
            config,
            line_size,
            reset_interval,
        } => cmd_working_set(trace, config, line_size, reset_interval),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn cmd_instr_count(
    trace_path: PathBuf,
    config: Option<PathBuf>,
    addr2line: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    top: Option<usize>,
    jobs: usize,
) -> Result<()> {
    let mut cfg = match config {
        Some(path) => {
            let cfg: InstrCountConfig = serde_json::from_str(&read_config_text(&path)?)
                .with_context(|| format!("invalid JSON config {}", path.display()))?;
            cfg
        }
        None => InstrCountConfig::default(),
    };
    if addr2line.is_some() {
        cfg.addr2line_file = addr2line;
    }
    if output_dir.is_some() {
        cfg.output_dir = output_dir;
    }
    if let Some(top) = top {
        cfg.report_top = top;
    }

    let refs = trace::load(&trace_path)?;
    log::info!("loaded {} references from {}", refs.len(), trace_path.display());
    let mut tool = InstrCountTool::new(&cfg);

    if jobs <= 1 {
        for memref in &refs {
            tool.process_memref(memref);
        }
    } else {
        let tool_ref = &tool;
        let refs_ref = &refs;
        thread::scope(|scope| {
            for worker in 0..jobs {
                scope.spawn(move || {
                    let mut shard = tool_ref.parallel_shard_init(worker);
                    for memref in refs_ref.iter().skip(worker).step_by(jobs) {
                        InstrCountTool::parallel_shard_memref(&mut shard.data, memref);
                    }
                    tool_ref.parallel_shard_exit(shard);
                });
            }
        });
    }

    tool.print_results();
    Ok(())
}

fn cmd_working_set(
    trace_path: PathBuf,
    config: Option<PathBuf>,
    line_size: Option<u64>,
    reset_interval: Option<u64>,
) -> Result<()> {
    let mut cfg = match config {
        Some(path) => {
            let cfg: WorkingSetConfig = serde_json::from_str(&read_config_text(&path)?)
                .with_context(|| format!("invalid JSON config {}", path.display()))?;
            cfg
        }
        None => WorkingSetConfig::default(),
    };
    if let Some(line_size) = line_size {
        cfg.line_size = line_size;
    }
    if let Some(reset_interval) = reset_interval {
        cfg.reset_interval = reset_interval;
    }

    let refs = trace::load(&trace_path)?;
    log::info!("loaded {} references from {}", refs.len(), trace_path.display());
    let mut tool = WorkingSetTool::new(&cfg)
        .with_context(|| format!("invalid working-set configuration ({cfg:?})"))?;
    for memref in &refs {
        tool.process_memref(memref);
    }
    tool.print_results();
    Ok(())
}

fn read_config_text(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .with_context(|| format!("unable to read config file {}", path.display()))
}
