//! Text trace parsing.
//!
//! One reference per line; `#` comments and blank lines are skipped:
//!
//! ```text
//! I  <addr> <size>         instruction fetch
//! PI <addr> <size>         instruction prefetch
//! R  <pc> <addr> <size>    data read
//! W  <pc> <addr> <size>    data write
//! P  <pc> <addr> <size>    data prefetch
//! F | V | O                flush / invalidate / other marker
//! ```
//!
//! Address and size literals accept `0x` hex or decimal.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{bail, Context, Result};
use cachetrace_core::{MemRef, RefKind};

/// Loads every reference from the trace file at `path`.
pub fn load(path: &Path) -> Result<Vec<MemRef>> {
    let file = File::open(path)
        .with_context(|| format!("unable to open trace file {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut refs = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.context("failed to read line from trace")?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        refs.push(
            parse_line(trimmed)
                .with_context(|| format!("trace line {}: \"{}\"", idx + 1, trimmed))?,
        );
    }
    Ok(refs)
}

fn parse_line(line: &str) -> Result<MemRef> {
    let mut parts = line.split_whitespace();
    let op = parts.next().context("missing op")?;
    let memref = match op {
        "I" | "i" => {
            let addr = parse_literal(parts.next().context("missing address")?)?;
            let size = parse_literal(parts.next().context("missing size")?)?;
            MemRef::instr(addr, size)
        }
        "PI" | "pi" => {
            let addr = parse_literal(parts.next().context("missing address")?)?;
            let size = parse_literal(parts.next().context("missing size")?)?;
            MemRef::prefetch_instr(addr, size)
        }
        "R" | "r" | "W" | "w" | "P" | "p" => {
            let pc = parse_literal(parts.next().context("missing pc")?)?;
            let addr = parse_literal(parts.next().context("missing address")?)?;
            let size = parse_literal(parts.next().context("missing size")?)?;
            match op {
                "R" | "r" => MemRef::read(pc, addr, size),
                "W" | "w" => MemRef::write(pc, addr, size),
                _ => MemRef::prefetch(pc, addr, size),
            }
        }
        "F" | "f" => MemRef::marker(RefKind::Flush),
        "V" | "v" => MemRef::marker(RefKind::Invalidate),
        "O" | "o" => MemRef::marker(RefKind::Other),
        _ => bail!("invalid op '{op}'"),
    };
    if parts.next().is_some() {
        bail!("extra tokens after reference");
    }
    Ok(memref)
}

fn parse_literal(text: &str) -> Result<u64> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.with_context(|| format!("invalid numeric literal '{text}'"))
}
