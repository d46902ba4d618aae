//! Address-to-source-line symbolization.
//!
//! This module parses the side-car CSV that maps instruction addresses to
//! `{symbol, path, line}` triples. It provides:
//! 1. **Row reader:** A minimal CSV splitter with the quoted-field convention
//!    the side-car generator emits.
//! 2. **Table:** An address-keyed map loaded once and queried at report time.
//!
//! The parser is intentionally limited: fields may be quoted, but embedded
//! newlines are not supported.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::common::error::StatsError;
use crate::common::memref::Addr;

/// One parsed CSV row.
///
/// Separator positions are kept instead of owned field strings; `field(i)`
/// borrows the substring between commas. A field opening with `"` extends
/// until the next `",` sequence, and a trailing comma yields an empty final
/// field.
#[derive(Debug, Default)]
pub struct CsvRow {
    line: String,
    cuts: Vec<usize>,
}

impl CsvRow {
    /// Reads the next row from `input`, replacing this row's contents.
    ///
    /// Returns `Ok(false)` once the input is exhausted, so callers never
    /// process a row twice or drop the final row on a missing trailing
    /// newline.
    pub fn read_next_row<R: BufRead>(&mut self, input: &mut R) -> Result<bool, StatsError> {
        self.line.clear();
        let n = input.read_line(&mut self.line)?;
        if n == 0 {
            self.cuts.clear();
            return Ok(false);
        }
        while self.line.ends_with('\n') || self.line.ends_with('\r') {
            self.line.pop();
        }

        self.cuts.clear();
        let bytes = self.line.as_bytes();
        let mut pos = 0;
        while let Some(off) = self.line[pos..].find(',') {
            let comma = pos + off;
            self.cuts.push(comma);
            if bytes.get(comma + 1) == Some(&b'"') {
                match self.line[comma + 2..].find("\",") {
                    Some(close) => pos = comma + 2 + close,
                    None => break,
                }
            } else {
                pos = comma + 1;
            }
        }
        Ok(true)
    }

    /// Number of fields in the current row; a blank or default row has none.
    pub fn len(&self) -> usize {
        if self.cuts.is_empty() && self.line.is_empty() {
            0
        } else {
            self.cuts.len() + 1
        }
    }

    /// True when the current row holds no fields.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrows field `index`; field 0 spans from byte 0 to the first comma.
    /// An index past the row's last field reads as empty.
    pub fn field(&self, index: usize) -> &str {
        if index >= self.len() {
            return "";
        }
        let start = if index == 0 {
            0
        } else {
            self.cuts[index - 1] + 1
        };
        let end = self.cuts.get(index).copied().unwrap_or(self.line.len());
        &self.line[start..end]
    }
}

/// Source location for one instruction address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugInfo {
    pub symbol: String,
    pub path: String,
    pub line: i64,
}

/// Address-keyed table of [`DebugInfo`] entries loaded from a side-car CSV.
#[derive(Debug, Default)]
pub struct Addr2LineTable {
    entries: HashMap<Addr, DebugInfo>,
}

impl Addr2LineTable {
    /// Loads the table from `path`.
    ///
    /// The header row declares the column order; `addr`, `symbol`, `path` and
    /// `line` are required (any order, extra columns ignored). `addr` parses
    /// as a decimal unsigned integer and `line` as a decimal signed integer.
    ///
    /// # Errors
    ///
    /// [`StatsError::IoOpen`] when the file cannot be opened,
    /// [`StatsError::CsvMissingColumn`] when a required column is absent, and
    /// [`StatsError::CsvParse`] on a malformed body row.
    pub fn load(path: &Path) -> Result<Self, StatsError> {
        let file = File::open(path).map_err(|source| StatsError::IoOpen {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = BufReader::new(file);
        let mut row = CsvRow::default();

        if !row.read_next_row(&mut reader)? {
            return Err(StatsError::CsvMissingColumn("addr"));
        }
        let mut addr_index = None;
        let mut symbol_index = None;
        let mut path_index = None;
        let mut line_index = None;
        for i in 0..row.len() {
            match row.field(i) {
                "addr" => addr_index = Some(i),
                "symbol" => symbol_index = Some(i),
                "path" => path_index = Some(i),
                "line" => line_index = Some(i),
                _ => {}
            }
        }
        let addr_index = addr_index.ok_or(StatsError::CsvMissingColumn("addr"))?;
        let symbol_index = symbol_index.ok_or(StatsError::CsvMissingColumn("symbol"))?;
        let path_index = path_index.ok_or(StatsError::CsvMissingColumn("path"))?;
        let line_index = line_index.ok_or(StatsError::CsvMissingColumn("line"))?;

        let mut entries = HashMap::new();
        let mut row_number = 1;
        while row.read_next_row(&mut reader)? {
            row_number += 1;
            if row.is_empty() {
                continue;
            }
            let addr: Addr =
                row.field(addr_index)
                    .parse()
                    .map_err(|_| StatsError::CsvParse {
                        line: row_number,
                        field: "addr",
                        value: row.field(addr_index).to_string(),
                    })?;
            let line: i64 = row
                .field(line_index)
                .parse()
                .map_err(|_| StatsError::CsvParse {
                    line: row_number,
                    field: "line",
                    value: row.field(line_index).to_string(),
                })?;
            entries.insert(
                addr,
                DebugInfo {
                    symbol: unquote(row.field(symbol_index)).to_string(),
                    path: unquote(row.field(path_index)).to_string(),
                    line,
                },
            );
        }
        Ok(Self { entries })
    }

    /// Looks up the source location for `addr`.
    pub fn get(&self, addr: Addr) -> Option<&DebugInfo> {
        self.entries.get(&addr)
    }

    /// Number of symbolized addresses.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Strips one pair of surrounding double quotes, if present.
fn unquote(field: &str) -> &str {
    field
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(field)
}
