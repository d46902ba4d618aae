//! Partial top-K selection over address histograms.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::common::memref::Addr;

/// Orders by count descending, ties by address ascending.
fn by_count_desc(l: &(Addr, u64), r: &(Addr, u64)) -> Ordering {
    r.1.cmp(&l.1).then(l.0.cmp(&r.0))
}

/// Returns the `k` largest histogram entries.
///
/// Entries are ordered by count descending with ties broken by ascending
/// address. When the histogram has fewer than `k` entries the result is
/// padded with `(0, 0)` so the returned length is always `k`. Selection is
/// partial: only the top `k` prefix is ever fully ordered.
pub fn top_k(hist: &HashMap<Addr, u64>, k: usize) -> Vec<(Addr, u64)> {
    let mut entries: Vec<(Addr, u64)> = hist.iter().map(|(&a, &c)| (a, c)).collect();
    if entries.len() > k {
        if k > 0 {
            entries.select_nth_unstable_by(k - 1, by_count_desc);
        }
        entries.truncate(k);
    }
    entries.sort_unstable_by(by_count_desc);
    entries.resize(k, (0, 0));
    entries
}
