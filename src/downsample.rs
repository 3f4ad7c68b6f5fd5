//! Row reduction for plotting that keeps spikes, valleys and both ends.
//!
//! The time-sorted input is cut into contiguous buckets. Each bucket keeps
//! its first and last row plus, per plotted column, the rows holding that
//! column's minimum and maximum inside the bucket.

use crate::config::RenderConfig;
use crate::table::{ColumnData, NormalizedTable};
use std::collections::BTreeSet;

/// Rendering quality tier, mapped to a point budget by `RenderConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Low,
    Medium,
    High,
    /// No reduction.
    Full,
}

impl Quality {
    pub fn budget(self, config: &RenderConfig) -> Option<usize> {
        match self {
            Quality::Low => Some(config.low_points),
            Quality::Medium => Some(config.medium_points),
            Quality::High => Some(config.high_points),
            Quality::Full => None,
        }
    }
}

/// Anchor rows kept per bucket (first and last).
const ANCHORS_PER_BUCKET: usize = 2;

/// Reduce `table` to roughly `max_points` rows. Tables already within
/// budget come back unchanged. Unknown, text or all-missing columns add no
/// extrema; only the bucket anchors are kept for them.
pub fn reduce(table: &NormalizedTable, columns: &[&str], max_points: usize) -> NormalizedTable {
    let n = table.len();
    if n <= max_points {
        return table.clone();
    }

    let series: Vec<&ColumnData> = columns
        .iter()
        .filter_map(|name| table.column(name))
        .filter(|data| data.is_numeric())
        .collect();

    let per_bucket = ANCHORS_PER_BUCKET + 2 * series.len();
    let buckets = (max_points / per_bucket).max(1);
    let size = n.div_ceil(buckets);

    let mut keep: BTreeSet<usize> = BTreeSet::new();
    for start in (0..n).step_by(size) {
        let end = (start + size).min(n);
        keep.insert(start);
        keep.insert(end - 1);
        for data in &series {
            if let Some((lo, hi)) = extrema(data, start, end) {
                keep.insert(lo);
                keep.insert(hi);
            }
        }
    }

    let idx: Vec<usize> = keep.into_iter().collect();
    table.take(&idx)
}

/// `reduce` with the budget of a quality tier.
pub fn reduce_for_quality(
    table: &NormalizedTable,
    columns: &[&str],
    quality: Quality,
    config: &RenderConfig,
) -> NormalizedTable {
    match quality.budget(config) {
        Some(max_points) => reduce(table, columns, max_points),
        None => table.clone(),
    }
}

/// Row indices of the minimum and maximum value in `start..end`.
fn extrema(data: &ColumnData, start: usize, end: usize) -> Option<(usize, usize)> {
    let mut found: Option<((usize, f64), (usize, f64))> = None;
    for i in start..end {
        let Some(v) = data.value(i) else {
            continue;
        };
        found = Some(match found {
            None => ((i, v), (i, v)),
            Some((lo, hi)) => (
                if v < lo.1 { (i, v) } else { lo },
                if v > hi.1 { (i, v) } else { hi },
            ),
        });
    }
    found.map(|(lo, hi)| (lo.0, hi.0))
}
