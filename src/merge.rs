//! Time alignment of the counter series with the process-detail series.
//!
//! Each counter row picks up the most recent process sample that is not
//! newer than it and not older than the tolerance. The result keeps exactly
//! the counter rows (left join), then gains the derived memory columns.

use crate::table::{ColumnData, NormalizedTable};
use crate::Result;
use anyhow::{Context, bail};
use chrono::{NaiveDateTime, TimeDelta};
use tracing::debug;

pub const AVAILABLE_MEM: &str = "AvailableMem(MB)";
pub const PHYSICAL_MEM: &str = "PhysicalMem(GB)";
pub const TOTAL_MEM: &str = "OSTotalMem(GB)";
pub const USED_MEM: &str = "Used(GB)";
pub const USAGE_PCT: &str = "Usage(%)";

/// Fields constant within one collection run.
const STATIC_FIELDS: &[&str] = &[PHYSICAL_MEM, TOTAL_MEM];

pub struct Merger {
    tolerance: TimeDelta,
}

impl Merger {
    /// Fails for a negative, non-finite or out-of-range tolerance.
    pub fn new(tolerance_seconds: f64) -> Result<Self> {
        if !tolerance_seconds.is_finite() || tolerance_seconds < 0.0 {
            bail!("merge tolerance must be a non-negative number of seconds, got {}", tolerance_seconds);
        }
        let millis = (tolerance_seconds * 1000.0).round();
        if millis > i64::MAX as f64 {
            bail!("merge tolerance of {} seconds is too large", tolerance_seconds);
        }
        let tolerance = TimeDelta::try_milliseconds(millis as i64)
            .with_context(|| format!("merge tolerance of {} seconds is too large", tolerance_seconds))?;
        Ok(Self { tolerance })
    }

    pub fn merge(
        &self,
        high_freq: NormalizedTable,
        process_detail: NormalizedTable,
    ) -> Result<NormalizedTable> {
        let mut out = high_freq.sort_by_timestamp();
        let detail = process_detail.sort_by_timestamp();
        if detail.is_empty() {
            return Ok(out);
        }

        let matches = asof_backward(out.timestamps(), detail.timestamps(), self.tolerance);
        debug!(
            "asof join: {}/{} counter rows matched a process sample",
            matches.iter().flatten().count(),
            matches.len()
        );

        for col in detail.columns() {
            if out.has_column(&col.name) {
                debug!("column {} exists on both sides; keeping the counter side", col.name);
                continue;
            }
            out.push_column(col.name.clone(), col.data.gather(&matches))?;
        }

        for field in STATIC_FIELDS {
            if let Some(col) = out.column(field) {
                let filled = backfill_then_forward(col);
                out.set_column(field, filled)?;
            }
        }

        derive_memory_usage(&mut out)?;
        Ok(out)
    }
}

/// For each left timestamp, the index of the last right row at or before
/// it, if within `tolerance`. Both inputs must be sorted ascending.
pub fn asof_backward(
    left: &[Option<NaiveDateTime>],
    right: &[Option<NaiveDateTime>],
    tolerance: TimeDelta,
) -> Vec<Option<usize>> {
    let mut out = Vec::with_capacity(left.len());
    let mut next = 0usize;
    for ts in left {
        let Some(ts) = *ts else {
            out.push(None);
            continue;
        };
        while next < right.len() && right[next].is_some_and(|r| r <= ts) {
            next += 1;
        }
        let hit = next
            .checked_sub(1)
            .filter(|&j| right[j].is_some_and(|r| ts - r <= tolerance));
        out.push(hit);
    }
    out
}

/// Fill gaps with the next known value, then trailing gaps with the last one.
fn backfill_then_forward(col: &ColumnData) -> ColumnData {
    let n = col.len();
    let mut idx: Vec<Option<usize>> = vec![None; n];

    let mut next = None;
    for i in (0..n).rev() {
        if !col.is_missing(i) {
            next = Some(i);
        }
        idx[i] = next;
    }

    let mut prev = None;
    for (i, slot) in idx.iter_mut().enumerate() {
        if !col.is_missing(i) {
            prev = Some(i);
        }
        if slot.is_none() {
            *slot = prev;
        }
    }

    col.gather(&idx)
}

/// `(used, usage_percent)` from total and available memory in the same unit.
///
/// Either input missing, or a non-positive total, leaves both absent.
pub fn derive_usage(total: Option<f64>, available: Option<f64>) -> (Option<f64>, Option<f64>) {
    match (total, available) {
        (Some(total), Some(available)) if total > 0.0 => {
            let used = total - available;
            (Some(used), Some(100.0 * used / total))
        }
        _ => (None, None),
    }
}

/// Adds `Used(GB)` and `Usage(%)` when both inputs are present.
fn derive_memory_usage(table: &mut NormalizedTable) -> Result<()> {
    let (Some(total), Some(available)) = (table.column(TOTAL_MEM), table.column(AVAILABLE_MEM))
    else {
        return Ok(());
    };

    let (used, pct): (Vec<_>, Vec<_>) = (0..table.len())
        .map(|i| derive_usage(total.value(i), available.value(i).map(|mb| mb / 1024.0)))
        .unzip();

    table.set_column(USED_MEM, ColumnData::Float64(used).narrow())?;
    table.set_column(USAGE_PCT, ColumnData::Float64(pct).narrow())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ts;
    use pretty_assertions::assert_eq;

    fn counters(times: &[&str], available_mb: &[f64]) -> NormalizedTable {
        let mut t = NormalizedTable::new(times.iter().map(|s| Some(ts(s))).collect());
        t.push_column(
            AVAILABLE_MEM,
            ColumnData::Float64(available_mb.iter().copied().map(Some).collect()),
        )
        .unwrap();
        t
    }

    fn details(times: &[&str], total_gb: &[f64], packed: &[&str]) -> NormalizedTable {
        let mut t = NormalizedTable::new(times.iter().map(|s| Some(ts(s))).collect());
        t.push_column(
            TOTAL_MEM,
            ColumnData::Float64(total_gb.iter().copied().map(Some).collect()),
        )
        .unwrap();
        t.push_column(
            "Top5_Memory_MB",
            ColumnData::Text(packed.iter().map(|s| Some(s.to_string())).collect()),
        )
        .unwrap();
        t
    }

    #[test]
    fn tolerance_edge_is_inclusive() {
        let left = [
            Some(ts("2026-01-05 10:00:35")),
            Some(ts("2026-01-05 10:00:35.001")),
        ];
        let right = [Some(ts("2026-01-05 10:00:00"))];
        let m = Merger::new(35.0).unwrap();
        assert_eq!(asof_backward(&left[..1], &right, m.tolerance), vec![Some(0)]);
        assert_eq!(asof_backward(&left[1..], &right, m.tolerance), vec![None]);
    }

    #[test]
    fn rejects_unusable_tolerances() {
        assert!(Merger::new(-1e300).is_err());
        assert!(Merger::new(-0.5).is_err());
        assert!(Merger::new(f64::NAN).is_err());
        assert!(Merger::new(f64::INFINITY).is_err());
        assert!(Merger::new(1e300).is_err());
        assert_eq!(Merger::new(0.0).unwrap().tolerance, TimeDelta::zero());
    }

    #[test]
    fn never_matches_future_samples() {
        let left = [Some(ts("2026-01-05 10:00:00"))];
        let right = [Some(ts("2026-01-05 10:00:01"))];
        assert_eq!(asof_backward(&left, &right, TimeDelta::seconds(35)), vec![None]);
    }

    #[test]
    fn picks_latest_sample_not_after_row() {
        let left = [
            Some(ts("2026-01-05 10:00:10")),
            Some(ts("2026-01-05 10:00:31")),
            Some(ts("2026-01-05 10:02:00")),
        ];
        let right = [
            Some(ts("2026-01-05 10:00:00")),
            Some(ts("2026-01-05 10:00:30")),
        ];
        assert_eq!(
            asof_backward(&left, &right, TimeDelta::seconds(35)),
            vec![Some(0), Some(1), None]
        );
    }

    #[test]
    fn empty_process_detail_returns_counters_unchanged() {
        let hf = counters(
            &["2026-01-05 10:00:01", "2026-01-05 10:00:00"],
            &[2048.0, 1024.0],
        );
        let merged = Merger::new(35.0)
            .unwrap()
            .merge(hf.clone(), NormalizedTable::default())
            .unwrap();
        assert_eq!(merged, hf.sort_by_timestamp());
    }

    #[test]
    fn merge_keeps_counter_rows_and_derives_usage() {
        let hf = counters(
            &[
                "2026-01-05 09:59:50",
                "2026-01-05 10:00:00",
                "2026-01-05 10:00:40",
                "2026-01-05 10:01:00",
            ],
            &[30.0 * 1024.0, 30.0 * 1024.0, 40.0 * 1024.0, 50.0 * 1024.0],
        );
        let pd = details(
            &["2026-01-05 10:00:00"],
            &[100.0],
            &["chrome:647MB | chrome:418MB"],
        );

        let merged = Merger::new(35.0).unwrap().merge(hf, pd).unwrap();
        assert_eq!(merged.len(), 4);

        // The packed column only attaches within tolerance.
        let packed = merged.column("Top5_Memory_MB").unwrap();
        assert_eq!(packed.text(0), None);
        assert_eq!(packed.text(1), Some("chrome:647MB | chrome:418MB"));
        assert_eq!(packed.text(2), None);

        // The static total covers every row.
        let total = merged.column(TOTAL_MEM).unwrap();
        assert!((0..4).all(|i| total.value(i) == Some(100.0)));

        let used = merged.column(USED_MEM).unwrap();
        let pct = merged.column(USAGE_PCT).unwrap();
        assert_eq!(used.value(1), Some(70.0));
        assert_eq!(pct.value(1), Some(70.0));
        assert_eq!(pct.value(3), Some(50.0));
    }

    #[test]
    fn derived_metrics_need_a_positive_total() {
        assert_eq!(derive_usage(Some(100.0), Some(30.0)), (Some(70.0), Some(70.0)));
        assert_eq!(derive_usage(Some(0.0), Some(30.0)), (None, None));
        assert_eq!(derive_usage(Some(-4.0), Some(30.0)), (None, None));
        assert_eq!(derive_usage(None, Some(30.0)), (None, None));
        assert_eq!(derive_usage(Some(100.0), None), (None, None));
    }

    #[test]
    fn no_derived_columns_without_both_inputs() {
        let hf = counters(&["2026-01-05 10:00:00"], &[1024.0]);
        let mut pd = NormalizedTable::new(vec![Some(ts("2026-01-05 10:00:00"))]);
        pd.push_column("Top5_Memory_MB", ColumnData::Text(vec![Some("a:1".into())]))
            .unwrap();
        let merged = Merger::new(35.0).unwrap().merge(hf, pd).unwrap();
        assert!(!merged.has_column(USED_MEM));
        assert!(!merged.has_column(USAGE_PCT));
    }
}
