//! Normalized table: one timestamp column plus named, typed value columns.
//!
//! Every stage after the normalizer works on this shape. Rows may arrive in
//! any order; `sort_by_timestamp` establishes the ascending order the merge,
//! process and downsample stages rely on.

mod column;

pub use column::ColumnData;

use crate::Result;
use anyhow::bail;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Canonical name of the time column in every dialect.
pub const TIMESTAMP: &str = "Timestamp";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTable {
    timestamps: Vec<Option<NaiveDateTime>>,
    columns: Vec<Column>,
}

impl NormalizedTable {
    pub fn new(timestamps: Vec<Option<NaiveDateTime>>) -> Self {
        Self {
            timestamps,
            columns: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[Option<NaiveDateTime>] {
        &self.timestamps
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&ColumnData> {
        self.columns.iter().find(|c| c.name == name).map(|c| &c.data)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Add a new column. Names must be unique and lengths must match.
    pub fn push_column(&mut self, name: impl Into<String>, data: ColumnData) -> Result<()> {
        let name = name.into();
        if name == TIMESTAMP || self.has_column(&name) {
            bail!("duplicate column name: {}", name);
        }
        if data.len() != self.len() {
            bail!(
                "column {} has {} rows, table has {}",
                name,
                data.len(),
                self.len()
            );
        }
        self.columns.push(Column { name, data });
        Ok(())
    }

    /// Replace an existing column in place, or append it.
    pub fn set_column(&mut self, name: &str, data: ColumnData) -> Result<()> {
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(col) => {
                if data.len() != self.timestamps.len() {
                    bail!("column {} length mismatch on replace", name);
                }
                col.data = data;
                Ok(())
            }
            None => self.push_column(name, data),
        }
    }

    /// Select rows by index, in the given order.
    pub fn take(&self, idx: &[usize]) -> Self {
        Self {
            timestamps: idx
                .iter()
                .map(|&i| self.timestamps.get(i).copied().flatten())
                .collect(),
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    data: c.data.take(idx),
                })
                .collect(),
        }
    }

    pub fn is_sorted(&self) -> bool {
        self.timestamps.iter().all(Option::is_some) && self.timestamps.is_sorted()
    }

    /// Drop rows without a timestamp and stable-sort the rest ascending.
    pub fn sort_by_timestamp(self) -> Self {
        if self.is_sorted() {
            return self;
        }
        let mut order: Vec<usize> = (0..self.len())
            .filter(|&i| self.timestamps[i].is_some())
            .collect();
        order.sort_by_key(|&i| self.timestamps[i]);
        self.take(&order)
    }

    /// Keep rows whose timestamp lies in the inclusive range.
    pub fn filter_range(&self, from: Option<NaiveDateTime>, to: Option<NaiveDateTime>) -> Self {
        let keep: Vec<usize> = self
            .timestamps
            .iter()
            .enumerate()
            .filter_map(|(i, ts)| {
                let ts = (*ts)?;
                let after = from.is_none_or(|f| ts >= f);
                let before = to.is_none_or(|t| ts <= t);
                (after && before).then_some(i)
            })
            .collect();
        self.take(&keep)
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamps.iter().flatten().next().copied()
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamps.iter().rev().flatten().next().copied()
    }

    /// Downcast every numeric column to its smallest safe width.
    pub fn narrow(&mut self) {
        for col in &mut self.columns {
            let data = std::mem::replace(&mut col.data, ColumnData::Text(Vec::new()));
            col.data = data.narrow();
        }
    }

    /// Stack tables vertically. The result has the union of all column
    /// names in first-seen order; a table lacking a column contributes
    /// missing cells for it. Row order is preserved (no sorting).
    pub fn concat(tables: Vec<NormalizedTable>) -> Self {
        let mut names: Vec<String> = Vec::new();
        for t in &tables {
            for name in t.column_names() {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }

        let mut out = NormalizedTable::new(
            tables
                .iter()
                .flat_map(|t| t.timestamps.iter().copied())
                .collect(),
        );

        for name in names {
            // Every name came from some table, so a template always exists.
            let Some(template) = tables.iter().find_map(|t| t.column(&name)) else {
                continue;
            };
            let mut acc: Option<ColumnData> = None;
            for t in &tables {
                let part = match t.column(&name) {
                    Some(data) => data.clone(),
                    None => template.empty_like(t.len()),
                };
                acc = Some(match acc {
                    Some(prev) => prev.append(part),
                    None => part,
                });
            }
            if let Some(data) = acc {
                out.columns.push(Column { name, data });
            }
        }

        out.narrow();
        out
    }
}

#[cfg(test)]
pub(crate) fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table(times: &[Option<&str>], values: &[Option<f64>]) -> NormalizedTable {
        let mut t = NormalizedTable::new(times.iter().map(|s| s.map(ts)).collect());
        t.push_column("CPU(%)", ColumnData::Float64(values.to_vec()))
            .unwrap();
        t
    }

    #[test]
    fn sort_drops_null_timestamps_and_orders_rows() {
        let t = table(
            &[
                Some("2026-01-05 10:00:02"),
                None,
                Some("2026-01-05 10:00:01"),
            ],
            &[Some(2.0), Some(99.0), Some(1.0)],
        )
        .sort_by_timestamp();

        assert_eq!(t.len(), 2);
        assert!(t.is_sorted());
        assert_eq!(t.column("CPU(%)").unwrap().to_f64s(), vec![Some(1.0), Some(2.0)]);
    }

    #[test]
    fn push_column_rejects_duplicates_and_bad_lengths() {
        let mut t = table(&[Some("2026-01-05 10:00:00")], &[Some(1.0)]);
        assert!(t.push_column("CPU(%)", ColumnData::Float64(vec![None])).is_err());
        assert!(t.push_column(TIMESTAMP, ColumnData::Float64(vec![None])).is_err());
        assert!(t.push_column("Other", ColumnData::Float64(vec![])).is_err());
    }

    #[test]
    fn concat_unions_columns_and_fills_gaps() {
        let a = table(&[Some("2026-01-05 10:00:00")], &[Some(1.0)]);
        let mut b = NormalizedTable::new(vec![Some(ts("2026-01-05 10:00:01"))]);
        b.push_column("AvailableMem(MB)", ColumnData::Float64(vec![Some(512.0)]))
            .unwrap();

        let c = NormalizedTable::concat(vec![a, b]);
        assert_eq!(c.len(), 2);
        assert_eq!(c.column_names().collect::<Vec<_>>(), vec!["CPU(%)", "AvailableMem(MB)"]);
        assert_eq!(c.column("CPU(%)").unwrap().to_f64s(), vec![Some(1.0), None]);
        assert_eq!(
            c.column("AvailableMem(MB)").unwrap().to_f64s(),
            vec![None, Some(512.0)]
        );
    }

    #[test]
    fn filter_range_is_inclusive() {
        let t = table(
            &[
                Some("2026-01-05 10:00:00"),
                Some("2026-01-05 10:00:01"),
                Some("2026-01-05 10:00:02"),
            ],
            &[Some(0.0), Some(1.0), Some(2.0)],
        );
        let f = t.filter_range(Some(ts("2026-01-05 10:00:01")), Some(ts("2026-01-05 10:00:02")));
        assert_eq!(f.len(), 2);
        assert_eq!(f.first_timestamp(), Some(ts("2026-01-05 10:00:01")));
    }
}
