//! Packed per-process metrics.
//!
//! A packed cell holds `name:value | name:value ...` where each value starts
//! with a number and may carry a unit (`chrome:647MB`). A name can repeat
//! inside one cell (one entry per worker process); repeats are summed.

use crate::table::{ColumnData, NormalizedTable};
use chrono::NaiveDateTime;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

/// Cell spellings that mean "nothing to report" (compared case-insensitively).
const NO_ACTIVITY: &[&str] = &["no_active_io", "nan", "none", "null", "n/a"];

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessEntry {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessPeak {
    pub process: String,
    pub max_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessSample {
    pub timestamp: NaiveDateTime,
    pub process: String,
    pub value: f64,
}

pub struct PackedParser {
    number: Regex,
}

impl PackedParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            number: Regex::new(r"[0-9]+(?:\.[0-9]+)?|\.[0-9]+")?,
        })
    }

    /// Entries of one cell in order. Sentinels and blanks give none;
    /// entries without a colon or without a number are skipped.
    pub fn entries(&self, cell: &str) -> Vec<ProcessEntry> {
        let cell = cell.trim_matches(|c: char| c == '"' || c == '\'' || c.is_whitespace());
        if cell.is_empty() || NO_ACTIVITY.iter().any(|s| cell.eq_ignore_ascii_case(s)) {
            return Vec::new();
        }

        cell.split('|')
            .filter_map(|item| {
                let (name, raw) = item.trim().split_once(':')?;
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }
                let value: f64 = self.number.find(raw)?.as_str().parse().ok()?;
                Some(ProcessEntry {
                    name: name.to_string(),
                    value,
                })
            })
            .collect()
    }

    /// Per-name totals for one cell.
    pub fn cell_totals(&self, cell: &str) -> BTreeMap<String, f64> {
        let mut totals = BTreeMap::new();
        for entry in self.entries(cell) {
            *totals.entry(entry.name).or_insert(0.0) += entry.value;
        }
        totals
    }

    /// Highest per-cell total of each process across the column, largest first.
    pub fn peak_table(&self, column: &ColumnData) -> Vec<ProcessPeak> {
        let mut peaks: BTreeMap<String, f64> = BTreeMap::new();
        for i in 0..column.len() {
            let Some(cell) = column.text(i) else {
                continue;
            };
            for (name, total) in self.cell_totals(cell) {
                let peak = peaks.entry(name).or_insert(total);
                if total > *peak {
                    *peak = total;
                }
            }
        }

        let mut out: Vec<ProcessPeak> = peaks
            .into_iter()
            .map(|(process, max_value)| ProcessPeak { process, max_value })
            .collect();
        out.sort_by(|a, b| {
            b.max_value
                .partial_cmp(&a.max_value)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.process.cmp(&b.process))
        });
        out
    }

    /// Long-form (timestamp, process, value) rows for a packed column.
    /// A process missing from a cell gets no row for that timestamp.
    pub fn time_series(&self, table: &NormalizedTable, column: &str) -> Vec<ProcessSample> {
        let Some(data) = table.column(column) else {
            return Vec::new();
        };

        let mut rows = Vec::new();
        for (i, ts) in table.timestamps().iter().enumerate() {
            let (Some(timestamp), Some(cell)) = (ts, data.text(i)) else {
                continue;
            };
            for (process, value) in self.cell_totals(cell) {
                rows.push(ProcessSample {
                    timestamp: *timestamp,
                    process,
                    value,
                });
            }
        }
        rows
    }
}
