//! Report model: dashboard summary and chart data built from the master table.

use crate::config::RenderConfig;
use crate::downsample::{Quality, reduce_for_quality};
use crate::log::PACKED_PREFIX;
use crate::merge::{PHYSICAL_MEM, TOTAL_MEM, USAGE_PCT, USED_MEM};
use crate::process::{PackedParser, ProcessPeak, ProcessSample};
use crate::table::NormalizedTable;
use chrono::{NaiveDateTime, TimeDelta};
use serde::Serialize;

/// Packed column holding per-process memory in MB.
pub const MEMORY_PACKED: &str = "Top5_Memory_MB";

const CPU_PCT: &str = "CPU(%)";
const SWAP_PCT: &str = "SwapUsage(%)";

/// Swap usage above this percentage counts as swapping.
const SWAP_THRESHOLD_PCT: f64 = 1.0;

/// Processes plotted in the memory trend chart.
const TREND_PROCESSES: usize = 5;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Serialize)]
pub struct SeriesView {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartView {
    pub title: String,
    pub timestamps: Vec<String>,
    pub series: Vec<SeriesView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeakTableView {
    pub column: String,
    pub peaks: Vec<ProcessPeak>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OffenderView {
    pub process: String,
    pub max_gb: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryView {
    pub rows: usize,
    pub first: Option<String>,
    pub last: Option<String>,
    /// `None` means unknown; there is no assumed default.
    pub physical_mem_gb: Option<f64>,
    pub os_total_mem_gb: Option<f64>,
    pub peak_used_gb: Option<f64>,
    pub peak_usage_pct: Option<f64>,
    pub peak_cpu_pct: Option<f64>,
    pub avg_cpu_pct: Option<f64>,
    /// First time swap usage rose above 1%.
    pub swap_started: Option<String>,
    /// Time from the lowest to the highest `Used(GB)` when the peak comes later.
    pub ramp_up: Option<String>,
    pub top_offender: Option<OffenderView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportData {
    pub quality: String,
    pub summary: SummaryView,
    pub charts: Vec<ChartView>,
    pub peaks: Vec<PeakTableView>,
    pub memory_trend: Vec<ProcessSample>,
}

/// Chart titles in display order.
const CHART_TITLES: &[&str] = &[
    "CPU (%)",
    "Memory (%)",
    "Memory used (GB)",
    "Disk busy (%)",
    "Disk queue",
    "Disk throughput (B/s)",
];

/// Which chart a numeric column belongs on, if any.
fn chart_title(name: &str) -> Option<&'static str> {
    let title = match name {
        USAGE_PCT | SWAP_PCT | "CommitUsage(%)" => "Memory (%)",
        USED_MEM => "Memory used (GB)",
        n if n.starts_with("CPU") && n.ends_with("(%)") => "CPU (%)",
        n if n.starts_with("DiskTime") => "Disk busy (%)",
        n if n.starts_with("DiskQueue") => "Disk queue",
        n if n.starts_with("DiskRead") || n.starts_with("DiskWrite") => "Disk throughput (B/s)",
        _ => return None,
    };
    Some(title)
}

/// Build report data. Performs:
/// - summary KPIs (installed memory, peaks, ramp-up, top offender)
/// - one downsampled chart per non-empty column group
/// - peak tables for every packed column
pub fn build_report_data(
    master: &NormalizedTable,
    parser: &PackedParser,
    quality: Quality,
    render: &RenderConfig,
) -> ReportData {
    let charts = CHART_TITLES
        .iter()
        .filter_map(|title| {
            let names: Vec<&str> = master
                .columns()
                .iter()
                .filter(|c| c.data.is_numeric() && chart_title(&c.name) == Some(*title))
                .map(|c| c.name.as_str())
                .collect();
            (!names.is_empty()).then(|| chart(master, title, &names, quality, render))
        })
        .collect();

    let peaks = master
        .columns()
        .iter()
        .filter(|c| c.name.starts_with(PACKED_PREFIX) && !c.data.is_numeric())
        .map(|c| PeakTableView {
            column: c.name.clone(),
            peaks: parser.peak_table(&c.data),
        })
        .collect();

    ReportData {
        quality: format!("{:?}", quality).to_lowercase(),
        summary: summarize(master, parser),
        charts,
        peaks,
        memory_trend: memory_trend(master, parser),
    }
}

fn chart(
    master: &NormalizedTable,
    title: &str,
    names: &[&str],
    quality: Quality,
    render: &RenderConfig,
) -> ChartView {
    let reduced = reduce_for_quality(master, names, quality, render);
    ChartView {
        title: title.to_string(),
        timestamps: reduced
            .timestamps()
            .iter()
            .map(|t| t.map(|t| fmt_time(&t)).unwrap_or_default())
            .collect(),
        series: names
            .iter()
            .filter_map(|name| {
                reduced.column(name).map(|data| SeriesView {
                    name: name.to_string(),
                    values: data.to_f64s(),
                })
            })
            .collect(),
    }
}

pub fn summarize(master: &NormalizedTable, parser: &PackedParser) -> SummaryView {
    let first_value = |name: &str| {
        master
            .column(name)
            .and_then(|c| (0..c.len()).find_map(|i| c.value(i)))
    };
    let peak = |name: &str| {
        master
            .column(name)
            .and_then(|c| c.to_f64s().into_iter().flatten().reduce(f64::max))
    };

    let mean = |name: &str| {
        let values: Vec<f64> = master.column(name)?.to_f64s().into_iter().flatten().collect();
        (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
    };
    let swap_started = master.column(SWAP_PCT).and_then(|c| {
        (0..c.len())
            .find(|&i| c.value(i).is_some_and(|v| v > SWAP_THRESHOLD_PCT))
            .and_then(|i| master.timestamps().get(i).copied().flatten())
    });

    let top_offender = master
        .column(MEMORY_PACKED)
        .and_then(|c| parser.peak_table(c).into_iter().next())
        .map(|p| OffenderView {
            process: p.process,
            max_gb: p.max_value / 1024.0,
        });

    SummaryView {
        rows: master.len(),
        first: master.first_timestamp().map(|t| fmt_time(&t)),
        last: master.last_timestamp().map(|t| fmt_time(&t)),
        physical_mem_gb: first_value(PHYSICAL_MEM),
        os_total_mem_gb: first_value(TOTAL_MEM),
        peak_used_gb: peak(USED_MEM),
        peak_usage_pct: peak(USAGE_PCT),
        peak_cpu_pct: peak(CPU_PCT),
        avg_cpu_pct: mean(CPU_PCT),
        swap_started: swap_started.map(|t| fmt_time(&t)),
        ramp_up: ramp_up(master).map(format_duration),
        top_offender,
    }
}

/// Duration from the first minimum to the first maximum of `Used(GB)`.
fn ramp_up(master: &NormalizedTable) -> Option<TimeDelta> {
    let used = master.column(USED_MEM)?;
    let mut lo: Option<(usize, f64)> = None;
    let mut hi: Option<(usize, f64)> = None;
    for i in 0..used.len() {
        let Some(v) = used.value(i) else {
            continue;
        };
        if lo.is_none_or(|(_, m)| v < m) {
            lo = Some((i, v));
        }
        if hi.is_none_or(|(_, m)| v > m) {
            hi = Some((i, v));
        }
    }
    let t_min = master.timestamps().get(lo?.0).copied().flatten()?;
    let t_max = master.timestamps().get(hi?.0).copied().flatten()?;
    (t_max > t_min).then(|| t_max - t_min)
}

fn memory_trend(master: &NormalizedTable, parser: &PackedParser) -> Vec<ProcessSample> {
    let Some(column) = master.column(MEMORY_PACKED) else {
        return Vec::new();
    };
    let top: Vec<String> = parser
        .peak_table(column)
        .into_iter()
        .take(TREND_PROCESSES)
        .map(|p| p.process)
        .collect();
    parser
        .time_series(master, MEMORY_PACKED)
        .into_iter()
        .filter(|s| top.contains(&s.process))
        .collect()
}

/// `H:MM:SS`, hours unbounded.
pub fn format_duration(d: TimeDelta) -> String {
    let secs = d.num_seconds().max(0);
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

fn fmt_time(t: &NaiveDateTime) -> String {
    t.format(TIME_FORMAT).to_string()
}
