use crate::config::NormalizeConfig;
use crate::error::NormalizeError;
use crate::log::dialect::{Dialect, Sample, Source};
use crate::log::headers::HeaderMapper;
use crate::log::time::{parse_high_frequency, parse_lenient};
use crate::table::{ColumnData, NormalizedTable, TIMESTAMP};
use crate::Result;
use csv::StringRecord;
use tracing::debug;

/// Prefix of the packed per-process columns in the process-detail dialect.
pub const PACKED_PREFIX: &str = "Top5_";

/// Turns one raw log into a typed, canonically named table.
///
/// Holds the compiled header patterns so it can be shared across worker
/// threads without recompiling per file.
pub struct Normalizer {
    marker: String,
    headers: HeaderMapper,
}

impl Normalizer {
    pub fn new(config: &NormalizeConfig) -> Result<Self> {
        Ok(Self {
            marker: config.high_frequency_marker.clone(),
            headers: HeaderMapper::new()?,
        })
    }

    pub fn dialect_of(&self, source: &Source) -> Dialect {
        Dialect::classify(&source.name(), &self.marker)
    }

    /// Normalize one source. Any error means "skip this file".
    pub fn normalize(&self, source: &Source) -> std::result::Result<Sample, NormalizeError> {
        let name = source.name();
        let bytes = source.read()?;
        let (headers, records) = read_csv(&name, &bytes)?;
        if records.is_empty() {
            return Err(NormalizeError::Empty { name });
        }

        let sample = match self.dialect_of(source) {
            Dialect::HighFrequency => {
                Sample::HighFrequency(self.high_frequency(&name, &headers, &records)?)
            }
            Dialect::ProcessDetail => {
                Sample::ProcessDetail(process_detail(&name, &headers, &records)?)
            }
        };
        debug!(
            "normalized {} as {:?}: {} rows, {} columns",
            name,
            sample.dialect(),
            sample.table().len(),
            sample.table().columns().len()
        );
        Ok(sample)
    }

    fn high_frequency(
        &self,
        name: &str,
        headers: &[String],
        records: &[StringRecord],
    ) -> std::result::Result<NormalizedTable, NormalizeError> {
        // First column is the collector's format marker; it always holds the time.
        let timestamps = records
            .iter()
            .map(|r| r.get(0).and_then(parse_high_frequency))
            .collect();
        let mut table = NormalizedTable::new(timestamps);

        for (idx, raw) in headers.iter().enumerate().skip(1) {
            let canonical = self
                .headers
                .canonical(raw)
                .unwrap_or_else(|| raw.clone());
            if canonical == TIMESTAMP || table.has_column(&canonical) {
                debug!("{}: dropping duplicate column {:?} ({:?})", name, canonical, raw);
                continue;
            }
            let data = numeric_column(records, idx);
            // Names were checked above and lengths come from `records`.
            if let Err(err) = table.push_column(canonical, data) {
                debug!("{}: {}", name, err);
            }
        }

        finish(name, table)
    }
}

fn process_detail(
    name: &str,
    headers: &[String],
    records: &[StringRecord],
) -> std::result::Result<NormalizedTable, NormalizeError> {
    let Some(ts_idx) = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(TIMESTAMP))
    else {
        return Err(NormalizeError::MissingTimestamp {
            name: name.to_string(),
        });
    };

    let timestamps = records
        .iter()
        .map(|r| r.get(ts_idx).and_then(parse_lenient))
        .collect();
    let mut table = NormalizedTable::new(timestamps);

    for (idx, header) in headers.iter().enumerate() {
        if idx == ts_idx {
            continue;
        }
        if table.has_column(header) {
            debug!("{}: dropping duplicate column {:?}", name, header);
            continue;
        }
        let data = if header.starts_with(PACKED_PREFIX) {
            text_column(records, idx)
        } else {
            value_column(records, idx)
        };
        if let Err(err) = table.push_column(header.clone(), data) {
            debug!("{}: {}", name, err);
        }
    }

    finish(name, table)
}

fn finish(
    name: &str,
    mut table: NormalizedTable,
) -> std::result::Result<NormalizedTable, NormalizeError> {
    if table.timestamps().iter().all(Option::is_none) {
        return Err(NormalizeError::Unparseable {
            name: name.to_string(),
        });
    }
    table.narrow();
    Ok(table)
}

fn read_csv(
    name: &str,
    bytes: &[u8],
) -> std::result::Result<(Vec<String>, Vec<StringRecord>), NormalizeError> {
    let csv_err = |source| NormalizeError::Csv {
        name: name.to_string(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let records = reader
        .records()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(csv_err)?;

    Ok((headers, records))
}

fn numeric_column(records: &[StringRecord], idx: usize) -> ColumnData {
    ColumnData::Float64(records.iter().map(|r| r.get(idx).and_then(coerce_numeric)).collect())
}

/// Numeric unless the column has text but no cell parses as a number
/// (e.g. `IP_Address`); such columns are kept as text.
fn value_column(records: &[StringRecord], idx: usize) -> ColumnData {
    let numeric = numeric_column(records, idx);
    if numeric.to_f64s().iter().any(Option::is_some) {
        return numeric;
    }
    let text = text_column(records, idx);
    if (0..text.len()).any(|i| !text.is_missing(i)) {
        text
    } else {
        numeric
    }
}

fn text_column(records: &[StringRecord], idx: usize) -> ColumnData {
    ColumnData::Text(
        records
            .iter()
            .map(|r| {
                r.get(idx)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            })
            .collect(),
    )
}

/// Numeric cell, or `None` for blanks and non-numeric tokens.
pub fn coerce_numeric(raw: &str) -> Option<f64> {
    let s = raw.trim().trim_matches('"').trim();
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ts;
    use pretty_assertions::assert_eq;

    const COUNTER_CSV: &str = concat!(
        "\"(PDH-CSV 4.0) (Korea Standard Time)(-540)\",",
        "\"\\\\WS\\Processor(_Total)\\% Processor Time\",",
        "\"\\\\WS\\Memory\\Available MBytes\",",
        "\"\\\\WS\\LogicalDisk(C:)\\% Disk Time\",",
        "\"\\\\WS\\LogicalDisk(_Total)\\% Disk Time\"\n",
        "\"01/05/2026 14:30:02.000\",\"12.5\",\"20480\",\"3.25\",\"1.5\"\n",
        "\"01/05/2026 14:30:01.000\",\" \",\"20000\",\"x\",\"2\"\n",
        "\"garbage\",\"1\",\"1\",\"1\",\"1\"\n",
    );

    fn normalizer() -> Normalizer {
        Normalizer::new(&NormalizeConfig::default()).unwrap()
    }

    fn upload(name: &str, text: &str) -> Source {
        Source::Upload {
            name: name.to_string(),
            bytes: text.as_bytes().to_vec(),
        }
    }

    #[test]
    fn high_frequency_log_gets_canonical_typed_columns() {
        let sample = normalizer()
            .normalize(&upload("Global_Peak_Log_000001.csv", COUNTER_CSV))
            .unwrap();
        let Sample::HighFrequency(table) = sample else {
            panic!("expected the counter dialect");
        };

        assert_eq!(
            table.column_names().collect::<Vec<_>>(),
            vec!["CPU(%)", "AvailableMem(MB)", "DiskTime_C(%)", "DiskTime(%)"]
        );
        assert_eq!(
            table.timestamps(),
            &[
                Some(ts("2026-01-05 14:30:02")),
                Some(ts("2026-01-05 14:30:01")),
                None
            ]
        );
        let cpu = table.column("CPU(%)").unwrap();
        assert_eq!(cpu.value(0), Some(12.5));
        assert_eq!(cpu.value(1), None);
        assert_eq!(table.column("DiskTime_C(%)").unwrap().value(1), None);
        assert_eq!(table.column("AvailableMem(MB)").unwrap().value(0), Some(20480.0));
    }

    #[test]
    fn process_detail_keeps_packed_columns_as_text() {
        let csv = "Timestamp, PhysicalMem(GB) ,OSTotalMem(GB),Top5_Memory_MB\n\
                   2026-01-05 14:30:00,32,31.8,\"chrome:647MB | code:300MB\"\n\
                   2026-01-05 14:30:30,32,31.8,No_Active_IO\n";
        let sample = normalizer()
            .normalize(&upload("Process_Detail_20260105.csv", csv))
            .unwrap();
        let Sample::ProcessDetail(table) = sample else {
            panic!("expected the process dialect");
        };

        assert_eq!(
            table.column_names().collect::<Vec<_>>(),
            vec!["PhysicalMem(GB)", "OSTotalMem(GB)", "Top5_Memory_MB"]
        );
        let packed = table.column("Top5_Memory_MB").unwrap();
        assert_eq!(packed.text(0), Some("chrome:647MB | code:300MB"));
        assert!(!packed.is_numeric());
        let total = table.column("OSTotalMem(GB)").unwrap().value(0).unwrap();
        assert!((total - 31.8).abs() < 1e-5);
    }

    #[test]
    fn process_detail_keeps_non_numeric_columns_as_text() {
        let csv = "Timestamp,IP_Address,CPU_Temp(C),Note\n\
                   2026-01-05 14:30:00,10.0.0.5,61,\n\
                   2026-01-05 14:30:30,10.0.0.5,n/a,\n";
        let Sample::ProcessDetail(table) = normalizer()
            .normalize(&upload("Process_Detail_20260105.csv", csv))
            .unwrap()
        else {
            panic!("expected the process dialect");
        };

        let ip = table.column("IP_Address").unwrap();
        assert!(!ip.is_numeric());
        assert_eq!(ip.display(0).as_deref(), Some("10.0.0.5"));
        // Mixed columns stay numeric; junk cells become missing.
        let temp = table.column("CPU_Temp(C)").unwrap();
        assert_eq!(temp.value(0), Some(61.0));
        assert_eq!(temp.value(1), None);
        // Entirely blank columns are numeric and all-missing.
        assert!(table.column("Note").unwrap().is_numeric());
    }

    #[test]
    fn file_level_failures_are_reported_not_raised() {
        let n = normalizer();
        assert!(matches!(
            n.normalize(&upload("Process_Detail.csv", "Time,Value\n1,2\n")),
            Err(NormalizeError::MissingTimestamp { .. })
        ));
        assert!(matches!(
            n.normalize(&upload("Process_Detail.csv", "Timestamp,Value\n")),
            Err(NormalizeError::Empty { .. })
        ));
        assert!(matches!(
            n.normalize(&upload("Global_Peak_Log.csv", "a,b\nnope,1\n")),
            Err(NormalizeError::Unparseable { .. })
        ));
        assert!(matches!(
            n.normalize(&Source::File("/definitely/not/here.csv".into())),
            Err(NormalizeError::Read { .. })
        ));
    }

    #[test]
    fn coerce_numeric_handles_quotes_and_junk() {
        assert_eq!(coerce_numeric("\"42.5\""), Some(42.5));
        assert_eq!(coerce_numeric(" "), None);
        assert_eq!(coerce_numeric("n/a"), None);
        assert_eq!(coerce_numeric("inf"), None);
    }
}
