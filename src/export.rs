//! Merged-table CSV export.

use crate::table::{NormalizedTable, TIMESTAMP};
use crate::Result;
use chrono::NaiveDateTime;
use std::io::Write;

const EXPORT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Write the table as CSV: `Timestamp` first, then every column in order.
/// Missing cells are empty. A UTF-8 BOM is written first so spreadsheet
/// tools pick the right encoding.
pub fn write_merged_csv<W: Write>(table: &NormalizedTable, mut out: W) -> Result<()> {
    out.write_all("\u{feff}".as_bytes())?;
    let mut writer = csv::Writer::from_writer(out);

    let mut header = vec![TIMESTAMP.to_string()];
    header.extend(table.column_names().map(str::to_string));
    writer.write_record(&header)?;

    for (i, ts) in table.timestamps().iter().enumerate() {
        let mut record = Vec::with_capacity(header.len());
        record.push(
            ts.map(|t| t.format(EXPORT_TIME_FORMAT).to_string())
                .unwrap_or_default(),
        );
        for col in table.columns() {
            record.push(col.data.display(i).unwrap_or_default());
        }
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// `Merged_Log_<YYYYMMDD_HHMM>.csv` for the given moment.
pub fn merged_file_name(now: NaiveDateTime) -> String {
    format!("Merged_Log_{}.csv", now.format("%Y%m%d_%H%M"))
}
