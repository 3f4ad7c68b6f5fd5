use crate::error::NormalizeError;
use crate::table::NormalizedTable;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

/// The two collector formats, told apart by file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dialect {
    /// ~1s performance-counter log (CPU, memory, disk counters).
    HighFrequency,
    /// Slower per-process log with packed Top-N columns.
    ProcessDetail,
}

impl Dialect {
    pub fn classify(file_name: &str, marker: &str) -> Self {
        if !marker.is_empty() && file_name.contains(marker) {
            Dialect::HighFrequency
        } else {
            Dialect::ProcessDetail
        }
    }
}

/// A raw log input: a file on disk or an in-memory upload.
#[derive(Debug, Clone)]
pub enum Source {
    File(PathBuf),
    Upload { name: String, bytes: Vec<u8> },
}

impl Source {
    /// File name used for classification and messages.
    pub fn name(&self) -> String {
        match self {
            Source::File(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            Source::Upload { name, .. } => name.clone(),
        }
    }

    /// Stable on-disk location, if any. Uploads have none.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Source::File(path) => Some(path),
            Source::Upload { .. } => None,
        }
    }

    pub fn read(&self) -> Result<Cow<'_, [u8]>, NormalizeError> {
        match self {
            Source::File(path) => fs::read(path)
                .map(Cow::Owned)
                .map_err(|source| NormalizeError::Read {
                    name: self.name(),
                    source,
                }),
            Source::Upload { bytes, .. } => Ok(Cow::Borrowed(bytes.as_slice())),
        }
    }
}

/// A normalized table tagged with the dialect it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Sample {
    HighFrequency(NormalizedTable),
    ProcessDetail(NormalizedTable),
}

impl Sample {
    pub fn dialect(&self) -> Dialect {
        match self {
            Sample::HighFrequency(_) => Dialect::HighFrequency,
            Sample::ProcessDetail(_) => Dialect::ProcessDetail,
        }
    }

    pub fn table(&self) -> &NormalizedTable {
        match self {
            Sample::HighFrequency(t) | Sample::ProcessDetail(t) => t,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_marker_substring() {
        assert_eq!(
            Dialect::classify("Global_Peak_Log_000001.csv", "Global_Peak"),
            Dialect::HighFrequency
        );
        assert_eq!(
            Dialect::classify("Process_Detail_20260105.csv", "Global_Peak"),
            Dialect::ProcessDetail
        );
    }
}
