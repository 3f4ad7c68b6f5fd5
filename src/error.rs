//! File-level normalization failures.
//!
//! The loader matches on these to skip a file; none of them abort a batch.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("failed to read {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed csv in {name}: {source}")]
    Csv {
        name: String,
        #[source]
        source: csv::Error,
    },

    #[error("{name} has no Timestamp column")]
    MissingTimestamp { name: String },

    #[error("{name} contains no data rows")]
    Empty { name: String },

    #[error("{name}: no row has a parseable timestamp")]
    Unparseable { name: String },
}
