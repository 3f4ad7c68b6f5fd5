//! Normalization of the two collector log dialects into `NormalizedTable`s.

pub mod dialect;
pub mod headers;
pub mod parse;
pub mod time;

pub use dialect::{Dialect, Sample, Source};
pub use parse::{Normalizer, PACKED_PREFIX};
