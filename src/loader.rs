//! Fan-out of sources to the cache/normalizer, fan-in to the merger.

use crate::cache::{self, TableStore};
use crate::log::{Normalizer, Sample, Source};
use crate::merge::Merger;
use crate::table::NormalizedTable;
use crate::Result;
use anyhow::Context;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Hard upper bound on parallel normalization tasks.
const MAX_POOL_WIDTH: usize = 8;

pub struct Loader<S: TableStore> {
    normalizer: Normalizer,
    merger: Merger,
    store: S,
    max_workers: usize,
}

impl<S: TableStore> Loader<S> {
    pub fn new(normalizer: Normalizer, merger: Merger, store: S, max_workers: usize) -> Self {
        Self {
            normalizer,
            merger,
            store,
            max_workers,
        }
    }

    /// Load every source and merge them into one time-sorted table.
    ///
    /// Files that fail to normalize are skipped. `Ok(None)` means nothing
    /// usable was found.
    pub fn load(&self, sources: &[Source]) -> Result<Option<NormalizedTable>> {
        if sources.is_empty() {
            return Ok(None);
        }

        let workers = pool_width(self.max_workers, sources.len());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .context("build loader thread pool")?;

        let samples: Vec<Option<Sample>> = pool.install(|| {
            sources
                .par_iter()
                .map(|source| {
                    match cache::get_or_build(source, &self.normalizer, &self.store) {
                        Ok(sample) => Some(sample),
                        Err(err) => {
                            warn!("skipping {}: {}", source.name(), err);
                            None
                        }
                    }
                })
                .collect()
        });

        let mut high_freq = Vec::new();
        let mut process_detail = Vec::new();
        for sample in samples.into_iter().flatten() {
            match sample {
                Sample::HighFrequency(t) => high_freq.push(t),
                Sample::ProcessDetail(t) => process_detail.push(t),
            }
        }
        info!(
            "loaded {} counter and {} process files out of {}",
            high_freq.len(),
            process_detail.len(),
            sources.len()
        );

        let master = match (high_freq.is_empty(), process_detail.is_empty()) {
            (true, true) => return Ok(None),
            (false, true) => combine(high_freq),
            (true, false) => combine(process_detail),
            (false, false) => self
                .merger
                .merge(combine(high_freq), combine(process_detail))?,
        };

        if master.is_empty() {
            return Ok(None);
        }
        Ok(Some(master))
    }
}

/// Worker threads for `sources` files: at least one, never more than the
/// configured count, the file count or `MAX_POOL_WIDTH`.
fn pool_width(max_workers: usize, sources: usize) -> usize {
    max_workers.min(MAX_POOL_WIDTH).min(sources).max(1)
}

fn combine(tables: Vec<NormalizedTable>) -> NormalizedTable {
    NormalizedTable::concat(tables).sort_by_timestamp()
}

/// CSV files in `dir`, newest name first.
pub fn discover_logs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("read log directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    files.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
    Ok(files)
}
