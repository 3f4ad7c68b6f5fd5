//! Columnar cache of normalized tables.
//!
//! A store is keyed by source path. The filesystem store keeps one binary
//! artifact next to each source CSV and trusts it only while it is at least
//! as new as the source. Caching never affects results: every failure falls
//! back to normalizing the source again.

use crate::error::NormalizeError;
use crate::log::{Normalizer, Sample, Source};
use crate::Result;
use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Bumped whenever the encoded table layout changes.
const FORMAT_VERSION: u32 = 1;

pub trait TableStore: Sync {
    /// A previously stored table for `source`, if still valid.
    fn load(&self, source: &Path) -> Option<Sample>;

    fn save(&self, source: &Path, sample: &Sample) -> Result<()>;
}

/// Store that never holds anything.
pub struct NoCache;

impl TableStore for NoCache {
    fn load(&self, _source: &Path) -> Option<Sample> {
        None
    }

    fn save(&self, _source: &Path, _sample: &Sample) -> Result<()> {
        Ok(())
    }
}

#[derive(Serialize)]
struct ArtifactRef<'a> {
    version: u32,
    sample: &'a Sample,
}

#[derive(Deserialize)]
struct Artifact {
    version: u32,
    sample: Sample,
}

/// Sibling-file store: `logs/run.csv` is cached as `logs/run.<extension>`.
pub struct FsStore {
    extension: String,
}

impl FsStore {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }

    pub fn artifact_path(&self, source: &Path) -> PathBuf {
        source.with_extension(&self.extension)
    }
}

impl TableStore for FsStore {
    fn load(&self, source: &Path) -> Option<Sample> {
        let artifact = self.artifact_path(source);
        if artifact == source {
            return None;
        }

        let source_mtime = fs::metadata(source).ok()?.modified().ok()?;
        let artifact_mtime = fs::metadata(&artifact).ok()?.modified().ok()?;
        if artifact_mtime < source_mtime {
            debug!("cache artifact {} is stale", artifact.display());
            return None;
        }

        let bytes = fs::read(&artifact).ok()?;
        match bincode::deserialize::<Artifact>(&bytes) {
            Ok(a) if a.version == FORMAT_VERSION => Some(a.sample),
            Ok(a) => {
                debug!(
                    "cache artifact {} has format {} (want {})",
                    artifact.display(),
                    a.version,
                    FORMAT_VERSION
                );
                None
            }
            Err(err) => {
                debug!("cache artifact {} is unreadable: {}", artifact.display(), err);
                None
            }
        }
    }

    fn save(&self, source: &Path, sample: &Sample) -> Result<()> {
        let artifact = self.artifact_path(source);
        if artifact == source {
            bail!("cache artifact would overwrite its source {}", source.display());
        }
        let bytes = bincode::serialize(&ArtifactRef {
            version: FORMAT_VERSION,
            sample,
        })?;
        fs::write(&artifact, bytes)
            .with_context(|| format!("write cache artifact {}", artifact.display()))?;
        Ok(())
    }
}

/// Cached table for `source` if valid, otherwise normalize and store it.
///
/// Uploads have no stable path and always bypass the store. Store writes
/// are best-effort.
pub fn get_or_build<S: TableStore + ?Sized>(
    source: &Source,
    normalizer: &Normalizer,
    store: &S,
) -> std::result::Result<Sample, NormalizeError> {
    let Some(path) = source.path() else {
        return normalizer.normalize(source);
    };

    if let Some(sample) = store.load(path) {
        // A marker change in config can reclassify a file; the artifact then no longer applies.
        if sample.dialect() == normalizer.dialect_of(source) {
            debug!("cache hit for {}", path.display());
            return Ok(sample);
        }
    }

    let sample = normalizer.normalize(source)?;
    if let Err(err) = store.save(path, &sample) {
        debug!("cache write skipped for {}: {:#}", path.display(), err);
    }
    Ok(sample)
}
