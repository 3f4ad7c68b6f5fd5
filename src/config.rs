//! Optional TOML configuration. Every field has a default, so an absent or
//! partial file is fine.

use crate::Result;
use anyhow::{Context, bail};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NormalizeConfig {
    /// File-name substring that marks the high-frequency counter dialect.
    #[serde(default = "default_high_frequency_marker")]
    pub high_frequency_marker: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Extension of the sibling artifact written next to each source file.
    #[serde(default = "default_cache_extension")]
    pub extension: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoaderConfig {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeConfig {
    /// Largest gap between a counter row and the process sample attached to it.
    #[serde(default = "default_tolerance_seconds")]
    pub tolerance_seconds: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenderConfig {
    #[serde(default = "default_low_points")]
    pub low_points: usize,
    #[serde(default = "default_medium_points")]
    pub medium_points: usize,
    #[serde(default = "default_high_points")]
    pub high_points: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default)]
    pub normalize: NormalizeConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            high_frequency_marker: default_high_frequency_marker(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            extension: default_cache_extension(),
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
        }
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            tolerance_seconds: default_tolerance_seconds(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            low_points: default_low_points(),
            medium_points: default_medium_points(),
            high_points: default_high_points(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            normalize: NormalizeConfig::default(),
            cache: CacheConfig::default(),
            loader: LoaderConfig::default(),
            merge: MergeConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_log_dir() -> String {
    if cfg!(windows) {
        r"C:\SystemLogs".to_string()
    } else {
        "./logs".to_string()
    }
}

fn default_high_frequency_marker() -> String {
    "Global_Peak".to_string()
}

fn default_cache_extension() -> String {
    "plcache".to_string()
}

fn default_max_workers() -> usize {
    8
}

fn default_tolerance_seconds() -> f64 {
    35.0
}

fn default_low_points() -> usize {
    2_000
}

fn default_medium_points() -> usize {
    5_000
}

fn default_high_points() -> usize {
    20_000
}

/// Load the config file, or defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let Some(path) = path else {
        return Ok(AppConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("read config file {}", path.display()))?;
    let cfg: AppConfig =
        toml::from_str(&text).with_context(|| format!("parse config file {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config file {}", path.display()))?;
    Ok(cfg)
}

impl AppConfig {
    fn validate(&self) -> Result<()> {
        let tolerance = self.merge.tolerance_seconds;
        if !tolerance.is_finite() || tolerance < 0.0 {
            bail!("[merge] tolerance_seconds must be a non-negative number, got {}", tolerance);
        }
        if self.loader.max_workers == 0 {
            bail!("[loader] max_workers must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            log_dir = "/var/log/perf"

            [merge]
            tolerance_seconds = 65.0
            "#,
        )
        .unwrap();

        assert_eq!(cfg.log_dir, "/var/log/perf");
        assert_eq!(cfg.merge.tolerance_seconds, 65.0);
        assert_eq!(cfg.loader.max_workers, 8);
        assert_eq!(cfg.normalize.high_frequency_marker, "Global_Peak");
        assert!(cfg.cache.enabled);
    }

    #[test]
    fn bad_values_are_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("perflog.toml");

        fs::write(&path, "[merge]\ntolerance_seconds = -1e300\n").unwrap();
        assert!(load_config(Some(&path)).is_err());

        fs::write(&path, "[loader]\nmax_workers = 0\n").unwrap();
        assert!(load_config(Some(&path)).is_err());

        fs::write(&path, "[merge]\ntolerance_seconds = 10.5\n").unwrap();
        assert_eq!(load_config(Some(&path)).unwrap().merge.tolerance_seconds, 10.5);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let res: std::result::Result<AppConfig, _> = toml::from_str("[merge]\nwindow = 3\n");
        assert!(res.is_err());
    }
}
