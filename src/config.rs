use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Hashed feature-space dimension. Part of the on-disk model format.
pub const DEFAULT_HASH_DIMENSION: u32 = 1 << 18;

/// Number of query vectors searched per batch.
pub const DEFAULT_CHUNK_SIZE: usize = 512;

/// Detection knobs carried by a classifier and persisted with the model.
///
/// ```text
/// threshold       - cosine distance above which a line is an outlier
/// merge_distance  - gap (in lines) below which outlier blocks merge
/// before_context  - lines of context emitted before an outlier
/// after_context   - lines of context emitted after an outlier
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiftConfig {
    #[serde(default = "default_hash_dimension")]
    pub hash_dimension: u32,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    #[serde(default = "default_merge_distance")]
    pub merge_distance: usize,
    #[serde(default = "default_before_context")]
    pub before_context: usize,
    #[serde(default = "default_after_context")]
    pub after_context: usize,
}

const fn default_hash_dimension() -> u32 {
    DEFAULT_HASH_DIMENSION
}
const fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
const fn default_threshold() -> f32 {
    0.2
}
const fn default_merge_distance() -> usize {
    5
}
const fn default_before_context() -> usize {
    2
}
const fn default_after_context() -> usize {
    2
}

impl Default for SiftConfig {
    fn default() -> Self {
        Self {
            hash_dimension: DEFAULT_HASH_DIMENSION,
            chunk_size: DEFAULT_CHUNK_SIZE,
            threshold: 0.2,
            merge_distance: 5,
            before_context: 2,
            after_context: 2,
        }
    }
}

/// User settings file, deserialized from `.logsift.toml`.
///
/// Thresholds override `SiftConfig` defaults; the ignore lists are regex
/// sources applied as deny filters (file basenames, relative paths, raw
/// line content).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub threshold: Option<f32>,
    pub merge_distance: Option<usize>,
    pub before_context: Option<usize>,
    pub after_context: Option<usize>,

    /// Basename patterns for files to skip entirely.
    #[serde(default)]
    pub ignore_files: Vec<String>,

    /// Relative-path patterns for files to skip entirely.
    #[serde(default)]
    pub ignore_paths: Vec<String>,

    /// Line patterns excluded from both training and testing.
    #[serde(default)]
    pub ignore_lines: Vec<String>,
}

impl Settings {
    /// Fold the file-level overrides into a config record.
    pub fn apply(&self, config: &mut SiftConfig) {
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(merge) = self.merge_distance {
            config.merge_distance = merge;
        }
        if let Some(before) = self.before_context {
            config.before_context = before;
        }
        if let Some(after) = self.after_context {
            config.after_context = after;
        }
    }
}

/// Candidate settings paths in priority order:
/// 1. `.logsift.toml` in the current directory (repo-local)
/// 2. `{config_dir}/logsift/config.toml` (user-level, platform-native)
pub fn default_settings_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(".logsift.toml"));
    }
    if let Some(config) = dirs::config_dir() {
        paths.push(config.join("logsift/config.toml"));
    }
    paths
}

/// Try to load settings from `path`. Returns `Ok(Some(settings))` on
/// success, `Ok(None)` if the file does not exist, or `Err` for other
/// I/O / parse errors.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or contains
/// invalid TOML.
pub fn try_load_settings(path: &Path) -> anyhow::Result<Option<Settings>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(anyhow::Error::new(e)
                .context(format!("failed to read settings file: {}", path.display())));
        }
    };
    let settings: Settings = toml::from_str(&content)
        .with_context(|| format!("failed to parse settings file: {}", path.display()))?;
    Ok(Some(settings))
}

/// Load the first settings file found among the default paths, or the
/// defaults when none exists.
///
/// # Errors
///
/// Returns an error only for a file that exists but is unreadable or
/// malformed; a missing file is not an error.
pub fn load_default_settings() -> anyhow::Result<Settings> {
    for path in default_settings_paths() {
        if let Some(settings) = try_load_settings(&path)? {
            return Ok(settings);
        }
    }
    Ok(Settings::default())
}
