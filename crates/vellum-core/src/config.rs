//! Configuration for the watch, index, graph, and analysis subsystems.
//!
//! Each config has sane defaults from [`crate::defaults`] plus a
//! `from_env()` constructor. Environment variables use the `VELLUM_`
//! prefix; `.env` loading is the binary's responsibility (dotenvy).

use std::path::PathBuf;
use std::time::Duration;

use crate::defaults;
use crate::error::{Error, Result};

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<f32>().ok())
        .unwrap_or(default)
}

/// Watch / debounce configuration.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `VELLUM_DEBOUNCE_MS` | `500` | Quiet period before processing a change |
/// | `VELLUM_STABILITY_INTERVAL_MS` | `500` | Gap between the two stability reads |
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub debounce: Duration,
    pub stability_interval: Duration,
    /// Recognized note extensions (lowercase, no dot).
    pub note_extensions: Vec<String>,
    /// Vault folders whose contents are ignored.
    pub excluded_folders: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(defaults::DEBOUNCE_MS),
            stability_interval: Duration::from_millis(defaults::STABILITY_INTERVAL_MS),
            note_extensions: defaults::NOTE_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            excluded_folders: defaults::EXCLUDED_FOLDERS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl WatchConfig {
    pub fn from_env() -> Self {
        Self {
            debounce: Duration::from_millis(env_u64("VELLUM_DEBOUNCE_MS", defaults::DEBOUNCE_MS)),
            stability_interval: Duration::from_millis(env_u64(
                "VELLUM_STABILITY_INTERVAL_MS",
                defaults::STABILITY_INTERVAL_MS,
            )),
            ..Self::default()
        }
    }
}

/// Vault location and layout.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Absolute path to the vault root.
    pub root: PathBuf,
}

impl VaultConfig {
    pub fn from_env() -> Result<Self> {
        let root = std::env::var("VELLUM_VAULT_ROOT")
            .map(PathBuf::from)
            .map_err(|_| Error::Config("VELLUM_VAULT_ROOT is not set".to_string()))?;
        if !root.is_dir() {
            return Err(Error::Config(format!(
                "vault root does not exist: {}",
                root.display()
            )));
        }
        Ok(Self { root })
    }
}

/// Similarity band thresholds. Bands are half-open on the high side and
/// never overlap: `[suggest, merge)`, `[merge, duplicate)`, `[duplicate, 1]`.
#[derive(Debug, Clone)]
pub struct BandConfig {
    pub duplicate_min: f32,
    pub merge_min: f32,
    pub suggest_min: f32,
}

impl Default for BandConfig {
    fn default() -> Self {
        Self {
            duplicate_min: defaults::BAND_DUPLICATE_MIN,
            merge_min: defaults::BAND_MERGE_MIN,
            suggest_min: defaults::BAND_SUGGEST_MIN,
        }
    }
}

impl BandConfig {
    pub fn from_env() -> Self {
        Self {
            duplicate_min: env_f32("VELLUM_BAND_DUPLICATE_MIN", defaults::BAND_DUPLICATE_MIN),
            merge_min: env_f32("VELLUM_BAND_MERGE_MIN", defaults::BAND_MERGE_MIN),
            suggest_min: env_f32("VELLUM_BAND_SUGGEST_MIN", defaults::BAND_SUGGEST_MIN),
        }
    }
}

/// Composite-score weights for note suggestions.
#[derive(Debug, Clone)]
pub struct SuggestConfig {
    pub entity_weight: f32,
    pub graph_weight: f32,
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            entity_weight: defaults::ENTITY_WEIGHT,
            graph_weight: defaults::GRAPH_WEIGHT,
        }
    }
}

impl SuggestConfig {
    pub fn from_env() -> Self {
        Self {
            entity_weight: env_f32("VELLUM_ENTITY_WEIGHT", defaults::ENTITY_WEIGHT),
            graph_weight: env_f32("VELLUM_GRAPH_WEIGHT", defaults::GRAPH_WEIGHT),
        }
    }
}

/// Auto-tagging configuration.
#[derive(Debug, Clone)]
pub struct AutoTagConfig {
    /// Notes with a shorter body are not classified.
    pub min_content_length: usize,
    pub max_tags_per_note: usize,
}

impl Default for AutoTagConfig {
    fn default() -> Self {
        Self {
            min_content_length: defaults::TAG_MIN_CONTENT_LEN,
            max_tags_per_note: defaults::TAG_MAX_PER_NOTE,
        }
    }
}

impl AutoTagConfig {
    pub fn from_env() -> Self {
        Self {
            min_content_length: env_usize(
                "VELLUM_TAG_MIN_CONTENT_LEN",
                defaults::TAG_MIN_CONTENT_LEN,
            ),
            max_tags_per_note: env_usize("VELLUM_TAG_MAX_PER_NOTE", defaults::TAG_MAX_PER_NOTE),
        }
    }
}

/// Vault activity digest configuration.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `VELLUM_DIGEST_PERIOD_DAYS` | `1` | Activity window size |
/// | `VELLUM_DIGEST_INTERVAL_SECS` | `86400` | Gap between automatic digests |
#[derive(Debug, Clone)]
pub struct DigestConfig {
    pub period_days: u64,
    /// Interval between automatic digest generations.
    pub generation_interval: Duration,
    pub max_trending: usize,
    pub max_suggestions: usize,
    /// Similarity band for suggested connections, `[min, max)`.
    pub connection_min: f32,
    pub connection_max: f32,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            period_days: defaults::DIGEST_PERIOD_DAYS,
            generation_interval: Duration::from_secs(defaults::DIGEST_INTERVAL_SECS),
            max_trending: defaults::DIGEST_MAX_TRENDING,
            max_suggestions: defaults::DIGEST_MAX_SUGGESTIONS,
            connection_min: defaults::DIGEST_CONNECTION_MIN,
            connection_max: defaults::DIGEST_CONNECTION_MAX,
        }
    }
}

impl DigestConfig {
    pub fn from_env() -> Self {
        Self {
            period_days: env_u64("VELLUM_DIGEST_PERIOD_DAYS", defaults::DIGEST_PERIOD_DAYS),
            generation_interval: Duration::from_secs(env_u64(
                "VELLUM_DIGEST_INTERVAL_SECS",
                defaults::DIGEST_INTERVAL_SECS,
            )),
            max_trending: env_usize("VELLUM_DIGEST_MAX_TRENDING", defaults::DIGEST_MAX_TRENDING),
            max_suggestions: env_usize(
                "VELLUM_DIGEST_MAX_SUGGESTIONS",
                defaults::DIGEST_MAX_SUGGESTIONS,
            ),
            connection_min: env_f32("VELLUM_DIGEST_CONNECTION_MIN", defaults::DIGEST_CONNECTION_MIN),
            connection_max: env_f32("VELLUM_DIGEST_CONNECTION_MAX", defaults::DIGEST_CONNECTION_MAX),
        }
    }
}

/// Graph batching configuration.
#[derive(Debug, Clone)]
pub struct GraphBatchConfig {
    /// Interval between dirty-set flushes.
    pub flush_interval: Duration,
    /// Per-note extraction timeout within a batch.
    pub extraction_timeout: Duration,
}

impl Default for GraphBatchConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(defaults::BATCH_GRAPH_INTERVAL_SECS),
            extraction_timeout: Duration::from_secs(defaults::EXTRACTION_TIMEOUT_SECS),
        }
    }
}

impl GraphBatchConfig {
    pub fn from_env() -> Self {
        Self {
            flush_interval: Duration::from_secs(env_u64(
                "VELLUM_BATCH_GRAPH_INTERVAL_SECS",
                defaults::BATCH_GRAPH_INTERVAL_SECS,
            )),
            extraction_timeout: Duration::from_secs(env_u64(
                "VELLUM_EXTRACTION_TIMEOUT_SECS",
                defaults::EXTRACTION_TIMEOUT_SECS,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_config_defaults() {
        let cfg = WatchConfig::default();
        assert_eq!(cfg.debounce, Duration::from_millis(500));
        assert_eq!(cfg.stability_interval, Duration::from_millis(500));
        assert!(cfg.note_extensions.contains(&"md".to_string()));
        assert!(cfg.excluded_folders.contains(&".obsidian".to_string()));
    }

    #[test]
    fn test_band_config_defaults_ordered() {
        let cfg = BandConfig::default();
        assert!(cfg.suggest_min < cfg.merge_min);
        assert!(cfg.merge_min < cfg.duplicate_min);
    }

    #[test]
    fn test_suggest_config_defaults() {
        let cfg = SuggestConfig::default();
        assert!((cfg.entity_weight - 0.1).abs() < f32::EPSILON);
        assert!((cfg.graph_weight - 0.05).abs() < f32::EPSILON);
    }
}
