//! On-disk configuration for the `timescrub` binary.
//!
//! ```toml
//! [cache]
//! block_ms = 100
//! read_ahead_blocks = 2
//!
//! [player]
//! interval_ms = 33
//! frame_period_ms = 16
//!
//! [source]
//! latency_ms = 20
//! window_ms = 1000
//! ```
//!
//! Every table and key is optional. Command-line flags override file values.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use timescrub_cache::CacheConfig;
use timescrub_player::PlayerConfig;

/// Simulated remote defaults.
pub const DEFAULT_LATENCY_MS: u64 = 20;
pub const DEFAULT_WINDOW_MS: i64 = 1000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Delay before the simulated remote answers a request.
    pub latency_ms: u64,
    /// How far back from the cursor each frame looks for a subject's latest record.
    pub window_ms: i64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            latency_ms: DEFAULT_LATENCY_MS,
            window_ms: DEFAULT_WINDOW_MS,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub cache: CacheConfig,
    pub player: PlayerConfig,
    pub source: SourceConfig,
}

impl AppConfig {
    /// `$XDG_CONFIG_HOME/timescrub/config.toml` (or the platform equivalent).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("timescrub").join("config.toml"))
    }

    /// Load from `path` if given (it must exist), else from the default
    /// location if present, else use defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = Self::from_toml(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.cache.validate()?;
        config.player.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.cache.block_ms, 100);
        assert_eq!(config.player.interval_ms, 33);
        assert_eq!(config.source.latency_ms, DEFAULT_LATENCY_MS);
    }

    #[test]
    fn test_partial_tables_keep_other_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [cache]
            block_ms = 250

            [source]
            latency_ms = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.cache.block_ms, 250);
        assert_eq!(config.cache.read_ahead_blocks, 2);
        assert_eq!(config.player, PlayerConfig::default());
        assert_eq!(config.source.latency_ms, 5);
        assert_eq!(config.source.window_ms, DEFAULT_WINDOW_MS);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(AppConfig::from_toml("[cache]\nblock_ms = 0\n").is_err());
        assert!(AppConfig::from_toml("[player]\ninterval_ms = -1\n").is_err());
        assert!(AppConfig::from_toml("[cache]\nblock_ms = \"wide\"\n").is_err());
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(AppConfig::load(Some(&missing)).is_err());

        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[player]\ninterval_ms = 40").unwrap();
        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.player.interval_ms, 40);
    }
}
