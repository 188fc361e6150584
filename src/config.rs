//! TOML configuration for the node statistics recorder.
//!
//! The recorder itself only ever sees a [`StatsConfig`] handed to it at
//! construction time. [`NodeStatsConfig`] is the on-disk file wrapper used by
//! the binary, with defaults for every field and an environment variable
//! override for the file location.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::StatsError;

/// Number of history entries retained per status when not configured.
pub const DEFAULT_HISTORY_SIZE: usize = 10;

/// Largest accepted `history_size`.
pub const MAX_HISTORY_SIZE: usize = 100_000;

/// Directory holding `stats.json` when not configured.
pub const DEFAULT_HISTORY_DIR: &str = "/var/lib/nodestats/history";

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "NODESTATS_CONFIG";

/// System-wide config file location.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/nodestats/nodestats.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration file for the `nodestats` binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeStatsConfig {
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NodeStatsConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        config
            .stats
            .validate()
            .with_context(|| format!("invalid config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded nodestats configuration");
        Ok(config)
    }

    /// Try to load configuration from, in order:
    /// 1. The path in the `NODESTATS_CONFIG` environment variable.
    /// 2. `/etc/nodestats/nodestats.toml`.
    /// 3. Compiled-in defaults.
    pub fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "NODESTATS_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let system_path = Path::new(SYSTEM_CONFIG_PATH);
        if system_path.exists() {
            match Self::load(system_path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %system_path.display(),
                        error = %e,
                        "system config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Settings consumed by [`crate::stats::StatsStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// History entries kept per status, and the length of the mtime ring.
    pub history_size: usize,
    /// Directory containing `stats.json`. Created on first save.
    pub history_dir: PathBuf,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            history_size: DEFAULT_HISTORY_SIZE,
            history_dir: PathBuf::from(DEFAULT_HISTORY_DIR),
        }
    }
}

impl StatsConfig {
    pub fn new(history_size: usize, history_dir: impl Into<PathBuf>) -> Self {
        Self {
            history_size,
            history_dir: history_dir.into(),
        }
    }

    pub fn validate(&self) -> Result<(), StatsError> {
        if self.history_size == 0 {
            return Err(StatsError::InvalidConfig(
                "history_size must be at least 1".to_string(),
            ));
        }
        if self.history_size > MAX_HISTORY_SIZE {
            return Err(StatsError::InvalidConfig(format!(
                "history_size must be at most {MAX_HISTORY_SIZE}, got {}",
                self.history_size
            )));
        }
        Ok(())
    }

    /// Scope this configuration to a single node so that every tracked node
    /// writes its own `stats.json` under `<history_dir>/<node>`.
    pub fn for_node(&self, node: &str) -> Result<Self, StatsError> {
        let mut components = Path::new(node).components();
        let single_normal = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !single_normal {
            return Err(StatsError::InvalidConfig(format!(
                "node name '{node}' is not a plain directory name"
            )));
        }

        Ok(Self {
            history_size: self.history_size,
            history_dir: self.history_dir.join(node),
        })
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Emit JSON log lines instead of the human-readable format.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let cfg = NodeStatsConfig::default();

        assert_eq!(cfg.stats.history_size, 10);
        assert_eq!(
            cfg.stats.history_dir,
            PathBuf::from("/var/lib/nodestats/history")
        );
        assert_eq!(cfg.logging.level, "info");
        assert!(!cfg.logging.json);
        assert!(cfg.stats.validate().is_ok());
    }

    #[test]
    fn test_parse_example_toml() {
        let toml_str = r#"
[stats]
history_size = 25
history_dir = "/srv/nodestats"

[logging]
level = "debug"
json = true
"#;

        let cfg: NodeStatsConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(cfg.stats.history_size, 25);
        assert_eq!(cfg.stats.history_dir, PathBuf::from("/srv/nodestats"));
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.logging.json);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_str = r#"
[stats]
history_dir = "/tmp/stats"
"#;

        let cfg: NodeStatsConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(cfg.stats.history_size, DEFAULT_HISTORY_SIZE);
        assert_eq!(cfg.stats.history_dir, PathBuf::from("/tmp/stats"));
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_zero_history_size_rejected() {
        let cfg = StatsConfig::new(0, "/tmp/stats");
        assert!(matches!(cfg.validate(), Err(StatsError::InvalidConfig(_))));
    }

    #[test]
    fn test_oversized_history_size_rejected() {
        assert!(StatsConfig::new(MAX_HISTORY_SIZE, "/tmp/stats").validate().is_ok());

        let cfg = StatsConfig::new(MAX_HISTORY_SIZE + 1, "/tmp/stats");
        assert!(matches!(cfg.validate(), Err(StatsError::InvalidConfig(_))));

        let toml_str = format!("[stats]\nhistory_size = {}\n", i64::MAX);
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nodestats.toml");
        std::fs::write(&path, toml_str).unwrap();
        assert!(NodeStatsConfig::load(&path).is_err());
    }

    #[test]
    fn test_load_rejects_zero_history_size() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nodestats.toml");
        std::fs::write(&path, "[stats]\nhistory_size = 0\n").unwrap();

        assert!(NodeStatsConfig::load(&path).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nodestats.toml");
        std::fs::write(&path, "[stats]\nhistory_size = 3\n").unwrap();

        let cfg = NodeStatsConfig::load(&path).unwrap();
        assert_eq!(cfg.stats.history_size, 3);
    }

    #[test]
    fn test_for_node_scopes_directory() {
        let cfg = StatsConfig::new(4, "/srv/nodestats");
        let node = cfg.for_node("core-sw1").unwrap();

        assert_eq!(node.history_size, 4);
        assert_eq!(node.history_dir, PathBuf::from("/srv/nodestats/core-sw1"));
    }

    #[test]
    fn test_for_node_rejects_paths() {
        let cfg = StatsConfig::default();

        for bad in ["", "..", "a/b", "/etc", "."] {
            assert!(cfg.for_node(bad).is_err(), "accepted node name {bad:?}");
        }
    }
}
