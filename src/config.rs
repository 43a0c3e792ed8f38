//! Application configuration.
//!
//! Tuning knobs are loaded from a TOML file at:
//! 1. the `--config` command-line flag
//! 2. `$MBOXDELTA_CONFIG` (environment variable)
//! 3. `~/.config/mboxdelta/config.toml` (Linux/macOS)
//!    `%APPDATA%\mboxdelta\config.toml` (Windows)
//! 4. Built-in defaults
//!
//! The active mailing lists live in a separate properties file whose keys are
//! `project` or `project-listType`; see [`ActiveLists`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{IndexerError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Drop-folder scanning and worker pool settings.
    pub ingest: IngestConfig,
    /// MIME extraction settings.
    pub extract: ExtractConfig,
    /// Indexing service client settings.
    pub delivery: DeliveryConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override directory for the log file.
    pub log_dir: Option<PathBuf>,
}

/// Drop-folder scanning and worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Files modified more recently than this are left for the next run.
    pub min_file_age_ms: u64,
    /// How long to wait for workers after all files were submitted.
    pub shutdown_timeout_secs: u64,
}

/// MIME extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Maximum number of characters extracted from one attachment.
    pub attachment_char_limit: usize,
    /// Minimum sniffer confidence (0-100) to override a declared ISO-8859 charset.
    pub charset_confidence: u8,
}

/// Indexing service client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Whole-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: None,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            min_file_age_ms: 2000,
            shutdown_timeout_secs: 10,
        }
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            attachment_char_limit: 100_000,
            charset_confidence: 80,
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 60,
            connect_timeout_secs: 10,
        }
    }
}

impl IngestConfig {
    /// Minimum file age as a [`Duration`].
    pub fn min_file_age(&self) -> Duration {
        Duration::from_millis(self.min_file_age_ms)
    }

    /// Shutdown grace period as a [`Duration`].
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration from `explicit`, or from the standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config(explicit: Option<&Path>) -> Config {
    let path = explicit.map(Path::to_path_buf).or_else(config_file_path);
    if let Some(path) = path {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MBOXDELTA_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mboxdelta").join("config.toml"))
}

/// Return the directory the log file is written to.
pub fn log_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.log_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mboxdelta")
}

// ── Active mailing lists ────────────────────────────────────────

/// Immutable set of active `project` / `project-listType` keys.
///
/// Loaded once per run and shared read-only by every worker.
#[derive(Debug, Clone, Default)]
pub struct ActiveLists {
    keys: HashSet<String>,
}

impl ActiveLists {
    /// Build a set from explicit keys.
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Load keys from a properties file. Values are ignored.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| IndexerError::io(path, e))?;
        let lists = Self::parse_properties(&contents);
        tracing::info!(path = %path.display(), count = lists.len(), "Loaded active mail lists");
        Ok(lists)
    }

    /// Parse properties syntax: `key=value`, `key: value` or a bare `key`.
    ///
    /// Lines starting with `#` or `!` are comments.
    pub fn parse_properties(contents: &str) -> Self {
        let keys = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
            .filter_map(|line| {
                let end = line
                    .find(|c: char| c == '=' || c == ':' || c.is_whitespace())
                    .unwrap_or(line.len());
                let key = line[..end].trim();
                (!key.is_empty()).then(|| key.to_string())
            })
            .collect();
        Self { keys }
    }

    /// Whether `key` is an active mailing list.
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Number of active keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// `true` if no mailing list is active.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
