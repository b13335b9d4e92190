//! Configuration file parser for ~/.config/talkdigest/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde but logged, since they are usually typos.
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::digest::patterns::DISCUSSION_TAG;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Wiki `index.php` endpoint, used for the syndication feed.
    pub index_url: String,

    /// Wiki `api.php` endpoint, used for the change log and revision diffs.
    pub api_url: String,

    /// Change tag both sources are filtered by.
    pub tag: String,

    /// Maximum number of entries requested from each source.
    pub limit: u32,

    /// Size of the time window, in days.
    pub days: u32,

    /// How long a cached digest stays fresh, in seconds.
    pub cache_ttl_secs: u64,

    /// Per-request timeout applied by the HTTP client, in seconds.
    pub request_timeout_secs: u64,

    /// Name of the cache slot holding the default digest.
    pub cache_slot: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index_url: "https://en.wikipedia.org/w/index.php".to_string(),
            api_url: "https://en.wikipedia.org/w/api.php".to_string(),
            tag: DISCUSSION_TAG.to_string(),
            limit: 50,
            days: 1,
            cache_ttl_secs: 300,
            request_timeout_secs: 30,
            cache_slot: "recent-discussions".to_string(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 8] = [
        "index_url",
        "api_url",
        "tag",
        "limit",
        "days",
        "cache_ttl_secs",
        "request_timeout_secs",
        "cache_slot",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            api_url = %config.api_url,
            limit = config.limit,
            days = config.days,
            "Loaded configuration"
        );
        Ok(config)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(name: &str, content: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("talkdigest_config_test_{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    fn cleanup(path: &Path) {
        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.tag, "discussiontools-added-comment");
        assert_eq!(config.limit, 50);
        assert_eq!(config.days, 1);
        assert_eq!(config.cache_ttl_secs, 300);
        assert_eq!(config.cache_slot, "recent-discussions");
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/talkdigest_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.limit, 50);
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let path = write_config("whitespace", "   \n  \n  ");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.days, 1);
        cleanup(&path);
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let path = write_config("partial", "days = 7\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.days, 7);
        assert_eq!(config.limit, 50);
        assert_eq!(config.api_url, "https://en.wikipedia.org/w/api.php");
        cleanup(&path);
    }

    #[test]
    fn test_full_config() {
        let content = r#"
index_url = "https://wiki.example/w/index.php"
api_url = "https://wiki.example/w/api.php"
tag = "custom-tag"
limit = 100
days = 3
cache_ttl_secs = 60
request_timeout_secs = 10
cache_slot = "example-digest"
"#;
        let path = write_config("full", content);
        let config = Config::load(&path).unwrap();
        assert_eq!(config.index_url, "https://wiki.example/w/index.php");
        assert_eq!(config.api_url, "https://wiki.example/w/api.php");
        assert_eq!(config.tag, "custom-tag");
        assert_eq!(config.limit, 100);
        assert_eq!(config.days, 3);
        assert_eq!(config.cache_ttl_secs, 60);
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(config.cache_slot, "example-digest");
        cleanup(&path);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let path = write_config("invalid", "this is not [valid toml");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
        cleanup(&path);
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let path = write_config("unknown", "limit = 5\ntheme = \"dark\"\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.limit, 5);
        cleanup(&path);
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let path = write_config("wrongtype", "limit = \"many\"\n");
        assert!(Config::load(&path).is_err());
        cleanup(&path);
    }

    #[test]
    fn test_too_large_file_rejected() {
        let path = write_config("too_large", &"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));
        cleanup(&path);
    }
}
