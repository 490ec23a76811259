//! Configuration file parser for ~/.config/vitrine/config.toml.
//!
//! The file is optional. A missing or empty file yields `Config::default()`.
//! Unknown keys are accepted but logged, since they are usually typos.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::feed::FeedSettings;
use crate::history::HistorySettings;

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

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// Every field has a default, so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Records per grid page.
    pub page_size: u32,

    /// Records in each of the trending and new-releases rows.
    pub home_section_limit: u32,

    /// Minimum viewing time, in seconds, before a title enters history.
    pub watch_threshold_secs: u64,

    /// Maximum number of titles kept in history.
    pub history_capacity: usize,

    /// Pending sessions older than this are discarded on resume. Unset keeps
    /// sessions of any age.
    pub max_pending_age_secs: Option<u64>,

    /// Recommendations shown on a detail screen.
    pub recommendation_limit: usize,

    /// Category tabs of the movies screen, after "all".
    pub movie_categories: Vec<String>,

    /// Category tabs of the series screen, after "all".
    pub series_categories: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: 21,
            home_section_limit: 10,
            watch_threshold_secs: 20,
            history_capacity: 10,
            max_pending_age_secs: None,
            recommendation_limit: 6,
            movie_categories: [
                "Acción",
                "Aventura",
                "Crimen",
                "Deporte",
                "Infantiles",
                "Anime",
                "Comedia",
                "Romance",
                "Terror",
                "Fantasía",
            ]
            .map(String::from)
            .to_vec(),
            series_categories: [
                "Aventura",
                "Misterio",
                "Crimen",
                "Romance",
                "Drama",
                "Fantasía",
                "Comedia",
                "Ciencia Ficción",
            ]
            .map(String::from)
            .to_vec(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 8] = [
        "page_size",
        "home_section_limit",
        "watch_threshold_secs",
        "history_capacity",
        "max_pending_age_secs",
        "recommendation_limit",
        "movie_categories",
        "series_categories",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Zero page size or history capacity → `Err(ConfigError::Invalid)`
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
                // Deleted between metadata and read
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
        config.validate()?;
        tracing::info!(
            path = %path.display(),
            page_size = config.page_size,
            history_capacity = config.history_capacity,
            "Loaded configuration"
        );
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be at least 1".into()));
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::Invalid(
                "history_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn feed_settings(&self) -> FeedSettings {
        FeedSettings {
            page_size: self.page_size,
            home_section_limit: self.home_section_limit,
            movie_categories: self.movie_categories.clone(),
            series_categories: self.series_categories.clone(),
        }
    }

    pub fn history_settings(&self) -> HistorySettings {
        if self.max_pending_age_secs.is_none() {
            tracing::debug!("No max_pending_age_secs set, pending sessions of any age are credited");
        }
        HistorySettings {
            threshold: Duration::from_secs(self.watch_threshold_secs),
            capacity: self.history_capacity,
            max_pending_age: self.max_pending_age_secs.map(Duration::from_secs),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
