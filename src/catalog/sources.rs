//! Playback source keys and locators.
//!
//! Source maps are keyed `source<N>_<label>` where the ordinal only drives
//! display order. Locators are either a plain URL, `url::<url>`, or
//! `script::<markup>` for embedded players.
use std::collections::BTreeMap;
use thiserror::Error;
use url::Url;

/// A parsed source key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceKey {
    /// Display ordinal from a `source<N>_` prefix.
    pub ordinal: Option<u32>,
    /// Text after the first `_`, or the whole key when there is none.
    pub label: String,
    /// The key exactly as stored.
    pub raw: String,
}

impl SourceKey {
    pub fn parse(key: &str) -> Self {
        let ordinal = key
            .strip_prefix("source")
            .and_then(|rest| rest.split_once('_'))
            .and_then(|(digits, _)| {
                if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                    digits.parse::<u32>().ok()
                } else {
                    None
                }
            });
        let label = key
            .split_once('_')
            .map(|(_, label)| label)
            .unwrap_or(key)
            .to_string();

        Self {
            ordinal,
            label,
            raw: key.to_string(),
        }
    }

    /// Label shown on the source tab: first letter upper-cased.
    pub fn display_label(&self) -> String {
        let mut chars = self.label.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    fn sort_key(&self) -> (u32, &str) {
        (self.ordinal.unwrap_or(u32::MAX), self.raw.as_str())
    }
}

/// A source key paired with its locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub key: SourceKey,
    pub locator: String,
}

/// Order a source map for display.
///
/// Sorted by `(ordinal or u32::MAX, raw key)` so unnumbered keys come last and
/// ties are deterministic.
pub fn ordered_sources(sources: &BTreeMap<String, String>) -> Vec<SourceEntry> {
    let mut entries: Vec<SourceEntry> = sources
        .iter()
        .map(|(key, locator)| SourceEntry {
            key: SourceKey::parse(key),
            locator: locator.clone(),
        })
        .collect();
    entries.sort_by(|a, b| a.key.sort_key().cmp(&b.key.sort_key()));
    entries
}

// ============================================================================
// Playback Targets
// ============================================================================

#[derive(Debug, Error, PartialEq)]
pub enum LocatorError {
    #[error("Empty playback locator")]
    Empty,

    #[error("Invalid playback URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
}

/// What the embedded player surface should load.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackTarget {
    /// Markup to wrap in a full-screen host page.
    Embed(String),
    Url(Url),
}

impl PlaybackTarget {
    pub fn parse(locator: &str) -> Result<Self, LocatorError> {
        let locator = locator.trim();
        if locator.is_empty() {
            return Err(LocatorError::Empty);
        }

        let (tag, data) = match locator.split_once("::") {
            Some((tag, data)) => (Some(tag), data),
            None => (None, locator),
        };

        match tag {
            Some("script") => {
                if data.trim().is_empty() {
                    return Err(LocatorError::Empty);
                }
                Ok(PlaybackTarget::Embed(data.to_string()))
            }
            Some("url") => parse_http_url(data),
            _ => parse_http_url(locator),
        }
    }
}

fn parse_http_url(raw: &str) -> Result<PlaybackTarget, LocatorError> {
    if raw.trim().is_empty() {
        return Err(LocatorError::Empty);
    }
    let url = Url::parse(raw.trim()).map_err(|e| LocatorError::InvalidUrl(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(PlaybackTarget::Url(url)),
        other => Err(LocatorError::UnsupportedScheme(other.to_string())),
    }
}
