use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Content Kind
// ============================================================================

/// What a catalog entry represents.
///
/// Stored as the lowercase tag used by the catalog documents (`movie`, `series`)
/// so bundles exported from the hosted store import without translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Movie,
    #[serde(rename = "series")]
    SeriesSeason,
}

impl ContentKind {
    /// Every lowercase tag [`FromStr`] accepts.
    pub const TAGS: &'static [&'static str] = &["movie", "movies", "series", "serie", "season"];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Movie => "movie",
            ContentKind::SeriesSeason => "series",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "movie" | "movies" => Ok(ContentKind::Movie),
            "series" | "serie" | "season" => Ok(ContentKind::SeriesSeason),
            other => Err(format!("Unknown content kind: {}", other)),
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// One catalog entry: a movie, or one season of a series.
///
/// Records are read-only projections of store documents and are rebuilt on
/// every fetch. `id` is assigned by the store and never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRecord {
    pub id: String,
    pub title: String,
    /// Shared across every season of one series.
    #[serde(default)]
    pub series_title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub poster_url: String,
    pub kind: ContentKind,
    /// Grouping key for movie sequels.
    #[serde(default)]
    pub saga_id: Option<String>,
    #[serde(default)]
    pub categories: BTreeSet<String>,
    /// Source key (`source<N>_<label>`) to playable locator.
    #[serde(default)]
    pub sources: BTreeMap<String, String>,
    #[serde(default)]
    pub season_number: i64,
    #[serde(default)]
    pub year: i64,
    /// Position in the trending list; 0 means "not trending".
    #[serde(default)]
    pub popularity_rank: i64,
    #[serde(default)]
    pub rating_imdb: String,
    #[serde(default)]
    pub rating_rotten: String,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl ContentRecord {
    /// A bare record with every optional field empty.
    pub fn new(id: impl Into<String>, title: impl Into<String>, kind: ContentKind) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            series_title: String::new(),
            description: String::new(),
            poster_url: String::new(),
            kind,
            saga_id: None,
            categories: BTreeSet::new(),
            sources: BTreeMap::new(),
            season_number: 0,
            year: 0,
            popularity_rank: 0,
            rating_imdb: String::new(),
            rating_rotten: String::new(),
            published_at: None,
        }
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.categories.contains(category)
    }

    /// Source entries in display order.
    pub fn ordered_sources(&self) -> Vec<super::SourceEntry> {
        super::ordered_sources(&self.sources)
    }
}

/// A record as submitted for creation, before the store assigns an id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentDraft {
    /// Explicit id to keep (catalog imports); `None` lets the store assign one.
    pub id: Option<String>,
    pub title: String,
    pub series_title: String,
    pub description: String,
    pub poster_url: String,
    pub kind: Option<ContentKind>,
    pub saga_id: Option<String>,
    pub categories: BTreeSet<String>,
    pub sources: BTreeMap<String, String>,
    pub season_number: i64,
    pub year: i64,
    pub popularity_rank: i64,
    pub rating_imdb: String,
    pub rating_rotten: String,
    pub published_at: Option<DateTime<Utc>>,
    /// Episodes of a season, stored as children of the record.
    pub episodes: Vec<EpisodeRecord>,
}

/// One episode of a season record.
///
/// `episode_number` orders episodes but is not guaranteed unique.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EpisodeRecord {
    pub title: String,
    pub sources: BTreeMap<String, String>,
    pub episode_number: i64,
}

impl EpisodeRecord {
    pub fn ordered_sources(&self) -> Vec<super::SourceEntry> {
        super::ordered_sources(&self.sources)
    }
}

/// A user report that a playback source no longer works.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokenSourceReport {
    pub content_id: String,
    pub content_title: String,
    pub server_name: String,
    pub reported_url: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_str_accepts_catalog_tags() {
        assert_eq!("movie".parse::<ContentKind>(), Ok(ContentKind::Movie));
        assert_eq!("Series".parse::<ContentKind>(), Ok(ContentKind::SeriesSeason));
        assert!("podcast".parse::<ContentKind>().is_err());
    }

    #[test]
    fn test_every_tag_parses() {
        for tag in ContentKind::TAGS {
            assert!(tag.parse::<ContentKind>().is_ok(), "{} should parse", tag);
        }
    }

    #[test]
    fn test_record_deserializes_with_missing_optional_fields() {
        let json = r#"{"id":"abc","title":"Heat","kind":"movie"}"#;
        let record: ContentRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "abc");
        assert_eq!(record.kind, ContentKind::Movie);
        assert!(record.categories.is_empty());
        assert!(record.published_at.is_none());
        assert_eq!(record.popularity_rank, 0);
    }

    #[test]
    fn test_series_kind_serializes_as_series() {
        let json = serde_json::to_string(&ContentKind::SeriesSeason).unwrap();
        assert_eq!(json, "\"series\"");
    }
}
