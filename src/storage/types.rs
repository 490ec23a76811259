use chrono::{TimeZone, Utc};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::catalog::{ContentKind, ContentRecord, EpisodeRecord};
use crate::util::strip_control_chars;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process has locked the database
    #[error("Another instance of vitrine appears to be running. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5): database is locked
        // SQLITE_LOCKED (6): database table is locked
        // SQLITE_CANTOPEN (14): unable to open database file
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

// ============================================================================
// Row Types
// ============================================================================

/// Column list matching [`ContentRow`], aliased on `c`.
pub(crate) const CONTENT_COLUMNS: &str = "c.id, c.title, c.series_title, c.description, \
     c.poster_url, c.kind, c.saga_id, c.categories, c.sources, c.season_number, c.year, \
     c.popularity_rank, c.rating_imdb, c.rating_rotten, c.published_at";

/// Internal row type for content queries (used by sqlx FromRow)
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ContentRow {
    pub id: String,
    pub title: String,
    pub series_title: String,
    pub description: String,
    pub poster_url: String,
    pub kind: String,
    pub saga_id: Option<String>,
    pub categories: String,
    pub sources: String,
    pub season_number: i64,
    pub year: i64,
    pub popularity_rank: i64,
    pub rating_imdb: String,
    pub rating_rotten: String,
    pub published_at: Option<i64>,
}

impl ContentRow {
    /// Convert into a record, or `None` if the stored kind is unknown.
    ///
    /// Text fields are stripped of control characters since they come from
    /// catalog documents edited outside this program.
    pub(crate) fn into_record(self) -> Option<ContentRecord> {
        let kind = match self.kind.parse::<ContentKind>() {
            Ok(kind) => kind,
            Err(e) => {
                tracing::warn!(id = %self.id, error = %e, "Skipping content with unknown kind");
                return None;
            }
        };

        let categories: BTreeSet<String> = decode_json(&self.id, "categories", &self.categories);
        let sources: BTreeMap<String, String> = decode_json(&self.id, "sources", &self.sources);
        let published_at = self
            .published_at
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single());

        Some(ContentRecord {
            title: strip_control_chars(&self.title).into_owned(),
            series_title: strip_control_chars(&self.series_title).into_owned(),
            description: strip_control_chars(&self.description).into_owned(),
            id: self.id,
            poster_url: self.poster_url,
            kind,
            saga_id: self.saga_id.filter(|s| !s.is_empty()),
            categories,
            sources,
            season_number: self.season_number,
            year: self.year,
            popularity_rank: self.popularity_rank,
            rating_imdb: self.rating_imdb,
            rating_rotten: self.rating_rotten,
            published_at,
        })
    }
}

/// Internal row type for episode queries
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct EpisodeRow {
    pub title: String,
    pub episode_number: i64,
    pub sources: String,
}

impl EpisodeRow {
    pub(crate) fn into_episode(self, season_id: &str) -> EpisodeRecord {
        EpisodeRecord {
            title: strip_control_chars(&self.title).into_owned(),
            sources: decode_json(season_id, "episode sources", &self.sources),
            episode_number: self.episode_number,
        }
    }
}

/// Decode a JSON column, falling back to the empty value on malformed data.
fn decode_json<T: serde::de::DeserializeOwned + Default>(id: &str, column: &str, raw: &str) -> T {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!(id = %id, column, error = %e, "Malformed JSON column, using empty value");
        T::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(kind: &str) -> ContentRow {
        ContentRow {
            id: "id1".into(),
            title: "\x1b[31mRed\x1b[0m Planet".into(),
            series_title: String::new(),
            description: String::new(),
            poster_url: String::new(),
            kind: kind.into(),
            saga_id: Some(String::new()),
            categories: r#"["Drama","Action"]"#.into(),
            sources: "not json".into(),
            season_number: 0,
            year: 2001,
            popularity_rank: 0,
            rating_imdb: String::new(),
            rating_rotten: String::new(),
            published_at: Some(1_700_000_000_000),
        }
    }

    #[test]
    fn test_into_record_sanitizes_and_decodes() {
        let record = row("movie").into_record().unwrap();
        assert_eq!(record.title, "Red Planet");
        assert!(record.has_category("Drama"));
        assert!(record.sources.is_empty());
        assert!(record.saga_id.is_none());
        assert_eq!(
            record.published_at.unwrap().timestamp_millis(),
            1_700_000_000_000
        );
    }

    #[test]
    fn test_into_record_skips_unknown_kind() {
        assert!(row("podcast").into_record().is_none());
    }
}
