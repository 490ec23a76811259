//! Collaborator contracts the browsing core relies on.
//!
//! [`ContentStore`] stands in for the hosted document database and
//! [`PreferenceStore`] for the on-device key-value preferences. [`Database`]
//! implements both; tests wrap it to inject failures or count requests.
use async_trait::async_trait;
use thiserror::Error;

use crate::catalog::{BrokenSourceReport, ContentDraft, ContentQuery, ContentRecord, EpisodeRecord};
use crate::storage::Database;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or refused the request.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The request reached the store and failed there.
    #[error("Store request failed: {0}")]
    Request(#[from] anyhow::Error),
}

/// Queryable catalog collection.
#[async_trait]
pub trait ContentStore: Send + Sync + 'static {
    async fn query(&self, query: &ContentQuery) -> Result<Vec<ContentRecord>, StoreError>;

    /// Batched lookup by id. Result order is unspecified and missing ids are
    /// silently absent.
    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<ContentRecord>, StoreError>;

    async fn episodes(&self, season_id: &str) -> Result<Vec<EpisodeRecord>, StoreError>;

    /// Store a record, returning its id (assigned by the store when the draft
    /// has none).
    async fn upsert(&self, draft: &ContentDraft) -> Result<String, StoreError>;

    async fn report_broken_source(&self, report: &BrokenSourceReport) -> Result<(), StoreError>;
}

/// String key-value store scoped by a namespace.
#[async_trait]
pub trait PreferenceStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

#[async_trait]
impl ContentStore for Database {
    async fn query(&self, query: &ContentQuery) -> Result<Vec<ContentRecord>, StoreError> {
        Ok(self.query_content(query).await?)
    }

    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<ContentRecord>, StoreError> {
        Ok(self.get_content_by_ids(ids).await?)
    }

    async fn episodes(&self, season_id: &str) -> Result<Vec<EpisodeRecord>, StoreError> {
        Ok(self.get_episodes(season_id).await?)
    }

    async fn upsert(&self, draft: &ContentDraft) -> Result<String, StoreError> {
        Ok(self.upsert_content(draft).await?)
    }

    async fn report_broken_source(&self, report: &BrokenSourceReport) -> Result<(), StoreError> {
        Database::report_broken_source(self, report).await?;
        Ok(())
    }
}

/// Preferences under one dotted namespace of the database's key-value table.
#[derive(Debug, Clone)]
pub struct PreferenceScope {
    db: Database,
    namespace: String,
}

impl PreferenceScope {
    pub fn new(db: Database, namespace: impl Into<String>) -> Self {
        Self {
            db,
            namespace: namespace.into(),
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}.{}", self.namespace, key)
    }
}

#[async_trait]
impl PreferenceStore for PreferenceScope {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.db.get_preference(&self.key(key)).await?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        Ok(self.db.set_preference(&self.key(key), value).await?)
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        Ok(self.db.remove_preference(&self.key(key)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scopes_do_not_collide() {
        let db = Database::open(":memory:").await.unwrap();
        let history = PreferenceScope::new(db.clone(), "history");
        let theme = PreferenceScope::new(db.clone(), "theme");

        history.set("mode", "a").await.unwrap();
        theme.set("mode", "b").await.unwrap();

        assert_eq!(history.get("mode").await.unwrap().as_deref(), Some("a"));
        assert_eq!(theme.get("mode").await.unwrap().as_deref(), Some("b"));
        assert_eq!(
            db.get_preference("history.mode").await.unwrap().as_deref(),
            Some("a")
        );

        history.remove("mode").await.unwrap();
        assert_eq!(history.get("mode").await.unwrap(), None);
        assert_eq!(theme.get("mode").await.unwrap().as_deref(), Some("b"));
    }
}
