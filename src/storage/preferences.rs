use anyhow::Result;

use super::schema::Database;

impl Database {
    // ========================================================================
    // User Preferences Operations
    // ========================================================================

    /// Get a single preference value by key.
    ///
    /// Keys use dotted convention: `history.view_history`,
    /// `history.current_session`, etc.
    ///
    /// # Returns
    ///
    /// The preference value if the key exists, or `None` if not set.
    pub async fn get_preference(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM user_preferences WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(value,)| value))
    }

    /// Set a preference value (UPSERT).
    ///
    /// Inserts the key-value pair if it doesn't exist, or updates the value and
    /// timestamp if the key already exists.
    pub async fn set_preference(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_preferences (key, value, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Remove a preference. Removing a missing key is not an error.
    pub async fn remove_preference(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM user_preferences WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Get all preferences matching a key prefix, ordered by key.
    pub async fn get_preferences_by_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        // Escape LIKE wildcards so a prefix like "a_b." only matches literally
        let escaped = prefix
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let pattern = format!("{}%", escaped);
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT key, value FROM user_preferences WHERE key LIKE ? ESCAPE '\\' ORDER BY key",
        )
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::Database;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_get_preference_missing() {
        let db = test_db().await;
        let value = db.get_preference("nonexistent.key").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_set_preference_upsert() {
        let db = test_db().await;
        db.set_preference("history.view_history", "[]").await.unwrap();
        db.set_preference("history.view_history", "[\"a\"]").await.unwrap();

        let value = db.get_preference("history.view_history").await.unwrap();
        assert_eq!(value, Some("[\"a\"]".to_string()));
    }

    #[tokio::test]
    async fn test_remove_preference() {
        let db = test_db().await;
        db.set_preference("history.current_session", "{}").await.unwrap();
        db.remove_preference("history.current_session").await.unwrap();
        assert_eq!(db.get_preference("history.current_session").await.unwrap(), None);

        // Removing again is a no-op
        db.remove_preference("history.current_session").await.unwrap();
    }

    #[tokio::test]
    async fn test_get_preferences_by_prefix_no_false_matches() {
        let db = test_db().await;
        db.set_preference("history.view_history", "[]").await.unwrap();
        db.set_preference("historyx.other", "1").await.unwrap();
        db.set_preference("view_history", "2").await.unwrap();

        let prefs = db.get_preferences_by_prefix("history.").await.unwrap();
        assert_eq!(prefs.len(), 1);
        assert_eq!(prefs[0].0, "history.view_history");
    }

    #[tokio::test]
    async fn test_prefix_underscore_is_literal() {
        let db = test_db().await;
        db.set_preference("a_b.key", "1").await.unwrap();
        db.set_preference("axb.key", "2").await.unwrap();

        let prefs = db.get_preferences_by_prefix("a_b.").await.unwrap();
        assert_eq!(prefs, vec![("a_b.key".to_string(), "1".to_string())]);
    }
}
