use anyhow::{bail, Result};
use sqlx::QueryBuilder;

use super::schema::Database;
use super::types::{ContentRow, EpisodeRow, CONTENT_COLUMNS};
use crate::catalog::{
    ContentDraft, ContentKind, ContentQuery, ContentRecord, Direction, EpisodeRecord, Filter,
    OrderField,
};

impl OrderField {
    fn column(&self) -> &'static str {
        match self {
            OrderField::PublishedAt => "published_at",
            OrderField::PopularityRank => "popularity_rank",
            OrderField::SeasonNumber => "season_number",
            OrderField::Year => "year",
        }
    }
}

impl Direction {
    fn sql(&self) -> &'static str {
        match self {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        }
    }

    fn after_op(&self) -> &'static str {
        match self {
            Direction::Ascending => ">",
            Direction::Descending => "<",
        }
    }
}

impl Database {
    // ========================================================================
    // Content Queries
    // ========================================================================

    /// Run a catalog query.
    ///
    /// Ordering ties are broken by id in the same direction as the order
    /// field, which is what makes `start_after` cursors stable.
    pub async fn query_content(&self, query: &ContentQuery) -> Result<Vec<ContentRecord>> {
        let mut builder: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM content c WHERE 1 = 1", CONTENT_COLUMNS));

        // Unknown kinds are excluded before LIMIT so they never shorten a page.
        builder.push(" AND lower(c.kind) IN (");
        let mut separated = builder.separated(", ");
        for tag in ContentKind::TAGS {
            separated.push_bind(*tag);
        }
        separated.push_unseparated(")");

        for filter in &query.filters {
            match filter {
                Filter::KindEq(kind) => {
                    builder.push(" AND c.kind = ").push_bind(kind.as_str());
                }
                Filter::SeriesTitleEq(title) => {
                    builder.push(" AND c.series_title = ").push_bind(title.clone());
                }
                Filter::SagaEq(saga) => {
                    builder.push(" AND c.saga_id = ").push_bind(saga.clone());
                }
                Filter::CategoryContains(category) => {
                    builder
                        .push(
                            " AND EXISTS (SELECT 1 FROM content_categories cc \
                             WHERE cc.content_id = c.id AND cc.category = ",
                        )
                        .push_bind(category.clone())
                        .push(")");
                }
                Filter::CategoryContainsAny(categories) => {
                    if categories.is_empty() {
                        builder.push(" AND 0");
                        continue;
                    }
                    builder.push(
                        " AND EXISTS (SELECT 1 FROM content_categories cc \
                         WHERE cc.content_id = c.id AND cc.category IN (",
                    );
                    let mut separated = builder.separated(", ");
                    for category in categories {
                        separated.push_bind(category.clone());
                    }
                    separated.push_unseparated("))");
                }
                Filter::PopularityAbove(rank) => {
                    builder.push(" AND c.popularity_rank > ").push_bind(*rank);
                }
            }
        }

        if let Some((field, direction)) = query.order {
            let column = field.column();
            builder.push(format!(" AND c.{} IS NOT NULL", column));

            if let Some(cursor) = &query.start_after {
                let op = direction.after_op();
                builder
                    .push(format!(" AND (c.{} {} ", column, op))
                    .push_bind(cursor.sort_value)
                    .push(format!(" OR (c.{} = ", column))
                    .push_bind(cursor.sort_value)
                    .push(format!(" AND c.id {} ", op))
                    .push_bind(cursor.id.clone())
                    .push("))");
            }

            builder.push(format!(
                " ORDER BY c.{} {}, c.id {}",
                column,
                direction.sql(),
                direction.sql()
            ));
        }

        if let Some(limit) = query.limit {
            builder.push(" LIMIT ").push_bind(i64::from(limit));
        }

        let rows: Vec<ContentRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().filter_map(ContentRow::into_record).collect())
    }

    /// Fetch records by id.
    ///
    /// Results come back in whatever order SQLite produces, not request order,
    /// matching the hosted store's batched lookup. Missing ids are skipped.
    /// Chunks at 500 ids per query to stay under SQLite bind-parameter limits.
    pub async fn get_content_by_ids(&self, ids: &[String]) -> Result<Vec<ContentRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        const CHUNK_SIZE: usize = 500;
        let mut result = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(CHUNK_SIZE) {
            let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(format!(
                "SELECT {} FROM content c WHERE c.id IN (",
                CONTENT_COLUMNS
            ));
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(id.clone());
            }
            separated.push_unseparated(")");

            let rows: Vec<ContentRow> = builder.build_query_as().fetch_all(&self.pool).await?;
            result.extend(rows.into_iter().filter_map(ContentRow::into_record));
        }

        Ok(result)
    }

    /// Episodes of a season, ordered by episode number.
    pub async fn get_episodes(&self, season_id: &str) -> Result<Vec<EpisodeRecord>> {
        let rows: Vec<EpisodeRow> = sqlx::query_as(
            r#"
            SELECT title, episode_number, sources
            FROM episodes
            WHERE content_id = ?
            ORDER BY episode_number ASC, id ASC
        "#,
        )
        .bind(season_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| row.into_episode(season_id))
            .collect())
    }

    pub async fn count_content(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM content")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // ========================================================================
    // Content Writes
    // ========================================================================

    /// Insert or replace a record with its categories and episodes.
    ///
    /// When the draft carries no id, the store assigns a random 20-character
    /// one. Returns the record id. Runs in one transaction so readers never see
    /// a record without its category rows.
    pub async fn upsert_content(&self, draft: &ContentDraft) -> Result<String> {
        let Some(kind) = draft.kind else {
            bail!("Content '{}' has no kind", draft.title);
        };
        if draft.title.trim().is_empty() {
            bail!("Content has an empty title");
        }

        let categories = serde_json::to_string(&draft.categories)?;
        let sources = serde_json::to_string(&draft.sources)?;

        let mut tx = self.pool.begin().await?;

        let id = match draft.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                let (generated,): (String,) =
                    sqlx::query_as("SELECT lower(hex(randomblob(10)))")
                        .fetch_one(&mut *tx)
                        .await?;
                generated
            }
        };

        sqlx::query(
            r#"
            INSERT INTO content (
                id, title, series_title, description, poster_url, kind, saga_id,
                categories, sources, season_number, year, popularity_rank,
                rating_imdb, rating_rotten, published_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                series_title = excluded.series_title,
                description = excluded.description,
                poster_url = excluded.poster_url,
                kind = excluded.kind,
                saga_id = excluded.saga_id,
                categories = excluded.categories,
                sources = excluded.sources,
                season_number = excluded.season_number,
                year = excluded.year,
                popularity_rank = excluded.popularity_rank,
                rating_imdb = excluded.rating_imdb,
                rating_rotten = excluded.rating_rotten,
                published_at = excluded.published_at
        "#,
        )
        .bind(&id)
        .bind(&draft.title)
        .bind(&draft.series_title)
        .bind(&draft.description)
        .bind(&draft.poster_url)
        .bind(kind.as_str())
        .bind(draft.saga_id.as_deref().filter(|s| !s.is_empty()))
        .bind(&categories)
        .bind(&sources)
        .bind(draft.season_number)
        .bind(draft.year)
        .bind(draft.popularity_rank)
        .bind(&draft.rating_imdb)
        .bind(&draft.rating_rotten)
        .bind(draft.published_at.map(|t| t.timestamp_millis()))
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM content_categories WHERE content_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        if !draft.categories.is_empty() {
            let mut builder: QueryBuilder<sqlx::Sqlite> =
                QueryBuilder::new("INSERT INTO content_categories (content_id, category) ");
            builder.push_values(&draft.categories, |mut b, category| {
                b.push_bind(id.clone()).push_bind(category.clone());
            });
            builder.build().execute(&mut *tx).await?;
        }

        sqlx::query("DELETE FROM episodes WHERE content_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        for episode in &draft.episodes {
            sqlx::query(
                "INSERT INTO episodes (content_id, title, episode_number, sources) VALUES (?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(&episode.title)
            .bind(episode.episode_number)
            .bind(serde_json::to_string(&episode.sources)?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(id = %id, kind = %kind, episodes = draft.episodes.len(), "Upserted content");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::{
        ContentDraft, ContentKind, ContentQuery, Direction, EpisodeRecord, Filter, OrderField,
        PageCursor,
    };
    use crate::storage::Database;
    use chrono::{TimeZone, Utc};

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    fn draft(id: &str, kind: ContentKind, published_ms: Option<i64>, categories: &[&str]) -> ContentDraft {
        ContentDraft {
            id: Some(id.to_string()),
            title: format!("Title {}", id),
            kind: Some(kind),
            categories: categories.iter().map(|c| c.to_string()).collect(),
            published_at: published_ms.map(|ms| Utc.timestamp_millis_opt(ms).unwrap()),
            ..Default::default()
        }
    }

    fn ids(records: &[crate::catalog::ContentRecord]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_upsert_assigns_id_when_missing() {
        let db = test_db().await;
        let mut d = draft("", ContentKind::Movie, Some(1), &[]);
        d.id = None;
        let id = db.upsert_content(&d).await.unwrap();
        assert_eq!(id.len(), 20);

        let fetched = db.get_content_by_ids(&[id.clone()]).await.unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].id, id);
    }

    #[tokio::test]
    async fn test_upsert_requires_kind() {
        let db = test_db().await;
        let mut d = draft("x", ContentKind::Movie, None, &[]);
        d.kind = None;
        assert!(db.upsert_content(&d).await.is_err());
    }

    #[tokio::test]
    async fn test_upsert_replaces_categories() {
        let db = test_db().await;
        db.upsert_content(&draft("a", ContentKind::Movie, Some(10), &["Drama"]))
            .await
            .unwrap();
        db.upsert_content(&draft("a", ContentKind::Movie, Some(10), &["Comedy"]))
            .await
            .unwrap();

        let drama = db
            .query_content(&ContentQuery::newest(10).filter(Filter::CategoryContains("Drama".into())))
            .await
            .unwrap();
        assert!(drama.is_empty());

        let comedy = db
            .query_content(&ContentQuery::newest(10).filter(Filter::CategoryContains("Comedy".into())))
            .await
            .unwrap();
        assert_eq!(ids(&comedy), vec!["a"]);
        assert_eq!(db.count_content().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_newest_orders_desc_and_excludes_unpublished() {
        let db = test_db().await;
        db.upsert_content(&draft("old", ContentKind::Movie, Some(100), &[])).await.unwrap();
        db.upsert_content(&draft("new", ContentKind::Movie, Some(300), &[])).await.unwrap();
        db.upsert_content(&draft("mid", ContentKind::SeriesSeason, Some(200), &[])).await.unwrap();
        db.upsert_content(&draft("draft", ContentKind::Movie, None, &[])).await.unwrap();

        let records = db.query_content(&ContentQuery::newest(10)).await.unwrap();
        assert_eq!(ids(&records), vec!["new", "mid", "old"]);

        let movies = db
            .query_content(&ContentQuery::newest(10).filter(Filter::KindEq(ContentKind::Movie)))
            .await
            .unwrap();
        assert_eq!(ids(&movies), vec!["new", "old"]);
    }

    #[tokio::test]
    async fn test_start_after_breaks_ties_by_id() {
        let db = test_db().await;
        for id in ["a", "b", "c", "d"] {
            db.upsert_content(&draft(id, ContentKind::Movie, Some(500), &[])).await.unwrap();
        }

        let first = db.query_content(&ContentQuery::newest(2)).await.unwrap();
        assert_eq!(ids(&first), vec!["d", "c"]);

        let cursor = PageCursor::after(first.last().unwrap(), OrderField::PublishedAt);
        let second = db
            .query_content(&ContentQuery::newest(2).start_after(cursor))
            .await
            .unwrap();
        assert_eq!(ids(&second), vec!["b", "a"]);

        let cursor = PageCursor::after(second.last().unwrap(), OrderField::PublishedAt);
        let third = db
            .query_content(&ContentQuery::newest(2).start_after(cursor))
            .await
            .unwrap();
        assert!(third.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_kinds_do_not_end_pagination() {
        let db = test_db().await;
        for (id, ms) in [("m1", 100), ("m2", 200), ("m3", 300), ("doc1", 400), ("doc2", 500)] {
            db.upsert_content(&draft(id, ContentKind::Movie, Some(ms), &[])).await.unwrap();
        }
        sqlx::query("UPDATE content SET kind = 'documentary' WHERE id LIKE 'doc%'")
            .execute(&db.pool)
            .await
            .unwrap();

        let first = db.query_content(&ContentQuery::newest(2)).await.unwrap();
        assert_eq!(ids(&first), vec!["m3", "m2"]);

        let cursor = PageCursor::after(first.last().unwrap(), OrderField::PublishedAt);
        let second = db
            .query_content(&ContentQuery::newest(2).start_after(cursor))
            .await
            .unwrap();
        assert_eq!(ids(&second), vec!["m1"]);
    }

    #[tokio::test]
    async fn test_trending_only_ranked_ascending() {
        let db = test_db().await;
        for (id, rank) in [("x", 0), ("first", 1), ("third", 3), ("second", 2)] {
            let mut d = draft(id, ContentKind::Movie, Some(1), &[]);
            d.popularity_rank = rank;
            db.upsert_content(&d).await.unwrap();
        }
        let records = db.query_content(&ContentQuery::trending(10)).await.unwrap();
        assert_eq!(ids(&records), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_contains_any_matches_each_record_once() {
        let db = test_db().await;
        db.upsert_content(&draft("both", ContentKind::Movie, Some(1), &["Drama", "Crime"]))
            .await
            .unwrap();
        db.upsert_content(&draft("one", ContentKind::Movie, Some(2), &["Crime"]))
            .await
            .unwrap();
        db.upsert_content(&draft("none", ContentKind::Movie, Some(3), &["Anime"]))
            .await
            .unwrap();

        let records = db
            .query_content(
                &ContentQuery::new()
                    .filter(Filter::CategoryContainsAny(vec!["Drama".into(), "Crime".into()]))
                    .order_by(OrderField::PublishedAt, Direction::Ascending),
            )
            .await
            .unwrap();
        assert_eq!(ids(&records), vec!["both", "one"]);

        let empty = db
            .query_content(&ContentQuery::new().filter(Filter::CategoryContainsAny(Vec::new())))
            .await
            .unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_get_by_ids_skips_missing() {
        let db = test_db().await;
        db.upsert_content(&draft("a", ContentKind::Movie, Some(1), &[])).await.unwrap();
        let records = db
            .get_content_by_ids(&["a".to_string(), "gone".to_string()])
            .await
            .unwrap();
        assert_eq!(ids(&records), vec!["a"]);
        assert!(db.get_content_by_ids(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_episodes_ordered_and_replaced_on_upsert() {
        let db = test_db().await;
        let mut season = draft("s1", ContentKind::SeriesSeason, Some(1), &[]);
        season.episodes = vec![
            EpisodeRecord { title: "Two".into(), episode_number: 2, ..Default::default() },
            EpisodeRecord { title: "One".into(), episode_number: 1, ..Default::default() },
        ];
        db.upsert_content(&season).await.unwrap();

        let episodes = db.get_episodes("s1").await.unwrap();
        let titles: Vec<_> = episodes.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["One", "Two"]);

        season.episodes = vec![EpisodeRecord {
            title: "Pilot".into(),
            episode_number: 1,
            ..Default::default()
        }];
        db.upsert_content(&season).await.unwrap();
        let episodes = db.get_episodes("s1").await.unwrap();
        let titles: Vec<_> = episodes.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Pilot"]);
    }
}
