//! Lookups behind the detail screens: seasons and episodes of a series,
//! movies of a saga, recommendations and title search.
use crate::catalog::{ContentQuery, ContentRecord, Direction, EpisodeRecord, Filter, OrderField};
use crate::store::{ContentStore, StoreError};

/// Any-of membership queries accept at most this many values.
pub const MAX_ANY_OF_VALUES: usize = 10;

/// Candidates fetched before excluding the current record.
const RECOMMENDATION_FETCH: u32 = 10;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesDetail {
    /// Every season of the series, first season first.
    pub seasons: Vec<ContentRecord>,
    /// Episodes of the selected season.
    pub episodes: Vec<EpisodeRecord>,
}

/// Seasons sharing `season`'s series title plus the episodes of `season`.
pub async fn series_detail<S>(store: &S, season: &ContentRecord) -> Result<SeriesDetail, StoreError>
where
    S: ContentStore + ?Sized,
{
    let seasons_query = ContentQuery::new()
        .filter(Filter::SeriesTitleEq(season.series_title.clone()))
        .order_by(OrderField::SeasonNumber, Direction::Ascending);

    let (seasons, mut episodes) =
        futures::try_join!(store.query(&seasons_query), store.episodes(&season.id))?;
    episodes.sort_by_key(|e| e.episode_number);

    tracing::debug!(
        series = %season.series_title,
        seasons = seasons.len(),
        episodes = episodes.len(),
        "Series detail loaded"
    );
    Ok(SeriesDetail { seasons, episodes })
}

/// Everything tagged with a saga, oldest first.
pub async fn saga_movies<S>(store: &S, saga_id: &str) -> Result<Vec<ContentRecord>, StoreError>
where
    S: ContentStore + ?Sized,
{
    let query = ContentQuery::new()
        .filter(Filter::SagaEq(saga_id.to_string()))
        .order_by(OrderField::Year, Direction::Ascending);
    store.query(&query).await
}

/// Up to `limit` other records sharing at least one category with `record`.
pub async fn recommendations<S>(
    store: &S,
    record: &ContentRecord,
    limit: usize,
) -> Result<Vec<ContentRecord>, StoreError>
where
    S: ContentStore + ?Sized,
{
    if record.categories.is_empty() || limit == 0 {
        return Ok(Vec::new());
    }

    let categories: Vec<String> = record
        .categories
        .iter()
        .take(MAX_ANY_OF_VALUES)
        .cloned()
        .collect();
    let query = ContentQuery::new()
        .filter(Filter::CategoryContainsAny(categories))
        .limit(RECOMMENDATION_FETCH);

    let candidates = store.query(&query).await?;
    Ok(candidates
        .into_iter()
        .filter(|candidate| candidate.id != record.id)
        .take(limit)
        .collect())
}

/// Case-insensitive title substring search over the whole catalog.
///
/// The store has no text search, so every record is fetched and matched here.
pub async fn search_titles<S>(store: &S, needle: &str) -> Result<Vec<ContentRecord>, StoreError>
where
    S: ContentStore + ?Sized,
{
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return Ok(Vec::new());
    }

    let all = store.query(&ContentQuery::new()).await?;
    let scanned = all.len();
    let matches: Vec<ContentRecord> = all
        .into_iter()
        .filter(|record| record.title.to_lowercase().contains(&needle))
        .collect();

    tracing::debug!(scanned, matches = matches.len(), "Title search");
    Ok(matches)
}
