//! The browsing actor: home sections, the paginated grid and id-list screens.
//!
//! [`Browser`] is the single owner of all feed state. Store I/O runs on
//! spawned tasks that report back as [`FeedEvent`]s over an mpsc channel;
//! the owner applies them in [`Browser::pump`] / [`Browser::settle`] (or
//! [`Browser::drain`] from a UI tick), so nothing is ever mutated from two
//! places.
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::home::{HomeBarrier, HomeSection};
use super::ordering::order_by_ids;
use super::pager::{PageOutcome, Pager};
use crate::catalog::{ContentKind, ContentQuery, ContentRecord, Direction, Filter, OrderField, PageCursor};
use crate::history::{Clock, HistoryTracker, SystemClock};
use crate::store::{ContentStore, PreferenceStore, StoreError};

/// Capacity of the task-to-owner event channel.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Which slice of the catalog a browser shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// Every kind, no category tabs.
    All,
    /// One kind, with that kind's category tabs.
    Kind(ContentKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSettings {
    pub page_size: u32,
    pub home_section_limit: u32,
    pub movie_categories: Vec<String>,
    pub series_categories: Vec<String>,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            page_size: 21,
            home_section_limit: 10,
            movie_categories: Vec::new(),
            series_categories: Vec::new(),
        }
    }
}

/// Results sent from spawned store tasks back to the owning [`Browser`].
#[derive(Debug)]
pub enum FeedEvent {
    /// A home section finished. Failures arrive as empty `records`.
    SectionLoaded {
        section: HomeSection,
        generation: u64,
        records: Vec<ContentRecord>,
    },
    /// A grid page finished.
    PageLoaded {
        generation: u64,
        result: Result<Vec<ContentRecord>, String>,
    },
}

pub struct Browser<S, P, C = SystemClock> {
    store: Arc<S>,
    history: Arc<HistoryTracker<P, C>>,
    settings: FeedSettings,
    screen: Screen,
    tab: usize,

    pager: Pager,
    home: HomeBarrier,
    new_releases: Vec<ContentRecord>,
    trending: Vec<ContentRecord>,
    recently_watched: Vec<ContentRecord>,

    event_tx: mpsc::Sender<FeedEvent>,
    event_rx: mpsc::Receiver<FeedEvent>,
    /// Spawned tasks whose event has not been applied yet.
    outstanding: usize,
}

impl<S, P, C> Browser<S, P, C>
where
    S: ContentStore,
    P: PreferenceStore,
    C: Clock,
{
    pub fn new(
        store: Arc<S>,
        history: Arc<HistoryTracker<P, C>>,
        settings: FeedSettings,
        screen: Screen,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            history,
            settings,
            screen,
            tab: 0,
            pager: Pager::new(OrderField::PublishedAt),
            home: HomeBarrier::default(),
            new_releases: Vec::new(),
            trending: Vec::new(),
            recently_watched: Vec::new(),
            event_tx,
            event_rx,
            outstanding: 0,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn screen(&self) -> Screen {
        self.screen
    }

    /// Category tags behind tabs 1..n. Tab 0 is "all".
    pub fn categories(&self) -> &[String] {
        match self.screen {
            Screen::All => &[],
            Screen::Kind(ContentKind::Movie) => &self.settings.movie_categories,
            Screen::Kind(ContentKind::SeriesSeason) => &self.settings.series_categories,
        }
    }

    pub fn selected_tab(&self) -> usize {
        self.tab
    }

    pub fn current_category(&self) -> Option<&str> {
        match self.tab {
            0 => None,
            n => self.categories().get(n - 1).map(String::as_str),
        }
    }

    /// Grid items accumulated across pages, in server order.
    pub fn items(&self) -> &[ContentRecord] {
        self.pager.items()
    }

    pub fn cursor(&self) -> Option<&PageCursor> {
        self.pager.cursor()
    }

    pub fn new_releases(&self) -> &[ContentRecord] {
        &self.new_releases
    }

    pub fn trending(&self) -> &[ContentRecord] {
        &self.trending
    }

    /// The history section, most recently watched first.
    pub fn recently_watched(&self) -> &[ContentRecord] {
        &self.recently_watched
    }

    /// Whether a scroll-triggered continuation could return more records.
    pub fn has_more(&self) -> bool {
        self.pager.has_more()
    }

    /// Whether a grid page fetch is outstanding.
    pub fn is_loading(&self) -> bool {
        self.pager.is_loading()
    }

    /// Whether the loading placeholder should cover the screen.
    pub fn shows_placeholder(&self) -> bool {
        self.home.is_pending() || (self.pager.is_loading() && self.pager.items().is_empty())
    }

    pub fn home_barrier(&self) -> &HomeBarrier {
        &self.home
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Reconcile any pending watch session, then fan out the four home
    /// sections. Results arrive through [`pump`](Self::pump).
    pub async fn load_home_sections(&mut self) {
        match self.history.check_pending_history().await {
            Ok(outcome) => tracing::debug!(outcome = ?outcome, "Pending history reconciled"),
            Err(e) => tracing::warn!(error = %e, "Failed to reconcile pending history"),
        }

        let generation = self.home.start();
        tracing::debug!(generation, screen = ?self.screen, "Loading home sections");

        let limit = self.settings.home_section_limit;

        let store = self.store.clone();
        let query = self.scoped(ContentQuery::trending(limit));
        self.spawn_section(HomeSection::Trending, generation, async move {
            store.query(&query).await
        });

        let store = self.store.clone();
        let query = self.scoped(ContentQuery::newest(limit));
        self.spawn_section(HomeSection::NewReleases, generation, async move {
            store.query(&query).await
        });

        let store = self.store.clone();
        let history = self.history.clone();
        self.spawn_section(HomeSection::History, generation, async move {
            let ids = history.history().await?;
            fetch_ordered(store.as_ref(), &ids).await
        });

        let category = self.current_category().map(str::to_owned);
        self.load_page(category.as_deref(), true);
    }

    /// Request a grid page, optionally restricted to one category.
    ///
    /// A new query clears the grid and cursor first. A continuation while a
    /// page is in flight does nothing and returns `false`. Callers check
    /// [`has_more`](Self::has_more) before scroll-triggered continuations.
    pub fn load_page(&mut self, category: Option<&str>, is_new_query: bool) -> bool {
        let Some(request) = self.pager.begin(is_new_query) else {
            tracing::debug!(
                generation = self.pager.generation(),
                "Page fetch already in flight, ignoring continuation"
            );
            return false;
        };

        let mut query = self
            .scoped(ContentQuery::new())
            .order_by(OrderField::PublishedAt, Direction::Descending)
            .limit(self.settings.page_size)
            .start_after(request.start_after);
        if let Some(category) = category {
            query = query.filter(Filter::CategoryContains(category.to_string()));
        }

        let generation = request.generation;
        tracing::debug!(
            generation,
            category = category.unwrap_or("all"),
            is_new_query,
            "Fetching grid page"
        );

        self.outstanding += 1;
        let store = self.store.clone();
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = match catch_task_panic(async { store.query(&query).await }).await {
                Ok(Ok(records)) => Ok(records),
                Ok(Err(e)) => {
                    tracing::warn!(generation, error = %e, "Grid page fetch failed");
                    Err(e.to_string())
                }
                Err(panic_msg) => {
                    tracing::error!(generation, error = %panic_msg, "Grid page task panicked");
                    Err(panic_msg)
                }
            };
            if let Err(e) = tx.send(FeedEvent::PageLoaded { generation, result }).await {
                tracing::warn!(error = %e, event = "PageLoaded", "Channel send failed (receiver dropped)");
            }
        });
        true
    }

    /// Continue the grid under the current tab.
    pub fn load_more(&mut self) -> bool {
        let category = self.current_category().map(str::to_owned);
        self.load_page(category.as_deref(), false)
    }

    /// Switch category tab and start a fresh query for it.
    ///
    /// Returns `false` for an index past the last tab.
    pub fn select_tab(&mut self, index: usize) -> bool {
        if index > self.categories().len() {
            tracing::warn!(index, tabs = self.categories().len() + 1, "Tab index out of range");
            return false;
        }
        self.tab = index;
        let category = self.current_category().map(str::to_owned);
        tracing::debug!(tab = index, category = category.as_deref().unwrap_or("all"), "Tab selected");
        self.load_page(category.as_deref(), true)
    }

    /// Records for an ordered id list (favourites, watchlist), in list order.
    ///
    /// Ids the store no longer has are dropped. A failed lookup yields an
    /// empty list.
    pub async fn load_id_list(&self, ids: &[String]) -> Vec<ContentRecord> {
        match fetch_ordered(self.store.as_ref(), ids).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(count = ids.len(), error = %e, "Id list lookup failed, showing empty");
                Vec::new()
            }
        }
    }

    // ========================================================================
    // Event Application
    // ========================================================================

    /// Wait for and apply one task result. Returns `false` when nothing is
    /// outstanding.
    pub async fn pump(&mut self) -> bool {
        if self.outstanding == 0 {
            return false;
        }
        match self.event_rx.recv().await {
            Some(event) => {
                self.apply(event);
                true
            }
            None => false,
        }
    }

    /// Apply results until every spawned task has reported.
    pub async fn settle(&mut self) {
        while self.pump().await {}
    }

    /// Apply every result that is already available without waiting.
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.event_rx.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    fn apply(&mut self, event: FeedEvent) {
        self.outstanding = self.outstanding.saturating_sub(1);

        match event {
            FeedEvent::SectionLoaded {
                section,
                generation,
                records,
            } => {
                if generation != self.home.generation() {
                    tracing::debug!(
                        expected = self.home.generation(),
                        got = generation,
                        section = %section,
                        "Ignoring stale home section (generation mismatch)"
                    );
                    return;
                }
                tracing::debug!(section = %section, count = records.len(), "Home section loaded");
                match section {
                    HomeSection::NewReleases => self.new_releases = records,
                    HomeSection::Trending => self.trending = records,
                    HomeSection::History => self.recently_watched = records,
                    HomeSection::Catalog => {}
                }
                self.complete_section(section);
            }
            FeedEvent::PageLoaded { generation, result } => {
                let expected = self.pager.generation();
                match self.pager.complete(generation, result) {
                    PageOutcome::Stale => {
                        tracing::debug!(
                            expected,
                            got = generation,
                            "Ignoring stale page (generation mismatch)"
                        );
                        return;
                    }
                    PageOutcome::Appended(count) => {
                        tracing::debug!(generation, count, total = self.pager.items().len(), "Page appended");
                    }
                    PageOutcome::Exhausted => tracing::debug!(generation, "No more pages"),
                    PageOutcome::Failed => {}
                }
                // The first current page of a home load stands in for the catalog section
                if self.home.is_pending() && !self.home.is_complete(HomeSection::Catalog) {
                    self.complete_section(HomeSection::Catalog);
                }
            }
        }
    }

    fn complete_section(&mut self, section: HomeSection) {
        let generation = self.home.generation();
        if self.home.complete(generation, section) {
            tracing::info!(
                generation,
                new_releases = self.new_releases.len(),
                trending = self.trending.len(),
                history = self.recently_watched.len(),
                items = self.pager.items().len(),
                "Home feed ready"
            );
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Restrict a query to this screen's kind.
    fn scoped(&self, query: ContentQuery) -> ContentQuery {
        match self.screen {
            Screen::All => query,
            Screen::Kind(kind) => query.filter(Filter::KindEq(kind)),
        }
    }

    fn spawn_section<F>(&mut self, section: HomeSection, generation: u64, future: F)
    where
        F: Future<Output = Result<Vec<ContentRecord>, StoreError>> + Send + 'static,
    {
        self.outstanding += 1;
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let records = match catch_task_panic(future).await {
                Ok(Ok(records)) => records,
                Ok(Err(e)) => {
                    tracing::warn!(section = %section, error = %e, "Home section failed, showing empty");
                    Vec::new()
                }
                Err(panic_msg) => {
                    tracing::error!(section = %section, error = %panic_msg, "Home section task panicked");
                    Vec::new()
                }
            };
            let event = FeedEvent::SectionLoaded {
                section,
                generation,
                records,
            };
            if let Err(e) = tx.send(event).await {
                tracing::warn!(error = %e, event = "SectionLoaded", "Channel send failed (receiver dropped)");
            }
        });
    }
}

/// Fetch records for `ids` in one batched lookup, in `ids` order.
async fn fetch_ordered<S>(store: &S, ids: &[String]) -> Result<Vec<ContentRecord>, StoreError>
where
    S: ContentStore + ?Sized,
{
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let records = store.get_by_ids(ids).await?;
    Ok(order_by_ids(ids, records))
}

/// Run a task future, converting a panic into its message.
async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: Future<Output = T>,
{
    AssertUnwindSafe(future).catch_unwind().await.map_err(|panic| {
        if let Some(s) = panic.downcast_ref::<&'static str>() {
            s.to_string()
        } else if let Some(s) = panic.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        }
    })
}
