//! Watch-history heuristic.
//!
//! Opening a detail or player view starts a session marker; closing it
//! computes the elapsed wall-clock time and, past a threshold, moves the
//! content id to the front of a capped most-recently-watched list.
//!
//! Both the marker and the list live in a [`PreferenceStore`], so a session
//! left open by a killed process is reconciled by [`HistoryTracker::check_pending_history`]
//! on the next resume.
use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

use crate::store::{PreferenceStore, StoreError};

/// Preference key holding the serialized history list.
pub const HISTORY_KEY: &str = "view_history";
/// Preference key holding the serialized pending session.
pub const SESSION_KEY: &str = "current_session";

/// Sessions older than this are logged when credited without an age limit.
const STALE_SESSION_WARN: Duration = Duration::from_secs(24 * 60 * 60);

// ============================================================================
// Clock
// ============================================================================

/// Wall-clock source in Unix milliseconds.
pub trait Clock: Send + Sync + 'static {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

impl<F> Clock for F
where
    F: Fn() -> i64 + Send + Sync + 'static,
{
    fn now_millis(&self) -> i64 {
        self()
    }
}

// ============================================================================
// Persisted Shapes
// ============================================================================

/// The single active viewing session.
///
/// Serialized as `{"contentId": "...", "startTime": 1700000000000}`. A
/// floating-point `startTime` is accepted on read since older writers stored
/// numbers as doubles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSession {
    pub content_id: String,
    #[serde(deserialize_with = "millis_from_number")]
    pub start_time: i64,
}

fn millis_from_number<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() {
        return Err(serde::de::Error::custom("startTime is not a finite number"));
    }
    Ok(value as i64)
}

/// What closing a session did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    /// No session marker was stored.
    NoSession,
    /// The stored marker could not be parsed and was discarded.
    Malformed,
    /// Watched long enough; the id is now first in the history list.
    Recorded { content_id: String, elapsed_ms: i64 },
    /// Closed before the threshold; history unchanged.
    TooShort { content_id: String, elapsed_ms: i64 },
    /// Older than the configured maximum pending age; history unchanged.
    Expired { content_id: String, elapsed_ms: i64 },
}

// ============================================================================
// Settings
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistorySettings {
    /// Minimum session length that counts as watched.
    pub threshold: Duration,
    /// Maximum history length.
    pub capacity: usize,
    /// Pending sessions older than this are discarded instead of credited.
    /// `None` credits any age.
    pub max_pending_age: Option<Duration>,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            threshold: Duration::from_secs(20),
            capacity: 10,
            max_pending_age: None,
        }
    }
}

/// Move `content_id` to the front of `history`, dropping entries past `capacity`.
pub fn promote(history: &mut Vec<String>, content_id: &str, capacity: usize) {
    history.retain(|id| id != content_id);
    history.insert(0, content_id.to_string());
    history.truncate(capacity);
}

// ============================================================================
// Tracker
// ============================================================================

#[derive(Debug, Clone)]
pub struct HistoryTracker<P, C = SystemClock> {
    prefs: P,
    clock: C,
    settings: HistorySettings,
}

impl<P: PreferenceStore> HistoryTracker<P, SystemClock> {
    pub fn new(prefs: P, settings: HistorySettings) -> Self {
        Self::with_clock(prefs, SystemClock, settings)
    }
}

impl<P: PreferenceStore, C: Clock> HistoryTracker<P, C> {
    pub fn with_clock(prefs: P, clock: C, settings: HistorySettings) -> Self {
        Self {
            prefs,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &HistorySettings {
        &self.settings
    }

    /// Begin a viewing session, replacing any unfinished one.
    pub async fn start_watching(&self, content_id: &str) -> Result<(), StoreError> {
        let session = PendingSession {
            content_id: content_id.to_string(),
            start_time: self.clock.now_millis(),
        };
        let json = serde_json::to_string(&session).map_err(anyhow::Error::from)?;
        self.prefs.set(SESSION_KEY, &json).await?;
        tracing::debug!(content_id, start_time = session.start_time, "Viewing session started");
        Ok(())
    }

    /// Close the active session, crediting it to history if it lasted long enough.
    ///
    /// The marker is cleared whatever the outcome.
    pub async fn stop_watching_and_save(&self) -> Result<WatchOutcome, StoreError> {
        let Some(raw) = self.prefs.get(SESSION_KEY).await? else {
            return Ok(WatchOutcome::NoSession);
        };

        let session = match serde_json::from_str::<PendingSession>(&raw) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding malformed viewing session");
                self.prefs.remove(SESSION_KEY).await?;
                return Ok(WatchOutcome::Malformed);
            }
        };

        let elapsed_ms = self.clock.now_millis().saturating_sub(session.start_time);
        let content_id = session.content_id;

        let outcome = if elapsed_ms < duration_ms(self.settings.threshold) {
            WatchOutcome::TooShort {
                content_id,
                elapsed_ms,
            }
        } else if self
            .settings
            .max_pending_age
            .is_some_and(|max| elapsed_ms > duration_ms(max))
        {
            tracing::warn!(
                content_id = %content_id,
                elapsed_ms,
                "Pending session exceeds maximum age, not recording"
            );
            WatchOutcome::Expired {
                content_id,
                elapsed_ms,
            }
        } else {
            if elapsed_ms > duration_ms(STALE_SESSION_WARN) {
                tracing::warn!(
                    content_id = %content_id,
                    elapsed_ms,
                    "Crediting a session pending for over a day"
                );
            }
            WatchOutcome::Recorded {
                content_id,
                elapsed_ms,
            }
        };

        let added = match &outcome {
            WatchOutcome::Recorded { content_id, .. } => {
                self.add_to_history(content_id).await.map(drop)
            }
            _ => Ok(()),
        };
        self.prefs.remove(SESSION_KEY).await?;
        added?;
        tracing::debug!(outcome = ?outcome, "Viewing session closed");
        Ok(outcome)
    }

    /// Reconcile a session left open by an abnormal exit.
    ///
    /// Same as [`stop_watching_and_save`](Self::stop_watching_and_save); a
    /// no-op when nothing is pending.
    pub async fn check_pending_history(&self) -> Result<WatchOutcome, StoreError> {
        self.stop_watching_and_save().await
    }

    /// History ids, most recent first. A malformed stored list reads as empty.
    pub async fn history(&self) -> Result<Vec<String>, StoreError> {
        let Some(raw) = self.prefs.get(HISTORY_KEY).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(ids) => Ok(ids),
            Err(e) => {
                tracing::warn!(error = %e, "Malformed history list, treating as empty");
                Ok(Vec::new())
            }
        }
    }

    /// Put `content_id` first in the history list and persist it.
    pub async fn add_to_history(&self, content_id: &str) -> Result<Vec<String>, StoreError> {
        let mut history = self.history().await?;
        promote(&mut history, content_id, self.settings.capacity);
        let json = serde_json::to_string(&history).map_err(anyhow::Error::from)?;
        self.prefs.set(HISTORY_KEY, &json).await?;
        tracing::info!(content_id, len = history.len(), "Added to watch history");
        Ok(history)
    }

    /// The stored session marker, if any parses.
    pub async fn pending_session(&self) -> Result<Option<PendingSession>, StoreError> {
        Ok(self
            .prefs
            .get(SESSION_KEY)
            .await?
            .and_then(|raw| serde_json::from_str(&raw).ok()))
    }
}

fn duration_ms(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}
