//! Integration tests for watch history persisted through SQLite preferences.
//!
//! A "restart" is modelled by building a fresh tracker over the same
//! database, the way a relaunched app would.

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use vitrine::config::Config;
use vitrine::history::{HistorySettings, HistoryTracker, WatchOutcome};
use vitrine::storage::Database;
use vitrine::store::{PreferenceScope, PreferenceStore, StoreError};

type TestClock = Box<dyn Fn() -> i64 + Send + Sync>;

fn tracker(
    db: &Database,
    now: &Arc<AtomicI64>,
    settings: HistorySettings,
) -> HistoryTracker<PreferenceScope, TestClock> {
    let now = now.clone();
    let clock: TestClock = Box::new(move || now.load(Ordering::SeqCst));
    HistoryTracker::with_clock(PreferenceScope::new(db.clone(), "history"), clock, settings)
}

/// Preferences that refuse writes to the history list while `full` is set.
struct FullDisk {
    inner: PreferenceScope,
    full: Arc<AtomicBool>,
}

#[async_trait]
impl PreferenceStore for FullDisk {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if key == "view_history" && self.full.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("disk full".into()));
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(key).await
    }
}

#[tokio::test]
async fn test_session_survives_restart() {
    let db = Database::open(":memory:").await.unwrap();
    let now = Arc::new(AtomicI64::new(1_700_000_000_000));

    let before = tracker(&db, &now, HistorySettings::default());
    before.start_watching("heat").await.unwrap();
    drop(before);

    now.fetch_add(90_000, Ordering::SeqCst);
    let after = tracker(&db, &now, HistorySettings::default());
    let outcome = after.check_pending_history().await.unwrap();

    assert_eq!(
        outcome,
        WatchOutcome::Recorded {
            content_id: "heat".into(),
            elapsed_ms: 90_000
        }
    );
    assert_eq!(after.history().await.unwrap(), vec!["heat"]);
    assert_eq!(
        after.check_pending_history().await.unwrap(),
        WatchOutcome::NoSession
    );
}

#[tokio::test]
async fn test_history_is_mru_capped_at_ten() {
    let db = Database::open(":memory:").await.unwrap();
    let now = Arc::new(AtomicI64::new(0));
    let t = tracker(&db, &now, HistorySettings::default());

    for i in 0..12 {
        t.start_watching(&format!("t{}", i)).await.unwrap();
        now.fetch_add(20_000, Ordering::SeqCst);
        t.stop_watching_and_save().await.unwrap();
    }
    let history = t.history().await.unwrap();
    assert_eq!(history.len(), 10);
    assert_eq!(history.first().map(String::as_str), Some("t11"));
    assert_eq!(history.last().map(String::as_str), Some("t2"));

    // Rewatching an older title moves it to the front without growing the list
    t.start_watching("t5").await.unwrap();
    now.fetch_add(20_000, Ordering::SeqCst);
    t.stop_watching_and_save().await.unwrap();
    let history = t.history().await.unwrap();
    assert_eq!(history.len(), 10);
    assert_eq!(&history[..3], &["t5", "t11", "t10"]);
    assert_eq!(history.iter().filter(|id| *id == "t5").count(), 1);
}

#[tokio::test]
async fn test_just_under_threshold_not_recorded() {
    let db = Database::open(":memory:").await.unwrap();
    let now = Arc::new(AtomicI64::new(0));
    let t = tracker(&db, &now, HistorySettings::default());

    t.start_watching("a").await.unwrap();
    now.fetch_add(19_999, Ordering::SeqCst);
    assert!(matches!(
        t.stop_watching_and_save().await.unwrap(),
        WatchOutcome::TooShort { .. }
    ));
    assert!(t.history().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_configured_pending_age_limit() {
    let db = Database::open(":memory:").await.unwrap();
    let now = Arc::new(AtomicI64::new(0));
    let config = Config {
        max_pending_age_secs: Some(3_600),
        ..Default::default()
    };
    let t = tracker(&db, &now, config.history_settings());
    assert_eq!(t.settings().max_pending_age, Some(Duration::from_secs(3_600)));

    t.start_watching("overnight").await.unwrap();
    now.fetch_add(3_600_001, Ordering::SeqCst);
    assert!(matches!(
        t.check_pending_history().await.unwrap(),
        WatchOutcome::Expired { .. }
    ));

    t.start_watching("evening").await.unwrap();
    now.fetch_add(3_600_000, Ordering::SeqCst);
    assert!(matches!(
        t.check_pending_history().await.unwrap(),
        WatchOutcome::Recorded { .. }
    ));
    assert_eq!(t.history().await.unwrap(), vec!["evening"]);
}

#[tokio::test]
async fn test_history_keys_do_not_leak_outside_namespace() {
    let db = Database::open(":memory:").await.unwrap();
    let now = Arc::new(AtomicI64::new(0));
    let t = tracker(&db, &now, HistorySettings::default());

    t.add_to_history("a").await.unwrap();
    t.start_watching("b").await.unwrap();

    let keys: Vec<String> = db
        .get_preferences_by_prefix("history.")
        .await
        .unwrap()
        .into_iter()
        .map(|(k, _)| k)
        .collect();
    assert_eq!(keys.len(), 2);
    assert!(keys.contains(&"history.view_history".to_string()));
    assert!(keys.contains(&"history.current_session".to_string()));
    assert_eq!(db.get_preference("view_history").await.unwrap(), None);
}

#[tokio::test]
async fn test_failed_history_write_still_clears_session() {
    let db = Database::open(":memory:").await.unwrap();
    let now = Arc::new(AtomicI64::new(1_700_000_000_000));
    let full = Arc::new(AtomicBool::new(true));
    let prefs = FullDisk {
        inner: PreferenceScope::new(db.clone(), "history"),
        full: full.clone(),
    };
    let clock_now = now.clone();
    let clock: TestClock = Box::new(move || clock_now.load(Ordering::SeqCst));
    let t = HistoryTracker::with_clock(prefs, clock, HistorySettings::default());

    t.start_watching("a").await.unwrap();
    now.fetch_add(30_000, Ordering::SeqCst);
    assert!(matches!(
        t.stop_watching_and_save().await,
        Err(StoreError::Unavailable(_))
    ));
    assert_eq!(t.pending_session().await.unwrap(), None);
    assert_eq!(db.get_preference("history.current_session").await.unwrap(), None);

    // Once writes succeed again, the lost session is not credited later
    full.store(false, Ordering::SeqCst);
    now.fetch_add(600_000, Ordering::SeqCst);
    assert_eq!(
        t.check_pending_history().await.unwrap(),
        WatchOutcome::NoSession
    );
    assert!(t.history().await.unwrap().is_empty());
}
