mod error;
mod models;
mod store;

pub use error::{Result, StoreError};
pub use models::{
  CONTINUITY_THRESHOLD_SECS, IngestSummary, PlayerInfo, PlayerRecord, Records, Snapshot,
};
pub use store::{JsonFileStore, MemoryStore, RecordStore};

use std::cmp::Reverse;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Apply one snapshot to the record store.
///
/// Every visible name gets a record and an open session. A visible player is
/// credited the time since they were last seen when that gap is under
/// [`CONTINUITY_THRESHOLD_SECS`]; `last_seen` advances either way. Players
/// with an open session who are no longer visible have it closed, and nothing
/// else about them changes.
pub fn ingest_snapshot(records: &mut Records, snapshot: &Snapshot) -> IngestSummary {
  let now = snapshot.taken_at;
  let mut summary = IngestSummary::default();

  for name in &snapshot.players {
    let Some(record) = records.get_mut(name) else {
      records.insert(name.clone(), PlayerRecord::first_seen(now));
      summary.opened.push(name.clone());
      continue;
    };

    if record.session_start.is_none() {
      record.session_start = Some(now);
      summary.opened.push(name.clone());
    }

    // Backwards clock jumps credit nothing. Loaded timestamps are untrusted,
    // so the gap saturates instead of overflowing.
    let diff = now.saturating_sub(record.last_seen.unwrap_or(now));
    if (0..CONTINUITY_THRESHOLD_SECS).contains(&diff) {
      record.total_time = record.total_time.saturating_add(diff as u64);
      summary.credited = summary.credited.saturating_add(diff as u64);
    }

    record.last_seen = Some(now);
  }

  for (name, record) in records.iter_mut() {
    if !snapshot.players.contains(name) && record.session_start.take().is_some() {
      summary.closed.push(name.clone());
    }
  }

  summary
}

/// Player presence tracker backed by a [`RecordStore`].
///
/// Ingests are serialized behind the write lock, which is held until the
/// store has been rewritten. Queries take the read lock and return owned
/// copies, so they never observe a half-applied snapshot.
pub struct Tracker {
  records: RwLock<Records>,
  store: Arc<dyn RecordStore>,
}

impl Tracker {
  /// Load the records from `store` and track on top of them.
  pub async fn open(store: impl RecordStore) -> Result<Self> {
    let store: Arc<dyn RecordStore> = Arc::new(store);
    let loader = Arc::clone(&store);
    let records = tokio::task::spawn_blocking(move || loader.load()).await??;

    info!(players = records.len(), "player records loaded");
    Ok(Self {
      records: RwLock::new(records),
      store,
    })
  }

  /// Tracker with an empty [`MemoryStore`] (useful for testing).
  pub fn in_memory() -> Self {
    Self {
      records: RwLock::new(Records::new()),
      store: Arc::new(MemoryStore::new()),
    }
  }

  /// Apply a snapshot and persist the full store.
  ///
  /// If persisting fails the in-memory change is kept; the next successful
  /// ingest writes it out.
  pub async fn ingest(&self, snapshot: &Snapshot) -> Result<IngestSummary> {
    let mut records = self.records.write().await;
    let summary = ingest_snapshot(&mut records, snapshot);

    let to_save = records.clone();
    let store = Arc::clone(&self.store);
    tokio::task::spawn_blocking(move || store.save(&to_save)).await??;

    debug!(
      taken_at = snapshot.taken_at,
      visible = snapshot.players.len(),
      opened = summary.opened.len(),
      closed = summary.closed.len(),
      credited = summary.credited,
      "ingested snapshot"
    );
    Ok(summary)
  }

  /// The `limit` players with the most accumulated time, highest first.
  /// Ties are ordered by name.
  pub async fn top_players(&self, limit: usize) -> Vec<(String, PlayerRecord)> {
    let records = self.records.read().await;
    let mut ranked: Vec<(String, PlayerRecord)> = records
      .iter()
      .map(|(name, record)| (name.clone(), record.clone()))
      .collect();
    ranked.sort_by_key(|(_, record)| Reverse(record.total_time));
    ranked.truncate(limit);
    ranked
  }

  /// Detail for one player as of `now`. Returns None if never seen.
  pub async fn player_info(&self, name: &str, now: i64) -> Option<PlayerInfo> {
    let records = self.records.read().await;
    records.get(name).map(|record| PlayerInfo {
      total_time: record.total_time,
      last_seen: record.last_seen,
      current_session: record.current_session(now),
    })
  }

  /// Copy of a single record.
  pub async fn record(&self, name: &str) -> Option<PlayerRecord> {
    self.records.read().await.get(name).cloned()
  }

  /// Number of players ever seen.
  pub async fn len(&self) -> usize {
    self.records.read().await.len()
  }

  pub async fn is_empty(&self) -> bool {
    self.records.read().await.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn now() -> i64 {
    1700000000 // Fixed timestamp for testing
  }

  fn snapshot(offset: i64, players: &[&str]) -> Snapshot {
    Snapshot::new(now() + offset, players.iter().copied())
  }

  struct FailingStore;

  impl RecordStore for FailingStore {
    fn load(&self) -> Result<Records> {
      Ok(Records::new())
    }

    fn save(&self, _records: &Records) -> Result<()> {
      Err(std::io::Error::other("disk full").into())
    }
  }

  #[tokio::test]
  async fn test_first_sighting_creates_record() {
    let tracker = Tracker::in_memory();

    let summary = tracker.ingest(&snapshot(0, &["Alice"])).await.unwrap();
    assert_eq!(summary.opened, vec!["Alice"]);

    let alice = tracker.record("Alice").await.unwrap();
    assert_eq!(alice, PlayerRecord::first_seen(now()));
    assert_eq!(alice.total_time, 0);
    assert_eq!(alice.session_start, Some(now()));
    assert_eq!(alice.last_seen, Some(now()));
  }

  #[tokio::test]
  async fn test_session_walkthrough() {
    let tracker = Tracker::in_memory();

    tracker.ingest(&snapshot(0, &["Alice"])).await.unwrap();
    tracker.ingest(&snapshot(60, &["Alice"])).await.unwrap();
    assert_eq!(tracker.record("Alice").await.unwrap().total_time, 60);

    // Absent: session closes, totals untouched
    let summary = tracker.ingest(&snapshot(500, &[])).await.unwrap();
    assert_eq!(summary.closed, vec!["Alice"]);
    let alice = tracker.record("Alice").await.unwrap();
    assert_eq!(alice.total_time, 60);
    assert_eq!(alice.session_start, None);
    assert_eq!(alice.last_seen, Some(now() + 60));

    // Back after 500s since last seen: reopened, gap not credited
    tracker.ingest(&snapshot(560, &["Alice"])).await.unwrap();
    let alice = tracker.record("Alice").await.unwrap();
    assert_eq!(alice.total_time, 60);
    assert_eq!(alice.session_start, Some(now() + 560));
    assert_eq!(alice.last_seen, Some(now() + 560));

    tracker.ingest(&snapshot(600, &["Alice"])).await.unwrap();
    assert_eq!(tracker.record("Alice").await.unwrap().total_time, 100);
  }

  #[tokio::test]
  async fn test_long_gap_not_credited_but_advances_last_seen() {
    let tracker = Tracker::in_memory();

    tracker.ingest(&snapshot(0, &["Steve"])).await.unwrap();
    let summary = tracker.ingest(&snapshot(300, &["Steve"])).await.unwrap();
    assert_eq!(summary.credited, 0);

    let steve = tracker.record("Steve").await.unwrap();
    assert_eq!(steve.total_time, 0);
    assert_eq!(steve.last_seen, Some(now() + 300));
    assert_eq!(steve.session_start, Some(now()));
  }

  #[tokio::test]
  async fn test_short_gap_credited_exactly() {
    let tracker = Tracker::in_memory();

    tracker.ingest(&snapshot(0, &["Steve"])).await.unwrap();
    let summary = tracker.ingest(&snapshot(299, &["Steve"])).await.unwrap();

    assert_eq!(summary.credited, 299);
    assert_eq!(tracker.record("Steve").await.unwrap().total_time, 299);
  }

  #[tokio::test]
  async fn test_short_absence_credits_gap_on_return() {
    let tracker = Tracker::in_memory();

    tracker.ingest(&snapshot(0, &["Alex"])).await.unwrap();
    tracker.ingest(&snapshot(60, &["Alex"])).await.unwrap();
    tracker.ingest(&snapshot(120, &[])).await.unwrap();

    // Rejoin within the threshold of last_seen: the gap still counts
    tracker.ingest(&snapshot(180, &["Alex"])).await.unwrap();
    let alex = tracker.record("Alex").await.unwrap();
    assert_eq!(alex.total_time, 180);
    assert_eq!(alex.session_start, Some(now() + 180));
  }

  #[tokio::test]
  async fn test_offline_players_left_untouched() {
    let tracker = Tracker::in_memory();

    tracker.ingest(&snapshot(0, &["Steve", "Alex"])).await.unwrap();
    tracker.ingest(&snapshot(60, &["Steve"])).await.unwrap();
    let alex_before = tracker.record("Alex").await.unwrap();

    let summary = tracker.ingest(&snapshot(120, &["Steve"])).await.unwrap();
    assert!(summary.closed.is_empty());
    assert_eq!(tracker.record("Alex").await.unwrap(), alex_before);
  }

  #[tokio::test]
  async fn test_totals_never_decrease() {
    let tracker = Tracker::in_memory();
    let sequence: [(i64, &[&str]); 8] = [
      (0, &["Notch"]),
      (120, &["Notch", "jeb_"]),
      (-50, &["Notch", "jeb_"]),
      (400, &["jeb_"]),
      (401, &[]),
      (900, &["Notch"]),
      (950, &["Notch", "jeb_"]),
      (1000, &["Notch", "jeb_"]),
    ];

    let mut previous = 0;
    for (offset, players) in sequence {
      tracker.ingest(&snapshot(offset, players)).await.unwrap();
      let total = tracker.record("Notch").await.unwrap().total_time;
      assert!(total >= previous, "total went from {} to {}", previous, total);
      previous = total;
    }
  }

  #[tokio::test]
  async fn test_record_without_last_seen_gets_no_credit() {
    let mut records = Records::new();
    records.insert("Legacy".to_string(), PlayerRecord::default());

    let summary = ingest_snapshot(&mut records, &snapshot(0, &["Legacy"]));
    assert_eq!(summary.opened, vec!["Legacy"]);
    assert_eq!(summary.credited, 0);
    assert_eq!(records["Legacy"].last_seen, Some(now()));
    assert_eq!(records["Legacy"].session_start, Some(now()));
  }

  #[tokio::test]
  async fn test_extreme_loaded_timestamps_do_not_overflow() {
    let mut records = Records::new();
    records.insert(
      "Ancient".to_string(),
      PlayerRecord {
        total_time: u64::MAX - 1,
        session_start: Some(i64::MIN),
        last_seen: Some(i64::MIN),
      },
    );
    records.insert(
      "Future".to_string(),
      PlayerRecord {
        total_time: 10,
        session_start: Some(i64::MAX),
        last_seen: Some(i64::MAX),
      },
    );

    let summary = ingest_snapshot(&mut records, &snapshot(0, &["Ancient", "Future"]));
    assert_eq!(summary.credited, 0);
    assert_eq!(records["Ancient"].total_time, u64::MAX - 1);
    assert_eq!(records["Future"].total_time, 10);
    assert_eq!(records["Ancient"].last_seen, Some(now()));
    assert_eq!(records["Future"].last_seen, Some(now()));

    // Sessions opened at the extremes still report without panicking
    assert_eq!(records["Ancient"].current_session(now()), Some(i64::MAX));
    assert_eq!(records["Future"].current_session(-1), Some(i64::MIN));
  }

  #[tokio::test]
  async fn test_credit_saturates_at_max_total() {
    let mut records = Records::new();
    records.insert(
      "Veteran".to_string(),
      PlayerRecord {
        total_time: u64::MAX - 5,
        session_start: Some(now()),
        last_seen: Some(now()),
      },
    );

    ingest_snapshot(&mut records, &snapshot(60, &["Veteran"]));
    assert_eq!(records["Veteran"].total_time, u64::MAX);
  }

  #[tokio::test]
  async fn test_top_players() {
    let mut records = Records::new();
    for (name, total) in [("A", 100), ("B", 300), ("C", 200), ("D", 50)] {
      records.insert(
        name.to_string(),
        PlayerRecord {
          total_time: total,
          ..Default::default()
        },
      );
    }
    let tracker = Tracker::open(MemoryStore::with_records(records))
      .await
      .unwrap();

    let names: Vec<String> = tracker
      .top_players(3)
      .await
      .into_iter()
      .map(|(name, _)| name)
      .collect();
    assert_eq!(names, vec!["B", "C", "A"]);
    assert_eq!(tracker.top_players(10).await.len(), 4);
  }

  #[tokio::test]
  async fn test_top_players_ties_are_deterministic() {
    let tracker = Tracker::in_memory();
    tracker
      .ingest(&snapshot(0, &["zed", "Alex", "mike"]))
      .await
      .unwrap();

    let first: Vec<String> = tracker.top_players(10).await.into_iter().map(|(n, _)| n).collect();
    let second: Vec<String> = tracker.top_players(10).await.into_iter().map(|(n, _)| n).collect();
    assert_eq!(first, vec!["Alex", "mike", "zed"]);
    assert_eq!(first, second);
  }

  #[tokio::test]
  async fn test_player_info() {
    let tracker = Tracker::in_memory();
    assert!(tracker.player_info("ghost", now()).await.is_none());

    tracker.ingest(&snapshot(0, &["Steve"])).await.unwrap();
    tracker.ingest(&snapshot(120, &["Steve"])).await.unwrap();

    let info = tracker.player_info("Steve", now() + 200).await.unwrap();
    assert_eq!(info.total_time, 120);
    assert_eq!(info.last_seen, Some(now() + 120));
    assert_eq!(info.current_session, Some(200));

    tracker.ingest(&snapshot(180, &[])).await.unwrap();
    let info = tracker.player_info("Steve", now() + 200).await.unwrap();
    assert_eq!(info.current_session, None);
  }

  #[tokio::test]
  async fn test_names_are_case_sensitive() {
    let tracker = Tracker::in_memory();
    tracker.ingest(&snapshot(0, &["steve", "Steve"])).await.unwrap();

    assert_eq!(tracker.len().await, 2);
    assert!(tracker.player_info("STEVE", now()).await.is_none());
  }

  #[tokio::test]
  async fn test_ingest_persists_every_time() {
    let store = Arc::new(MemoryStore::new());
    let tracker = Tracker {
      records: RwLock::new(Records::new()),
      store: store.clone(),
    };

    tracker.ingest(&snapshot(0, &["Alice"])).await.unwrap();
    assert_eq!(store.saved()["Alice"].session_start, Some(now()));

    tracker.ingest(&snapshot(30, &[])).await.unwrap();
    assert_eq!(store.saved()["Alice"].session_start, None);
  }

  #[tokio::test]
  async fn test_failed_save_keeps_memory_state() {
    let tracker = Tracker::open(FailingStore).await.unwrap();

    let result = tracker.ingest(&snapshot(0, &["Alice"])).await;
    assert!(matches!(result, Err(StoreError::Io(_))));
    assert!(tracker.record("Alice").await.is_some());
  }
}
