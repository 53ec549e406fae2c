use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Gaps between consecutive sightings at or above this many seconds are not
/// credited to a player's total.
pub const CONTINUITY_THRESHOLD_SECS: i64 = 300;

/// Persistent accounting for one player name (case-sensitive).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
  /// Accumulated online time in seconds
  #[serde(default)]
  pub total_time: u64,
  /// Unix timestamp the current session started; `None` means offline
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub session_start: Option<i64>,
  /// Unix timestamp of the last snapshot that saw this player online
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_seen: Option<i64>,
}

impl PlayerRecord {
  /// A freshly observed player with an open session.
  pub fn first_seen(now: i64) -> Self {
    Self {
      total_time: 0,
      session_start: Some(now),
      last_seen: Some(now),
    }
  }

  pub fn is_online(&self) -> bool {
    self.session_start.is_some()
  }

  /// Seconds since the session opened, if one is open.
  pub fn current_session(&self, now: i64) -> Option<i64> {
    self.session_start.map(|start| now.saturating_sub(start))
  }
}

/// The whole record store, keyed by player name.
///
/// Ordered so iteration (and therefore tie-breaking in rankings) is
/// deterministic for a given store state.
pub type Records = BTreeMap<String, PlayerRecord>;

/// One point-in-time read of the visible player list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
  /// Unix timestamp the snapshot was taken
  pub taken_at: i64,
  /// Names visible in the server's player sample
  pub players: BTreeSet<String>,
}

impl Snapshot {
  pub fn new<I, S>(taken_at: i64, players: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      taken_at,
      players: players.into_iter().map(Into::into).collect(),
    }
  }
}

/// Detail view of a single player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerInfo {
  pub total_time: u64,
  pub last_seen: Option<i64>,
  /// Seconds in the current session, `None` when offline
  pub current_session: Option<i64>,
}

/// What a single ingest changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
  /// Players whose session opened on this snapshot (new or returning)
  pub opened: Vec<String>,
  /// Players whose session closed on this snapshot
  pub closed: Vec<String>,
  /// Seconds credited across all players
  pub credited: u64,
}
