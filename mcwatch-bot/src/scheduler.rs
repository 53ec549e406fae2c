//! Periodic server polling ("auto check").
//!
//! [`Poller`] runs a single firing: query the server, derive up/down and
//! join notifications, and feed the tracker. [`AutoCheck`] owns the on/off
//! toggle and the background task that fires the poller on an interval.

use crate::helpers;
use crate::notifier::{Notification, Notifier};
use crate::ping::SnapshotSource;
use mcwatch_db::{IngestSummary, Snapshot, Tracker};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// What the previous firing observed.
#[derive(Debug, Default)]
pub struct PollState {
    /// `None` until the first firing completes
    last_server_up: Option<bool>,
    last_online: BTreeSet<String>,
}

impl PollState {
    /// Record this firing's observation and return what changed.
    ///
    /// Transitions are only reported against a known previous state. While
    /// the server is down the online set is cleared, so everyone visible when
    /// it returns counts as joined.
    pub fn observe(&mut self, server_up: bool, players: &BTreeSet<String>) -> Vec<Notification> {
        let mut notifications = Vec::new();

        match self.last_server_up {
            Some(false) if server_up => notifications.push(Notification::ServerUp),
            Some(true) if !server_up => notifications.push(Notification::ServerDown),
            _ => {}
        }

        if server_up {
            let joined: Vec<String> = players.difference(&self.last_online).cloned().collect();
            if !joined.is_empty() {
                notifications.push(Notification::PlayersJoined(joined));
            }
            self.last_online = players.clone();
        } else {
            self.last_online.clear();
        }

        self.last_server_up = Some(server_up);
        notifications
    }

    pub fn last_server_up(&self) -> Option<bool> {
        self.last_server_up
    }
}

/// Result of one firing.
#[derive(Debug)]
pub struct PollOutcome {
    pub server_up: bool,
    pub notifications: Vec<Notification>,
    /// Present when the snapshot was ingested and persisted
    pub ingested: Option<IngestSummary>,
}

pub struct Poller<S, N> {
    source: S,
    tracker: Arc<Tracker>,
    notifier: N,
    state: Mutex<PollState>,
}

impl<S: SnapshotSource, N: Notifier> Poller<S, N> {
    pub fn new(source: S, tracker: Arc<Tracker>, notifier: N) -> Self {
        Self {
            source,
            tracker,
            notifier,
            state: Mutex::new(PollState::default()),
        }
    }

    /// Run one firing as of `now`. Never fails; problems are logged.
    pub async fn fire(&self, now: i64) -> PollOutcome {
        let mut state = self.state.lock().await;

        let snapshot = match self.source.status().await {
            Ok(status) => Some(status.snapshot(now)),
            Err(e) if e.is_timeout() => {
                info!(error = %e, "server not responding");
                None
            }
            Err(e) => {
                warn!(error = %e, "status query failed");
                None
            }
        };
        let server_up = snapshot.is_some();
        let snapshot = snapshot.unwrap_or(Snapshot {
            taken_at: now,
            players: BTreeSet::new(),
        });

        let notifications = state.observe(server_up, &snapshot.players);
        for notification in &notifications {
            self.notifier.notify(notification.clone()).await;
        }

        let ingested = if server_up {
            match self.tracker.ingest(&snapshot).await {
                Ok(summary) => Some(summary),
                Err(e) => {
                    error!(error = %e, "failed to persist player data");
                    None
                }
            }
        } else {
            None
        };

        PollOutcome {
            server_up,
            notifications,
            ingested,
        }
    }
}

/// The Disabled/Enabled toggle for periodic polling.
///
/// Disabling stops future firings; a firing already running is left to
/// finish. Dropping the handle ends the background task.
pub struct AutoCheck {
    enabled: watch::Sender<bool>,
}

impl AutoCheck {
    /// Start the background task in the disabled state.
    pub fn spawn<S: SnapshotSource, N: Notifier>(poller: Arc<Poller<S, N>>, period: Duration) -> Self {
        let (enabled, rx) = watch::channel(false);
        tokio::spawn(run(poller, period, rx));
        Self { enabled }
    }

    /// Returns false if it was already in the requested state.
    pub fn set_enabled(&self, enabled: bool) -> bool {
        self.enabled.send_if_modified(|current| {
            if *current == enabled {
                false
            } else {
                *current = enabled;
                true
            }
        })
    }

    pub fn is_enabled(&self) -> bool {
        *self.enabled.borrow()
    }
}

async fn run<S: SnapshotSource, N: Notifier>(
    poller: Arc<Poller<S, N>>,
    period: Duration,
    mut enabled: watch::Receiver<bool>,
) {
    loop {
        loop {
            let on = *enabled.borrow_and_update();
            if on {
                break;
            }
            if enabled.changed().await.is_err() {
                return;
            }
        }

        info!(period_secs = period.as_secs(), "auto check enabled");
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => fire_bounded(&poller, period).await,
                changed = enabled.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    let on = *enabled.borrow_and_update();
                    if !on {
                        info!("auto check disabled");
                        break;
                    }
                }
            }
        }
    }
}

/// Run one firing in its own task, abandoning it if it outlives `period`.
async fn fire_bounded<S: SnapshotSource, N: Notifier>(poller: &Arc<Poller<S, N>>, period: Duration) {
    let task_poller = Arc::clone(poller);
    let mut firing = tokio::spawn(async move { task_poller.fire(helpers::now()).await });

    match tokio::time::timeout(period, &mut firing).await {
        Ok(Ok(outcome)) => debug!(
            server_up = outcome.server_up,
            notifications = outcome.notifications.len(),
            ingested = outcome.ingested.is_some(),
            "poll complete"
        ),
        Ok(Err(e)) => error!(error = %e, "poll firing panicked"),
        Err(_) => {
            firing.abort();
            warn!(period_secs = period.as_secs(), "poll firing overran its interval, skipped");
        }
    }
}
