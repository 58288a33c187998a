use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use sqlx::SqlitePool;
use tokio::task::AbortHandle;

use arena_core::{ArenaError, SessionState};

use crate::db;

struct Pending {
    ticket: u64,
    handle: AbortHandle,
}

/// Aborts sessions that stay DISCONNECTED past a timeout.
///
/// Each watched session owns at most one tokio task. Scheduling again
/// replaces the previous task; cancelling aborts it. When a task fires it
/// re-reads the session and only acts if nothing has written to it since
/// the task was scheduled.
pub struct DisconnectWatchdog {
    pending: DashMap<i64, Pending>,
    next_ticket: AtomicU64,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
}

/// What a fired check did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireResult {
    Aborted,
    /// The session moved on before the timer fired.
    Stale,
    Missing,
}

impl DisconnectWatchdog {
    pub fn new(timeout: Duration, max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            pending: DashMap::new(),
            next_ticket: AtomicU64::new(1),
            timeout,
            max_retries,
            retry_delay,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of sessions with a live timer.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_watching(&self, session_id: i64) -> bool {
        self.pending.contains_key(&session_id)
    }

    /// Start (or restart) the timer for a session that just became
    /// DISCONNECTED at `version`.
    pub fn schedule(self: &Arc<Self>, pool: SqlitePool, session_id: i64, version: i64) {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let watchdog = Arc::clone(self);

        // Hold the entry while spawning so the task cannot finish and try
        // to clear its slot before the slot exists.
        let entry = self.pending.entry(session_id);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(watchdog.timeout).await;
            match watchdog.fire(&pool, session_id, version).await {
                Ok(result) => {
                    tracing::debug!(session_id, ?result, "disconnect watchdog fired");
                }
                Err(e) => {
                    tracing::error!(session_id, error = %e, "disconnect watchdog gave up");
                }
            }
            watchdog
                .pending
                .remove_if(&session_id, |_, pending| pending.ticket == ticket);
        })
        .abort_handle();

        let previous = match entry {
            Entry::Occupied(mut occupied) => Some(occupied.insert(Pending { ticket, handle })),
            Entry::Vacant(vacant) => {
                vacant.insert(Pending { ticket, handle });
                None
            }
        };
        if let Some(previous) = previous {
            previous.handle.abort();
            tracing::debug!(session_id, "replaced pending disconnect timer");
        }
        tracing::info!(
            session_id,
            timeout_ms = self.timeout.as_millis() as u64,
            "disconnect watchdog scheduled"
        );
    }

    /// Drop the timer for a session, if any.
    pub fn cancel(&self, session_id: i64) {
        if let Some((_, pending)) = self.pending.remove(&session_id) {
            pending.handle.abort();
            tracing::debug!(session_id, "disconnect watchdog cancelled");
        }
    }

    /// The deferred check. Store failures are retried up to the configured
    /// bound.
    async fn fire(
        &self,
        pool: &SqlitePool,
        session_id: i64,
        version: i64,
    ) -> Result<FireResult, ArenaError> {
        let mut attempt = 0;
        loop {
            match abort_if_unchanged(pool, session_id, version).await {
                Ok(result) => return Ok(result),
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(session_id, attempt, error = %e, "watchdog check failed, retrying");
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Abort the session if it is still DISCONNECTED at `version`.
pub async fn abort_if_unchanged(
    pool: &SqlitePool,
    session_id: i64,
    version: i64,
) -> Result<FireResult, ArenaError> {
    let session = match db::get_session(pool, session_id).await? {
        Some(s) => s,
        None => return Ok(FireResult::Missing),
    };
    if session.state != SessionState::Disconnected || session.version != version {
        return Ok(FireResult::Stale);
    }

    let next = session.state.transition(SessionState::Aborted)?;
    let now = Utc::now();
    if !db::update_session_state(pool, session_id, version, next, now).await? {
        return Ok(FireResult::Stale);
    }

    let data = format!("{}->{}", SessionState::Disconnected, next);
    if let Err(e) = db::insert_event(pool, session_id, "state", &data, now).await {
        tracing::warn!(session_id, error = %e, "failed to log abort event");
    }
    tracing::info!(session_id, "session aborted after disconnect timeout");
    Ok(FireResult::Aborted)
}
