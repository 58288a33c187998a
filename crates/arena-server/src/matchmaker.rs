use chrono::{DateTime, Utc};

use arena_core::{ArenaError, Session, SessionEvent, SessionState};

use crate::collaborators::with_retry;
use crate::db;
use crate::state::AppState;

/// Upper bound on search rounds when concurrent writers keep winning.
const MAX_ATTEMPTS: usize = 8;
/// WAITING sessions examined per round.
const CANDIDATE_BATCH: i64 = 16;

fn check_player(player_id: i64) -> Result<(), ArenaError> {
    if player_id <= 0 {
        return Err(ArenaError::InvalidArgument(format!(
            "invalid player id {}",
            player_id
        )));
    }
    Ok(())
}

pub async fn get_session(state: &AppState, id: i64) -> Result<Session, ArenaError> {
    db::get_session(&state.db, id)
        .await?
        .ok_or_else(|| ArenaError::session_not_found(id))
}

pub async fn get_open_session_for_player(
    state: &AppState,
    player_id: i64,
) -> Result<Session, ArenaError> {
    db::find_open_session(&state.db, player_id)
        .await?
        .ok_or_else(|| {
            ArenaError::NotFound(format!("player {} has no open session", player_id))
        })
}

pub async fn list_ongoing_sessions(state: &AppState) -> Result<Vec<Session>, ArenaError> {
    db::list_ongoing_sessions(&state.db).await
}

/// Put a player into a match: rejoin their open session, take the free
/// slot of a waiting one, or open a new one.
#[tracing::instrument(skip(state))]
pub async fn join_or_create(state: &AppState, player_id: i64) -> Result<Session, ArenaError> {
    check_player(player_id)?;

    for _ in 0..MAX_ATTEMPTS {
        if let Some(existing) = db::find_open_queue_session(&state.db, player_id).await? {
            tracing::debug!(session_id = existing.id, "player rejoined open session");
            return Ok(existing);
        }

        for candidate in db::list_waiting_sessions(&state.db, player_id, CANDIDATE_BATCH).await? {
            let now = Utc::now();
            let claimed = db::claim_waiting_session(
                &state.db,
                candidate.id,
                candidate.version,
                player_id,
                now,
            )
            .await?;
            if claimed {
                record_transition(state, candidate.id, SessionState::Waiting, SessionState::Ready, now)
                    .await;
                tracing::info!(
                    session_id = candidate.id,
                    player_a = candidate.player_a_id,
                    "session paired"
                );
                return get_session(state, candidate.id).await;
            }
        }

        if let Some(id) = db::insert_waiting_session(&state.db, player_id, Utc::now()).await? {
            tracing::info!(session_id = id, "opened waiting session");
            return get_session(state, id).await;
        }
    }

    Err(ArenaError::Internal(format!(
        "matchmaking for player {} did not settle",
        player_id
    )))
}

/// Pair two players directly. Returns the existing session when the pair
/// already has one open.
pub async fn create_friend_session(
    state: &AppState,
    player_a: i64,
    player_b: i64,
) -> Result<Session, ArenaError> {
    friend_session(state, player_a, player_b)
        .await
        .map(|(session, _)| session)
}

/// Like `create_friend_session`, but also tells `player_b` about the
/// invitation and opens a chat room for the pair. Both are best-effort and
/// only happen when the session is new.
#[tracing::instrument(skip(state))]
pub async fn invite_friend(
    state: &AppState,
    player_a: i64,
    player_b: i64,
) -> Result<Session, ArenaError> {
    let (session, created) = friend_session(state, player_a, player_b).await?;
    if !created {
        return Ok(session);
    }

    let attempts = state.attempts();
    let notification = &state.collaborators.notification;
    let message = format!("Player {} sent you a game invitation.", player_a);
    if let Err(e) = with_retry("notification create", attempts, || {
        notification.create(player_b, &message)
    })
    .await
    {
        tracing::warn!(session_id = session.id, error = %e, "invite notification failed");
    }

    let chat = &state.collaborators.chat;
    let name = format!("{} vs {}", player_a, player_b);
    match with_retry("chat create", attempts, || chat.create(&name, session.id)).await {
        Ok(room) => {
            for user_id in [player_a, player_b] {
                if let Err(e) =
                    with_retry("chat add_user", attempts, || chat.add_user(room.id, user_id)).await
                {
                    tracing::warn!(chat_room_id = room.id, user_id, error = %e, "chat add_user failed");
                }
            }
        }
        Err(e) => {
            tracing::warn!(session_id = session.id, error = %e, "invite chat room failed");
        }
    }

    Ok(session)
}

#[tracing::instrument(skip(state))]
pub(crate) async fn friend_session(
    state: &AppState,
    player_a: i64,
    player_b: i64,
) -> Result<(Session, bool), ArenaError> {
    check_player(player_a)?;
    check_player(player_b)?;
    if player_a == player_b {
        return Err(ArenaError::InvalidArgument(
            "a player cannot be paired with themselves".into(),
        ));
    }

    for _ in 0..MAX_ATTEMPTS {
        let open = db::list_open_sessions_for_players(&state.db, player_a, player_b).await?;
        if let Some(existing) = open.iter().find(|s| s.pairs(player_a, player_b)) {
            tracing::debug!(session_id = existing.id, "friend session already open");
            return Ok((existing.clone(), false));
        }
        if let Some(busy) = open.first() {
            let who = if busy.has_player(player_a) {
                player_a
            } else {
                player_b
            };
            return Err(ArenaError::AlreadyExists(format!(
                "player {} is already in session {}",
                who, busy.id
            )));
        }

        if let Some(id) = db::insert_friend_session(&state.db, player_a, player_b, Utc::now()).await?
        {
            tracing::info!(session_id = id, "opened friend session");
            return Ok((get_session(state, id).await?, true));
        }
    }

    Err(ArenaError::Internal(format!(
        "friend pairing {} / {} did not settle",
        player_a, player_b
    )))
}

/// Apply a state transition. Entering DISCONNECTED arms the watchdog;
/// leaving it disarms it.
#[tracing::instrument(skip(state))]
pub async fn update_state(
    state: &AppState,
    session_id: i64,
    next: SessionState,
) -> Result<Session, ArenaError> {
    for _ in 0..MAX_ATTEMPTS {
        let session = get_session(state, session_id).await?;
        let next = session.transition(next)?;
        let now = Utc::now();
        if !db::update_session_state(&state.db, session_id, session.version, next, now).await? {
            tracing::debug!("lost update race, retrying");
            continue;
        }

        record_transition(state, session_id, session.state, next, now).await;
        let version = session.version + 1;
        if next == SessionState::Disconnected {
            state.watchdog.schedule(state.db.clone(), session_id, version);
        } else if session.state == SessionState::Disconnected {
            state.watchdog.cancel(session_id);
        }

        tracing::info!(from = %session.state, to = %next, "session state changed");
        return get_session(state, session_id).await;
    }

    Err(ArenaError::Internal(format!(
        "session {} kept changing underneath the update",
        session_id
    )))
}

pub async fn append_event(
    state: &AppState,
    session_id: i64,
    event_type: &str,
    event_data: &str,
) -> Result<SessionEvent, ArenaError> {
    if event_type.trim().is_empty() {
        return Err(ArenaError::InvalidArgument("event type is empty".into()));
    }
    get_session(state, session_id).await?;
    db::insert_event(&state.db, session_id, event_type, event_data, Utc::now()).await
}

pub async fn list_events(state: &AppState, session_id: i64) -> Result<Vec<SessionEvent>, ArenaError> {
    get_session(state, session_id).await?;
    db::list_events(&state.db, session_id).await
}

/// Log a transition to the session's event history. Failures are logged
/// only; the transition itself is already committed.
pub(crate) async fn record_transition(
    state: &AppState,
    session_id: i64,
    from: SessionState,
    to: SessionState,
    at: DateTime<Utc>,
) {
    let data = format!("{}->{}", from, to);
    if let Err(e) = db::insert_event(&state.db, session_id, "state", &data, at).await {
        tracing::warn!(session_id, error = %e, "failed to record state event");
    }
}
