//! Finalizing a session once the game server reports a result.

use chrono::Utc;

use arena_core::{ArenaError, Outcome, Session, TournamentUserState};

use crate::collaborators::{rooms_by_game, with_retry};
use crate::db;
use crate::matchmaker::{get_session, record_transition};
use crate::state::AppState;

/// Version races tolerated while the session is still unfinished.
const MAX_ATTEMPTS: usize = 8;

/// Record the final score of a session and run the follow-up work: stat,
/// tournament advancement and elimination, and chat teardown. Only the first caller gets
/// through; later calls see `FailedPrecondition`, as does a session that
/// never got a second player.
#[tracing::instrument(skip(state))]
pub async fn finish_session(
    state: &AppState,
    session_id: i64,
    points_a: i32,
    points_b: i32,
    winner_id: i64,
) -> Result<Session, ArenaError> {
    let (session, outcome) = commit(state, session_id, points_a, points_b, winner_id).await?;
    state.watchdog.cancel(session_id);
    tracing::info!(state = %outcome.state(), points_a, points_b, "session finished");

    record_stat(state, session_id, outcome).await;
    if let Some((winner, loser)) = outcome.decisive() {
        advance_tournament(state, session_id, winner, loser).await;
    }
    teardown_chat(state, session_id).await;

    Ok(session)
}

async fn commit(
    state: &AppState,
    session_id: i64,
    points_a: i32,
    points_b: i32,
    winner_id: i64,
) -> Result<(Session, Outcome), ArenaError> {
    for _ in 0..MAX_ATTEMPTS {
        let session = get_session(state, session_id).await?;
        if session.finished {
            return Err(already_finished(session_id));
        }

        let outcome = session.outcome_for(winner_id)?;
        let next = outcome.state();
        let now = Utc::now();
        let written = db::finish_session(
            &state.db,
            session_id,
            session.version,
            points_a,
            points_b,
            next,
            now,
        )
        .await?;
        if written {
            record_transition(state, session_id, session.state, next, now).await;
            return Ok((get_session(state, session_id).await?, outcome));
        }
        tracing::debug!("finish lost a version race, reloading");
    }

    Err(finish_did_not_settle(session_id))
}

fn finish_did_not_settle(session_id: i64) -> ArenaError {
    ArenaError::Internal(format!(
        "session {} kept changing underneath the finish",
        session_id
    ))
}

fn already_finished(session_id: i64) -> ArenaError {
    ArenaError::FailedPrecondition(format!("session {} is already finished", session_id))
}

async fn record_stat(state: &AppState, session_id: i64, outcome: Outcome) {
    let Some((winner, loser)) = outcome.decisive() else {
        return;
    };
    let stat = &state.collaborators.stat;
    match with_retry("stat create", state.attempts(), || {
        stat.create_stat(session_id, winner, loser)
    })
    .await
    {
        Ok(stat_id) => tracing::debug!(session_id, stat_id, "stat recorded"),
        Err(e) => tracing::warn!(session_id, error = %e, "failed to record stat"),
    }
}

/// Move a tournament game's winner on to the next round and knock the loser
/// out. Failures are logged only.
async fn advance_tournament(state: &AppState, session_id: i64, winner: i64, loser: i64) {
    let mapping = match db::find_mapping_by_session(&state.db, session_id).await {
        Ok(Some(m)) => m,
        Ok(None) => return,
        Err(e) => {
            tracing::warn!(session_id, error = %e, "tournament lookup failed");
            return;
        }
    };
    let room_id = mapping.room_id;
    let now = Utc::now();

    match db::advance_tournament_winner(&state.db, room_id, winner, now).await {
        Ok(true) => tracing::info!(session_id, room_id, user_id = winner, "tournament winner advanced"),
        Ok(false) => tracing::warn!(
            session_id,
            room_id,
            user_id = winner,
            "winner is not registered in the tournament"
        ),
        Err(e) => tracing::warn!(session_id, error = %e, "tournament advance failed"),
    }

    match db::set_tournament_user_state(
        &state.db,
        room_id,
        loser,
        TournamentUserState::Eliminated,
        now,
    )
    .await
    {
        Ok(true) => tracing::info!(session_id, room_id, user_id = loser, "tournament loser eliminated"),
        Ok(false) => tracing::debug!(session_id, room_id, user_id = loser, "loser is not registered"),
        Err(e) => tracing::warn!(session_id, error = %e, "tournament elimination failed"),
    }
}

async fn teardown_chat(state: &AppState, session_id: i64) {
    let chat = &state.collaborators.chat;
    let attempts = state.attempts();
    let rooms = match with_retry("chat list_rooms", attempts, || chat.list_rooms()).await {
        Ok(rooms) => rooms_by_game(rooms),
        Err(e) => {
            tracing::warn!(session_id, error = %e, "chat lookup failed");
            return;
        }
    };
    let Some(room) = rooms.get(&session_id) else {
        return;
    };
    if let Err(e) = with_retry("chat destroy", attempts, || chat.destroy(room.id)).await {
        tracing::warn!(session_id, chat_room_id = room.id, error = %e, "chat teardown failed");
    }
}

#[cfg(test)]
mod tests {
    use arena_core::SessionState;

    use super::*;

    #[test]
    fn already_finished_is_a_precondition_failure() {
        let err = already_finished(4);
        assert_eq!(err.code(), "FAILED_PRECONDITION");
        assert!(err.message().contains('4'));
    }

    #[test]
    fn unsettled_finish_is_internal() {
        let err = finish_did_not_settle(4);
        assert_eq!(err.code(), "INTERNAL");
        assert_ne!(err.code(), already_finished(4).code());
    }

    #[test]
    fn draw_has_no_stat_pair() {
        assert_eq!(Outcome::Draw.decisive(), None);
        assert_eq!(Outcome::Draw.state(), SessionState::Draw);
    }
}
