use chrono::{DateTime, Duration, Utc};

use arena_core::protocol::RoundStatus;
use arena_core::tournament::round_readiness;
use arena_core::{
    ArenaError, TournamentGameMapping, TournamentRoom, TournamentRoomPatch, TournamentUser,
    TournamentUserPatch, TournamentUserState,
};

use crate::collaborators::with_retry;
use crate::db::{self, db_err, is_unique_violation};
use crate::matchmaker;
use crate::state::AppState;

/// Insert attempts when concurrent registrations collide on play order.
const MAX_REGISTER_ATTEMPTS: usize = 16;

fn room_not_found(id: i64) -> ArenaError {
    ArenaError::NotFound(format!("tournament room {} not found", id))
}

/// Load a room that still accepts players and games.
async fn active_room(state: &AppState, room_id: i64) -> Result<TournamentRoom, ArenaError> {
    let room = get_room(state, room_id).await?;
    if !room.active {
        return Err(ArenaError::FailedPrecondition(format!(
            "tournament room {} is closed",
            room_id
        )));
    }
    Ok(room)
}

// ── Rooms ───────────────────────────────────────────────────────────────

/// Open a tournament room together with its chat room. Nothing is stored if
/// the chat room cannot be created.
#[tracing::instrument(skip(state))]
pub async fn create_room(
    state: &AppState,
    name: &str,
    size: i32,
    start_time: Option<DateTime<Utc>>,
) -> Result<TournamentRoom, ArenaError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ArenaError::InvalidArgument("room name is empty".into()));
    }
    if size < 2 {
        return Err(ArenaError::InvalidArgument(format!(
            "room size must be at least 2, got {}",
            size
        )));
    }

    let chat = &state.collaborators.chat;
    let chat_room = with_retry("chat create", state.attempts(), || chat.create(name, 0))
        .await
        .map_err(|e| ArenaError::Internal(format!("could not create tournament chat: {}", e)))?;

    let now = Utc::now();
    let start_time = start_time.unwrap_or(now + Duration::hours(1));
    let room = db::insert_room(&state.db, name, size, chat_room.id, start_time, now).await?;
    tracing::info!(room_id = room.id, chat_room_id = chat_room.id, "tournament room created");
    Ok(room)
}

pub async fn get_room(state: &AppState, room_id: i64) -> Result<TournamentRoom, ArenaError> {
    db::get_room(&state.db, room_id)
        .await?
        .ok_or_else(|| room_not_found(room_id))
}

pub async fn list_rooms(state: &AppState) -> Result<Vec<TournamentRoom>, ArenaError> {
    db::list_rooms(&state.db).await
}

/// Rename, start or close a room.
#[tracing::instrument(skip(state))]
pub async fn update_room(
    state: &AppState,
    room_id: i64,
    patch: TournamentRoomPatch,
) -> Result<TournamentRoom, ArenaError> {
    let mut room = get_room(state, room_id).await?;
    if patch.is_empty() {
        return Ok(room);
    }

    patch.apply(&mut room)?;
    room.updated_at = Utc::now();
    db::update_room(&state.db, &room).await?;
    tracing::info!(started = room.started, active = room.active, "tournament room updated");
    Ok(room)
}

// ── Users ───────────────────────────────────────────────────────────────

/// Register a user in a room at the next free play order.
#[tracing::instrument(skip(state))]
pub async fn register_user(
    state: &AppState,
    room_id: i64,
    user_id: i64,
) -> Result<TournamentUser, ArenaError> {
    let room = active_room(state, room_id).await?;
    if db::find_tournament_user(&state.db, room_id, user_id).await?.is_some() {
        return Err(already_registered(room_id, user_id));
    }

    let mut inserted = None;
    for attempt in 1..=MAX_REGISTER_ATTEMPTS {
        match db::insert_tournament_user(&state.db, room_id, user_id, Utc::now()).await {
            Ok(id) => {
                inserted = Some(id);
                break;
            }
            Err(e) if is_unique_violation(&e) => {
                if db::find_tournament_user(&state.db, room_id, user_id).await?.is_some() {
                    return Err(already_registered(room_id, user_id));
                }
                tracing::debug!(attempt, "play order taken, retrying");
            }
            Err(e) => return Err(db_err(e)),
        }
    }
    let id = inserted.ok_or_else(|| {
        ArenaError::Internal(format!("no free play order in room {} after retries", room_id))
    })?;
    let user = get_user(state, id).await?;

    let chat = &state.collaborators.chat;
    if let Err(e) = with_retry("chat add_user", state.attempts(), || {
        chat.add_user(room.chat_room_id, user_id)
    })
    .await
    {
        tracing::warn!(chat_room_id = room.chat_room_id, error = %e, "could not add user to tournament chat");
    }

    tracing::info!(play_order = user.play_order, "tournament user registered");
    Ok(user)
}

fn already_registered(room_id: i64, user_id: i64) -> ArenaError {
    ArenaError::AlreadyExists(format!(
        "user {} is already registered in room {}",
        user_id, room_id
    ))
}

pub async fn get_user(state: &AppState, id: i64) -> Result<TournamentUser, ArenaError> {
    db::get_tournament_user(&state.db, id)
        .await?
        .ok_or_else(|| ArenaError::NotFound(format!("tournament user {} not found", id)))
}

/// Remove a user from their room. Other users keep their play order.
#[tracing::instrument(skip(state))]
pub async fn unregister_user(state: &AppState, id: i64) -> Result<(), ArenaError> {
    if !db::delete_tournament_user(&state.db, id).await? {
        return Err(ArenaError::NotFound(format!("tournament user {} not found", id)));
    }
    tracing::info!("tournament user removed");
    Ok(())
}

/// Users of a room in play order.
pub async fn list_users(state: &AppState, room_id: i64) -> Result<Vec<TournamentUser>, ArenaError> {
    get_room(state, room_id).await?;
    db::list_tournament_users(&state.db, room_id).await
}

/// Overwrite the fields set in `patch`. An empty patch returns the user
/// unchanged.
#[tracing::instrument(skip(state))]
pub async fn update_user(
    state: &AppState,
    id: i64,
    patch: TournamentUserPatch,
) -> Result<TournamentUser, ArenaError> {
    let mut user = get_user(state, id).await?;
    if patch.is_empty() {
        return Ok(user);
    }

    patch.apply(&mut user);
    user.updated_at = Utc::now();
    db::update_tournament_user(&state.db, &user)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ArenaError::AlreadyExists(format!(
                    "play order {} is taken in room {}",
                    user.play_order, user.room_id
                ))
            } else {
                db_err(e)
            }
        })?;
    Ok(user)
}

// ── Games ───────────────────────────────────────────────────────────────

/// Start a tournament game between two players of a room. Pairing the same
/// two players again returns the mapping of their open game; a casual
/// session the pair already shares is not taken over.
#[tracing::instrument(skip(state))]
pub async fn create_tournament_game(
    state: &AppState,
    room_id: i64,
    user_id: i64,
    opponent_id: i64,
) -> Result<TournamentGameMapping, ArenaError> {
    active_room(state, room_id).await?;
    let (session, created) = matchmaker::friend_session(state, user_id, opponent_id).await?;
    if let Some(existing) = db::find_mapping_by_session(&state.db, session.id).await? {
        tracing::debug!(session_id = session.id, "tournament game already mapped");
        return Ok(existing);
    }
    if !created {
        return Err(ArenaError::AlreadyExists(format!(
            "players {} and {} already share session {} outside the tournament",
            user_id, opponent_id, session.id
        )));
    }

    let now = Utc::now();
    for player in [user_id, opponent_id] {
        let marked = db::set_tournament_user_state(
            &state.db,
            room_id,
            player,
            TournamentUserState::Playing,
            now,
        )
        .await?;
        if !marked {
            tracing::debug!(player, "player is not registered in the room");
        }
    }

    match db::insert_mapping(&state.db, room_id, session.id, user_id, now).await {
        Ok(mapping) => {
            tracing::info!(session_id = session.id, "tournament game created");
            Ok(mapping)
        }
        Err(e) if is_unique_violation(&e) => db::find_mapping_by_session(&state.db, session.id)
            .await?
            .ok_or_else(|| ArenaError::Internal("tournament mapping vanished".into())),
        Err(e) => Err(db_err(e)),
    }
}

pub async fn get_game(state: &AppState, id: i64) -> Result<TournamentGameMapping, ArenaError> {
    db::get_mapping(&state.db, id)
        .await?
        .ok_or_else(|| ArenaError::NotFound(format!("tournament game {} not found", id)))
}

pub async fn list_games(
    state: &AppState,
    room_id: i64,
) -> Result<Vec<TournamentGameMapping>, ArenaError> {
    get_room(state, room_id).await?;
    db::list_mappings(&state.db, room_id).await
}

/// Whether every user of the room is waiting on the same round.
pub async fn round_status(state: &AppState, room_id: i64) -> Result<RoundStatus, ArenaError> {
    let users = list_users(state, room_id).await?;
    let round = round_readiness(&users);
    Ok(RoundStatus {
        room_id,
        ready: round.is_some(),
        round,
    })
}
