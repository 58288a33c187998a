use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use arena_core::error::ErrorBody;
use arena_core::protocol::{
    AppendEventRequest, CreateRoomRequest, CreateTournamentGameRequest, FinishSessionRequest,
    FriendSessionRequest, JoinQueueRequest, RegisterUserRequest, RoundStatus,
    UpdateStateRequest,
};
use arena_core::{
    ArenaError, Session, SessionEvent, TournamentGameMapping, TournamentRoom, TournamentRoomPatch,
    TournamentUser, TournamentUserPatch,
};

use crate::state::AppState;
use crate::{completion, matchmaker, tournament};

/// Error returned by every handler; rendered as `{code, message}`.
#[derive(Debug)]
pub struct ApiError(pub ArenaError);

impl From<ArenaError> for ApiError {
    fn from(e: ArenaError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ArenaError::NotFound(_) => StatusCode::NOT_FOUND,
            ArenaError::AlreadyExists(_) => StatusCode::CONFLICT,
            ArenaError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ArenaError::FailedPrecondition(_) => StatusCode::PRECONDITION_FAILED,
            ArenaError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "request failed");
        }
        (status, Json(ErrorBody::from(&self.0))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ── Health ──────────────────────────────────────────────────────────────

pub async fn health() -> &'static str {
    "ok"
}

// ── Sessions ────────────────────────────────────────────────────────────

pub async fn join_queue(
    State(state): State<Arc<AppState>>,
    Json(req): Json<JoinQueueRequest>,
) -> ApiResult<Session> {
    Ok(Json(matchmaker::join_or_create(&state, req.player_id).await?))
}

pub async fn create_friend_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FriendSessionRequest>,
) -> ApiResult<Session> {
    let session = matchmaker::create_friend_session(&state, req.player_a, req.player_b).await?;
    Ok(Json(session))
}

pub async fn invite_friend(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FriendSessionRequest>,
) -> ApiResult<Session> {
    let session = matchmaker::invite_friend(&state, req.player_a, req.player_b).await?;
    Ok(Json(session))
}

pub async fn list_ongoing_sessions(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Session>> {
    Ok(Json(matchmaker::list_ongoing_sessions(&state).await?))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Session> {
    Ok(Json(matchmaker::get_session(&state, id).await?))
}

pub async fn open_session_for_player(
    State(state): State<Arc<AppState>>,
    Path(player_id): Path<i64>,
) -> ApiResult<Session> {
    Ok(Json(
        matchmaker::get_open_session_for_player(&state, player_id).await?,
    ))
}

pub async fn update_state(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateStateRequest>,
) -> ApiResult<Session> {
    let target = req.target()?;
    Ok(Json(matchmaker::update_state(&state, id, target).await?))
}

pub async fn finish_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<FinishSessionRequest>,
) -> ApiResult<Session> {
    let session =
        completion::finish_session(&state, id, req.points_a, req.points_b, req.winner_id).await?;
    Ok(Json(session))
}

pub async fn append_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<AppendEventRequest>,
) -> Result<(StatusCode, Json<SessionEvent>), ApiError> {
    let event = matchmaker::append_event(&state, id, &req.event_type, &req.event_data).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Vec<SessionEvent>> {
    Ok(Json(matchmaker::list_events(&state, id).await?))
}

// ── Tournaments ─────────────────────────────────────────────────────────

pub async fn create_room(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<TournamentRoom>), ApiError> {
    let room = tournament::create_room(&state, &req.name, req.size, req.start_time).await?;
    Ok((StatusCode::CREATED, Json(room)))
}

pub async fn list_rooms(State(state): State<Arc<AppState>>) -> ApiResult<Vec<TournamentRoom>> {
    Ok(Json(tournament::list_rooms(&state).await?))
}

pub async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<TournamentRoom> {
    Ok(Json(tournament::get_room(&state, id).await?))
}

pub async fn update_room(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(patch): Json<TournamentRoomPatch>,
) -> ApiResult<TournamentRoom> {
    Ok(Json(tournament::update_room(&state, id, patch).await?))
}

pub async fn register_user(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<i64>,
    Json(req): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<TournamentUser>), ApiError> {
    let user = tournament::register_user(&state, room_id, req.user_id).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn list_tournament_users(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<i64>,
) -> ApiResult<Vec<TournamentUser>> {
    Ok(Json(tournament::list_users(&state, room_id).await?))
}

pub async fn create_tournament_game(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<i64>,
    Json(req): Json<CreateTournamentGameRequest>,
) -> ApiResult<TournamentGameMapping> {
    let mapping =
        tournament::create_tournament_game(&state, room_id, req.user_id, req.opponent_id).await?;
    Ok(Json(mapping))
}

pub async fn list_tournament_games(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<i64>,
) -> ApiResult<Vec<TournamentGameMapping>> {
    Ok(Json(tournament::list_games(&state, room_id).await?))
}

pub async fn get_tournament_game(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<TournamentGameMapping> {
    Ok(Json(tournament::get_game(&state, id).await?))
}

pub async fn round_status(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<i64>,
) -> ApiResult<RoundStatus> {
    Ok(Json(tournament::round_status(&state, room_id).await?))
}

pub async fn get_tournament_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<TournamentUser> {
    Ok(Json(tournament::get_user(&state, id).await?))
}

pub async fn update_tournament_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(patch): Json<TournamentUserPatch>,
) -> ApiResult<TournamentUser> {
    Ok(Json(tournament::update_user(&state, id, patch).await?))
}

pub async fn unregister_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    tournament::unregister_user(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
