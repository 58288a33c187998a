use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ArenaError;
use crate::session::SessionState;

/// Join the matchmaking queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinQueueRequest {
    pub player_id: i64,
}

/// Pair two known players directly, bypassing the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendSessionRequest {
    pub player_a: i64,
    pub player_b: i64,
}

/// Requested transition. The state is kept as text so an unknown name is
/// reported as an invalid argument rather than a malformed body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStateRequest {
    pub state: String,
}

impl UpdateStateRequest {
    pub fn target(&self) -> Result<SessionState, ArenaError> {
        self.state.parse()
    }
}

/// Final score report from the game server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinishSessionRequest {
    pub points_a: i32,
    pub points_b: i32,
    pub winner_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendEventRequest {
    pub event_type: String,
    #[serde(default)]
    pub event_data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    pub size: i32,
    /// Defaults to one hour from now.
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUserRequest {
    pub user_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTournamentGameRequest {
    pub user_id: i64,
    pub opponent_id: i64,
}

/// Answer to "is this room ready for its next round".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundStatus {
    pub room_id: i64,
    pub ready: bool,
    pub round: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_state_name_is_invalid_argument() {
        let req = UpdateStateRequest {
            state: "PAUSED".into(),
        };
        assert_eq!(req.target().unwrap_err().code(), "INVALID_ARGUMENT");

        let req = UpdateStateRequest {
            state: "DISCONNECTED".into(),
        };
        assert_eq!(req.target(), Ok(SessionState::Disconnected));
    }
}
