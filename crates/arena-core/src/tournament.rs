use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ArenaError;

/// A bracket container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentRoom {
    pub id: i64,
    pub name: String,
    pub size: i32,
    pub chat_room_id: i64,
    pub started: bool,
    pub start_time: DateTime<Utc>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TournamentUserState {
    Waiting,
    Playing,
    /// Lost a game; takes no further part in the room.
    Eliminated,
}

impl TournamentUserState {
    pub fn as_str(self) -> &'static str {
        match self {
            TournamentUserState::Waiting => "WAITING",
            TournamentUserState::Playing => "PLAYING",
            TournamentUserState::Eliminated => "ELIMINATED",
        }
    }
}

impl fmt::Display for TournamentUserState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TournamentUserState {
    type Err = ArenaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WAITING" => Ok(TournamentUserState::Waiting),
            "PLAYING" => Ok(TournamentUserState::Playing),
            "ELIMINATED" => Ok(TournamentUserState::Eliminated),
            other => Err(ArenaError::InvalidArgument(format!(
                "unknown tournament user state {:?}",
                other
            ))),
        }
    }
}

/// A participant's standing within a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentUser {
    pub id: i64,
    pub room_id: i64,
    pub user_id: i64,
    pub play_order: i32,
    pub games_played: i32,
    pub state: TournamentUserState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Links a session to the tournament context of the user who initiated it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentGameMapping {
    pub id: i64,
    pub room_id: i64,
    pub session_id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Fields of a tournament user to overwrite. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentUserPatch {
    #[serde(default)]
    pub state: Option<TournamentUserState>,
    #[serde(default)]
    pub play_order: Option<i32>,
    #[serde(default)]
    pub games_played: Option<i32>,
}

impl TournamentUserPatch {
    pub fn is_empty(&self) -> bool {
        self.state.is_none() && self.play_order.is_none() && self.games_played.is_none()
    }

    pub fn apply(&self, user: &mut TournamentUser) {
        if let Some(state) = self.state {
            user.state = state;
        }
        if let Some(play_order) = self.play_order {
            user.play_order = play_order;
        }
        if let Some(games_played) = self.games_played {
            user.games_played = games_played;
        }
    }
}

/// Fields of a room to overwrite. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentRoomPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub started: Option<bool>,
    #[serde(default)]
    pub active: Option<bool>,
}

impl TournamentRoomPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.started.is_none() && self.active.is_none()
    }

    /// Apply the patch. A blank name is rejected and leaves `room` untouched.
    pub fn apply(&self, room: &mut TournamentRoom) -> Result<(), ArenaError> {
        if let Some(name) = &self.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(ArenaError::InvalidArgument("room name is empty".into()));
            }
            room.name = name.to_string();
        }
        if let Some(started) = self.started {
            room.started = started;
        }
        if let Some(active) = self.active {
            room.active = active;
        }
        Ok(())
    }
}

/// The round a room is ready to pair, if any.
///
/// Eliminated users are ignored. The room is ready once at least two users
/// remain, all of them are `WAITING`, and all have played the same number
/// of games.
pub fn round_readiness(users: &[TournamentUser]) -> Option<i32> {
    let mut active = users
        .iter()
        .filter(|u| u.state != TournamentUserState::Eliminated);
    let first = active.next()?;
    let round = first.games_played;
    let mut remaining = 1;
    for u in active {
        if u.state != TournamentUserState::Waiting || u.games_played != round {
            return None;
        }
        remaining += 1;
    }
    (first.state == TournamentUserState::Waiting && remaining >= 2).then_some(round)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(play_order: i32, games_played: i32, state: TournamentUserState) -> TournamentUser {
        let now = Utc::now();
        TournamentUser {
            id: play_order as i64,
            room_id: 1,
            user_id: 100 + play_order as i64,
            play_order,
            games_played,
            state,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn patch_with_zero_values_overwrites() {
        let mut u = user(3, 2, TournamentUserState::Playing);
        let patch = TournamentUserPatch {
            state: None,
            play_order: Some(0),
            games_played: Some(0),
        };
        patch.apply(&mut u);
        assert_eq!(u.play_order, 0);
        assert_eq!(u.games_played, 0);
        assert_eq!(u.state, TournamentUserState::Playing);
    }

    #[test]
    fn empty_patch_changes_nothing() {
        let mut u = user(3, 2, TournamentUserState::Playing);
        let before = u.clone();
        let patch = TournamentUserPatch::default();
        assert!(patch.is_empty());
        patch.apply(&mut u);
        assert_eq!(u, before);
    }

    #[test]
    fn patch_deserializes_missing_fields_as_none() {
        let patch: TournamentUserPatch = serde_json::from_str(r#"{"games_played":0}"#).unwrap();
        assert_eq!(patch.games_played, Some(0));
        assert_eq!(patch.play_order, None);
        assert_eq!(patch.state, None);
    }

    #[test]
    fn readiness_requires_everyone_waiting_on_same_round() {
        use TournamentUserState::*;
        assert_eq!(round_readiness(&[]), None);
        assert_eq!(
            round_readiness(&[user(1, 1, Waiting), user(2, 1, Waiting)]),
            Some(1)
        );
        assert_eq!(
            round_readiness(&[user(1, 1, Waiting), user(2, 0, Waiting)]),
            None
        );
        assert_eq!(
            round_readiness(&[user(1, 1, Waiting), user(2, 1, Playing)]),
            None
        );
    }

    #[test]
    fn readiness_ignores_eliminated_users() {
        use TournamentUserState::*;
        let after_round_one = [
            user(1, 1, Waiting),
            user(2, 0, Eliminated),
            user(3, 1, Waiting),
            user(4, 0, Eliminated),
        ];
        assert_eq!(round_readiness(&after_round_one), Some(1));

        let champion = [user(1, 2, Waiting), user(3, 1, Eliminated)];
        assert_eq!(round_readiness(&champion), None);
    }

    #[test]
    fn room_patch_sets_flags_and_rejects_blank_name() {
        let now = Utc::now();
        let mut room = TournamentRoom {
            id: 1,
            name: "cup".into(),
            size: 4,
            chat_room_id: 9,
            started: false,
            start_time: now,
            active: true,
            created_at: now,
            updated_at: now,
        };

        let patch = TournamentRoomPatch {
            started: Some(true),
            active: Some(false),
            ..Default::default()
        };
        patch.apply(&mut room).unwrap();
        assert!(room.started);
        assert!(!room.active);
        assert_eq!(room.name, "cup");

        let blank = TournamentRoomPatch {
            name: Some("  ".into()),
            active: Some(true),
            ..Default::default()
        };
        assert!(matches!(
            blank.apply(&mut room),
            Err(ArenaError::InvalidArgument(_))
        ));
        assert!(!room.active);
    }

    #[test]
    fn user_state_parses() {
        assert_eq!("PLAYING".parse(), Ok(TournamentUserState::Playing));
        assert_eq!("ELIMINATED".parse(), Ok(TournamentUserState::Eliminated));
        assert!("playing".parse::<TournamentUserState>().is_err());
    }
}
