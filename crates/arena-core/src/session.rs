use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ArenaError;

/// Lifecycle state of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Waiting,
    Ready,
    Friend,
    Active,
    Disconnected,
    FinishedA,
    FinishedB,
    Draw,
    Aborted,
}

impl SessionState {
    pub const ALL: [SessionState; 9] = [
        SessionState::Waiting,
        SessionState::Ready,
        SessionState::Friend,
        SessionState::Active,
        SessionState::Disconnected,
        SessionState::FinishedA,
        SessionState::FinishedB,
        SessionState::Draw,
        SessionState::Aborted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Waiting => "WAITING",
            SessionState::Ready => "READY",
            SessionState::Friend => "FRIEND",
            SessionState::Active => "ACTIVE",
            SessionState::Disconnected => "DISCONNECTED",
            SessionState::FinishedA => "FINISHED_A",
            SessionState::FinishedB => "FINISHED_B",
            SessionState::Draw => "DRAW",
            SessionState::Aborted => "ABORTED",
        }
    }

    /// A terminal session is finished and accepts no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::FinishedA
                | SessionState::FinishedB
                | SessionState::Draw
                | SessionState::Aborted
        )
    }

    /// States reachable in one step from `self`.
    pub fn successors(self) -> &'static [SessionState] {
        use SessionState::*;
        match self {
            Waiting => &[Ready],
            Ready => &[Active],
            Friend => &[Active],
            Active => &[Disconnected, FinishedA, FinishedB, Draw],
            Disconnected => &[Active, Aborted],
            FinishedA | FinishedB | Draw | Aborted => &[],
        }
    }

    /// Validate a transition from `self` to `next`.
    pub fn transition(self, next: SessionState) -> Result<SessionState, ArenaError> {
        if self.is_terminal() {
            return Err(ArenaError::FailedPrecondition(format!(
                "session is in terminal state {}",
                self
            )));
        }
        if self.successors().contains(&next) {
            Ok(next)
        } else {
            Err(ArenaError::InvalidArgument(format!(
                "transition {} -> {} is not allowed",
                self, next
            )))
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionState {
    type Err = ArenaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SessionState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| ArenaError::InvalidArgument(format!("unknown session state {:?}", s)))
    }
}

/// One match between two players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub state: SessionState,
    pub points_a: i32,
    pub points_b: i32,
    pub player_a_id: i64,
    pub player_b_id: Option<i64>,
    pub finished: bool,
    /// Write counter; bumped on every update and used for compare-and-swap.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn has_player(&self, player_id: i64) -> bool {
        self.player_a_id == player_id || self.player_b_id == Some(player_id)
    }

    /// True when the session pairs exactly `a` and `b`, in either order.
    pub fn pairs(&self, a: i64, b: i64) -> bool {
        (self.player_a_id == a && self.player_b_id == Some(b))
            || (self.player_a_id == b && self.player_b_id == Some(a))
    }

    /// Validate a transition for this session. Besides the state table,
    /// READY needs a second player.
    pub fn transition(&self, next: SessionState) -> Result<SessionState, ArenaError> {
        let next = self.state.transition(next)?;
        if next == SessionState::Ready && self.player_b_id.is_none() {
            return Err(ArenaError::FailedPrecondition(format!(
                "session {} has no second player",
                self.id
            )));
        }
        Ok(next)
    }

    /// Classify a reported winner against this session's players. A session
    /// still waiting for its second player has no result.
    pub fn outcome_for(&self, winner_id: i64) -> Result<Outcome, ArenaError> {
        let Some(b) = self.player_b_id else {
            return Err(ArenaError::FailedPrecondition(format!(
                "session {} has no second player",
                self.id
            )));
        };
        Ok(if winner_id == self.player_a_id {
            Outcome::WonByA {
                winner: self.player_a_id,
                loser: b,
            }
        } else if winner_id == b {
            Outcome::WonByB {
                winner: b,
                loser: self.player_a_id,
            }
        } else {
            Outcome::Draw
        })
    }
}

/// Result of a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    WonByA { winner: i64, loser: i64 },
    WonByB { winner: i64, loser: i64 },
    Draw,
}

impl Outcome {
    pub fn state(self) -> SessionState {
        match self {
            Outcome::WonByA { .. } => SessionState::FinishedA,
            Outcome::WonByB { .. } => SessionState::FinishedB,
            Outcome::Draw => SessionState::Draw,
        }
    }

    /// `(winner, loser)` for a decisive result.
    pub fn decisive(self) -> Option<(i64, i64)> {
        match self {
            Outcome::WonByA { winner, loser } | Outcome::WonByB { winner, loser } => {
                Some((winner, loser))
            }
            Outcome::Draw => None,
        }
    }
}

/// An entry in a session's append-only event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub id: i64,
    pub session_id: i64,
    pub event_type: String,
    pub event_data: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(a: i64, b: Option<i64>) -> Session {
        let now = Utc::now();
        Session {
            id: 1,
            state: SessionState::Active,
            points_a: 0,
            points_b: 0,
            player_a_id: a,
            player_b_id: b,
            finished: false,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn queue_path_transitions() {
        use SessionState::*;
        assert_eq!(Waiting.transition(Ready), Ok(Ready));
        assert_eq!(Ready.transition(Active), Ok(Active));
        assert_eq!(Active.transition(Disconnected), Ok(Disconnected));
        assert_eq!(Disconnected.transition(Active), Ok(Active));
        assert_eq!(Disconnected.transition(Aborted), Ok(Aborted));
        for end in [FinishedA, FinishedB, Draw] {
            assert_eq!(Active.transition(end), Ok(end));
        }
    }

    #[test]
    fn friend_skips_queue_states() {
        use SessionState::*;
        assert_eq!(Friend.transition(Active), Ok(Active));
        assert!(matches!(
            Friend.transition(Ready),
            Err(ArenaError::InvalidArgument(_))
        ));
    }

    #[test]
    fn terminal_states_reject_everything() {
        for from in SessionState::ALL.into_iter().filter(|s| s.is_terminal()) {
            for to in SessionState::ALL {
                assert!(matches!(
                    from.transition(to),
                    Err(ArenaError::FailedPrecondition(_))
                ));
            }
        }
    }

    #[test]
    fn unlisted_transitions_are_invalid() {
        use SessionState::*;
        for (from, to) in [
            (Waiting, Active),
            (Waiting, Waiting),
            (Ready, Disconnected),
            (Active, Aborted),
            (Disconnected, FinishedA),
        ] {
            assert!(
                matches!(from.transition(to), Err(ArenaError::InvalidArgument(_))),
                "{} -> {}",
                from,
                to
            );
        }
    }

    #[test]
    fn state_strings_round_trip_and_reject_unknown() {
        for state in SessionState::ALL {
            assert_eq!(state.as_str().parse::<SessionState>(), Ok(state));
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state.as_str()));
        }
        assert!(matches!(
            "finished - Draw".parse::<SessionState>(),
            Err(ArenaError::InvalidArgument(_))
        ));
    }

    #[test]
    fn outcome_classification() {
        let s = session(7, Some(9));
        assert_eq!(
            s.outcome_for(7),
            Ok(Outcome::WonByA { winner: 7, loser: 9 })
        );
        assert_eq!(s.outcome_for(9), Ok(Outcome::WonByB { winner: 9, loser: 7 }));
        assert_eq!(s.outcome_for(3), Ok(Outcome::Draw));
        assert_eq!(s.outcome_for(7).map(Outcome::decisive), Ok(Some((7, 9))));
        assert_eq!(Outcome::Draw.decisive(), None);
        assert_eq!(Outcome::Draw.state(), SessionState::Draw);
    }

    #[test]
    fn lone_player_has_no_outcome() {
        let s = session(7, None);
        assert!(matches!(
            s.outcome_for(7),
            Err(ArenaError::FailedPrecondition(_))
        ));
        assert!(matches!(
            s.outcome_for(0),
            Err(ArenaError::FailedPrecondition(_))
        ));
    }

    #[test]
    fn ready_needs_a_second_player() {
        let mut s = session(7, None);
        s.state = SessionState::Waiting;
        assert!(matches!(
            s.transition(SessionState::Ready),
            Err(ArenaError::FailedPrecondition(_))
        ));

        s.player_b_id = Some(9);
        assert_eq!(s.transition(SessionState::Ready), Ok(SessionState::Ready));
        assert!(matches!(
            s.transition(SessionState::Active),
            Err(ArenaError::InvalidArgument(_))
        ));
    }

    #[test]
    fn pairs_is_order_insensitive() {
        let s = session(4, Some(5));
        assert!(s.pairs(4, 5));
        assert!(s.pairs(5, 4));
        assert!(!s.pairs(4, 6));
        assert!(s.has_player(5));
        assert!(!s.has_player(6));
    }
}
