pub mod error;
pub mod protocol;
pub mod session;
pub mod tournament;

pub use error::ArenaError;
pub use session::{Outcome, Session, SessionEvent, SessionState};
pub use tournament::{
    TournamentGameMapping, TournamentRoom, TournamentRoomPatch, TournamentUser,
    TournamentUserPatch, TournamentUserState,
};
