//! Poll core: tally, session state machine, announcements.

pub mod announce;
pub mod session;
pub mod tally;


pub use announce::Announcements;
pub use session::{ResetPolicy, SessionState, VoteSession};
pub use tally::{ParticipantVote, Tally};
