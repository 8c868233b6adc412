// Library root: the draft session, shared by the `draftbot` binary and the
// integration tests.

pub mod session;

pub use session::{DraftSession, PickRecord, RosterSlot, TeamRoster};
