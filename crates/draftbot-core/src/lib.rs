// Draft domain: players, positions, rosters, pick schedule, draft state,
// configuration and persistence.

pub mod config;
pub mod db;
pub mod draftboard;
pub mod position;
pub mod roster;
pub mod schedule;
pub mod state;
pub mod zscore;

pub use draftboard::{build_draftboard, Draftboard, DraftboardError, Player, PlayerId, RankedRow, TakenSet};
pub use position::Position;
pub use roster::{RosterRequirements, RosterTracker};
pub use schedule::{build_pick_schedule, PickSchedule, PickSlot};
pub use state::{DraftPick, DraftRules, DraftState, PickChoice, PickError, Selection};
