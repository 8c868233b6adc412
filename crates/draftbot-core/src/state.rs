// Draft state: committed picks, taken players and per-team rosters.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::draftboard::{Draftboard, PlayerId, TakenSet};
use crate::position::Position;
use crate::roster::{RosterRequirements, RosterTracker};
use crate::schedule::{PickSchedule, PickSlot};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PickError {
    #[error("the draft is complete")]
    DraftComplete,

    #[error("no player named '{0}' on the board")]
    UnknownPlayer(String),

    #[error("{name} has already been taken")]
    AlreadyTaken { name: String },

    #[error("team {team_id} has no open slot for {name} ({position})")]
    NoOpenSlot {
        name: String,
        position: Position,
        team_id: usize,
    },

    #[error("pick {global_index} cannot be traded (pick {pick_pointer} is on the clock, {len} picks total)")]
    PickNotTradable {
        global_index: usize,
        pick_pointer: usize,
        len: usize,
    },

    #[error("team {team_id} does not exist ({num_teams} teams)")]
    UnknownTeam { team_id: usize, num_teams: usize },
}

/// The read-only inputs every state transition is checked against.
#[derive(Debug, Clone, Copy)]
pub struct DraftRules<'a> {
    pub board: &'a Draftboard,
    pub schedule: &'a PickSchedule,
    pub requirements: &'a RosterRequirements,
}

/// A candidate decision at one pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PickChoice {
    Player(PlayerId),
    /// Advance the pick without taking anyone; used when a team has no
    /// legal candidate left.
    Pass,
}

/// What happened at a committed pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selection {
    Drafted(PlayerId),
    /// Taken off the board without filling a slot or scoring.
    Benched(PlayerId),
    Passed,
}

impl Selection {
    pub fn player(&self) -> Option<PlayerId> {
        match *self {
            Selection::Drafted(id) | Selection::Benched(id) => Some(id),
            Selection::Passed => None,
        }
    }
}

/// A committed pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftPick {
    pub pick: PickSlot,
    pub selection: Selection,
    /// Roster slot the player filled, for drafted players only.
    pub slot: Option<Position>,
}

/// Complete state of a draft in progress.
///
/// `pick_pointer()` is always `picks().len()`.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftState {
    picks: Vec<DraftPick>,
    taken: TakenSet,
    rosters: Vec<RosterTracker>,
}

impl DraftState {
    pub fn new(num_teams: usize, board_len: usize) -> Self {
        DraftState {
            picks: Vec::new(),
            taken: TakenSet::with_capacity(board_len),
            rosters: vec![RosterTracker::new(); num_teams],
        }
    }

    /// Index of the next pick to be made.
    pub fn pick_pointer(&self) -> usize {
        self.picks.len()
    }

    pub fn picks(&self) -> &[DraftPick] {
        &self.picks
    }

    pub fn taken(&self) -> &TakenSet {
        &self.taken
    }

    pub fn is_taken(&self, id: PlayerId) -> bool {
        self.taken.contains(id)
    }

    pub fn roster(&self, team_id: usize) -> Option<&RosterTracker> {
        self.rosters.get(team_id)
    }

    pub fn rosters(&self) -> &[RosterTracker] {
        &self.rosters
    }

    /// The pick currently on the clock.
    pub fn on_the_clock(&self, schedule: &PickSchedule) -> Option<PickSlot> {
        schedule.get(self.pick_pointer())
    }

    pub fn is_complete(&self, schedule: &PickSchedule) -> bool {
        self.pick_pointer() >= schedule.len()
    }

    /// Total projected points of the players `team_id` drafted.
    pub fn team_points(&self, team_id: usize, board: &Draftboard) -> f64 {
        self.picks
            .iter()
            .filter(|p| p.pick.team_id == team_id)
            .filter_map(|p| match p.selection {
                Selection::Drafted(id) => board.get(id).map(|pl| pl.projected_points),
                _ => None,
            })
            .sum()
    }

    /// Apply `choice` for the team on the clock.
    ///
    /// On error the state is unchanged.
    pub fn apply(&mut self, choice: PickChoice, rules: &DraftRules) -> Result<DraftPick, PickError> {
        let pick = self
            .on_the_clock(rules.schedule)
            .ok_or(PickError::DraftComplete)?;
        let selection = match choice {
            PickChoice::Player(id) => Selection::Drafted(id),
            PickChoice::Pass => Selection::Passed,
        };
        self.record(pick, selection, rules)
    }

    /// Copy-with-extension: the state after `choice`, leaving `self` alone.
    pub fn with_choice(&self, choice: PickChoice, rules: &DraftRules) -> Result<Self, PickError> {
        let mut next = self.clone();
        next.apply(choice, rules)?;
        Ok(next)
    }

    /// Take `id` off the board for the team on the clock without filling a
    /// slot.
    pub fn bench(&mut self, id: PlayerId, rules: &DraftRules) -> Result<DraftPick, PickError> {
        let pick = self
            .on_the_clock(rules.schedule)
            .ok_or(PickError::DraftComplete)?;
        self.record(pick, Selection::Benched(id), rules)
    }

    /// Remove the last pick and rebuild every roster by replaying the rest.
    pub fn undo_last(&mut self, rules: &DraftRules) -> Option<DraftPick> {
        let last = self.picks.pop()?;
        let remaining = std::mem::take(&mut self.picks);
        self.reset(rules.board.len());
        for pick in remaining {
            // Every remaining pick was legal when first recorded.
            if let Err(e) = self.record(pick.pick, pick.selection, rules) {
                warn!("replay dropped pick {}: {}", pick.pick.global_index, e);
            }
        }
        Some(last)
    }

    /// Rebuild this state from a recorded pick history.
    ///
    /// Picks are replayed in order with the team each was made by; a pick
    /// that no longer applies stops the replay with its error.
    pub fn restore_from_picks(
        &mut self,
        picks: &[DraftPick],
        rules: &DraftRules,
    ) -> Result<(), PickError> {
        self.reset(rules.board.len());
        for pick in picks {
            self.record(pick.pick, pick.selection, rules)?;
        }
        Ok(())
    }

    fn reset(&mut self, board_len: usize) {
        self.picks.clear();
        self.taken = TakenSet::with_capacity(board_len);
        for roster in &mut self.rosters {
            *roster = RosterTracker::new();
        }
    }

    fn record(
        &mut self,
        pick: PickSlot,
        selection: Selection,
        rules: &DraftRules,
    ) -> Result<DraftPick, PickError> {
        let team = self.rosters.get_mut(pick.team_id).ok_or(PickError::UnknownTeam {
            team_id: pick.team_id,
            num_teams: rules.schedule.num_teams(),
        })?;

        let slot = match selection {
            Selection::Passed => None,
            Selection::Drafted(id) | Selection::Benched(id) => {
                let player = rules
                    .board
                    .get(id)
                    .ok_or_else(|| PickError::UnknownPlayer(format!("#{id}")))?;
                if self.taken.contains(id) {
                    return Err(PickError::AlreadyTaken {
                        name: player.name.clone(),
                    });
                }
                let slot = if matches!(selection, Selection::Drafted(_)) {
                    let filled = team.fill(player.position, rules.requirements).ok_or_else(|| {
                        PickError::NoOpenSlot {
                            name: player.name.clone(),
                            position: player.position,
                            team_id: pick.team_id,
                        }
                    })?;
                    Some(filled)
                } else {
                    None
                };
                self.taken.insert(id);
                slot
            }
        };

        let committed = DraftPick {
            pick: PickSlot {
                global_index: self.picks.len(),
                ..pick
            },
            selection,
            slot,
        };
        self.picks.push(committed);
        Ok(committed)
    }
}
