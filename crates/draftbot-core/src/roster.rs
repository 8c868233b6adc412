// Roster requirements and per-team slot tracking.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::position::{Position, SLOT_COUNT};

/// Required slot counts per position, shared by every team in the league.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterRequirements {
    required: [u8; SLOT_COUNT],
}

impl Default for RosterRequirements {
    /// QB:1, RB:2, WR:2, TE:1, FLEX:2, K:1, DST:1.
    fn default() -> Self {
        let mut reqs = Self::none();
        reqs.set(Position::Quarterback, 1);
        reqs.set(Position::RunningBack, 2);
        reqs.set(Position::WideReceiver, 2);
        reqs.set(Position::TightEnd, 1);
        reqs.set(Position::Flex, 2);
        reqs.set(Position::Kicker, 1);
        reqs.set(Position::Defense, 1);
        reqs
    }
}

impl RosterRequirements {
    /// Requirements with zero slots everywhere.
    pub fn none() -> Self {
        RosterRequirements {
            required: [0; SLOT_COUNT],
        }
    }

    /// Build requirements from an already-validated position map.
    /// Positions missing from the map require zero slots.
    pub fn from_counts(counts: &HashMap<Position, u8>) -> Self {
        let mut reqs = Self::none();
        for (&pos, &count) in counts {
            reqs.set(pos, count);
        }
        reqs
    }

    pub fn set(&mut self, position: Position, count: u8) {
        self.required[position.index()] = count;
    }

    pub fn required(&self, position: Position) -> usize {
        self.required[position.index()] as usize
    }

    /// Total starting slots per team.
    pub fn slots_per_team(&self) -> usize {
        self.required.iter().map(|&c| c as usize).sum()
    }
}

/// Filled slot counts for one team.
///
/// A plain `Copy` value: cloning a draft state copies every tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterTracker {
    filled: [u8; SLOT_COUNT],
}

impl RosterTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filled(&self, slot: Position) -> usize {
        self.filled[slot.index()] as usize
    }

    /// Open slots remaining for `slot`, never negative.
    ///
    /// For FLEX this equals `FLEX.required - surplus`, where surplus counts
    /// RB/WR/TE players beyond their dedicated slots.
    pub fn still_needed(&self, slot: Position, reqs: &RosterRequirements) -> usize {
        reqs.required(slot).saturating_sub(self.filled(slot))
    }

    /// Slots with at least one opening, in display order.
    pub fn needed_positions<'a>(
        &'a self,
        reqs: &'a RosterRequirements,
    ) -> impl Iterator<Item = Position> + 'a {
        Position::ALL
            .into_iter()
            .filter(move |&slot| self.still_needed(slot, reqs) > 0)
    }

    /// The slot a player at `position` would occupy, if any.
    ///
    /// Slot assignment priority:
    /// 1. Dedicated position slot
    /// 2. FLEX (RB/WR/TE only)
    pub fn slot_for(&self, position: Position, reqs: &RosterRequirements) -> Option<Position> {
        if position.is_meta_slot() {
            return None;
        }
        if self.still_needed(position, reqs) > 0 {
            return Some(position);
        }
        if position.is_flex_eligible() && self.still_needed(Position::Flex, reqs) > 0 {
            return Some(Position::Flex);
        }
        None
    }

    /// Place a player at `position`, returning the slot it filled.
    /// Returns `None` and leaves the tracker untouched when no slot is open.
    pub fn fill(&mut self, position: Position, reqs: &RosterRequirements) -> Option<Position> {
        let slot = self.slot_for(position, reqs)?;
        self.filled[slot.index()] += 1;
        Some(slot)
    }

    pub fn is_complete(&self, reqs: &RosterRequirements) -> bool {
        self.needed_positions(reqs).next().is_none()
    }
}
