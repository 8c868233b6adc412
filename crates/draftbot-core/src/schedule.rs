// Snake-order pick schedule.

use serde::{Deserialize, Serialize};

/// One pick in the draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickSlot {
    /// 0-based position in the whole draft.
    pub global_index: usize,
    pub team_id: usize,
    /// 0-based round.
    pub round: usize,
}

/// Ordered picks for a whole draft.
///
/// Built once per draft and only read afterwards, except for explicit pick
/// trades which change the owning team of a future slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickSchedule {
    num_teams: usize,
    rounds: usize,
    slots: Vec<PickSlot>,
}

/// Snake order: even rounds run 0..n, odd rounds run n-1..0.
pub fn build_pick_schedule(num_teams: usize, rounds: usize) -> PickSchedule {
    let mut slots = Vec::with_capacity(num_teams * rounds);
    for round in 0..rounds {
        for i in 0..num_teams {
            let team_id = if round % 2 == 0 { i } else { num_teams - 1 - i };
            slots.push(PickSlot {
                global_index: slots.len(),
                team_id,
                round,
            });
        }
    }
    PickSchedule {
        num_teams,
        rounds,
        slots,
    }
}

impl PickSchedule {
    pub fn num_teams(&self) -> usize {
        self.num_teams
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, global_index: usize) -> Option<PickSlot> {
        self.slots.get(global_index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PickSlot> {
        self.slots.iter()
    }

    /// Change the owner of one pick. Callers are responsible for refusing
    /// picks that were already made.
    ///
    /// Returns the previous owner, or `None` if the index or team is out of
    /// range (in which case nothing changes).
    pub fn reassign(&mut self, global_index: usize, team_id: usize) -> Option<usize> {
        if team_id >= self.num_teams {
            return None;
        }
        let slot = self.slots.get_mut(global_index)?;
        let previous = slot.team_id;
        slot.team_id = team_id;
        Some(previous)
    }
}
