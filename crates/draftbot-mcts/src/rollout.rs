//! Rollout policies and the playout loop.

use std::sync::Arc;

use draftbot_core::config::RolloutKind;
use draftbot_core::{DraftRules, DraftState, PickChoice, PickError};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::expansion::candidate_choices;

/// Strategy for choosing among legal candidates during a playout.
pub trait RolloutPolicy {
    /// Pick one of `candidates`, which is never empty.
    fn choose(&mut self, candidates: &[PickChoice], state: &DraftState) -> PickChoice;
}

/// Uniformly random choice, driven by a seeded RNG.
#[derive(Debug, Clone)]
pub struct UniformRollout {
    rng: ChaCha8Rng,
}

impl UniformRollout {
    pub fn new(seed: u64) -> Self {
        UniformRollout {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl RolloutPolicy for UniformRollout {
    fn choose(&mut self, candidates: &[PickChoice], _state: &DraftState) -> PickChoice {
        candidates[self.rng.gen_range(0..candidates.len())]
    }
}

/// Greedy choice by positional z-score: each team takes the candidate who
/// stands furthest above the startable pool at their position.
#[derive(Debug, Clone)]
pub struct ZScoreRollout {
    scores: Arc<[f64]>,
}

impl ZScoreRollout {
    /// `scores` is indexed by player id, as produced by
    /// `draftbot_core::zscore::positional_zscores`.
    pub fn new(scores: Arc<[f64]>) -> Self {
        ZScoreRollout { scores }
    }

    fn score(&self, choice: PickChoice) -> f64 {
        match choice {
            PickChoice::Player(id) => self.scores.get(id).copied().unwrap_or(0.0),
            PickChoice::Pass => f64::NEG_INFINITY,
        }
    }
}

impl RolloutPolicy for ZScoreRollout {
    fn choose(&mut self, candidates: &[PickChoice], _state: &DraftState) -> PickChoice {
        let mut best = candidates[0];
        for &choice in &candidates[1..] {
            if self.score(choice) > self.score(best) {
                best = choice;
            }
        }
        best
    }
}

/// A rollout policy selected at runtime from configuration.
#[derive(Debug, Clone)]
pub enum ConfiguredRollout {
    Uniform(UniformRollout),
    ZScore(ZScoreRollout),
}

impl ConfiguredRollout {
    /// `scores` is only used by the z-score policy.
    pub fn from_kind(kind: RolloutKind, seed: u64, scores: &Arc<[f64]>) -> Self {
        match kind {
            RolloutKind::Uniform => ConfiguredRollout::Uniform(UniformRollout::new(seed)),
            RolloutKind::ZScore => ConfiguredRollout::ZScore(ZScoreRollout::new(Arc::clone(scores))),
        }
    }
}

impl RolloutPolicy for ConfiguredRollout {
    fn choose(&mut self, candidates: &[PickChoice], state: &DraftState) -> PickChoice {
        match self {
            ConfiguredRollout::Uniform(p) => p.choose(candidates, state),
            ConfiguredRollout::ZScore(p) => p.choose(candidates, state),
        }
    }
}

/// Apply `choice` to `state`, returning the points it earns `target_team`.
pub(crate) fn advance(
    state: &mut DraftState,
    choice: PickChoice,
    rules: &DraftRules,
    target_team: usize,
) -> Result<f64, PickError> {
    let pick = state.apply(choice, rules)?;
    match choice {
        PickChoice::Player(id) if pick.pick.team_id == target_team => Ok(rules
            .board
            .get(id)
            .map(|p| p.projected_points)
            .unwrap_or(0.0)),
        _ => Ok(0.0),
    }
}

/// Play `state` out to the end of the schedule.
///
/// `state` is a disposable copy. Returns `accrued` plus the projected points
/// of every player the target team takes along the way.
pub fn rollout<P: RolloutPolicy + ?Sized>(
    mut state: DraftState,
    rules: &DraftRules,
    target_team: usize,
    accrued: f64,
    policy: &mut P,
) -> Result<f64, PickError> {
    let mut total = accrued;
    loop {
        let candidates = candidate_choices(&state, rules);
        if candidates.is_empty() {
            return Ok(total);
        }
        let choice = policy.choose(&candidates, &state);
        total += advance(&mut state, choice, rules, target_team)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use draftbot_core::{
        build_draftboard, build_pick_schedule, Draftboard, PickSchedule, Position, RankedRow,
        RosterRequirements,
    };

    struct Fixture {
        board: Draftboard,
        schedule: PickSchedule,
        reqs: RosterRequirements,
    }

    impl Fixture {
        fn qb_rb() -> Self {
            let rows: Vec<RankedRow> = [
                ("QB A", "QB", "100"),
                ("RB A", "RB", "95"),
                ("QB B", "QB", "90"),
                ("RB B", "RB", "85"),
                ("QB C", "QB", "80"),
                ("RB C", "RB", "75"),
            ]
            .iter()
            .enumerate()
            .map(|(i, (n, p, pts))| RankedRow::new(i as u64 + 1, n, p, pts))
            .collect();
            let mut reqs = RosterRequirements::none();
            reqs.set(Position::Quarterback, 1);
            reqs.set(Position::RunningBack, 1);
            Fixture {
                board: build_draftboard(&rows).unwrap(),
                schedule: build_pick_schedule(2, 2),
                reqs,
            }
        }

        fn rules(&self) -> DraftRules<'_> {
            DraftRules {
                board: &self.board,
                schedule: &self.schedule,
                requirements: &self.reqs,
            }
        }
    }

    /// Always takes the first candidate.
    struct FirstChoice;

    impl RolloutPolicy for FirstChoice {
        fn choose(&mut self, candidates: &[PickChoice], _state: &DraftState) -> PickChoice {
            candidates[0]
        }
    }

    #[test]
    fn rollout_plays_to_the_end() {
        let fx = Fixture::qb_rb();
        let state = DraftState::new(2, fx.board.len());
        // First candidate is always the best QB still needed, else the RB.
        // t0: QB A (100), t1: QB B, t1: RB A, t0: RB B (85).
        let reward = rollout(state.clone(), &fx.rules(), 0, 0.0, &mut FirstChoice).unwrap();
        assert_eq!(reward, 185.0);
        // The caller's state is never touched.
        assert_eq!(state.pick_pointer(), 0);
    }

    #[test]
    fn rollout_adds_to_accrued_points() {
        let fx = Fixture::qb_rb();
        let state = DraftState::new(2, fx.board.len());
        let reward = rollout(state, &fx.rules(), 1, 50.0, &mut FirstChoice).unwrap();
        // t1 gets QB B (90) and RB A (95).
        assert_eq!(reward, 50.0 + 185.0);
    }

    #[test]
    fn rollout_of_complete_draft_returns_accrued() {
        let fx = Fixture::qb_rb();
        let mut state = DraftState::new(2, fx.board.len());
        for _ in 0..4 {
            state.apply(PickChoice::Pass, &fx.rules()).unwrap();
        }
        let reward = rollout(state, &fx.rules(), 0, 12.5, &mut FirstChoice).unwrap();
        assert_eq!(reward, 12.5);
    }

    #[test]
    fn uniform_rollout_is_seeded() {
        let fx = Fixture::qb_rb();
        let state = DraftState::new(2, fx.board.len());
        let run = |seed| {
            let mut policy = UniformRollout::new(seed);
            (0..20)
                .map(|_| rollout(state.clone(), &fx.rules(), 0, 0.0, &mut policy).unwrap())
                .collect::<Vec<f64>>()
        };
        assert_eq!(run(7), run(7));
    }

    #[test]
    fn uniform_rollout_rewards_stay_in_range() {
        let fx = Fixture::qb_rb();
        let state = DraftState::new(2, fx.board.len());
        let mut policy = UniformRollout::new(1);
        for _ in 0..100 {
            let reward = rollout(state.clone(), &fx.rules(), 0, 0.0, &mut policy).unwrap();
            // Team 0 always ends with one QB and one RB from the board.
            assert!((155.0..=195.0).contains(&reward), "reward {reward}");
        }
    }

    #[test]
    fn zscore_rollout_takes_highest_score() {
        let fx = Fixture::qb_rb();
        let state = DraftState::new(2, fx.board.len());
        let scores: Arc<[f64]> = vec![0.1, 2.0, 0.0, 0.0, 0.0, 0.0].into();
        let mut policy = ZScoreRollout::new(scores);
        let choice = policy.choose(&[PickChoice::Player(0), PickChoice::Player(1)], &state);
        assert_eq!(choice, PickChoice::Player(1));
        assert_eq!(policy.choose(&[PickChoice::Pass], &state), PickChoice::Pass);
    }

    #[test]
    fn configured_rollout_follows_kind() {
        let scores: Arc<[f64]> = vec![0.0; 6].into();
        assert!(matches!(
            ConfiguredRollout::from_kind(RolloutKind::Uniform, 1, &scores),
            ConfiguredRollout::Uniform(_)
        ));
        assert!(matches!(
            ConfiguredRollout::from_kind(RolloutKind::ZScore, 1, &scores),
            ConfiguredRollout::ZScore(_)
        ));
    }
}
