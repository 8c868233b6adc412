//! Search driver.
//!
//! One search answers one real pick:
//! 1. Build the root from the real state and expand it
//! 2. Iterate select -> expand -> rollout -> backpropagate until the budget
//!    runs out
//! 3. Commit to a root child by the configured policy
//!
//! The tree is dropped with the search. Parallel search runs independent
//! trees and merges their root statistics before committing.

use std::time::{Duration, Instant};

use draftbot_core::config::CommitPolicy;
use draftbot_core::{DraftRules, DraftState, PickChoice, PickError, PickSlot};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, trace};

use crate::config::MctsConfig;
use crate::expansion::{expand, Expansion};
use crate::node::NodeId;
use crate::rollout::{advance, rollout, RolloutPolicy};
use crate::tree::SearchTree;

/// Budget applied when neither a time nor an iteration limit is set.
const FALLBACK_TIME_BUDGET: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("the draft is complete; there is no pick to search")]
    DraftComplete,

    /// A candidate produced by expansion failed to apply. Indicates a bug.
    #[error("illegal transition during search: {0}")]
    IllegalTransition(#[from] PickError),
}

/// Aggregate statistics for one root child.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildStats {
    pub choice: PickChoice,
    pub visits: u32,
    pub value_sum: f64,
    /// Best single rollout reward.
    pub best: f64,
}

impl ChildStats {
    pub fn mean(&self) -> f64 {
        if self.visits == 0 {
            0.0
        } else {
            self.value_sum / self.visits as f64
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchStats {
    pub iterations: u64,
    pub elapsed: Duration,
    pub tree_size: usize,
    pub max_depth: u32,
    /// Expansions that found no candidate and added a pass.
    pub pass_throughs: u64,
    pub workers: usize,
}

/// Result of a search.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The committed choice.
    pub choice: PickChoice,
    /// The pick being searched.
    pub pick: PickSlot,
    /// Root children in expansion order.
    pub children: Vec<ChildStats>,
    pub stats: SearchStats,
}

/// Search state for one pick.
pub struct MctsSearch<'a, P: RolloutPolicy> {
    tree: SearchTree,
    root_state: &'a DraftState,
    rules: DraftRules<'a>,
    config: &'a MctsConfig,
    policy: P,
    pick: PickSlot,
    pass_throughs: u64,
}

impl<'a, P: RolloutPolicy> MctsSearch<'a, P> {
    /// Build the root for the pick on the clock and expand it.
    pub fn new(
        root_state: &'a DraftState,
        rules: DraftRules<'a>,
        config: &'a MctsConfig,
        policy: P,
    ) -> Result<Self, SearchError> {
        let pick = root_state
            .on_the_clock(rules.schedule)
            .ok_or(SearchError::DraftComplete)?;

        let mut search = Self {
            tree: SearchTree::new(),
            root_state,
            rules,
            config,
            policy,
            pick,
            pass_throughs: 0,
        };
        let root = search.tree.root();
        if let Expansion::Expanded {
            pass_through: true, ..
        } = expand(&mut search.tree, root, root_state, &rules)
        {
            search.pass_throughs += 1;
        }
        Ok(search)
    }

    /// Iterate until the budget is spent, then commit.
    pub fn run(mut self) -> Result<SearchResult, SearchError> {
        let start = Instant::now();
        let deadline = match (self.config.time_budget, self.config.max_iterations) {
            (Some(budget), _) => Some(start + budget),
            (None, Some(_)) => None,
            (None, None) => Some(start + FALLBACK_TIME_BUDGET),
        };

        let root = self.tree.root();
        let forced = self.tree.get(root).children.len() == 1;

        let mut iterations: u64 = 0;
        while !forced {
            if self.config.max_iterations.is_some_and(|max| iterations >= max) {
                break;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }
            self.simulate()?;
            iterations += 1;
        }

        let children = self.root_children();
        let choice = commit(&children, self.config.commit_policy)
            .map(|i| children[i].choice)
            .unwrap_or(PickChoice::Pass);
        let tree_stats = self.tree.stats();
        let stats = SearchStats {
            iterations,
            elapsed: start.elapsed(),
            tree_size: tree_stats.total_nodes,
            max_depth: tree_stats.max_depth,
            pass_throughs: self.pass_throughs,
            workers: 1,
        };

        debug!(
            pick = self.pick.global_index,
            team = self.pick.team_id,
            iterations = stats.iterations,
            nodes = stats.tree_size,
            max_depth = stats.max_depth,
            forced,
            "search complete"
        );

        Ok(SearchResult {
            choice,
            pick: self.pick,
            children,
            stats,
        })
    }

    /// One iteration: select, expand, rollout, backpropagate.
    fn simulate(&mut self) -> Result<(), SearchError> {
        let target_team = self.pick.team_id;
        let mut scratch = self.root_state.clone();
        let mut accrued = 0.0;
        let mut node = self.tree.root();

        // Selection
        while self.tree.get(node).is_expanded() {
            let Some(child) = self.tree.select_child(node, self.config.exploration_constant)
            else {
                break;
            };
            accrued += self.step(&mut scratch, child, target_team)?;
            node = child;
        }

        // Expansion
        if let Expansion::Expanded { pass_through, .. } =
            expand(&mut self.tree, node, &scratch, &self.rules)
        {
            if pass_through {
                self.pass_throughs += 1;
            }
            if let Some(child) = self.tree.select_child(node, self.config.exploration_constant) {
                accrued += self.step(&mut scratch, child, target_team)?;
                node = child;
            }
        }

        // Rollout on the scratch copy
        let reward = rollout(scratch, &self.rules, target_team, accrued, &mut self.policy)?;

        self.tree.backpropagate(node, reward);

        trace!(
            leaf = node.0,
            depth = self.tree.get(node).depth,
            reward,
            "iteration complete"
        );
        Ok(())
    }

    fn step(
        &self,
        scratch: &mut DraftState,
        child: NodeId,
        target_team: usize,
    ) -> Result<f64, SearchError> {
        let choice = self
            .tree
            .get(child)
            .choice
            .unwrap_or(PickChoice::Pass);
        Ok(advance(scratch, choice, &self.rules, target_team)?)
    }

    fn root_children(&self) -> Vec<ChildStats> {
        self.tree
            .get(self.tree.root())
            .children
            .iter()
            .map(|&id| {
                let node = self.tree.get(id);
                ChildStats {
                    choice: node.choice.unwrap_or(PickChoice::Pass),
                    visits: node.visit_count,
                    value_sum: node.value_sum,
                    best: node.best_reward,
                }
            })
            .collect()
    }

    pub fn tree(&self) -> &SearchTree {
        &self.tree
    }
}

/// Index of the child to commit to. Ties go to the earliest child.
pub fn commit(children: &[ChildStats], policy: CommitPolicy) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, child) in children.iter().enumerate() {
        let better = match best {
            None => true,
            Some(b) => match policy {
                CommitPolicy::MeanValue => child.mean() > children[b].mean(),
                CommitPolicy::VisitCount => child.visits > children[b].visits,
            },
        };
        if better {
            best = Some(i);
        }
    }
    best
}

/// Run a single-tree search for the pick on the clock.
pub fn run_mcts<P: RolloutPolicy>(
    state: &DraftState,
    rules: DraftRules,
    config: &MctsConfig,
    policy: P,
) -> Result<SearchResult, SearchError> {
    MctsSearch::new(state, rules, config, policy)?.run()
}

/// Root-parallel search: `config.workers` independent trees, each with its
/// own policy from `make_policy(seed + worker)`. Root child statistics are
/// summed by choice and the commit rule is applied to the totals.
pub fn run_parallel<P, F>(
    state: &DraftState,
    rules: DraftRules,
    config: &MctsConfig,
    make_policy: F,
) -> Result<SearchResult, SearchError>
where
    P: RolloutPolicy,
    F: Fn(u64) -> P + Sync,
{
    let workers = config.workers.max(1);
    if workers == 1 {
        return run_mcts(state, rules, config, make_policy(config.seed));
    }

    let start = Instant::now();
    let results = (0..workers)
        .into_par_iter()
        .map(|w| {
            let policy = make_policy(config.seed.wrapping_add(w as u64));
            run_mcts(state, rules, config, policy)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut merged = merge_results(results, config.commit_policy)
        .ok_or(SearchError::DraftComplete)?;
    merged.stats.elapsed = start.elapsed();
    Ok(merged)
}

/// Combine per-worker results. Returns `None` for an empty input.
fn merge_results(results: Vec<SearchResult>, policy: CommitPolicy) -> Option<SearchResult> {
    let mut iter = results.into_iter();
    let mut merged = iter.next()?;

    for result in iter {
        for child in result.children {
            match merged.children.iter_mut().find(|c| c.choice == child.choice) {
                Some(existing) => {
                    existing.visits += child.visits;
                    existing.value_sum += child.value_sum;
                    existing.best = existing.best.max(child.best);
                }
                None => merged.children.push(child),
            }
        }
        let stats = &mut merged.stats;
        stats.iterations += result.stats.iterations;
        stats.tree_size += result.stats.tree_size;
        stats.max_depth = stats.max_depth.max(result.stats.max_depth);
        stats.pass_throughs += result.stats.pass_throughs;
        stats.workers += result.stats.workers;
    }

    if let Some(i) = commit(&merged.children, policy) {
        merged.choice = merged.children[i].choice;
    }
    Some(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rollout::UniformRollout;
    use std::collections::HashSet;
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
        /// Two teams, one QB and one RB each. QBs: 100/90/80, RBs: 95/85/75.
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

        /// Same rosters, but only one quarterback is worth having.
        fn scarce_qb() -> Self {
            let rows: Vec<RankedRow> = [
                ("QB A", "QB", "100"),
                ("RB A", "RB", "95"),
                ("RB B", "RB", "90"),
                ("RB C", "RB", "85"),
                ("QB B", "QB", "20"),
                ("QB C", "QB", "10"),
            ]
            .iter()
            .enumerate()
            .map(|(i, (n, p, pts))| RankedRow::new(i as u64 + 1, n, p, pts))
            .collect();
            Fixture {
                board: build_draftboard(&rows).unwrap(),
                ..Self::qb_rb()
            }
        }

        /// Two teams on the default roster (FLEX included) over ten rounds.
        /// There are enough players at every position that no team ever
        /// has to pass.
        fn full_roster() -> Self {
            let mut rows = Vec::new();
            let counts = [("QB", 3), ("RB", 6), ("WR", 6), ("TE", 4), ("K", 3), ("DST", 3)];
            for (position, count) in counts {
                for n in 1..=count {
                    rows.push((format!("{position} {n}"), position));
                }
            }
            // Interleave positions on the board by giving every row its own
            // descending point total.
            rows.sort_by_key(|(name, _)| name.chars().last());
            let rows: Vec<RankedRow> = rows
                .iter()
                .enumerate()
                .map(|(i, (name, position))| {
                    let points = format!("{}", 250 - 10 * i);
                    RankedRow::new(i as u64 + 1, name, position, &points)
                })
                .collect();
            Fixture {
                board: build_draftboard(&rows).unwrap(),
                schedule: build_pick_schedule(2, 10),
                reqs: RosterRequirements::default(),
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

    /// Panics unless no player is taken twice and no team has a slot
    /// filled beyond its requirement.
    fn assert_legal(state: &DraftState, reqs: &RosterRequirements, context: &str) {
        let mut seen = HashSet::new();
        for pick in state.picks() {
            if let Some(id) = pick.selection.player() {
                assert!(seen.insert(id), "{context}: player {id} taken twice");
            }
        }
        for (team, roster) in state.rosters().iter().enumerate() {
            for &slot in Position::ALL.iter() {
                assert!(
                    roster.filled(slot) <= reqs.required(slot),
                    "{context}: team {team} has {} {slot} for {} slots",
                    roster.filled(slot),
                    reqs.required(slot)
                );
            }
        }
    }

    fn child(choice: PickChoice, visits: u32, value_sum: f64) -> ChildStats {
        ChildStats {
            choice,
            visits,
            value_sum,
            best: value_sum,
        }
    }

    #[test]
    fn commit_mean_value_vs_visit_count() {
        let children = vec![
            child(PickChoice::Player(0), 10, 500.0), // mean 50
            child(PickChoice::Player(1), 2, 120.0),  // mean 60
        ];
        assert_eq!(commit(&children, CommitPolicy::MeanValue), Some(1));
        assert_eq!(commit(&children, CommitPolicy::VisitCount), Some(0));
    }

    #[test]
    fn commit_ties_go_first() {
        let children = vec![
            child(PickChoice::Player(4), 3, 30.0),
            child(PickChoice::Player(2), 3, 30.0),
        ];
        assert_eq!(commit(&children, CommitPolicy::MeanValue), Some(0));
        assert_eq!(commit(&children, CommitPolicy::VisitCount), Some(0));
        assert_eq!(commit(&[], CommitPolicy::MeanValue), None);
    }

    #[test]
    fn search_on_complete_draft_errors() {
        let fx = Fixture::qb_rb();
        let mut state = DraftState::new(2, fx.board.len());
        for _ in 0..4 {
            state.apply(PickChoice::Pass, &fx.rules()).unwrap();
        }
        let config = MctsConfig::for_testing();
        let err = run_mcts(&state, fx.rules(), &config, UniformRollout::new(1)).unwrap_err();
        assert!(matches!(err, SearchError::DraftComplete));
    }

    #[test]
    fn root_visits_count_every_iteration() {
        let fx = Fixture::qb_rb();
        let state = DraftState::new(2, fx.board.len());
        let config = MctsConfig::for_testing().with_iterations(200);
        let search = MctsSearch::new(&state, fx.rules(), &config, UniformRollout::new(3)).unwrap();
        let root = search.tree().root();
        assert_eq!(search.tree().get(root).children.len(), 2);

        let result = search.run().unwrap();
        assert_eq!(result.stats.iterations, 200);
        let child_visits: u32 = result.children.iter().map(|c| c.visits).sum();
        assert_eq!(child_visits, 200);
    }

    #[test]
    fn node_visits_equal_rollouts_through_node() {
        let fx = Fixture::qb_rb();
        let state = DraftState::new(2, fx.board.len());
        let config = MctsConfig::for_testing().with_iterations(150);
        let mut search =
            MctsSearch::new(&state, fx.rules(), &config, UniformRollout::new(5)).unwrap();
        for _ in 0..150 {
            search.simulate().unwrap();
        }
        let tree = search.tree();
        assert_eq!(tree.get(tree.root()).visit_count, 151);
        // Every rollout ends at a leaf, so an expanded node's visits are the
        // sum of its children's (plus the seeded visit at the root).
        for i in 0..tree.len() {
            let node = tree.get(NodeId(i as u32));
            if node.is_expanded() {
                let below: u32 = node.children.iter().map(|&c| tree.get(c).visit_count).sum();
                let seeded = u32::from(node.parent.is_none());
                assert!(
                    node.visit_count == below + seeded || node.visit_count == below + seeded + 1,
                    "node {i}: {} visits, {} below",
                    node.visit_count,
                    below
                );
            }
        }
    }

    #[test]
    fn seeded_search_is_deterministic() {
        let fx = Fixture::qb_rb();
        let state = DraftState::new(2, fx.board.len());
        let config = MctsConfig::for_testing().with_iterations(300);
        let a = run_mcts(&state, fx.rules(), &config, UniformRollout::new(11)).unwrap();
        let b = run_mcts(&state, fx.rules(), &config, UniformRollout::new(11)).unwrap();
        assert_eq!(a.choice, b.choice);
        assert_eq!(a.children, b.children);
    }

    #[test]
    fn search_takes_the_scarce_quarterback() {
        let fx = Fixture::scarce_qb();
        let state = DraftState::new(2, fx.board.len());
        let config = MctsConfig::for_testing().with_iterations(2000);
        let result = run_mcts(&state, fx.rules(), &config, UniformRollout::new(42)).unwrap();
        // QB A first ends with 100 + 90; RB A first leaves a 20-point QB.
        assert_eq!(result.choice, PickChoice::Player(0));
        let qb = &result.children[0];
        assert_eq!(qb.choice, PickChoice::Player(0));
        assert!((qb.mean() - 190.0).abs() < 1e-9);
    }

    #[test]
    fn first_pick_is_a_top_ranked_player() {
        let fx = Fixture::qb_rb();
        let state = DraftState::new(2, fx.board.len());
        let config = MctsConfig::for_testing();
        let result = run_mcts(&state, fx.rules(), &config, UniformRollout::new(42)).unwrap();
        assert!(matches!(
            result.choice,
            PickChoice::Player(0) | PickChoice::Player(1)
        ));
    }

    #[test]
    fn forced_pick_skips_iterations() {
        let fx = Fixture::qb_rb();
        let mut state = DraftState::new(2, fx.board.len());
        state.apply(PickChoice::Player(0), &fx.rules()).unwrap();
        state.apply(PickChoice::Player(2), &fx.rules()).unwrap();
        // Team 1 still needs only an RB: one candidate.
        let config = MctsConfig::for_testing();
        let result = run_mcts(&state, fx.rules(), &config, UniformRollout::new(1)).unwrap();
        assert_eq!(result.choice, PickChoice::Player(1));
        assert_eq!(result.stats.iterations, 0);
    }

    #[test]
    fn every_node_replays_to_a_legal_state() {
        let fx = Fixture::full_roster();
        let state = DraftState::new(2, fx.board.len());
        let config = MctsConfig::for_testing().with_iterations(400);
        let mut search =
            MctsSearch::new(&state, fx.rules(), &config, UniformRollout::new(21)).unwrap();
        for _ in 0..400 {
            search.simulate().unwrap();
        }

        let tree = search.tree();
        assert!(tree.stats().max_depth >= 3);
        for i in 0..tree.len() {
            let mut replay = state.clone();
            for choice in tree.path_choices(NodeId(i as u32)) {
                replay.apply(choice, &fx.rules()).unwrap();
            }
            assert_legal(&replay, &fx.reqs, &format!("node {i}"));
        }
    }

    #[test]
    fn searched_draft_fills_flex_without_passing() {
        let fx = Fixture::full_roster();
        let mut state = DraftState::new(2, fx.board.len());
        let config = MctsConfig::for_testing().with_iterations(60);
        while !state.is_complete(&fx.schedule) {
            let result = run_mcts(&state, fx.rules(), &config, UniformRollout::new(13)).unwrap();
            assert_ne!(result.choice, PickChoice::Pass, "pick {}", result.pick.global_index);
            state.apply(result.choice, &fx.rules()).unwrap();
            assert_legal(&state, &fx.reqs, &format!("pick {}", state.pick_pointer()));
        }

        assert_eq!(state.picks().len(), 20);
        for roster in state.rosters() {
            assert!(roster.is_complete(&fx.reqs));
            assert_eq!(roster.filled(Position::Flex), 2);
        }
    }

    #[test]
    fn time_budget_stops_search() {
        let fx = Fixture::qb_rb();
        let state = DraftState::new(2, fx.board.len());
        let config = MctsConfig::default().with_time_budget(Duration::from_millis(20));
        let result = run_mcts(&state, fx.rules(), &config, UniformRollout::new(1)).unwrap();
        assert!(result.stats.iterations > 0);
        assert!(result.stats.elapsed < Duration::from_secs(5));
    }

    #[test]
    fn parallel_search_merges_workers() {
        let fx = Fixture::scarce_qb();
        let state = DraftState::new(2, fx.board.len());
        let config = MctsConfig::for_testing().with_iterations(300).with_workers(4);
        let result = run_parallel(&state, fx.rules(), &config, UniformRollout::new).unwrap();
        assert_eq!(result.stats.workers, 4);
        assert_eq!(result.stats.iterations, 1200);
        let visits: u32 = result.children.iter().map(|c| c.visits).sum();
        assert_eq!(visits, 1200);
        assert_eq!(result.choice, PickChoice::Player(0));
    }

    #[test]
    fn parallel_search_is_deterministic() {
        let fx = Fixture::qb_rb();
        let state = DraftState::new(2, fx.board.len());
        let config = MctsConfig::for_testing().with_iterations(100).with_workers(3);
        let a = run_parallel(&state, fx.rules(), &config, UniformRollout::new).unwrap();
        let b = run_parallel(&state, fx.rules(), &config, UniformRollout::new).unwrap();
        assert_eq!(a.children, b.children);
    }

    #[test]
    fn merge_sums_by_choice() {
        let make = |children: Vec<ChildStats>| SearchResult {
            choice: PickChoice::Pass,
            pick: PickSlot {
                global_index: 0,
                team_id: 0,
                round: 0,
            },
            children,
            stats: SearchStats {
                iterations: 10,
                workers: 1,
                ..SearchStats::default()
            },
        };
        let a = make(vec![
            child(PickChoice::Player(0), 6, 60.0),
            child(PickChoice::Player(1), 4, 80.0),
        ]);
        let b = make(vec![
            child(PickChoice::Player(1), 1, 5.0),
            child(PickChoice::Player(0), 9, 180.0),
        ]);
        let merged = merge_results(vec![a, b], CommitPolicy::MeanValue).unwrap();
        assert_eq!(merged.children[0], ChildStats {
            choice: PickChoice::Player(0),
            visits: 15,
            value_sum: 240.0,
            best: 180.0,
        });
        assert_eq!(merged.children[1].visits, 5);
        assert_eq!(merged.stats.iterations, 20);
        assert_eq!(merged.stats.workers, 2);
        // Means: 16.0 vs 17.0.
        assert_eq!(merged.choice, PickChoice::Player(1));
    }
}
