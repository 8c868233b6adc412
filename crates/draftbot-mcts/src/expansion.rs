//! Candidate generation and node expansion.

use draftbot_core::{DraftRules, DraftState, PickChoice};
use tracing::trace;

use crate::node::NodeId;
use crate::tree::SearchTree;

/// Legal choices for the team on the clock.
///
/// One candidate per position the team still needs, each the best player
/// available there, with duplicates removed (a RB can be both the best RB
/// and the best FLEX). A team with nothing left to take gets a single
/// `Pass`. A finished draft has no choices at all.
pub fn candidate_choices(state: &DraftState, rules: &DraftRules) -> Vec<PickChoice> {
    let Some(pick) = state.on_the_clock(rules.schedule) else {
        return Vec::new();
    };
    let Some(roster) = state.roster(pick.team_id) else {
        return vec![PickChoice::Pass];
    };

    let mut choices: Vec<PickChoice> = Vec::new();
    for slot in roster.needed_positions(rules.requirements) {
        if let Some(id) = rules.board.best_available(slot, state.taken()) {
            let choice = PickChoice::Player(id);
            if !choices.contains(&choice) {
                choices.push(choice);
            }
        }
    }

    if choices.is_empty() {
        trace!(
            "pick {} (team {}) has no candidates, passing",
            pick.global_index,
            pick.team_id
        );
        choices.push(PickChoice::Pass);
    }
    choices
}

/// What an expansion did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expansion {
    /// The node already had children.
    AlreadyExpanded,
    /// The draft is over at this node.
    Terminal,
    /// Children were added; `pass_through` is set when the only child is a
    /// pass.
    Expanded { children: usize, pass_through: bool },
}

/// Give `node_id` one child per candidate at `state`, the node's draft
/// state. Expanding a node twice is a no-op.
pub fn expand(
    tree: &mut SearchTree,
    node_id: NodeId,
    state: &DraftState,
    rules: &DraftRules,
) -> Expansion {
    if tree.get(node_id).is_expanded() {
        return Expansion::AlreadyExpanded;
    }
    let choices = candidate_choices(state, rules);
    if choices.is_empty() {
        return Expansion::Terminal;
    }
    let pass_through = choices == [PickChoice::Pass];
    for &choice in &choices {
        tree.add_child(node_id, choice);
    }
    Expansion::Expanded {
        children: choices.len(),
        pass_through,
    }
}
