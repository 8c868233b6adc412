//! Monte Carlo Tree Search over snake-draft states.
//!
//! Given the real draft state and the team on the clock, the search estimates
//! which available player maximizes that team's final projected points. Each
//! iteration has four phases:
//!
//! 1. **Selection**: descend from the root with UCB1 while nodes are expanded
//! 2. **Expansion**: give the leaf one child per candidate player (the best
//!    available at each position the team still needs)
//! 3. **Rollout**: play the rest of the draft out with a [`RolloutPolicy`],
//!    summing the points the target team collects
//! 4. **Backpropagation**: add the reward to every node back to the root
//!
//! Nodes store only the choice on their incoming edge. The draft state at a
//! node is rebuilt by replaying choices from the root onto a scratch copy, so
//! the tree itself stays small.
//!
//! # Usage
//!
//! ```rust,ignore
//! use draftbot_mcts::{run_mcts, MctsConfig, UniformRollout};
//!
//! let config = MctsConfig::for_testing();
//! let result = run_mcts(&state, rules, &config, UniformRollout::new(config.seed))?;
//! println!("take {:?} ({} iterations)", result.choice, result.stats.iterations);
//! ```
//!
//! # Configuration
//!
//! [`MctsConfig`] holds the exploration constant, the time and iteration
//! budgets, the commit policy and the number of root-parallel workers.

pub mod config;
pub mod expansion;
pub mod node;
pub mod rollout;
pub mod search;
pub mod tree;

pub use config::MctsConfig;
pub use expansion::{candidate_choices, expand, Expansion};
pub use node::{NodeId, SearchNode};
pub use rollout::{rollout, ConfiguredRollout, RolloutPolicy, UniformRollout, ZScoreRollout};
pub use search::{
    commit, run_mcts, run_parallel, ChildStats, MctsSearch, SearchError, SearchResult,
    SearchStats,
};
pub use tree::{SearchTree, TreeStats};
