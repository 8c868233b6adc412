//! Search tree node.

use draftbot_core::PickChoice;

/// Index of a node in the tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Sentinel for "no node" (the root's parent).
    pub const NONE: NodeId = NodeId(u32::MAX);

    #[inline]
    pub fn is_none(&self) -> bool {
        self.0 == u32::MAX
    }

    #[inline]
    pub fn is_some(&self) -> bool {
        !self.is_none()
    }

    #[inline]
    pub(crate) fn index(&self) -> usize {
        self.0 as usize
    }
}

/// A node in the search tree.
///
/// Nodes hold only the edge that led to them and their statistics; the
/// draft state at a node is rebuilt by replaying edges from the root.
#[derive(Debug, Clone)]
pub struct SearchNode {
    pub parent: NodeId,
    /// The choice that produced this node. `None` only at the root.
    pub choice: Option<PickChoice>,
    /// Distance from the root.
    pub depth: u32,
    pub visit_count: u32,
    /// Sum of rollout rewards through this node.
    pub value_sum: f64,
    /// Highest single rollout reward seen. Diagnostic only; selection and
    /// commit use the mean.
    pub best_reward: f64,
    /// Children in expansion order.
    pub children: Vec<NodeId>,
}

impl SearchNode {
    pub fn new_root() -> Self {
        SearchNode {
            parent: NodeId::NONE,
            choice: None,
            depth: 0,
            visit_count: 0,
            value_sum: 0.0,
            best_reward: f64::NEG_INFINITY,
            children: Vec::new(),
        }
    }

    pub fn new_child(parent: NodeId, choice: PickChoice, depth: u32) -> Self {
        SearchNode {
            parent,
            choice: Some(choice),
            depth,
            ..Self::new_root()
        }
    }

    /// Mean reward, or 0.0 if unvisited.
    #[inline]
    pub fn mean_value(&self) -> f64 {
        if self.visit_count == 0 {
            0.0
        } else {
            self.value_sum / self.visit_count as f64
        }
    }

    #[inline]
    pub fn is_expanded(&self) -> bool {
        !self.children.is_empty()
    }

    /// UCB1 score: `mean + c * sqrt(ln(N_parent) / n)`.
    ///
    /// Takes the precomputed `ln(N_parent)`. Unvisited nodes score infinity.
    #[inline]
    pub fn ucb1(&self, ln_parent_visits: f64, exploration: f64) -> f64 {
        if self.visit_count == 0 {
            return f64::INFINITY;
        }
        self.mean_value() + exploration * (ln_parent_visits / self.visit_count as f64).sqrt()
    }

    /// Record one rollout through this node.
    #[inline]
    pub fn record(&mut self, reward: f64) {
        self.visit_count += 1;
        self.value_sum += reward;
        if reward > self.best_reward {
            self.best_reward = reward;
        }
    }
}
