//! Search tree with arena allocation.
//!
//! Nodes live in a contiguous Vec and refer to each other by `NodeId`.
//! Children point back to their parent by index only, so the tree is
//! dropped as a single allocation once a pick is committed.

use draftbot_core::PickChoice;

use crate::node::{NodeId, SearchNode};

/// Search tree with arena-based node storage.
#[derive(Debug)]
pub struct SearchTree {
    nodes: Vec<SearchNode>,
    root: NodeId,
}

/// Summary statistics about a tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeStats {
    pub total_nodes: usize,
    pub root_visits: u32,
    pub root_value: f64,
    pub max_depth: u32,
}

impl Default for SearchTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchTree {
    /// Create a tree holding only a root node.
    ///
    /// The root starts with one visit so `ln(N_parent)` is defined for its
    /// first children.
    pub fn new() -> Self {
        let mut root = SearchNode::new_root();
        root.visit_count = 1;
        Self {
            nodes: vec![root],
            root: NodeId(0),
        }
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> &SearchNode {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> &mut SearchNode {
        &mut self.nodes[id.index()]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Append a child for `choice` under `parent_id`.
    pub fn add_child(&mut self, parent_id: NodeId, choice: PickChoice) -> NodeId {
        let depth = self.get(parent_id).depth + 1;
        let child_id = NodeId(self.nodes.len() as u32);
        self.nodes.push(SearchNode::new_child(parent_id, choice, depth));
        self.get_mut(parent_id).children.push(child_id);
        child_id
    }

    /// Choose the child to descend into with UCB1.
    ///
    /// The first unvisited child in expansion order wins outright. Otherwise
    /// the highest `mean + c * sqrt(ln(N_parent) / n)` wins, ties going to
    /// the earliest child. Returns `None` for a node with no children.
    pub fn select_child(&self, node_id: NodeId, exploration: f64) -> Option<NodeId> {
        let node = self.get(node_id);
        if let Some(&unvisited) = node
            .children
            .iter()
            .find(|&&id| self.get(id).visit_count == 0)
        {
            return Some(unvisited);
        }

        debug_assert!(
            node.visit_count >= 1,
            "selecting below a node with no visits"
        );
        let ln_parent = (node.visit_count as f64).ln();

        let mut best: Option<(NodeId, f64)> = None;
        for &id in &node.children {
            let score = self.get(id).ucb1(ln_parent, exploration);
            // Strict comparison keeps the first of equal scores.
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((id, score));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Add `reward` to every node from `leaf_id` up to the root.
    pub fn backpropagate(&mut self, leaf_id: NodeId, reward: f64) {
        let mut current_id = leaf_id;
        while current_id.is_some() {
            let node = self.get_mut(current_id);
            node.record(reward);
            current_id = node.parent;
        }
    }

    /// Choices on the path from the root to `node_id`, root side first.
    pub fn path_choices(&self, node_id: NodeId) -> Vec<PickChoice> {
        let mut path = Vec::new();
        let mut current = node_id;
        while current.is_some() {
            let node = self.get(current);
            if let Some(choice) = node.choice {
                path.push(choice);
            }
            current = node.parent;
        }
        path.reverse();
        path
    }

    pub fn stats(&self) -> TreeStats {
        let root = self.get(self.root);
        TreeStats {
            total_nodes: self.nodes.len(),
            root_visits: root.visit_count,
            root_value: root.mean_value(),
            max_depth: self.nodes.iter().map(|n| n.depth).max().unwrap_or(0),
        }
    }
}
