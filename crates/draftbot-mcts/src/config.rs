//! Search configuration parameters.

use std::time::Duration;

use draftbot_core::config::{CommitPolicy, SearchConfig};

/// Configuration for one pick's search.
#[derive(Debug, Clone)]
pub struct MctsConfig {
    /// UCB1 exploration constant `C`.
    pub exploration_constant: f64,

    /// Wall-clock budget. The deadline is checked between iterations.
    pub time_budget: Option<Duration>,

    /// Iteration budget. When both budgets are set, whichever runs out
    /// first ends the search.
    pub max_iterations: Option<u64>,

    pub commit_policy: CommitPolicy,

    /// Independent trees searched in parallel.
    pub workers: usize,

    /// Base RNG seed; worker `i` uses `seed + i`.
    pub seed: u64,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            exploration_constant: std::f64::consts::SQRT_2,
            time_budget: Some(Duration::from_secs(30)),
            max_iterations: None,
            commit_policy: CommitPolicy::MeanValue,
            workers: 1,
            seed: 0,
        }
    }
}

impl MctsConfig {
    /// Build from the `[search]` section. Unseeded configs draw a seed.
    pub fn from_search_config(search: &SearchConfig) -> Self {
        Self {
            exploration_constant: search.exploration_constant,
            time_budget: Some(Duration::from_secs_f64(search.seconds_per_pick)),
            max_iterations: search.max_iterations,
            commit_policy: search.commit_policy,
            workers: search.workers.max(1),
            seed: search.seed.unwrap_or_else(rand::random),
        }
    }

    /// A small, deterministic, iteration-bounded config for tests.
    pub fn for_testing() -> Self {
        Self {
            time_budget: None,
            max_iterations: Some(500),
            seed: 7,
            ..Self::default()
        }
    }

    pub fn with_iterations(mut self, n: u64) -> Self {
        self.max_iterations = Some(n);
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    pub fn with_exploration(mut self, c: f64) -> Self {
        self.exploration_constant = c;
        self
    }

    pub fn with_commit_policy(mut self, policy: CommitPolicy) -> Self {
        self.commit_policy = policy;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MctsConfig::default();
        assert_eq!(config.time_budget, Some(Duration::from_secs(30)));
        assert!((config.exploration_constant - 2f64.sqrt()).abs() < 1e-12);
        assert_eq!(config.commit_policy, CommitPolicy::MeanValue);
    }

    #[test]
    fn test_builder_pattern() {
        let config = MctsConfig::for_testing()
            .with_iterations(100)
            .with_workers(0)
            .with_seed(9);
        assert_eq!(config.max_iterations, Some(100));
        assert_eq!(config.workers, 1);
        assert_eq!(config.seed, 9);
        assert_eq!(config.time_budget, None);
    }

    #[test]
    fn from_search_config_copies_fields() {
        let search = SearchConfig {
            seconds_per_pick: 2.5,
            max_iterations: Some(10),
            exploration_constant: 0.5,
            commit_policy: CommitPolicy::VisitCount,
            seed: Some(3),
            workers: 2,
            ..SearchConfig::default()
        };
        let config = MctsConfig::from_search_config(&search);
        assert_eq!(config.time_budget, Some(Duration::from_millis(2500)));
        assert_eq!(config.max_iterations, Some(10));
        assert_eq!(config.exploration_constant, 0.5);
        assert_eq!(config.commit_policy, CommitPolicy::VisitCount);
        assert_eq!(config.seed, 3);
        assert_eq!(config.workers, 2);
    }
}
