// Positional z-scores over the startable player pool.

use crate::draftboard::Draftboard;
use crate::position::Position;
use crate::roster::RosterRequirements;

// ---------------------------------------------------------------------------
// Pool statistics
// ---------------------------------------------------------------------------

/// Mean and population standard deviation of projected points across a
/// player pool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolStats {
    pub mean: f64,
    pub stdev: f64,
}

impl PoolStats {
    /// Stats of `points`. An empty pool has mean and stdev 0.
    pub fn of(points: &[f64]) -> PoolStats {
        if points.is_empty() {
            return PoolStats { mean: 0.0, stdev: 0.0 };
        }
        let count = points.len() as f64;
        let mean = points.iter().copied().sum::<f64>() / count;
        let sum_sq: f64 = points.iter().map(|&p| (p - mean) * (p - mean)).sum();
        PoolStats {
            mean,
            stdev: (sum_sq / count).sqrt(),
        }
    }

    /// Standard deviations above the pool mean; 0 for a flat pool.
    pub fn zscore(&self, points: f64) -> f64 {
        if self.stdev <= 1e-9 {
            0.0
        } else {
            (points - self.mean) / self.stdev
        }
    }
}

// ---------------------------------------------------------------------------
// Positional pools
// ---------------------------------------------------------------------------

/// Number of players at `position` the league would start:
/// `(required + flex share) * num_teams`.
///
/// Every FLEX-eligible position gets the full FLEX count as its share, since
/// any of them may end up filling it.
pub fn pool_size(position: Position, reqs: &RosterRequirements, num_teams: usize) -> usize {
    let flex = if position.is_flex_eligible() {
        reqs.required(Position::Flex)
    } else {
        0
    };
    (reqs.required(position) + flex) * num_teams
}

/// Z-score of every player on the board, indexed by player id, measured
/// against the top of that player's positional pool.
pub fn positional_zscores(
    board: &Draftboard,
    reqs: &RosterRequirements,
    num_teams: usize,
) -> Vec<f64> {
    let mut scores = vec![0.0; board.len()];
    for position in Position::ALL.iter().filter(|p| !p.is_meta_slot()) {
        let ids = board.eligible(*position);
        let size = pool_size(*position, reqs, num_teams).min(ids.len());
        if size == 0 {
            continue;
        }
        let pool: Vec<f64> = ids[..size]
            .iter()
            .filter_map(|&id| board.get(id).map(|p| p.projected_points))
            .collect();
        let stats = PoolStats::of(&pool);
        for &id in &ids {
            if let Some(player) = board.get(id) {
                scores[id] = stats.zscore(player.projected_points);
            }
        }
    }
    scores
}
