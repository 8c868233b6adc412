// Ranked player pool and ranked-points CSV loading.
//
// Input rows are `name,position,points` (or `rank,name,position,points`),
// already sorted best-first. Board order is input order; a row whose points
// exceed the previous row's is rejected rather than silently re-sorted.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::position::{Position, SLOT_COUNT};

/// Index of a player on the board. Lower ids are ranked higher.
pub type PlayerId = usize;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DraftboardError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse CSV {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("malformed row {line}: {reason}")]
    MalformedRow { line: u64, reason: String },

    #[error(
        "row {line} ('{name}') projects {points} points, more than the {previous} above it"
    )]
    InputOrderingViolation {
        line: u64,
        name: String,
        points: f64,
        previous: f64,
    },
}

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A draftable player. Never mutated after the board is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub position: Position,
    pub projected_points: f64,
    /// 1-based board rank.
    pub rank: usize,
}

/// One unparsed input row, as read from the ranked-points source.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedRow {
    /// Source line, reported in errors.
    pub line: u64,
    pub name: String,
    pub position: String,
    pub points: String,
}

impl RankedRow {
    pub fn new(line: u64, name: &str, position: &str, points: &str) -> Self {
        RankedRow {
            line,
            name: name.to_string(),
            position: position.to_string(),
            points: points.to_string(),
        }
    }
}

/// The ordered universe of draftable players.
#[derive(Debug, Clone, Default)]
pub struct Draftboard {
    players: Vec<Player>,
    /// Player ids per position, best first. The FLEX entry stays empty.
    by_position: [Vec<PlayerId>; SLOT_COUNT],
}

/// Set of players already taken, sized to a board.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TakenSet {
    words: Vec<u64>,
    count: usize,
}

impl TakenSet {
    pub fn with_capacity(players: usize) -> Self {
        TakenSet {
            words: vec![0; players.div_ceil(64)],
            count: 0,
        }
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.words
            .get(id / 64)
            .is_some_and(|w| w & (1u64 << (id % 64)) != 0)
    }

    /// Mark `id` as taken. Returns `false` if it was already taken.
    pub fn insert(&mut self, id: PlayerId) -> bool {
        let word = id / 64;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        let bit = 1u64 << (id % 64);
        if self.words[word] & bit != 0 {
            return false;
        }
        self.words[word] |= bit;
        self.count += 1;
        true
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

// ---------------------------------------------------------------------------
// Board construction
// ---------------------------------------------------------------------------

/// Build a board from ranked rows, preserving their order.
///
/// Fails on the first unparseable row; the board is never partial.
pub fn build_draftboard(rows: &[RankedRow]) -> Result<Draftboard, DraftboardError> {
    let mut players: Vec<Player> = Vec::with_capacity(rows.len());
    // Picks are stored and restored by name, so names must be unique.
    let mut names = HashSet::with_capacity(rows.len());

    for row in rows {
        let name = row.name.trim();
        if name.is_empty() {
            return Err(DraftboardError::MalformedRow {
                line: row.line,
                reason: "empty player name".into(),
            });
        }
        if !names.insert(name.to_ascii_lowercase()) {
            return Err(DraftboardError::MalformedRow {
                line: row.line,
                reason: format!("duplicate player name '{name}'"),
            });
        }

        let position = Position::from_player_str(&row.position).ok_or_else(|| {
            DraftboardError::MalformedRow {
                line: row.line,
                reason: format!("unknown position '{}' for {}", row.position.trim(), name),
            }
        })?;

        let points: f64 = row.points.trim().parse().map_err(|_| DraftboardError::MalformedRow {
            line: row.line,
            reason: format!("unparseable points '{}' for {}", row.points.trim(), name),
        })?;
        if !points.is_finite() || points < 0.0 {
            return Err(DraftboardError::MalformedRow {
                line: row.line,
                reason: format!("points must be finite and non-negative, got {points} for {name}"),
            });
        }

        if let Some(prev) = players.last() {
            if points > prev.projected_points {
                return Err(DraftboardError::InputOrderingViolation {
                    line: row.line,
                    name: name.to_string(),
                    points,
                    previous: prev.projected_points,
                });
            }
        }

        players.push(Player {
            name: name.to_string(),
            position,
            projected_points: points,
            rank: players.len() + 1,
        });
    }

    Ok(Draftboard::from_players(players))
}

impl Draftboard {
    fn from_players(players: Vec<Player>) -> Self {
        let mut by_position: [Vec<PlayerId>; SLOT_COUNT] = Default::default();
        for (id, player) in players.iter().enumerate() {
            by_position[player.position.index()].push(id);
        }
        Draftboard {
            players,
            by_position,
        }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Case-insensitive exact name lookup. Names are unique on a built board.
    pub fn find_by_name(&self, name: &str) -> Option<PlayerId> {
        let wanted = name.trim();
        self.players
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(wanted))
    }

    /// Player ids eligible for `slot`, best first. FLEX merges RB/WR/TE.
    pub fn eligible(&self, slot: Position) -> Vec<PlayerId> {
        if slot.is_meta_slot() {
            let mut ids: Vec<PlayerId> = Position::ALL
                .iter()
                .filter(|p| p.is_flex_eligible())
                .flat_map(|p| self.by_position[p.index()].iter().copied())
                .collect();
            ids.sort_unstable();
            ids
        } else {
            self.by_position[slot.index()].clone()
        }
    }

    /// The best untaken player eligible for `slot`.
    pub fn best_available(&self, slot: Position, taken: &TakenSet) -> Option<PlayerId> {
        if slot.is_meta_slot() {
            return Position::ALL
                .iter()
                .filter(|p| p.is_flex_eligible())
                .filter_map(|&p| self.best_available(p, taken))
                .min();
        }
        self.by_position[slot.index()]
            .iter()
            .copied()
            .find(|&id| !taken.contains(id))
    }

    /// Up to `limit` untaken players eligible for `slot`, best first.
    pub fn available(&self, slot: Position, taken: &TakenSet, limit: usize) -> Vec<PlayerId> {
        self.eligible(slot)
            .into_iter()
            .filter(|&id| !taken.contains(id))
            .take(limit)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// CSV loading
// ---------------------------------------------------------------------------

fn rows_from_reader<R: Read>(rdr: R, has_headers: bool) -> Result<Vec<RankedRow>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(has_headers)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(rdr);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(LoadError::Csv)?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let row = match record.len() {
            3 => RankedRow::new(line, &record[0], &record[1], &record[2]),
            // Leading rank column; board order already encodes rank.
            4 => RankedRow::new(line, &record[1], &record[2], &record[3]),
            n => {
                return Err(LoadError::Board(DraftboardError::MalformedRow {
                    line,
                    reason: format!("expected 3 or 4 fields, found {n}"),
                }))
            }
        };
        rows.push(row);
    }
    Ok(rows)
}

enum LoadError {
    Csv(csv::Error),
    Board(DraftboardError),
}

/// Load a board from any reader of ranked-points CSV.
pub fn load_draftboard_from_reader<R: Read>(
    rdr: R,
    has_headers: bool,
    source_name: &str,
) -> Result<Draftboard, DraftboardError> {
    let rows = rows_from_reader(rdr, has_headers).map_err(|e| match e {
        LoadError::Csv(source) => DraftboardError::Csv {
            path: source_name.to_string(),
            source,
        },
        LoadError::Board(err) => err,
    })?;
    build_draftboard(&rows)
}

/// Load a board from a ranked-points CSV file.
pub fn load_draftboard(path: &Path, has_headers: bool) -> Result<Draftboard, DraftboardError> {
    let file = std::fs::File::open(path).map_err(|e| DraftboardError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let board = load_draftboard_from_reader(file, has_headers, &path.display().to_string())?;
    tracing::info!("loaded {} players from {}", board.len(), path.display());
    Ok(board)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
