// Draft session: the real draft as it happens, plus the engine that
// recommends each pick.
//
// A session owns the board, the (possibly traded) pick schedule and the
// real draft state. Every real pick and every pick trade is written through
// to the database when one is attached, and a session opened on an existing
// database replays the current draft back into memory.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use draftbot_core::config::Config;
use draftbot_core::db::{Database, PickKind, StoredPick};
use draftbot_core::draftboard::load_draftboard;
use draftbot_core::zscore::positional_zscores;
use draftbot_core::{
    build_pick_schedule, DraftPick, DraftRules, DraftState, Draftboard, PickChoice, PickError,
    PickSchedule, PickSlot, Player, Position, Selection,
};
use draftbot_mcts::{run_parallel, ConfiguredRollout, MctsConfig, SearchResult};

// ---------------------------------------------------------------------------
// Output records
// ---------------------------------------------------------------------------

/// One committed pick, as reported to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PickRecord {
    /// 0-based global pick index.
    pub pick_number: usize,
    /// 0-based round.
    pub round: usize,
    pub team_id: usize,
    pub kind: PickKind,
    pub player_name: Option<String>,
    pub position: Option<Position>,
}

/// One starting slot on a team, filled or not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterSlot {
    pub slot: Position,
    pub player: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamRoster {
    pub team_id: usize,
    /// Starting slots in display order.
    pub slots: Vec<RosterSlot>,
    /// Players taken with bench picks.
    pub bench: Vec<String>,
    /// Projected points of the starters.
    pub points: f64,
}

// ---------------------------------------------------------------------------
// DraftSession
// ---------------------------------------------------------------------------

pub struct DraftSession {
    config: Config,
    board: Draftboard,
    schedule: PickSchedule,
    state: DraftState,
    /// Positional z-scores by player id, for the z-score rollout.
    zscores: Arc<[f64]>,
    mcts: MctsConfig,
    db: Option<Database>,
    draft_id: String,
    /// Picks of the current draft the database failed to record.
    unsaved: usize,
}

impl DraftSession {
    /// An in-memory session with nothing persisted.
    pub fn new(config: Config, board: Draftboard) -> Self {
        let draft = &config.draft;
        let schedule = build_pick_schedule(draft.num_teams, draft.rounds);
        let state = DraftState::new(draft.num_teams, board.len());
        let zscores: Arc<[f64]> =
            positional_zscores(&board, &draft.requirements, draft.num_teams).into();
        let mcts = MctsConfig::from_search_config(&config.search);

        DraftSession {
            config,
            board,
            schedule,
            state,
            zscores,
            mcts,
            db: None,
            draft_id: Database::generate_draft_id(),
            unsaved: 0,
        }
    }

    /// Load the board named by `config` and open its database, restoring the
    /// draft in progress if there is one.
    pub fn open(config: Config) -> Result<Self> {
        let board = load_draftboard(
            std::path::Path::new(&config.data_paths.draftboard),
            config.data_paths.has_headers,
        )
        .context("failed to load draftboard")?;
        let db = Database::open(&config.db_path).context("failed to open database")?;
        info!("Database opened at {}", config.db_path);
        Self::new(config, board).with_database(db)
    }

    /// Attach `db`, adopting its current draft id and replaying that
    /// draft's trades and picks.
    pub fn with_database(mut self, db: Database) -> Result<Self> {
        self.draft_id = match db.current_draft()? {
            Some(id) => id,
            None => {
                let id = db.new_draft()?;
                info!("Starting new draft {}", id);
                id
            }
        };
        self.db = Some(db);
        self.restore()?;
        Ok(self)
    }

    /// Replay the current draft from the database. Returns whether any
    /// picks were restored.
    fn restore(&mut self) -> Result<bool> {
        let Some(db) = &self.db else {
            return Ok(false);
        };

        for (index, team) in db.trades(&self.draft_id)? {
            if self.schedule.reassign(index, team).is_none() {
                warn!("Ignoring stored trade of pick {} to team {}", index, team);
            }
        }

        let stored = db.picks(&self.draft_id)?;
        if stored.is_empty() {
            info!("No picks recorded for draft_id={}, starting fresh", self.draft_id);
            return Ok(false);
        }

        let mut picks = Vec::with_capacity(stored.len());
        for sp in &stored {
            picks.push(self.pick_from_stored(sp)?);
        }
        let draft_id = self.draft_id.clone();
        let (state, rules) = self.state_and_rules();
        state
            .restore_from_picks(&picks, &rules)
            .with_context(|| format!("failed to replay draft {draft_id}"))?;

        info!(
            "Restored {} picks for draft_id={}",
            picks.len(),
            self.draft_id
        );
        Ok(true)
    }

    fn pick_from_stored(&self, sp: &StoredPick) -> Result<DraftPick> {
        let player = |name: &Option<String>| -> Result<usize> {
            let name = name.as_deref().unwrap_or_default();
            self.board
                .find_by_name(name)
                .ok_or_else(|| PickError::UnknownPlayer(name.to_string()))
                .with_context(|| format!("stored pick {} is not on the board", sp.pick_number))
        };
        let selection = match sp.kind {
            PickKind::Drafted => Selection::Drafted(player(&sp.player_name)?),
            PickKind::Benched => Selection::Benched(player(&sp.player_name)?),
            PickKind::Passed => Selection::Passed,
        };
        Ok(DraftPick {
            pick: PickSlot {
                global_index: sp.pick_number,
                team_id: sp.team_id,
                round: sp.round,
            },
            selection,
            slot: None,
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn rules(&self) -> DraftRules<'_> {
        DraftRules {
            board: &self.board,
            schedule: &self.schedule,
            requirements: &self.config.draft.requirements,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn board(&self) -> &Draftboard {
        &self.board
    }

    pub fn schedule(&self) -> &PickSchedule {
        &self.schedule
    }

    pub fn state(&self) -> &DraftState {
        &self.state
    }

    pub fn draft_id(&self) -> &str {
        &self.draft_id
    }

    pub fn mcts_config(&self) -> &MctsConfig {
        &self.mcts
    }

    /// Replace the search settings, e.g. to apply a command-line override.
    pub fn set_mcts_config(&mut self, mcts: MctsConfig) {
        self.mcts = mcts;
    }

    pub fn on_the_clock(&self) -> Option<PickSlot> {
        self.state.on_the_clock(&self.schedule)
    }

    /// Number of picks made in this process that the database did not
    /// record. A restored draft will be missing them.
    pub fn unsaved_picks(&self) -> usize {
        self.unsaved
    }

    pub fn is_complete(&self) -> bool {
        self.state.is_complete(&self.schedule)
    }

    // -----------------------------------------------------------------------
    // Engine
    // -----------------------------------------------------------------------

    /// Search for the best choice for the team on the clock without making
    /// it.
    pub fn think(&self) -> Result<SearchResult> {
        let kind = self.config.search.rollout;
        let zscores = &self.zscores;
        let result = run_parallel(&self.state, self.rules(), &self.mcts, |seed| {
            ConfiguredRollout::from_kind(kind, seed, zscores)
        })?;
        info!(
            "Pick {} (team {}): recommending {} after {} iterations in {:.2?}",
            result.pick.global_index,
            result.pick.team_id,
            self.describe(result.choice),
            result.stats.iterations,
            result.stats.elapsed
        );
        Ok(result)
    }

    /// Let the engine make the pick on the clock.
    pub fn auto_pick(&mut self) -> Result<PickRecord> {
        let result = self.think()?;
        if result.choice == PickChoice::Pass {
            warn!(
                "Team {} has no eligible player at pick {}, passing",
                result.pick.team_id, result.pick.global_index
            );
        }
        let (state, rules) = self.state_and_rules();
        let pick = state.apply(result.choice, &rules)?;
        self.persist(&pick);
        Ok(self.record(&pick))
    }

    /// Let the engine make every remaining pick.
    pub fn simulate_draft(&mut self) -> Result<Vec<PickRecord>> {
        let mut records = Vec::new();
        while !self.is_complete() {
            records.push(self.auto_pick()?);
        }
        info!("Simulated {} picks", records.len());
        Ok(records)
    }

    // -----------------------------------------------------------------------
    // Real picks
    // -----------------------------------------------------------------------

    /// Draft `name` for the team on the clock.
    pub fn make_pick(&mut self, name: &str) -> Result<PickRecord> {
        let id = self.lookup(name)?;
        let (state, rules) = self.state_and_rules();
        let pick = state.apply(PickChoice::Player(id), &rules)?;
        self.persist(&pick);
        Ok(self.record(&pick))
    }

    /// Take `name` off the board for the team on the clock without filling
    /// a starting slot.
    pub fn bench(&mut self, name: &str) -> Result<PickRecord> {
        let id = self.lookup(name)?;
        let (state, rules) = self.state_and_rules();
        let pick = state.bench(id, &rules)?;
        self.persist(&pick);
        Ok(self.record(&pick))
    }

    /// Remove the most recent pick. Returns `None` when nothing was picked.
    pub fn undo(&mut self) -> Result<Option<PickRecord>> {
        let (state, rules) = self.state_and_rules();
        let Some(pick) = state.undo_last(&rules) else {
            return Ok(None);
        };
        if let Some(db) = &self.db {
            db.remove_pick(&self.draft_id, pick.pick.global_index)?;
        }
        info!("Undid pick {}", pick.pick.global_index);
        Ok(Some(self.record(&pick)))
    }

    /// Give the pick at `global_index` to `team_id`. Only picks not yet made
    /// can change hands.
    pub fn give_pick(&mut self, global_index: usize, team_id: usize) -> Result<()> {
        let pointer = self.state.pick_pointer();
        if global_index < pointer || global_index >= self.schedule.len() {
            return Err(PickError::PickNotTradable {
                global_index,
                pick_pointer: pointer,
                len: self.schedule.len(),
            }
            .into());
        }
        let num_teams = self.schedule.num_teams();
        if team_id >= num_teams {
            return Err(PickError::UnknownTeam { team_id, num_teams }.into());
        }

        let previous = self.schedule.reassign(global_index, team_id);
        info!(
            "Pick {} moved from team {:?} to team {}",
            global_index, previous, team_id
        );

        if let Some(db) = &self.db {
            db.save_trade(&self.draft_id, global_index, team_id)?;
        }
        Ok(())
    }

    /// Start a new draft under a fresh draft id. Earlier drafts stay in the
    /// database.
    pub fn reset(&mut self) -> Result<()> {
        let draft = &self.config.draft;
        self.schedule = build_pick_schedule(draft.num_teams, draft.rounds);
        self.state = DraftState::new(draft.num_teams, self.board.len());
        self.draft_id = match &self.db {
            Some(db) => db.new_draft()?,
            None => Database::generate_draft_id(),
        };
        self.unsaved = 0;
        info!("Reset to new draft {}", self.draft_id);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reporting
    // -----------------------------------------------------------------------

    pub fn history(&self) -> Vec<PickRecord> {
        self.state.picks().iter().map(|p| self.record(p)).collect()
    }

    /// Every team's starters by slot, bench, and projected points.
    pub fn rosters(&self) -> Vec<TeamRoster> {
        (0..self.schedule.num_teams())
            .map(|team| self.roster(team))
            .collect()
    }

    pub fn roster(&self, team_id: usize) -> TeamRoster {
        let reqs = &self.config.draft.requirements;
        let team_picks: Vec<&DraftPick> = self
            .state
            .picks()
            .iter()
            .filter(|p| p.pick.team_id == team_id)
            .collect();

        let mut slots = Vec::with_capacity(reqs.slots_per_team());
        for &slot in Position::ALL.iter() {
            let mut filled = team_picks
                .iter()
                .filter(|p| p.slot == Some(slot))
                .filter_map(|p| p.selection.player())
                .filter_map(|id| self.board.get(id));
            for _ in 0..reqs.required(slot) {
                slots.push(RosterSlot {
                    slot,
                    player: filled.next().map(|p| p.name.clone()),
                });
            }
        }

        let bench = team_picks
            .iter()
            .filter_map(|p| match p.selection {
                Selection::Benched(id) => self.board.get(id).map(|pl| pl.name.clone()),
                _ => None,
            })
            .collect();

        TeamRoster {
            team_id,
            slots,
            bench,
            points: self.state.team_points(team_id, &self.board),
        }
    }

    /// The best `limit` untaken players eligible for `slot`.
    pub fn available(&self, slot: Position, limit: usize) -> Vec<&Player> {
        self.board
            .available(slot, self.state.taken(), limit)
            .into_iter()
            .filter_map(|id| self.board.get(id))
            .collect()
    }

    /// Human-readable name for a search choice.
    pub fn describe(&self, choice: PickChoice) -> String {
        match choice {
            PickChoice::Player(id) => match self.board.get(id) {
                Some(p) => format!("{} ({})", p.name, p.position),
                None => format!("player #{id}"),
            },
            PickChoice::Pass => "pass".to_string(),
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// The mutable state alongside the rules it is checked against.
    fn state_and_rules(&mut self) -> (&mut DraftState, DraftRules<'_>) {
        let rules = DraftRules {
            board: &self.board,
            schedule: &self.schedule,
            requirements: &self.config.draft.requirements,
        };
        (&mut self.state, rules)
    }

    fn lookup(&self, name: &str) -> Result<usize> {
        self.board
            .find_by_name(name)
            .ok_or_else(|| PickError::UnknownPlayer(name.to_string()).into())
    }

    fn record(&self, pick: &DraftPick) -> PickRecord {
        let player = pick.selection.player().and_then(|id| self.board.get(id));
        let kind = match pick.selection {
            Selection::Drafted(_) => PickKind::Drafted,
            Selection::Benched(_) => PickKind::Benched,
            Selection::Passed => PickKind::Passed,
        };
        PickRecord {
            pick_number: pick.pick.global_index,
            round: pick.pick.round,
            team_id: pick.pick.team_id,
            kind,
            player_name: player.map(|p| p.name.clone()),
            position: player.map(|p| p.position),
        }
    }

    /// Write a committed pick through to the database. A failed write is
    /// logged and counted, and the in-memory draft carries on.
    fn persist(&mut self, pick: &DraftPick) {
        let record = self.record(pick);
        info!(
            "Pick {} (round {}, team {}): {}",
            record.pick_number,
            record.round + 1,
            record.team_id,
            record.player_name.as_deref().unwrap_or("pass")
        );

        let Some(db) = &self.db else {
            return;
        };
        let stored = StoredPick {
            pick_number: record.pick_number,
            round: record.round,
            team_id: record.team_id,
            kind: record.kind,
            player_name: record.player_name,
            position: record.position.map(|p| p.display_str().to_string()),
        };
        if let Err(e) = db.save_pick(&self.draft_id, &stored) {
            self.unsaved += 1;
            warn!(
                "Pick {} not saved to draft {}, a restore will not include it ({} unsaved): {:#}",
                stored.pick_number, self.draft_id, self.unsaved, e
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use draftbot_core::config::{DataPaths, DraftConfig, SearchConfig};
    use draftbot_core::{build_draftboard, RankedRow, RosterRequirements};

    fn board() -> Draftboard {
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
        build_draftboard(&rows).unwrap()
    }

    fn config() -> Config {
        let mut requirements = RosterRequirements::none();
        requirements.set(Position::Quarterback, 1);
        requirements.set(Position::RunningBack, 1);
        Config {
            draft: DraftConfig {
                num_teams: 2,
                rounds: 2,
                my_team: Some(0),
                requirements,
            },
            search: SearchConfig {
                max_iterations: Some(200),
                seed: Some(5),
                ..SearchConfig::default()
            },
            data_paths: DataPaths {
                draftboard: "unused.csv".into(),
                has_headers: false,
            },
            db_path: ":memory:".into(),
        }
    }

    fn session() -> DraftSession {
        DraftSession::new(config(), board())
    }

    #[test]
    fn make_pick_records_team_on_the_clock() {
        let mut s = session();
        let rec = s.make_pick("qb a").unwrap();
        assert_eq!(rec.team_id, 0);
        assert_eq!(rec.player_name.as_deref(), Some("QB A"));
        assert_eq!(rec.position, Some(Position::Quarterback));
        assert_eq!(s.on_the_clock().unwrap().team_id, 1);
    }

    #[test]
    fn make_pick_rejects_unknown_and_taken_players() {
        let mut s = session();
        let err = s.make_pick("Nobody").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PickError>(),
            Some(PickError::UnknownPlayer(_))
        ));

        s.make_pick("QB A").unwrap();
        let err = s.make_pick("QB A").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PickError>(),
            Some(PickError::AlreadyTaken { .. })
        ));
        assert_eq!(s.state().pick_pointer(), 1);
    }

    #[test]
    fn bench_takes_player_without_points() {
        let mut s = session();
        let rec = s.bench("RB A").unwrap();
        assert_eq!(rec.kind, PickKind::Benched);
        let roster = s.roster(0);
        assert_eq!(roster.bench, vec!["RB A".to_string()]);
        assert_eq!(roster.points, 0.0);
        assert!(roster.slots.iter().all(|slot| slot.player.is_none()));
    }

    #[test]
    fn undo_restores_previous_state() {
        let mut s = session();
        assert!(s.undo().unwrap().is_none());
        s.make_pick("QB A").unwrap();
        s.make_pick("RB A").unwrap();
        let undone = s.undo().unwrap().unwrap();
        assert_eq!(undone.player_name.as_deref(), Some("RB A"));
        assert_eq!(s.state().pick_pointer(), 1);
        assert!(!s.state().is_taken(1));
        assert_eq!(s.roster(1).points, 0.0);
    }

    #[test]
    fn give_pick_validates_index_and_team() {
        let mut s = session();
        s.make_pick("QB A").unwrap();

        let err = s.give_pick(0, 1).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PickError>(),
            Some(PickError::PickNotTradable { .. })
        ));
        let err = s.give_pick(4, 1).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PickError>(),
            Some(PickError::PickNotTradable { .. })
        ));
        let err = s.give_pick(3, 2).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PickError>(),
            Some(PickError::UnknownTeam { .. })
        ));

        s.give_pick(3, 1).unwrap();
        let slot = s.schedule().get(3).unwrap();
        assert_eq!(slot.team_id, 1);
        assert_eq!(slot.round, 1);
    }

    #[test]
    fn roster_lists_slots_in_display_order() {
        let mut s = session();
        s.make_pick("RB A").unwrap();
        let roster = s.roster(0);
        assert_eq!(
            roster.slots,
            vec![
                RosterSlot {
                    slot: Position::Quarterback,
                    player: None
                },
                RosterSlot {
                    slot: Position::RunningBack,
                    player: Some("RB A".into())
                },
            ]
        );
        assert_eq!(roster.points, 95.0);
        assert_eq!(s.rosters().len(), 2);
    }

    #[test]
    fn available_skips_taken_players() {
        let mut s = session();
        s.make_pick("QB A").unwrap();
        let names: Vec<&str> = s
            .available(Position::Quarterback, 5)
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["QB B", "QB C"]);
    }

    #[test]
    fn simulate_draft_fills_every_slot() {
        let mut s = session();
        let records = s.simulate_draft().unwrap();
        assert_eq!(records.len(), 4);
        assert!(s.is_complete());
        for team in 0..2 {
            let roster = s.roster(team);
            assert!(roster.slots.iter().all(|slot| slot.player.is_some()));
        }
        assert!(s.think().is_err());
    }

    #[test]
    fn picks_survive_reopening_the_database() {
        let dir = std::env::temp_dir().join(format!("draftbot_session_test_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("draft.db").display().to_string();

        {
            let db = Database::open(&path).unwrap();
            let mut s = session().with_database(db).unwrap();
            s.make_pick("QB A").unwrap();
            s.bench("RB C").unwrap();
            s.give_pick(3, 1).unwrap();
        }

        let db = Database::open(&path).unwrap();
        let s = session().with_database(db).unwrap();
        assert_eq!(s.state().pick_pointer(), 2);
        assert_eq!(s.history()[1].kind, PickKind::Benched);
        assert_eq!(s.schedule().get(3).unwrap().team_id, 1);
        assert_eq!(s.roster(0).points, 100.0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn failed_pick_write_is_counted_and_draft_continues() {
        let dir = std::env::temp_dir().join(format!("draftbot_unsaved_test_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("draft.db").display().to_string();

        let db = Database::open(&path).unwrap();
        let mut s = session().with_database(db).unwrap();
        s.make_pick("QB A").unwrap();
        assert_eq!(s.unsaved_picks(), 0);

        rusqlite::Connection::open(&path)
            .unwrap()
            .execute_batch("DROP TABLE picks")
            .unwrap();

        let rec = s.make_pick("RB A").unwrap();
        assert_eq!(rec.player_name.as_deref(), Some("RB A"));
        assert_eq!(s.history().len(), 2);
        assert_eq!(s.unsaved_picks(), 1);

        s.reset().unwrap();
        assert_eq!(s.unsaved_picks(), 0);

        drop(s);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn reset_starts_a_new_draft() {
        let db = Database::open(":memory:").unwrap();
        let mut s = session().with_database(db).unwrap();
        let first_id = s.draft_id().to_string();
        s.make_pick("QB A").unwrap();
        s.give_pick(2, 0).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));

        s.reset().unwrap();
        assert_ne!(s.draft_id(), first_id);
        assert_eq!(s.state().pick_pointer(), 0);
        assert_eq!(s.schedule().get(2).unwrap().team_id, 1);
        assert!(s.history().is_empty());
    }
}
