// SQLite store for drafts, their picks, and pick trades.
//
// Each draft gets its own id; one of them is marked current in the `meta`
// table. Picks and trades are keyed by (draft_id, pick_number), so earlier
// drafts stay on disk untouched when a new one starts.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

/// How a stored pick was used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickKind {
    Drafted,
    Benched,
    Passed,
}

impl PickKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PickKind::Drafted => "drafted",
            PickKind::Benched => "benched",
            PickKind::Passed => "passed",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "drafted" => Some(PickKind::Drafted),
            "benched" => Some(PickKind::Benched),
            "passed" => Some(PickKind::Passed),
            _ => None,
        }
    }
}

/// A pick as persisted. Players are stored by name so a restored draft
/// survives a re-ranked board.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPick {
    pub pick_number: usize,
    pub round: usize,
    pub team_id: usize,
    pub kind: PickKind,
    pub player_name: Option<String>,
    pub position: Option<String>,
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS drafts (
        draft_id   TEXT PRIMARY KEY,
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );

    CREATE TABLE IF NOT EXISTS picks (
        draft_id    TEXT NOT NULL,
        pick_number INTEGER NOT NULL,
        round       INTEGER NOT NULL,
        team_id     INTEGER NOT NULL,
        kind        TEXT NOT NULL,
        player_name TEXT,
        position    TEXT,
        made_at     TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        PRIMARY KEY (draft_id, pick_number)
    );

    CREATE TABLE IF NOT EXISTS pick_trades (
        draft_id    TEXT NOT NULL,
        pick_number INTEGER NOT NULL,
        team_id     INTEGER NOT NULL,
        PRIMARY KEY (draft_id, pick_number)
    );

    CREATE TABLE IF NOT EXISTS meta (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
";

const CURRENT_DRAFT_KEY: &str = "current_draft";

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `path`, creating it and its parent directory if
    /// needed. `":memory:"` gives a throwaway database.
    pub fn open(path: &str) -> Result<Self> {
        if path != ":memory:" {
            let parent = std::path::Path::new(path).parent();
            if let Some(dir) = parent.filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("cannot create {}", dir.display()))?;
            }
        }

        let conn =
            Connection::open(path).with_context(|| format!("cannot open database {path}"))?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;")
            .context("cannot configure database")?;
        conn.execute_batch(SCHEMA)
            .context("cannot create database tables")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Panics if the mutex is poisoned.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Drafts
    // ------------------------------------------------------------------

    /// Register a new draft and make it current. Returns its id.
    pub fn new_draft(&self) -> Result<String> {
        let draft_id = Self::generate_draft_id();
        let mut conn = self.lock();
        let tx = conn.transaction().context("cannot start transaction")?;
        tx.execute(
            "INSERT INTO drafts (draft_id) VALUES (?1)",
            params![draft_id],
        )
        .with_context(|| format!("cannot register draft {draft_id}"))?;
        tx.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
            params![CURRENT_DRAFT_KEY, serde_json::to_string(&draft_id)?],
        )
        .context("cannot mark draft current")?;
        tx.commit().context("cannot commit new draft")?;
        Ok(draft_id)
    }

    /// The id of the current draft, if one was ever started.
    pub fn current_draft(&self) -> Result<Option<String>> {
        let conn = self.lock();
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![CURRENT_DRAFT_KEY],
                |row| row.get(0),
            )
            .optional()
            .context("cannot read current draft")?;
        raw.map(|json| serde_json::from_str(&json).context("corrupt current draft id"))
            .transpose()
    }

    /// Format: `draft_YYYYMMDD_HHMMSS_ffffff`.
    pub fn generate_draft_id() -> String {
        chrono::Utc::now()
            .format("draft_%Y%m%d_%H%M%S_%6f")
            .to_string()
    }

    // ------------------------------------------------------------------
    // Picks
    // ------------------------------------------------------------------

    /// Store a pick. Storing the same pick number twice keeps the first.
    pub fn save_pick(&self, draft_id: &str, pick: &StoredPick) -> Result<()> {
        self.lock()
            .execute(
                "INSERT OR IGNORE INTO picks
                    (draft_id, pick_number, round, team_id, kind, player_name, position)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    draft_id,
                    pick.pick_number as i64,
                    pick.round as i64,
                    pick.team_id as i64,
                    pick.kind.as_str(),
                    pick.player_name,
                    pick.position,
                ],
            )
            .with_context(|| format!("cannot save pick {}", pick.pick_number))?;
        Ok(())
    }

    /// Returns whether the pick existed.
    pub fn remove_pick(&self, draft_id: &str, pick_number: usize) -> Result<bool> {
        let removed = self
            .lock()
            .execute(
                "DELETE FROM picks WHERE draft_id = ?1 AND pick_number = ?2",
                params![draft_id, pick_number as i64],
            )
            .with_context(|| format!("cannot remove pick {pick_number}"))?;
        Ok(removed > 0)
    }

    /// Every pick of `draft_id`, in pick order.
    pub fn picks(&self, draft_id: &str) -> Result<Vec<StoredPick>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT pick_number, round, team_id, kind, player_name, position
             FROM picks WHERE draft_id = ?1 ORDER BY pick_number",
        )?;
        let mut rows = stmt.query(params![draft_id])?;

        let mut picks = Vec::new();
        while let Some(row) = rows.next()? {
            let pick_number: i64 = row.get(0)?;
            let kind: String = row.get(3)?;
            let kind = PickKind::parse(&kind)
                .with_context(|| format!("pick {pick_number} has unknown kind '{kind}'"))?;
            picks.push(StoredPick {
                pick_number: pick_number as usize,
                round: row.get::<_, i64>(1)? as usize,
                team_id: row.get::<_, i64>(2)? as usize,
                kind,
                player_name: row.get(4)?,
                position: row.get(5)?,
            });
        }
        Ok(picks)
    }

    // ------------------------------------------------------------------
    // Pick trades
    // ------------------------------------------------------------------

    /// Record that `pick_number` now belongs to `team_id`, replacing any
    /// earlier trade of the same pick.
    pub fn save_trade(&self, draft_id: &str, pick_number: usize, team_id: usize) -> Result<()> {
        self.lock()
            .execute(
                "INSERT OR REPLACE INTO pick_trades (draft_id, pick_number, team_id)
                 VALUES (?1, ?2, ?3)",
                params![draft_id, pick_number as i64, team_id as i64],
            )
            .with_context(|| format!("cannot save trade of pick {pick_number}"))?;
        Ok(())
    }

    /// `(pick_number, team_id)` for every traded pick of `draft_id`.
    pub fn trades(&self, draft_id: &str) -> Result<Vec<(usize, usize)>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT pick_number, team_id FROM pick_trades
             WHERE draft_id = ?1 ORDER BY pick_number",
        )?;
        let trades = stmt
            .query_map(params![draft_id], |row| {
                Ok((row.get::<_, i64>(0)? as usize, row.get::<_, i64>(1)? as usize))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("cannot read pick trades")?;
        Ok(trades)
    }
}
