// Configuration loading and parsing (config/draft.toml).

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::position::Position;
use crate::roster::RosterRequirements;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config file at {path}")]
    FileNotFound { path: PathBuf },

    #[error("{path} is not a valid draft config: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("cannot set up config/ from defaults/: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub draft: DraftConfig,
    pub search: SearchConfig,
    pub data_paths: DataPaths,
    pub db_path: String,
}

#[derive(Debug, Clone)]
pub struct DraftConfig {
    pub num_teams: usize,
    pub rounds: usize,
    /// The team the user drafts for, if any. Purely informational for the
    /// engine, which always searches for the team on the clock.
    pub my_team: Option<usize>,
    pub requirements: RosterRequirements,
}

/// How the search commits to a root child once the budget is spent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitPolicy {
    /// Highest mean reward.
    #[default]
    MeanValue,
    /// Most visits.
    VisitCount,
}

/// Which playout strategy rollouts use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum RolloutKind {
    #[default]
    #[serde(rename = "uniform")]
    Uniform,
    #[serde(rename = "zscore")]
    ZScore,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub seconds_per_pick: f64,
    /// Stop after this many iterations even if time remains.
    pub max_iterations: Option<u64>,
    pub exploration_constant: f64,
    pub commit_policy: CommitPolicy,
    pub rollout: RolloutKind,
    /// Fixed RNG seed. Unseeded searches draw one from the OS.
    pub seed: Option<u64>,
    pub workers: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            seconds_per_pick: 30.0,
            max_iterations: None,
            exploration_constant: std::f64::consts::SQRT_2,
            commit_policy: CommitPolicy::MeanValue,
            rollout: RolloutKind::Uniform,
            seed: None,
            workers: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    /// Ranked-points CSV.
    pub draftboard: String,
    #[serde(default)]
    pub has_headers: bool,
}

// ---------------------------------------------------------------------------
// draft.toml file layout
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct DraftFile {
    draft: DraftSection,
    #[serde(default)]
    search: SearchConfig,
    data: DataPaths,
    #[serde(default)]
    database: DatabaseSection,
}

#[derive(Debug, Deserialize)]
struct DraftSection {
    num_teams: usize,
    /// Defaults to one round per starting slot.
    rounds: Option<usize>,
    my_team: Option<usize>,
    /// Replaces the default requirements wholesale when present.
    roster: Option<HashMap<String, usize>>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabaseSection {
    path: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/draft.toml` under `base_dir`. Run
/// `ensure_config_files` first to seed it from `defaults/`.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join("draft.toml");
    let text = read_file(&path)?;
    parse_config(&text, &path)
}

/// Parse and validate the contents of a draft.toml.
pub fn parse_config(text: &str, path: &Path) -> Result<Config, ConfigError> {
    let file: DraftFile = toml::from_str(text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let requirements = match &file.draft.roster {
        Some(map) => parse_roster(map)?,
        None => RosterRequirements::default(),
    };
    let rounds = file
        .draft
        .rounds
        .unwrap_or_else(|| requirements.slots_per_team());

    let config = Config {
        draft: DraftConfig {
            num_teams: file.draft.num_teams,
            rounds,
            my_team: file.draft.my_team,
            requirements,
        },
        search: file.search,
        data_paths: file.data,
        db_path: file.database.path.unwrap_or_else(default_db_path),
    };

    validate(&config)?;

    Ok(config)
}

/// Copy each file in `defaults/` that has no counterpart in `config/` and
/// return the paths written. `*.example` templates are left alone.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults = base_dir.join("defaults");
    let target_dir = base_dir.join("config");
    let copy_err = |message: String| ConfigError::DefaultsCopyError { message };

    if !defaults.is_dir() {
        return if target_dir.is_dir() {
            Ok(Vec::new())
        } else {
            Err(copy_err(format!(
                "{} has no defaults/ or config/ directory",
                base_dir.display()
            )))
        };
    }

    std::fs::create_dir_all(&target_dir)
        .map_err(|e| copy_err(format!("cannot create {}: {e}", target_dir.display())))?;

    let list_err = |e: std::io::Error| copy_err(format!("cannot list {}: {e}", defaults.display()));
    let mut sources = Vec::new();
    for entry in std::fs::read_dir(&defaults).map_err(list_err)? {
        let path = entry.map_err(list_err)?.path();
        let is_template = path.extension().is_some_and(|ext| ext == "example");
        if path.is_file() && !is_template {
            sources.push(path);
        }
    }
    sources.sort();

    let mut written = Vec::new();
    for source in sources {
        let Some(name) = source.file_name() else {
            continue;
        };
        let dest = target_dir.join(name);
        // Never overwrite a file the user already has.
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&dest) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(copy_err(format!("cannot create {}: {e}", dest.display()))),
        };
        let bytes = std::fs::read(&source)
            .map_err(|e| copy_err(format!("cannot read {}: {e}", source.display())))?;
        file.write_all(&bytes)
            .map_err(|e| copy_err(format!("cannot write {}: {e}", dest.display())))?;
        written.push(dest);
    }

    Ok(written)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.into(),
    })
}

/// Per-user data directory, falling back to the working directory.
fn default_db_path() -> String {
    directories::ProjectDirs::from("", "", "draftbot")
        .map(|dirs| dirs.data_dir().join("draftbot.db"))
        .unwrap_or_else(|| PathBuf::from("draftbot.db"))
        .display()
        .to_string()
}

fn parse_roster(map: &HashMap<String, usize>) -> Result<RosterRequirements, ConfigError> {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();

    let mut counts = HashMap::new();
    for key in keys {
        let count = map[key];
        let field = format!("draft.roster.{key}");
        let position = Position::from_str_pos(key).ok_or_else(|| ConfigError::ValidationError {
            field: field.clone(),
            message: format!("unknown position '{key}'"),
        })?;
        let count = u8::try_from(count).map_err(|_| ConfigError::ValidationError {
            field: field.clone(),
            message: format!("at most {} slots per position", u8::MAX),
        })?;
        if counts.insert(position, count).is_some() {
            return Err(ConfigError::ValidationError {
                field,
                message: format!("{position} is listed more than once"),
            });
        }
    }
    Ok(RosterRequirements::from_counts(&counts))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_string(),
        message: message.into(),
    }
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    let draft = &config.draft;
    if draft.num_teams == 0 {
        return Err(invalid("draft.num_teams", "must be at least 1"));
    }
    if draft.rounds == 0 {
        return Err(invalid("draft.rounds", "must be at least 1"));
    }
    if let Some(team) = draft.my_team {
        if team >= draft.num_teams {
            return Err(invalid(
                "draft.my_team",
                format!("must be below num_teams ({})", draft.num_teams),
            ));
        }
    }
    if draft.requirements.slots_per_team() == 0 {
        return Err(invalid("draft.roster", "at least one slot is required"));
    }

    let search = &config.search;
    if !search.seconds_per_pick.is_finite() || search.seconds_per_pick <= 0.0 {
        return Err(invalid("search.seconds_per_pick", "must be a positive number"));
    }
    if search.max_iterations == Some(0) {
        return Err(invalid("search.max_iterations", "must be at least 1"));
    }
    if !search.exploration_constant.is_finite() || search.exploration_constant <= 0.0 {
        return Err(invalid(
            "search.exploration_constant",
            "must be a positive number",
        ));
    }
    if search.workers == 0 {
        return Err(invalid("search.workers", "must be at least 1"));
    }

    if config.data_paths.draftboard.trim().is_empty() {
        return Err(invalid("data.draftboard", "must not be empty"));
    }
    if config.db_path.trim().is_empty() {
        return Err(invalid("database.path", "must not be empty"));
    }

    Ok(())
}
