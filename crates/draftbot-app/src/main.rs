// draftbot entry point.
//
// Every invocation:
// 1. Initialize tracing (log to file, stdout carries command output)
// 2. Load config, copying defaults on first run
// 3. Load the draftboard and open the database, restoring the draft in
//    progress
// 4. Run one command and print its result

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;

use draftbot_app::{DraftSession, PickRecord, TeamRoster};
use draftbot_core::config::{self, Config};
use draftbot_core::Position;
use draftbot_mcts::SearchResult;

#[derive(Parser, Debug)]
#[command(name = "draftbot", version, about = "Snake-draft pick recommendations by tree search")]
struct Cli {
    /// Directory holding config/ (and defaults/ for first-run setup).
    #[arg(long, default_value = ".")]
    base_dir: PathBuf,

    /// Override the configured seconds of search per pick.
    #[arg(short = 't', long)]
    seconds: Option<f64>,

    /// Print results as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Let the engine make every remaining pick.
    Sim,
    /// Recommend a pick for the team on the clock.
    Think,
    /// Draft a player for the team on the clock.
    Pick { name: Vec<String> },
    /// Take a player for the team on the clock without filling a slot.
    Bench { name: Vec<String> },
    /// Remove the last pick.
    Undo,
    /// Give a future pick (0-based index) to another team.
    Trade { pick: usize, team: usize },
    /// Show the pick on the clock.
    State,
    /// List every pick so far.
    History,
    /// Show one team's roster, or every team's.
    Roster { team: Option<usize> },
    /// List the best untaken players at a position (FLEX allowed).
    Available {
        position: String,
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
    },
    /// Start a new draft.
    Reset,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.base_dir)?;
    info!("draftbot starting: {:?}", cli.command);

    let config = load_config(&cli.base_dir)?;
    info!(
        "Config loaded: {} teams, {} rounds, {:.1}s per pick",
        config.draft.num_teams, config.draft.rounds, config.search.seconds_per_pick
    );

    let mut session = DraftSession::open(config).context("failed to open draft session")?;
    if let Some(seconds) = cli.seconds {
        if !seconds.is_finite() || seconds <= 0.0 {
            bail!("--seconds must be a positive number");
        }
        let mcts = session
            .mcts_config()
            .clone()
            .with_time_budget(std::time::Duration::from_secs_f64(seconds));
        session.set_mcts_config(mcts);
    }

    let out = Output { json: cli.json };
    match cli.command {
        Command::Sim => {
            let records = session.simulate_draft()?;
            out.picks(&records)?;
            out.rosters(&session, &session.rosters())?;
        }
        Command::Think => {
            let result = session.think()?;
            out.recommendation(&session, &result)?;
        }
        Command::Pick { name } => {
            let record = session.make_pick(&name.join(" "))?;
            out.picks(std::slice::from_ref(&record))?;
        }
        Command::Bench { name } => {
            let record = session.bench(&name.join(" "))?;
            out.picks(std::slice::from_ref(&record))?;
        }
        Command::Undo => match session.undo()? {
            Some(record) => out.picks(std::slice::from_ref(&record))?,
            None => println!("Nothing to undo."),
        },
        Command::Trade { pick, team } => {
            session.give_pick(pick, team)?;
            println!("Pick {pick} now belongs to team {team}.");
        }
        Command::State => print_state(&session),
        Command::History => out.picks(&session.history())?,
        Command::Roster { team } => {
            let rosters = match team {
                Some(t) if t >= session.schedule().num_teams() => {
                    bail!("team {t} does not exist ({} teams)", session.schedule().num_teams())
                }
                Some(t) => vec![session.roster(t)],
                None => session.rosters(),
            };
            out.rosters(&session, &rosters)?;
        }
        Command::Available { position, limit } => {
            let Some(slot) = Position::from_str_pos(&position) else {
                bail!("unknown position '{position}'");
            };
            for player in session.available(slot, limit) {
                println!(
                    "{:>4}. {:<28} {:<4} {:>7.1}",
                    player.rank, player.name, player.position, player.projected_points
                );
            }
        }
        Command::Reset => {
            session.reset()?;
            println!("Started draft {}.", session.draft_id());
        }
    }

    if session.unsaved_picks() > 0 {
        eprintln!(
            "warning: {} pick(s) could not be saved; see logs/draftbot.log",
            session.unsaved_picks()
        );
    }

    Ok(())
}

/// Load `config/draft.toml` under `base_dir`, resolving a relative
/// draftboard path against `base_dir`.
fn load_config(base_dir: &Path) -> anyhow::Result<Config> {
    let copied = config::ensure_config_files(base_dir)?;
    for path in &copied {
        info!("Created {} from defaults", path.display());
    }
    let mut config = config::load_config_from(base_dir).context("failed to load configuration")?;
    let board_path = Path::new(&config.data_paths.draftboard);
    if board_path.is_relative() {
        config.data_paths.draftboard = base_dir.join(board_path).display().to_string();
    }
    Ok(config)
}

fn print_state(session: &DraftSession) {
    let state = session.state();
    match session.on_the_clock() {
        Some(slot) => println!(
            "Draft {} | Pick {} of {} | Round {} | Drafting: team {}{}",
            session.draft_id(),
            state.pick_pointer(),
            session.schedule().len(),
            slot.round + 1,
            slot.team_id,
            mine(session, slot.team_id)
        ),
        None => println!(
            "Draft {} | complete after {} picks",
            session.draft_id(),
            state.pick_pointer()
        ),
    }
    let budget = session
        .mcts_config()
        .time_budget
        .map(|d| format!("{:.1}s", d.as_secs_f64()))
        .unwrap_or_else(|| "none".into());
    println!(
        "Search: {} budget | {} iterations max | C = {:.3} | {} worker(s)",
        budget,
        session
            .mcts_config()
            .max_iterations
            .map_or_else(|| "no".to_string(), |n| n.to_string()),
        session.mcts_config().exploration_constant,
        session.mcts_config().workers
    );
}

fn mine(session: &DraftSession, team_id: usize) -> &'static str {
    if session.config().draft.my_team == Some(team_id) {
        " (you)"
    } else {
        ""
    }
}

struct Output {
    json: bool,
}

impl Output {
    fn picks(&self, records: &[PickRecord]) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(records)?);
            return Ok(());
        }
        for r in records {
            let player = match (&r.player_name, r.position) {
                (Some(name), Some(pos)) => format!("{name} ({pos})"),
                _ => "(pass)".to_string(),
            };
            println!(
                "{:>3}. round {:>2}, team {:>2}: {} [{}]",
                r.pick_number,
                r.round + 1,
                r.team_id,
                player,
                r.kind.as_str()
            );
        }
        Ok(())
    }

    fn rosters(&self, session: &DraftSession, rosters: &[TeamRoster]) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(rosters)?);
            return Ok(());
        }
        for roster in rosters {
            println!("Team {}{}", roster.team_id, mine(session, roster.team_id));
            println!("============");
            for slot in &roster.slots {
                println!("{}: {}", slot.slot, slot.player.as_deref().unwrap_or(""));
            }
            for name in &roster.bench {
                println!("BE: {name}");
            }
            println!("Projected points: {:.1}", roster.points);
            println!();
        }
        Ok(())
    }

    fn recommendation(&self, session: &DraftSession, result: &SearchResult) -> anyhow::Result<()> {
        if self.json {
            let children: Vec<serde_json::Value> = result
                .children
                .iter()
                .map(|c| {
                    serde_json::json!({
                        "choice": session.describe(c.choice),
                        "visits": c.visits,
                        "mean": c.mean(),
                        "best": c.best,
                    })
                })
                .collect();
            let value = serde_json::json!({
                "pick": result.pick.global_index,
                "team_id": result.pick.team_id,
                "recommendation": session.describe(result.choice),
                "iterations": result.stats.iterations,
                "elapsed_ms": result.stats.elapsed.as_millis() as u64,
                "tree_size": result.stats.tree_size,
                "max_depth": result.stats.max_depth,
                "candidates": children,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
            return Ok(());
        }

        println!("{}", session.describe(result.choice));
        println!(
            "pick {} (team {}), {} iterations in {:.2?} across {} worker(s), {} nodes, depth {}",
            result.pick.global_index,
            result.pick.team_id,
            result.stats.iterations,
            result.stats.elapsed,
            result.stats.workers,
            result.stats.tree_size,
            result.stats.max_depth
        );
        for child in &result.children {
            println!(
                "  {:<34} visits {:>8}  mean {:>8.1}  best {:>8.1}",
                session.describe(child.choice),
                child.visits,
                child.mean(),
                child.best
            );
        }
        Ok(())
    }
}

/// Initialize tracing to log to a file so stdout carries only command
/// output.
fn init_tracing(base_dir: &Path) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = base_dir.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("draftbot.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("draftbot_app=info,draftbot_core=info,draftbot_mcts=info,warn")
        }))
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
