//! portage: which dev servers are listening, and which workspace owns them.
//!
//! Flags select a view; without one, the listening user ports are shown.
//!
//! ## Views
//!
//! - default: listening ports (`--sort`, `--all`, `--json`)
//! - `--unified`: ports grouped under Cursor workspaces and Claude sessions (JSON)
//! - `--cursor`: open Cursor workspaces
//! - `--cursor-history`: recently closed Cursor workspaces (JSON)
//! - `--claude`: running Claude Code sessions
//! - `--claude-history`: Claude Code sessions from prompt history
//! - `--history`: Claude sessions and closed workspaces combined
//! - `--discovered`: the discovery ledger
//!
//! `--log-close PATH` and `--log-open PATH` record workspace events for the
//! editor extension and exit.

mod logging;
mod render;

use std::io::{self, Write};

use chrono::Utc;
use clap::Parser;
use portage_core::projection::{
    ports_json, unified_json, ClosedWorkspaceJson, EditorWorkspaceJson,
};
use portage_core::{PortageEngine, PortageError, ScanOptions, SortKey};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "portage")]
#[command(about = "Show listening dev servers and the workspaces they belong to")]
#[command(version)]
struct Cli {
    /// Sort by: 'port' (ascending) or 'uptime' (longest first)
    #[arg(long, default_value = "uptime", value_name = "ORDER")]
    sort: SortKey,

    /// Output in JSON format
    #[arg(long)]
    json: bool,

    /// Show all ports, including system services
    #[arg(long)]
    all: bool,

    /// Log timing information to stderr
    #[arg(long)]
    debug: bool,

    /// Show combined workspace history from Claude and Cursor
    #[arg(long)]
    history: bool,

    /// Limit number of entries (with --history, --cursor-history, --discovered)
    #[arg(long, default_value_t = 10, value_name = "N")]
    limit: usize,

    /// Show active Cursor windows
    #[arg(long)]
    cursor: bool,

    /// Show active Claude Code sessions
    #[arg(long)]
    claude: bool,

    /// Show Claude session history from ~/.claude/history.jsonl
    #[arg(long = "claude-history")]
    claude_history: bool,

    /// Show recently closed Cursor workspaces
    #[arg(long = "cursor-history")]
    cursor_history: bool,

    /// Show ports grouped under the workspaces they run in
    #[arg(long)]
    unified: bool,

    /// Show the log of first-seen ports
    #[arg(long)]
    discovered: bool,

    /// Log workspace closure (full path)
    #[arg(long = "log-close", value_name = "PATH")]
    log_close: Option<String>,

    /// Log workspace reopening (full path)
    #[arg(long = "log-open", value_name = "PATH")]
    log_open: Option<String>,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Core(#[from] PortageError),

    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

fn main() {
    let cli = Cli::parse();
    let _logging_guard = logging::init(cli.debug);

    let engine = match PortageEngine::new() {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!(error = %e, "portage failed to start");
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(path) = &cli.log_close {
        if let Err(e) = engine.log_close(path) {
            tracing::error!(error = %e, path = %path, "failed to log workspace close");
            eprintln!("Error logging workspace closure: {}", e);
            std::process::exit(1);
        }
        return;
    }

    if let Some(path) = &cli.log_open {
        if let Err(e) = engine.log_open(path) {
            tracing::error!(error = %e, path = %path, "failed to log workspace open");
            eprintln!("Error logging workspace open: {}", e);
            std::process::exit(1);
        }
        return;
    }

    if let Err(e) = run(&cli, &engine) {
        tracing::error!(error = %e, "portage failed");
        eprintln!("Error: {}", e);
        if matches!(e, CliError::Core(PortageError::ListingUnavailable { .. })) {
            eprintln!("Try running with sudo if you need to see all processes");
        }
        std::process::exit(1);
    }
}

fn run(cli: &Cli, engine: &PortageEngine) -> Result<(), CliError> {
    let options = ScanOptions {
        sort: cli.sort,
        include_all: cli.all,
        ..ScanOptions::default()
    };
    let storage = engine.storage();

    if cli.unified {
        return print_json(&unified_json(&engine.unified(&options)?));
    }

    if cli.cursor {
        let now = Utc::now();
        let open = engine.open_windows();
        let filtered = open.as_ref().is_some_and(|set| !set.is_empty());
        let workspaces = engine.active_editor_workspaces(open.as_ref());
        if cli.json {
            let rows: Vec<EditorWorkspaceJson> = workspaces
                .iter()
                .map(|ws| EditorWorkspaceJson::new(ws, now))
                .collect();
            return print_json(&rows);
        }
        return print_text(&render::editor_view(&workspaces, filtered, now, storage));
    }

    if cli.claude {
        let sessions = engine.live_sessions();
        if cli.json {
            return print_json(&sessions);
        }
        return print_text(&render::live_sessions_view(&sessions, storage));
    }

    if cli.claude_history {
        let entries = engine.assistant_entries()?;
        if entries.is_empty() {
            return print_text("No Claude history found\n");
        }
        let sessions = portage_core::assistant::group_sessions(&entries);
        if cli.json {
            return print_json(&sessions);
        }
        return print_text(&render::assistant_history_view(&sessions, Utc::now()));
    }

    if cli.cursor_history {
        let rows: Vec<ClosedWorkspaceJson> = engine
            .recently_closed(cli.limit)?
            .into_iter()
            .map(|path| ClosedWorkspaceJson { path })
            .collect();
        return print_json(&rows);
    }

    if cli.history {
        let history = engine.workspace_history(cli.limit)?;
        if cli.json {
            return print_json(&history);
        }
        return print_text(&render::workspace_history_view(&history, Utc::now()));
    }

    if cli.discovered {
        let entries = engine.discovery_history(Some(cli.limit))?;
        return print_text(&render::discovery_view(&entries, storage));
    }

    let outcome = engine.scan(&options)?;
    if cli.json {
        return print_json(&ports_json(&outcome.records));
    }
    print_text(&render::ports_view(&outcome.records, storage))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

fn print_text(text: &str) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    Ok(())
}
