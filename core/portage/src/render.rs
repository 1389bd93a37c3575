//! Table rendering for the human-readable views.
//!
//! Every view renders to a `String`; `main` decides where it goes.

use chrono::{DateTime, Utc};
use portage_core::{
    AssistantSession, DiscoveryEntry, EditorWorkspace, LiveAssistantSession, PortRecord,
    StorageConfig, WorkspaceHistoryEntry, NOT_AVAILABLE,
};

const SESSION_ID_WIDTH: usize = 12;

// ─────────────────────────────────────────────────────────────────────────────
// Table
// ─────────────────────────────────────────────────────────────────────────────

/// Minimal rounded-border table.
#[derive(Debug, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn render(&self) -> String {
        let widths: Vec<usize> = (0..self.headers.len())
            .map(|col| {
                self.rows
                    .iter()
                    .filter_map(|row| row.get(col))
                    .chain(std::iter::once(&self.headers[col]))
                    .map(|cell| cell.chars().count())
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut out = String::new();
        out.push_str(&border(&widths, '╭', '┬', '╮'));
        out.push_str(&line(&self.headers, &widths));
        out.push_str(&border(&widths, '├', '┼', '┤'));
        for row in &self.rows {
            out.push_str(&line(row, &widths));
        }
        out.push_str(&border(&widths, '╰', '┴', '╯'));
        out
    }
}

fn border(widths: &[usize], left: char, mid: char, right: char) -> String {
    let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
    format!("{}{}{}\n", left, segments.join(&mid.to_string()), right)
}

fn line(cells: &[String], widths: &[usize]) -> String {
    let padded: Vec<String> = widths
        .iter()
        .enumerate()
        .map(|(i, width)| {
            let cell = cells.get(i).map(String::as_str).unwrap_or("");
            let pad = width - cell.chars().count();
            format!(" {}{} ", cell, " ".repeat(pad))
        })
        .collect();
    format!("│{}│\n", padded.join("│"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Formatting helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Relative time for an idle duration in seconds.
pub fn time_ago(seconds: i64) -> String {
    match seconds.max(0) {
        s if s < 60 => "just now".to_string(),
        s if s < 3600 => format!("{}m ago", s / 60),
        s if s < 86_400 => format!("{}h ago", s / 3600),
        s => format!("{}d ago", s / 86_400),
    }
}

/// Relative time for a millisecond timestamp.
pub fn time_ago_millis(timestamp_ms: i64, now: DateTime<Utc>) -> String {
    time_ago((now.timestamp_millis() - timestamp_ms) / 1000)
}

pub fn short_session_id(id: &str) -> String {
    if id.chars().count() > SESSION_ID_WIDTH {
        let head: String = id.chars().take(SESSION_ID_WIDTH).collect();
        format!("{}...", head)
    } else {
        id.to_string()
    }
}

fn display_path(storage: &StorageConfig, path: &str) -> String {
    if path == NOT_AVAILABLE {
        return "-".to_string();
    }
    storage.shorten(path)
}

// ─────────────────────────────────────────────────────────────────────────────
// Views
// ─────────────────────────────────────────────────────────────────────────────

pub fn ports_view(records: &[PortRecord], storage: &StorageConfig) -> String {
    if records.is_empty() {
        return "\nNo active ports found\n".to_string();
    }
    let mut table = Table::new(&["PORT", "COMMAND", "PID", "UPTIME", "ADDRESS", "PATH"]);
    for r in records {
        table.push(vec![
            r.port.to_string(),
            r.command.clone(),
            r.process_id.clone(),
            r.uptime_label.clone(),
            r.address.clone(),
            display_path(storage, &r.working_directory),
        ]);
    }
    format!("\n{}\nTotal: {} ports\n", table.render(), table.len())
}

pub fn discovery_view(entries: &[DiscoveryEntry], storage: &StorageConfig) -> String {
    if entries.is_empty() {
        return "\nNo history entries found.\n".to_string();
    }
    let mut table = Table::new(&["STARTED", "PORT", "COMMAND", "PATH"]);
    for e in entries {
        table.push(vec![
            e.started.clone(),
            e.port.to_string(),
            e.command.clone(),
            display_path(storage, &e.working_directory),
        ]);
    }
    format!(
        "\nPORTAGE - Discovery History\n\n{}\nTotal: {} entries\n",
        table.render(),
        table.len()
    )
}

pub fn editor_view(
    workspaces: &[EditorWorkspace],
    filtered: bool,
    now: DateTime<Utc>,
    storage: &StorageConfig,
) -> String {
    if workspaces.is_empty() {
        return if filtered {
            "\nNo open Cursor windows found\n".to_string()
        } else {
            "\nNo Cursor workspaces found\n".to_string()
        };
    }
    let mut table = Table::new(&["#", "LAST ACTIVE", "PROJECT"]);
    for (i, ws) in workspaces.iter().enumerate() {
        table.push(vec![
            (i + 1).to_string(),
            time_ago(ws.seconds_since_active(now)),
            display_path(storage, &ws.path),
        ]);
    }
    format!(
        "\nCURSOR - Active Windows\n\n{}\nShowing {} most recently active workspaces\n",
        table.render(),
        table.len()
    )
}

pub fn live_sessions_view(sessions: &[LiveAssistantSession], storage: &StorageConfig) -> String {
    if sessions.is_empty() {
        return "No active Claude Code sessions found\n".to_string();
    }
    let mut table = Table::new(&["PROJECT", "PID", "SESSION", "CPU%", "MEM (MB)", "CPU TIME", "PATH"]);
    for s in sessions {
        table.push(vec![
            s.workspace_name.clone(),
            s.pid.clone(),
            short_session_id(&s.session_id),
            s.cpu_percent.clone(),
            s.memory_mb.clone(),
            s.cpu_time.clone(),
            display_path(storage, &s.working_dir),
        ]);
    }
    table.render()
}

pub fn assistant_history_view(sessions: &[AssistantSession], now: DateTime<Utc>) -> String {
    if sessions.is_empty() {
        return "No Claude sessions found\n".to_string();
    }
    let mut table = Table::new(&["PROJECT", "SESSION", "MESSAGES", "LAST ACTIVE", "PATH"]);
    for s in sessions {
        table.push(vec![
            s.project_name.clone(),
            short_session_id(&s.id),
            s.message_count.to_string(),
            time_ago_millis(s.last_timestamp, now),
            s.project.clone(),
        ]);
    }
    table.render()
}

pub fn workspace_history_view(entries: &[WorkspaceHistoryEntry], now: DateTime<Utc>) -> String {
    if entries.is_empty() {
        return "No workspace history found\n".to_string();
    }
    let mut table = Table::new(&["TYPE", "NAME", "LAST ACTIVE", "PATH"]);
    for e in entries {
        table.push(vec![
            e.source.as_str().to_string(),
            e.name.clone(),
            time_ago_millis(e.timestamp, now),
            e.path.clone(),
        ]);
    }
    table.render()
}
