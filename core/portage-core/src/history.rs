//! "What was I working on recently": assistant sessions and closed editor
//! workspaces on one timeline.

use std::collections::HashSet;

use serde::Serialize;

use crate::assistant::{project_name, AssistantSession};
use crate::workspace_log::ClosedWorkspace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HistorySource {
    Claude,
    Cursor,
}

impl HistorySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistorySource::Claude => "claude",
            HistorySource::Cursor => "cursor",
        }
    }
}

/// One row of the combined history. `timestamp` is in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceHistoryEntry {
    #[serde(rename = "type")]
    pub source: HistorySource,
    pub path: String,
    pub name: String,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<usize>,
}

/// Merges assistant sessions and closed workspaces, most recent first.
/// A `limit` of 0 means unlimited.
pub fn combined_history(
    sessions: &[AssistantSession],
    closed: &[ClosedWorkspace],
    limit: usize,
) -> Vec<WorkspaceHistoryEntry> {
    let claude = sessions.iter().map(|s| WorkspaceHistoryEntry {
        source: HistorySource::Claude,
        path: s.project.clone(),
        name: project_name(&s.project),
        timestamp: s.last_timestamp,
        session_id: Some(s.id.clone()),
        messages: Some(s.message_count),
    });
    let cursor = closed.iter().map(|c| WorkspaceHistoryEntry {
        source: HistorySource::Cursor,
        path: c.path.clone(),
        name: project_name(&c.path),
        timestamp: c.closed_at.saturating_mul(1000),
        session_id: None,
        messages: None,
    });

    let mut history: Vec<WorkspaceHistoryEntry> = claude.chain(cursor).collect();
    history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    if limit > 0 {
        history.truncate(limit);
    }
    history
}

/// Recently closed workspaces: the event ledger first, topped up from the
/// editor's own recently-opened list until `limit` is reached.
///
/// Supplemental paths are skipped when already listed, currently open in a
/// window, or gone from disk.
pub fn recently_closed<F>(
    closed: &[ClosedWorkspace],
    recently_opened: &[String],
    open_windows: &HashSet<String>,
    exists: F,
    limit: usize,
) -> Vec<String>
where
    F: Fn(&str) -> bool,
{
    let mut result: Vec<String> = closed
        .iter()
        .take(limit)
        .map(|c| c.path.clone())
        .collect();
    let mut listed: HashSet<String> = result.iter().cloned().collect();

    for path in recently_opened {
        if result.len() >= limit {
            break;
        }
        if listed.contains(path) || open_windows.contains(path) || !exists(path) {
            continue;
        }
        listed.insert(path.clone());
        result.push(path.clone());
    }
    result
}
