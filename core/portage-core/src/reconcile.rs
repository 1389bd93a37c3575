//! Merges ports, editor workspaces and assistant sessions into one view.
//!
//! Each port is attached to the first workspace whose path is a string
//! prefix of the port's working directory. Candidates are tried in output
//! order (least idle first). Nested workspaces are not disambiguated: with
//! both `/code/app` and `/code/app/web` open, a port in `/code/app/web`
//! goes to whichever is less idle. Ports that match nothing land in one
//! trailing orphaned bucket.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::assistant::{project_name, LiveAssistantSession};
use crate::editor::EditorWorkspace;
use crate::types::PortRecord;
use crate::workspace_log::ClosedWorkspace;

/// One entry of the reconciled view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciledItem {
    Workspace {
        path: String,
        name: String,
        last_active_seconds: i64,
        ports: Vec<PortRecord>,
    },
    Orphaned {
        ports: Vec<PortRecord>,
    },
}

impl ReconciledItem {
    pub fn ports(&self) -> &[PortRecord] {
        match self {
            ReconciledItem::Workspace { ports, .. } | ReconciledItem::Orphaned { ports } => ports,
        }
    }
}

/// Independently sourced activity signals for one reconciliation.
///
/// Every source may be empty; an absent editor or assistant is not an
/// error.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileInput<'a> {
    pub ports: &'a [PortRecord],
    pub editor_workspaces: &'a [EditorWorkspace],
    pub closed: &'a [ClosedWorkspace],
    pub sessions: &'a [LiveAssistantSession],
    pub now: DateTime<Utc>,
}

struct Candidate {
    path: String,
    last_active_seconds: i64,
    ports: Vec<PortRecord>,
}

fn candidates(input: &ReconcileInput<'_>) -> Vec<Candidate> {
    let mut idle: HashMap<&str, i64> = HashMap::new();
    for ws in input.editor_workspaces {
        let secs = ws.seconds_since_active(input.now);
        idle.entry(ws.path.as_str())
            .and_modify(|current| *current = (*current).min(secs))
            .or_insert(secs);
    }
    for session in input.sessions {
        if !session.working_dir.is_empty() {
            idle.entry(session.working_dir.as_str()).or_insert(0);
        }
    }

    let closed: HashSet<&str> = input.closed.iter().map(|c| c.path.as_str()).collect();

    let mut candidates: Vec<Candidate> = idle
        .into_iter()
        .filter(|(path, _)| !closed.contains(path))
        .map(|(path, last_active_seconds)| Candidate {
            path: path.to_string(),
            last_active_seconds,
            ports: Vec::new(),
        })
        .collect();

    candidates.sort_by(|a, b| {
        a.last_active_seconds
            .cmp(&b.last_active_seconds)
            .then_with(|| a.path.cmp(&b.path))
    });
    candidates
}

/// Builds the unified view: workspaces ascending by idle time, then the
/// orphaned bucket if any port matched nothing.
pub fn reconcile(input: ReconcileInput<'_>) -> Vec<ReconciledItem> {
    let mut workspaces = candidates(&input);
    let mut orphaned = Vec::new();

    for port in input.ports {
        match workspaces
            .iter_mut()
            .find(|ws| port.working_directory.starts_with(&ws.path))
        {
            Some(ws) => ws.ports.push(port.clone()),
            None => orphaned.push(port.clone()),
        }
    }

    let mut items: Vec<ReconciledItem> = workspaces
        .into_iter()
        .map(|ws| ReconciledItem::Workspace {
            name: project_name(&ws.path),
            path: ws.path,
            last_active_seconds: ws.last_active_seconds,
            ports: ws.ports,
        })
        .collect();

    if !orphaned.is_empty() {
        items.push(ReconciledItem::Orphaned { ports: orphaned });
    }
    items
}
