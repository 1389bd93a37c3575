//! Workspace event ledger: append-only open/close events per workspace.
//!
//! Editor integrations call `portage --log-close PATH` / `--log-open PATH`.
//! Nothing is ever deleted: reopening a workspace appends a newer `open`
//! event that supersedes the earlier `close`.
//!
//! Line format: `unix_seconds,open|close,path`. The path is the remainder
//! of the line and may itself contain commas.
//!
//! State for a path is derived, never stored:
//! `Unknown -> Open -> Closed -> Open ...`, where the latest event (by
//! timestamp) decides, and a live editor window always counts as open.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use fs_err as fs;

use crate::error::{PortageError, Result};
use crate::storage::read_lossy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkspaceEventKind {
    Open,
    Close,
}

impl WorkspaceEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkspaceEventKind::Open => "open",
            WorkspaceEventKind::Close => "close",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(WorkspaceEventKind::Open),
            "close" => Some(WorkspaceEventKind::Close),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceEvent {
    pub timestamp: i64,
    pub kind: WorkspaceEventKind,
    pub path: String,
}

impl WorkspaceEvent {
    pub fn to_line(&self) -> String {
        format!("{},{},{}\n", self.timestamp, self.kind.as_str(), self.path)
    }

    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let mut parts = line.splitn(3, ',');
        let timestamp = parts.next()?.parse().ok()?;
        let kind = WorkspaceEventKind::parse(parts.next()?)?;
        let path = parts.next()?.to_string();
        Some(Self {
            timestamp,
            kind,
            path,
        })
    }
}

/// Derived state of one workspace path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceState {
    Unknown,
    Open,
    Closed,
}

/// A workspace whose latest event is a close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedWorkspace {
    pub path: String,
    pub closed_at: i64,
}

/// Handle to the workspace event ledger file.
#[derive(Debug, Clone)]
pub struct WorkspaceLedger {
    path: PathBuf,
}

impl WorkspaceLedger {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records that a workspace was closed, at the current time.
    pub fn add_close(&self, workspace: &str) -> Result<()> {
        self.append(WorkspaceEventKind::Close, workspace, Utc::now().timestamp())
    }

    /// Records that a workspace was (re)opened, at the current time.
    pub fn add_open(&self, workspace: &str) -> Result<()> {
        self.append(WorkspaceEventKind::Open, workspace, Utc::now().timestamp())
    }

    pub fn append(&self, kind: WorkspaceEventKind, workspace: &str, timestamp: i64) -> Result<()> {
        let event = WorkspaceEvent {
            timestamp,
            kind,
            path: workspace.to_string(),
        };
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| PortageError::io("opening workspace log", e))?;
        file.write_all(event.to_line().as_bytes())
            .map_err(|e| PortageError::io("appending to workspace log", e))
    }

    /// Every well-formed event in file order. A missing file is empty.
    pub fn read_events(&self) -> Result<Vec<WorkspaceEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = read_lossy(&self.path, "reading workspace log")?;
        Ok(contents.lines().filter_map(WorkspaceEvent::parse_line).collect())
    }
}

/// Reduces an event stream to the latest event per path.
///
/// Latest means highest timestamp; on equal timestamps the later line wins.
pub fn latest_by_path(events: &[WorkspaceEvent]) -> HashMap<&str, &WorkspaceEvent> {
    let mut latest: HashMap<&str, &WorkspaceEvent> = HashMap::new();
    for event in events {
        match latest.get(event.path.as_str()) {
            Some(existing) if existing.timestamp > event.timestamp => {}
            _ => {
                latest.insert(event.path.as_str(), event);
            }
        }
    }
    latest
}

/// Current derived state of `path`.
pub fn workspace_state(
    events: &[WorkspaceEvent],
    path: &str,
    open_windows: &HashSet<String>,
) -> WorkspaceState {
    if open_windows.contains(path) {
        return WorkspaceState::Open;
    }
    match latest_by_path(events).get(path).map(|e| e.kind) {
        Some(WorkspaceEventKind::Open) => WorkspaceState::Open,
        Some(WorkspaceEventKind::Close) => WorkspaceState::Closed,
        None => WorkspaceState::Unknown,
    }
}

/// Workspaces whose latest event is a close, that are not open in a live
/// editor window, and that still exist. Most recently closed first.
pub fn closed_workspaces<F>(
    events: &[WorkspaceEvent],
    open_windows: &HashSet<String>,
    exists: F,
) -> Vec<ClosedWorkspace>
where
    F: Fn(&str) -> bool,
{
    let mut closed: Vec<ClosedWorkspace> = latest_by_path(events)
        .into_values()
        .filter(|event| event.kind == WorkspaceEventKind::Close)
        .filter(|event| !open_windows.contains(&event.path))
        .filter(|event| exists(&event.path))
        .map(|event| ClosedWorkspace {
            path: event.path.clone(),
            closed_at: event.timestamp,
        })
        .collect();

    closed.sort_by(|a, b| b.closed_at.cmp(&a.closed_at).then_with(|| a.path.cmp(&b.path)));
    closed
}
