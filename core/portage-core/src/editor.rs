//! Cursor editor state: live windows, per-workspace storage, recent list.
//!
//! Three read-only sources, all optional:
//! - window titles from System Events (which workspaces are open *now*)
//! - `workspaceStorage/<hash>/{workspace.json,state.vscdb}` (every workspace
//!   Cursor knows, with the state file's mtime as last activity)
//! - the global state DB's `history.recentlyOpenedPathsList`
//!
//! Any of them may be missing (Cursor not installed, no Accessibility
//! permission). The engine degrades every failure here to `None` or an
//! empty list.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use fs_err as fs;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::{PortageError, Result};
use crate::storage::StorageConfig;

/// Separator Cursor puts between title segments.
const TITLE_SEPARATOR: &str = " — ";

/// How many workspaces the unfiltered listing shows.
pub const UNFILTERED_WORKSPACE_LIMIT: usize = 10;

const RECENT_PATHS_KEY: &str = "history.recentlyOpenedPathsList";

/// A workspace known to Cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorWorkspace {
    pub path: String,
    pub last_modified: DateTime<Utc>,
}

impl EditorWorkspace {
    pub fn seconds_since_active(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_modified).num_seconds().max(0)
    }
}

#[derive(Debug, Deserialize)]
struct WorkspaceFile {
    #[serde(default)]
    folder: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecentList {
    #[serde(default)]
    entries: Vec<RecentEntry>,
}

#[derive(Debug, Deserialize)]
struct RecentEntry {
    #[serde(rename = "folderUri", default)]
    folder_uri: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Window titles
// ─────────────────────────────────────────────────────────────────────────────

/// Extracts workspace paths from a comma-separated list of window titles.
///
/// With `window.title` set to include the folder path, a title reads
/// `file.rs — ~/code/app`. The first segment that looks like a path wins.
pub fn parse_window_titles(output: &str, storage: &StorageConfig) -> HashSet<String> {
    output
        .split(',')
        .filter_map(|title| {
            title
                .trim()
                .split(TITLE_SEPARATOR)
                .map(str::trim)
                .find(|part| part.starts_with("~/") || part.starts_with('/'))
                .map(|part| storage.expand_tilde(part))
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Workspace storage
// ─────────────────────────────────────────────────────────────────────────────

/// Converts a `file://` folder URI into a decoded filesystem path.
pub fn folder_uri_to_path(uri: &str) -> Option<String> {
    let url = Url::parse(uri).ok()?;
    if url.scheme() != "file" {
        return None;
    }
    url.to_file_path()
        .ok()
        .map(|p| p.to_string_lossy().to_string())
}

fn read_workspace_dir(dir: &Path) -> Option<EditorWorkspace> {
    let state_meta = fs::metadata(dir.join("state.vscdb")).ok()?;
    let modified = state_meta.modified().ok()?;

    let contents = fs::read_to_string(dir.join("workspace.json")).ok()?;
    let workspace: WorkspaceFile = serde_json::from_str(&contents).ok()?;
    let decoded = folder_uri_to_path(workspace.folder.as_deref()?)?;

    let path = fs::canonicalize(&decoded)
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or(decoded);
    if !Path::new(&path).exists() {
        return None;
    }

    Some(EditorWorkspace {
        path,
        last_modified: DateTime::<Utc>::from(modified),
    })
}

/// Scans Cursor's workspace storage, oldest activity first.
///
/// When `open_windows` is known and non-empty, only open workspaces are
/// kept. A missing storage directory yields an empty list.
pub fn scan_workspace_storage(
    storage_dir: &Path,
    open_windows: Option<&HashSet<String>>,
) -> Vec<EditorWorkspace> {
    let entries = match fs::read_dir(storage_dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(error = %err, "no Cursor workspace storage");
            return Vec::new();
        }
    };

    let filter = open_windows.filter(|set| !set.is_empty());
    let mut workspaces: Vec<EditorWorkspace> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter_map(|dir| read_workspace_dir(&dir))
        .filter(|ws| filter.map_or(true, |open| open.contains(&ws.path)))
        .collect();

    workspaces.sort_by(|a, b| {
        a.last_modified
            .cmp(&b.last_modified)
            .then_with(|| a.path.cmp(&b.path))
    });
    workspaces
}

// ─────────────────────────────────────────────────────────────────────────────
// Recently opened list
// ─────────────────────────────────────────────────────────────────────────────

/// Reads the recently-opened folder list from Cursor's global state DB.
///
/// Entries without a `folderUri` (single files, remote workspaces) are
/// skipped. A missing key yields an empty list. The value column is
/// declared BLOB, so both text and blob storage are accepted.
pub fn recently_opened_paths(db_path: &Path) -> Result<Vec<String>> {
    let conn = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let value: Option<Vec<u8>> = conn
        .query_row(
            "SELECT value FROM ItemTable WHERE key = ?1",
            [RECENT_PATHS_KEY],
            |row| {
                Ok(match row.get_ref(0)? {
                    ValueRef::Text(bytes) | ValueRef::Blob(bytes) => Some(bytes.to_vec()),
                    _ => None,
                })
            },
        )
        .optional()?
        .flatten();

    let Some(value) = value else {
        return Ok(Vec::new());
    };

    let list: RecentList = serde_json::from_slice(&value).map_err(|e| PortageError::Json {
        context: "parsing recently-opened list".to_string(),
        source: e,
    })?;

    Ok(list
        .entries
        .into_iter()
        .filter_map(|e| e.folder_uri)
        .filter_map(|uri| folder_uri_to_path(&uri))
        .collect())
}
