//! Storage configuration and path management for Portage.
//!
//! Every file Portage reads or appends to is derived from one home
//! directory, so tests can point the whole tool at a temp dir with
//! `StorageConfig::with_home()`.
//!
//! Portage owns three files:
//! - `~/.portage.log` (discovery ledger)
//! - `~/.portage-workspace.log` (workspace event ledger)
//! - `~/.portmon.json` (hidden ports)
//!
//! Everything else is read-only state owned by Cursor or Claude Code.

use std::path::{Path, PathBuf};

use fs_err as fs;

use crate::error::{PortageError, Result};

/// Central configuration for all Portage storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    home: PathBuf,
}

impl StorageConfig {
    /// Resolves paths against the current user's home directory.
    pub fn from_env() -> Result<Self> {
        dirs::home_dir()
            .map(Self::with_home)
            .ok_or(PortageError::HomeDirNotFound)
    }

    /// Creates a StorageConfig rooted at a custom home directory.
    /// Used for testing with temp directories.
    pub fn with_home(home: PathBuf) -> Self {
        Self { home }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Portage Files
    // ─────────────────────────────────────────────────────────────────────────────

    /// Path to the discovery ledger (first-seen port/path combinations).
    pub fn discovery_log_file(&self) -> PathBuf {
        self.home.join(".portage.log")
    }

    /// Path to the workspace open/close event ledger.
    pub fn workspace_log_file(&self) -> PathBuf {
        self.home.join(".portage-workspace.log")
    }

    /// Path to the user config holding hidden ports.
    pub fn user_config_file(&self) -> PathBuf {
        self.home.join(".portmon.json")
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Cursor Paths (Read-Only)
    // ─────────────────────────────────────────────────────────────────────────────

    fn cursor_user_dir(&self) -> PathBuf {
        self.home
            .join("Library")
            .join("Application Support")
            .join("Cursor")
            .join("User")
    }

    /// Directory with one subdirectory per Cursor workspace.
    pub fn cursor_workspace_storage_dir(&self) -> PathBuf {
        self.cursor_user_dir().join("workspaceStorage")
    }

    /// Cursor's global state database (holds the recently-opened list).
    pub fn cursor_global_state_db(&self) -> PathBuf {
        self.cursor_user_dir()
            .join("globalStorage")
            .join("state.vscdb")
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Claude Code Paths (Read-Only)
    // ─────────────────────────────────────────────────────────────────────────────

    /// Claude Code's prompt history, one JSON object per line.
    pub fn claude_history_file(&self) -> PathBuf {
        self.home.join(".claude").join("history.jsonl")
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Path Helpers
    // ─────────────────────────────────────────────────────────────────────────────

    /// Expands a leading `~/` to the configured home directory.
    pub fn expand_tilde(&self, path: &str) -> String {
        match path.strip_prefix("~/") {
            Some(rest) => self.home.join(rest).to_string_lossy().to_string(),
            None => path.to_string(),
        }
    }

    /// Replaces the home directory prefix with `~` for display.
    pub fn shorten(&self, path: &str) -> String {
        if path == "N/A" || path == "-" {
            return path.to_string();
        }
        let home = self.home.to_string_lossy();
        match path.strip_prefix(home.as_ref()) {
            Some(rest) if !home.is_empty() => format!("~{}", rest),
            _ => path.to_string(),
        }
    }
}

/// Reads a text file, replacing invalid UTF-8 instead of failing.
///
/// The ledgers and Claude's history are line-oriented; one bad byte must
/// only spoil its own line.
pub(crate) fn read_lossy(path: &Path, context: &str) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| PortageError::io(context, e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
