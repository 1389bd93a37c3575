//! Decides which listening ports belong to the user's own dev work.

use std::path::{Path, PathBuf};

use crate::types::{is_meaningful_directory, PortRecord};

/// Background services that listen on ports but are never dev servers.
/// lsof truncates command names, hence `redis-ser`.
pub const EXCLUDED_COMMANDS: &[&str] = &["redis-ser"];

/// Working-directory prefixes that mark system or app-bundle processes.
pub const SYSTEM_PREFIXES: &[&str] = &["/opt/", "/usr/", "/System/", "/Library/"];

/// Pure user-relevance predicate.
///
/// The result depends only on (command, working directory) and the home
/// directory fixed at construction.
#[derive(Debug, Clone)]
pub struct PortClassifier {
    home: Option<PathBuf>,
}

impl PortClassifier {
    pub fn new(home: Option<PathBuf>) -> Self {
        Self { home }
    }

    pub fn from_home(home: &Path) -> Self {
        Self::new(Some(home.to_path_buf()))
    }

    pub fn is_user_relevant(&self, command: &str, working_directory: &str) -> bool {
        if !is_meaningful_directory(working_directory) {
            return false;
        }

        if EXCLUDED_COMMANDS.contains(&command) {
            return false;
        }

        let expanded = self.expand_tilde(working_directory);

        if SYSTEM_PREFIXES
            .iter()
            .any(|prefix| expanded.starts_with(prefix))
        {
            return false;
        }

        if let Some(home) = &self.home {
            let user_library = home.join("Library");
            if expanded.starts_with(user_library.to_string_lossy().as_ref()) {
                return false;
            }
        }

        true
    }

    pub fn is_user_port(&self, record: &PortRecord) -> bool {
        self.is_user_relevant(&record.command, &record.working_directory)
    }

    fn expand_tilde(&self, path: &str) -> String {
        match (path.strip_prefix("~/"), &self.home) {
            (Some(rest), Some(home)) => home.join(rest).to_string_lossy().to_string(),
            _ => path.to_string(),
        }
    }
}
