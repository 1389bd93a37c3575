//! Claude Code session state: prompt history and live processes.
//!
//! `~/.claude/history.jsonl` holds one object per submitted prompt:
//!
//! ```json
//! {"display":"fix the tests","timestamp":1760000000000,"project":"/Users/alice/app","sessionId":"3f2a..."}
//! ```
//!
//! Prompts are grouped into sessions by (project, sessionId). Live sessions
//! come from the process table, with the working directory read from the
//! process's open-file listing.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PortageError, Result};
use crate::probe::ProcessProbe;
use crate::storage::read_lossy;

/// Session id used for history lines that predate session ids.
const DEFAULT_SESSION_ID: &str = "default";

/// Placeholder when a live process has no matching history session.
pub const UNKNOWN_SESSION_ID: &str = "-";

const MIN_PS_FIELDS: usize = 11;
const MIN_LSOF_FIELDS: usize = 9;

/// One line of `history.jsonl`.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub display: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub project: String,
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<String>,
}

/// Prompts for one (project, session) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssistantSession {
    #[serde(rename = "session_id")]
    pub id: String,
    pub project: String,
    pub project_name: String,
    pub message_count: usize,
    pub first_timestamp: i64,
    pub last_timestamp: i64,
    pub first_message: String,
    pub last_message: String,
}

/// A Claude process currently running on this machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveAssistantSession {
    pub pid: String,
    pub session_id: String,
    pub working_dir: String,
    pub workspace_name: String,
    pub cpu_percent: String,
    pub memory_mb: String,
    pub cpu_time: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// History
// ─────────────────────────────────────────────────────────────────────────────

/// Reads every parseable history line. Blank and invalid lines are skipped.
pub fn load_history(path: &Path) -> Result<Vec<HistoryEntry>> {
    if !path.exists() {
        return Err(PortageError::FileNotFound(path.to_path_buf()));
    }
    let contents = read_lossy(path, "reading history file")?;

    let mut entries = Vec::new();
    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<HistoryEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(err) => debug!(error = %err, "skipping invalid history line"),
        }
    }
    Ok(entries)
}

/// Display name for a project path: its last component, or the whole path
/// when there is no usable component.
pub fn project_name(project: &str) -> String {
    match Path::new(project).file_name() {
        Some(name) => name.to_string_lossy().to_string(),
        None => project.to_string(),
    }
}

/// Groups history lines into sessions, most recently active first.
pub fn group_sessions(entries: &[HistoryEntry]) -> Vec<AssistantSession> {
    let mut groups: HashMap<(&str, &str), Vec<&HistoryEntry>> = HashMap::new();
    for entry in entries.iter().filter(|e| !e.project.is_empty()) {
        let session_id = entry.session_id.as_deref().unwrap_or(DEFAULT_SESSION_ID);
        groups
            .entry((entry.project.as_str(), session_id))
            .or_default()
            .push(entry);
    }

    let mut sessions: Vec<AssistantSession> = groups
        .into_iter()
        .map(|((project, session_id), mut prompts)| {
            prompts.sort_by_key(|p| p.timestamp);
            let first = prompts[0];
            let last = prompts[prompts.len() - 1];
            AssistantSession {
                id: session_id.to_string(),
                project: project.to_string(),
                project_name: project_name(project),
                message_count: prompts.len(),
                first_timestamp: first.timestamp,
                last_timestamp: last.timestamp,
                first_message: first.display.clone(),
                last_message: last.display.clone(),
            }
        })
        .collect();

    sessions.sort_by(|a, b| {
        b.last_timestamp
            .cmp(&a.last_timestamp)
            .then_with(|| a.project.cmp(&b.project))
            .then_with(|| a.id.cmp(&b.id))
    });
    sessions
}

/// Latest session id per project path, by history order.
pub fn latest_session_ids(entries: &[HistoryEntry]) -> HashMap<String, String> {
    let mut latest = HashMap::new();
    for entry in entries {
        match entry.session_id.as_deref() {
            Some(id) if !id.is_empty() && !entry.project.is_empty() => {
                latest.insert(entry.project.clone(), id.to_string());
            }
            _ => {}
        }
    }
    latest
}

// ─────────────────────────────────────────────────────────────────────────────
// Live sessions
// ─────────────────────────────────────────────────────────────────────────────

/// Pulls the working directory out of a full `lsof -p PID` listing.
pub fn parse_cwd_from_open_files(output: &str) -> Option<String> {
    output
        .lines()
        .filter(|line| line.contains("cwd") && line.contains("DIR"))
        .find_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            (fields.len() >= MIN_LSOF_FIELDS).then(|| fields[MIN_LSOF_FIELDS - 1..].join(" "))
        })
}

/// Discovers running Claude processes. No processes (or no `ps`) is an
/// empty list.
pub fn live_sessions<P: ProcessProbe + ?Sized>(
    probe: &P,
    history: &[HistoryEntry],
) -> Vec<LiveAssistantSession> {
    let Some(table) = probe.assistant_processes() else {
        return Vec::new();
    };
    let session_ids = latest_session_ids(history);

    table
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < MIN_PS_FIELDS {
                return None;
            }
            let pid = fields[1].to_string();
            let rss_kb: u64 = fields[5].parse().unwrap_or(0);

            let working_dir = probe
                .open_files(&pid)
                .and_then(|out| parse_cwd_from_open_files(&out))
                .unwrap_or_default();
            let workspace_name = working_dir
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string();
            let session_id = session_ids
                .get(&working_dir)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_SESSION_ID.to_string());

            Some(LiveAssistantSession {
                pid,
                session_id,
                working_dir,
                workspace_name,
                cpu_percent: fields[2].to_string(),
                memory_mb: (rss_kb / 1024).to_string(),
                cpu_time: fields[9].to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(project: &str, session: Option<&str>, ts: i64, display: &str) -> HistoryEntry {
        HistoryEntry {
            display: display.to_string(),
            timestamp: ts,
            project: project.to_string(),
            session_id: session.map(str::to_string),
        }
    }

    #[test]
    fn test_load_history_skips_invalid_lines() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("history.jsonl");
        std::fs::write(
            &path,
            concat!(
                r#"{"display":"hi","timestamp":1000,"project":"/p/a","sessionId":"s1"}"#,
                "\n\nnot json\n",
                r#"{"display":"again","timestamp":2000,"project":"/p/a"}"#,
                "\n"
            ),
        )
        .unwrap();

        let entries = load_history(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].session_id.as_deref(), Some("s1"));
        assert!(entries[1].session_id.is_none());
    }

    #[test]
    fn test_load_history_skips_invalid_utf8_line() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("history.jsonl");
        let mut bytes = br#"{"display":"one","timestamp":1000,"project":"/p/a","sessionId":"s1"}"#.to_vec();
        bytes.extend_from_slice(b"\n\xff\xfe\n");
        bytes.extend_from_slice(br#"{"display":"two","timestamp":2000,"project":"/p/b","sessionId":"s2"}"#);
        bytes.push(b'\n');
        std::fs::write(&path, bytes).unwrap();

        let entries = load_history(&path).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].display, "one");
        assert_eq!(entries[1].project, "/p/b");
    }

    #[test]
    fn test_load_history_missing_file_is_error() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            load_history(&temp.path().join("history.jsonl")),
            Err(PortageError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_group_sessions_by_project_and_id() {
        let entries = vec![
            entry("/p/a", Some("s1"), 300, "third"),
            entry("/p/a", Some("s1"), 100, "first"),
            entry("/p/b", None, 500, "b-only"),
            entry("", Some("s9"), 900, "no project"),
            entry("/p/a", Some("s2"), 200, "other"),
        ];

        let sessions = group_sessions(&entries);

        assert_eq!(sessions.len(), 3);
        assert_eq!(sessions[0].project, "/p/b");
        assert_eq!(sessions[0].id, "default");
        let s1 = &sessions[1];
        assert_eq!(s1.id, "s1");
        assert_eq!(s1.message_count, 2);
        assert_eq!(s1.first_message, "first");
        assert_eq!(s1.last_message, "third");
        assert_eq!(s1.first_timestamp, 100);
        assert_eq!(s1.last_timestamp, 300);
        assert_eq!(s1.project_name, "a");
        assert_eq!(sessions[2].id, "s2");
    }

    #[test]
    fn test_project_name_falls_back_to_path() {
        assert_eq!(project_name("/Users/alice/app"), "app");
        assert_eq!(project_name("/"), "/");
    }

    #[test]
    fn test_parse_cwd_from_open_files() {
        let output = "\
COMMAND  PID  USER   FD   TYPE DEVICE SIZE/OFF NODE NAME
node    4242 alice  cwd    DIR   1,16      640  123 /Users/alice/My App
node    4242 alice  txt    REG   1,16   999999  456 /usr/local/bin/node
";
        assert_eq!(
            parse_cwd_from_open_files(output),
            Some("/Users/alice/My App".to_string())
        );
        assert_eq!(parse_cwd_from_open_files("nothing here"), None);
    }

    struct TableProbe;

    impl ProcessProbe for TableProbe {
        fn socket_listing(&self) -> Result<String> {
            Ok(String::new())
        }
        fn working_directory(&self, _pid: &str) -> Option<String> {
            None
        }
        fn elapsed_time(&self, _pid: &str) -> Option<String> {
            None
        }
        fn editor_window_titles(&self) -> Option<String> {
            None
        }
        fn assistant_processes(&self) -> Option<String> {
            Some(
                "alice 4242 12.5 0.8 1234 204800 s003 S+ 9:00AM 0:42.10 claude\n\
                 alice 9 0.0 0.0 1 1 ?? S 9:00AM short\n"
                    .to_string(),
            )
        }
        fn open_files(&self, pid: &str) -> Option<String> {
            (pid == "4242").then(|| {
                "claude 4242 alice cwd DIR 1,16 640 123 /Users/alice/app\n".to_string()
            })
        }
    }

    #[test]
    fn test_live_sessions_from_process_table() {
        let history = vec![
            entry("/Users/alice/app", Some("old"), 1, "x"),
            entry("/Users/alice/app", Some("new"), 2, "y"),
        ];
        let sessions = live_sessions(&TableProbe, &history);

        assert_eq!(sessions.len(), 1);
        let s = &sessions[0];
        assert_eq!(s.pid, "4242");
        assert_eq!(s.working_dir, "/Users/alice/app");
        assert_eq!(s.workspace_name, "app");
        assert_eq!(s.session_id, "new");
        assert_eq!(s.cpu_percent, "12.5");
        assert_eq!(s.memory_mb, "200");
        assert_eq!(s.cpu_time, "0:42.10");
    }

    #[test]
    fn test_live_sessions_without_history_match() {
        let sessions = live_sessions(&TableProbe, &[]);
        assert_eq!(sessions[0].session_id, UNKNOWN_SESSION_ID);
    }
}
