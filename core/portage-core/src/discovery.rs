//! Discovery ledger: an append-only record of first-seen (port, path) pairs.
//!
//! Each line stores when the owning process actually started (observation
//! time minus uptime), not when Portage noticed it:
//!
//! ```text
//! 2026-10-19 09:14:02\t3000\t501\tnode\t/Users/alice/app
//! ```
//!
//! The file is never rewritten. A (port, working directory) pair is
//! logged at most once over the ledger's lifetime; the session or pid is
//! not part of the key.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDateTime};
use fs_err as fs;
use tracing::{debug, warn};

use crate::classify::PortClassifier;
use crate::error::{PortageError, Result};
use crate::storage::read_lossy;
use crate::types::{is_meaningful_directory, PortRecord};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const FIELD_COUNT: usize = 5;

/// One ledger line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryEntry {
    /// Start time as written in the ledger, normally `TIMESTAMP_FORMAT`.
    /// Older or hand-edited lines may hold anything.
    pub started: String,
    pub port: u16,
    pub process_id: String,
    pub command: String,
    pub working_directory: String,
}

impl DiscoveryEntry {
    /// Builds the entry for a record observed at `now`.
    pub fn observed(record: &PortRecord, now: NaiveDateTime) -> Self {
        Self {
            started: started_at(now, record.uptime_seconds)
                .format(TIMESTAMP_FORMAT)
                .to_string(),
            port: record.port,
            process_id: record.process_id.clone(),
            command: record.command.clone(),
            working_directory: record.working_directory.clone(),
        }
    }

    /// The parsed start time, if the ledger text is well formed.
    pub fn started_at(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.started, TIMESTAMP_FORMAT).ok()
    }

    pub fn to_line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\n",
            self.started, self.port, self.process_id, self.command, self.working_directory
        )
    }

    pub fn parse_line(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < FIELD_COUNT {
            return None;
        }
        Some(Self {
            started: parts[0].to_string(),
            port: parts[1].trim().parse().ok()?,
            process_id: parts[2].to_string(),
            command: parts[3].to_string(),
            working_directory: parts[4].to_string(),
        })
    }
}

/// `now` minus the uptime, or `now` itself when that falls outside the
/// representable range.
fn started_at(now: NaiveDateTime, uptime_seconds: u64) -> NaiveDateTime {
    i64::try_from(uptime_seconds)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|uptime| now.checked_sub_signed(uptime))
        .unwrap_or(now)
}

/// Ledger dedup key: (port text, working directory).
type SeenKey = (String, String);

fn seen_key(port: u16, working_directory: &str) -> SeenKey {
    (port.to_string(), working_directory.to_string())
}

/// Handle to the discovery ledger file.
#[derive(Debug, Clone)]
pub struct DiscoveryLedger {
    path: PathBuf,
}

impl DiscoveryLedger {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_raw(&self) -> Result<String> {
        if !self.path.exists() {
            return Ok(String::new());
        }
        read_lossy(&self.path, "reading discovery ledger")
    }

    /// Entries with at least five fields and a numeric port, in file order.
    /// The start time is kept verbatim even when it does not parse.
    pub fn load(&self) -> Result<Vec<DiscoveryEntry>> {
        Ok(self
            .read_raw()?
            .lines()
            .filter(|line| !line.is_empty())
            .filter_map(DiscoveryEntry::parse_line)
            .collect())
    }

    /// Keys already present in the ledger. Lines with a malformed timestamp
    /// or port still count, so they are never re-logged.
    fn seen_keys(&self) -> HashSet<SeenKey> {
        let raw = match self.read_raw() {
            Ok(raw) => raw,
            Err(err) => {
                warn!(error = %err, "discovery ledger unreadable, treating as empty");
                String::new()
            }
        };

        raw.lines()
            .filter(|line| !line.is_empty())
            .filter_map(|line| {
                let parts: Vec<&str> = line.split('\t').collect();
                (parts.len() >= FIELD_COUNT).then(|| (parts[1].to_string(), parts[4].to_string()))
            })
            .collect()
    }

    /// Appends entries as-is, without consulting the seen set.
    pub fn append(&self, entries: &[DiscoveryEntry]) -> Result<()> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| PortageError::io("opening discovery ledger", e))?;
        for entry in entries {
            file.write_all(entry.to_line().as_bytes())
                .map_err(|e| PortageError::io("appending to discovery ledger", e))?;
        }
        Ok(())
    }

    /// Logs every record whose (port, directory) pair has never been seen.
    ///
    /// Best effort: an unwritable ledger is logged and reported as zero
    /// appended entries, never as an error. Returns the number appended.
    pub fn record_new(&self, records: &[PortRecord], now: NaiveDateTime) -> usize {
        let mut seen = self.seen_keys();
        let fresh: Vec<DiscoveryEntry> = records
            .iter()
            .filter(|r| is_meaningful_directory(&r.working_directory))
            .filter(|r| seen.insert(seen_key(r.port, &r.working_directory)))
            .map(|r| DiscoveryEntry::observed(r, now))
            .collect();

        if fresh.is_empty() {
            return 0;
        }

        match self.append(&fresh) {
            Ok(()) => {
                debug!(count = fresh.len(), "logged new port discoveries");
                fresh.len()
            }
            Err(err) => {
                debug!(error = %err, "skipping discovery logging");
                0
            }
        }
    }

    /// User-relevant entries, most recently appended first.
    pub fn history(&self, classifier: &PortClassifier, limit: Option<usize>) -> Result<Vec<DiscoveryEntry>> {
        let mut entries: Vec<DiscoveryEntry> = self
            .load()?
            .into_iter()
            .filter(|e| classifier.is_user_relevant(&e.command, &e.working_directory))
            .collect();
        entries.reverse();
        if let Some(limit) = limit.filter(|l| *l > 0) {
            entries.truncate(limit);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn record(port: u16, pid: &str, dir: &str, uptime: u64) -> PortRecord {
        let mut r = PortRecord::from_listing(port, pid, "node", "alice", "*:0");
        r.working_directory = dir.to_string();
        r.uptime_seconds = uptime;
        r
    }

    fn ledger(temp: &TempDir) -> DiscoveryLedger {
        DiscoveryLedger::new(temp.path().join(".portage.log"))
    }

    #[test]
    fn test_started_at_subtracts_uptime() {
        let entry = DiscoveryEntry::observed(&record(3000, "501", "/Users/alice/app", 3600), at(12, 0, 0));
        assert_eq!(entry.started_at(), Some(at(11, 0, 0)));
        assert_eq!(
            entry.to_line(),
            "2026-10-19 11:00:00\t3000\t501\tnode\t/Users/alice/app\n"
        );
    }

    #[test]
    fn test_missing_ledger_loads_empty() {
        let temp = TempDir::new().unwrap();
        assert!(ledger(&temp).load().unwrap().is_empty());
    }

    #[test]
    fn test_round_trip_preserves_order_and_fields() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp);
        let entries: Vec<DiscoveryEntry> = (0..4)
            .map(|i| DiscoveryEntry {
                started: at(9, i, 0).format(TIMESTAMP_FORMAT).to_string(),
                port: 3000 + i as u16,
                process_id: format!("{}", 100 + i),
                command: "node".to_string(),
                working_directory: format!("/Users/alice/app{}", i),
            })
            .collect();

        ledger.append(&entries).unwrap();

        assert_eq!(ledger.load().unwrap(), entries);
    }

    #[test]
    fn test_same_combination_logged_once_across_runs() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp);
        let recs = vec![record(3000, "501", "/Users/alice/app", 10)];

        assert_eq!(ledger.record_new(&recs, at(10, 0, 0)), 1);
        // Different pid, same port + path: still the same combination.
        let later = vec![record(3000, "777", "/Users/alice/app", 10)];
        assert_eq!(ledger.record_new(&later, at(11, 0, 0)), 0);

        let contents = std::fs::read_to_string(ledger.path()).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn test_duplicate_within_run_logged_once() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp);
        let recs = vec![
            record(3000, "501", "/Users/alice/app", 10),
            record(3000, "502", "/Users/alice/app", 10),
            record(3001, "501", "/Users/alice/app", 10),
        ];

        assert_eq!(ledger.record_new(&recs, at(10, 0, 0)), 2);
    }

    #[test]
    fn test_sentinel_and_root_not_logged() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp);
        let recs = vec![record(3000, "1", "N/A", 0), record(3001, "2", "/", 0)];

        assert_eq!(ledger.record_new(&recs, at(10, 0, 0)), 0);
        assert!(!ledger.path().exists());
    }

    #[test]
    fn test_unwritable_ledger_is_not_fatal() {
        let temp = TempDir::new().unwrap();
        let ledger = DiscoveryLedger::new(temp.path().join("missing-dir").join(".portage.log"));
        let recs = vec![record(3000, "1", "/Users/alice/app", 0)];

        assert_eq!(ledger.record_new(&recs, at(10, 0, 0)), 0);
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp);
        std::fs::write(
            ledger.path(),
            "garbage line\n2026-10-19 09:00:00\tnope\t1\tnode\t/Users/alice/web\n",
        )
        .unwrap();

        assert!(ledger.load().unwrap().is_empty());
        let recs = vec![record(3000, "9", "/Users/alice/app", 0)];
        assert_eq!(ledger.record_new(&recs, at(10, 0, 0)), 1);
        assert_eq!(ledger.record_new(&recs, at(11, 0, 0)), 0);
    }

    #[test]
    fn test_unparseable_timestamp_kept_verbatim() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp);
        std::fs::write(
            ledger.path(),
            "yesterday-ish\t3000\t1\tnode\t/Users/alice/app\n",
        )
        .unwrap();

        let entries = ledger.load().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].started, "yesterday-ish");
        assert_eq!(entries[0].started_at(), None);

        let classifier = PortClassifier::from_home(Path::new("/Users/alice"));
        let history = ledger.history(&classifier, None).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].port, 3000);

        let recs = vec![record(3000, "9", "/Users/alice/app", 0)];
        assert_eq!(ledger.record_new(&recs, at(10, 0, 0)), 0);
    }

    #[test]
    fn test_invalid_utf8_line_does_not_reset_seen_set() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp);
        let mut seeded = b"2026-10-19 09:00:00\t4000\t7\tnode\t/Users/a/caf\xe9\n".to_vec();
        seeded.extend_from_slice(b"2026-10-19 09:00:00\t3000\t1\tnode\t/Users/alice/app\n");
        std::fs::write(ledger.path(), seeded).unwrap();

        let recs = vec![record(3000, "501", "/Users/alice/app", 10)];
        for hour in 10..13 {
            assert_eq!(ledger.record_new(&recs, at(hour, 0, 0)), 0);
        }
        let fresh = vec![record(5000, "502", "/Users/alice/api", 10)];
        assert_eq!(ledger.record_new(&fresh, at(13, 0, 0)), 1);
        assert_eq!(ledger.record_new(&fresh, at(14, 0, 0)), 0);

        assert_eq!(ledger.load().unwrap().len(), 3);
    }

    #[test]
    fn test_huge_uptime_falls_back_to_observation_time() {
        let now = at(12, 0, 0);
        for uptime in [8_640_000_000_000, u64::MAX] {
            let entry = DiscoveryEntry::observed(&record(3000, "1", "/Users/alice/app", uptime), now);
            assert_eq!(entry.started_at(), Some(now));
        }
    }

    #[test]
    fn test_history_filters_and_reverses() {
        let temp = TempDir::new().unwrap();
        let ledger = ledger(&temp);
        let now = at(12, 0, 0);
        ledger
            .append(&[
                DiscoveryEntry::observed(&record(3000, "1", "/Users/alice/a", 0), now),
                DiscoveryEntry::observed(&record(5432, "2", "/usr/local/var", 0), now),
                DiscoveryEntry::observed(&record(4000, "3", "/Users/alice/b", 0), now),
            ])
            .unwrap();

        let classifier = PortClassifier::from_home(Path::new("/Users/alice"));
        let history = ledger.history(&classifier, None).unwrap();
        let ports: Vec<u16> = history.iter().map(|e| e.port).collect();
        assert_eq!(ports, vec![4000, 3000]);

        let limited = ledger.history(&classifier, Some(1)).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].port, 4000);
    }
}
