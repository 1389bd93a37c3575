//! PortageEngine - the single entry point the CLI drives.
//!
//! The engine owns the storage layout, the probe and the classifier, and
//! wires the pipeline stages together:
//!
//! ```text
//! listing -> resolver (cached) -> classifier -> hidden filter
//!         -> dedup/sort -> discovery ledger -> reconciler
//! ```
//!
//! Every call is independent. The metadata cache is created per call (or
//! passed in by the caller) and dropped when the call returns.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use portage_core::{PortageEngine, ScanOptions};
//!
//! let engine = PortageEngine::new()?;
//! let outcome = engine.scan(&ScanOptions::default())?;
//! for record in &outcome.records {
//!     println!("{} {}", record.port, record.command);
//! }
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;

use chrono::{Local, NaiveDateTime, Utc};
use tracing::{debug, warn};

use crate::assistant::{self, AssistantSession, HistoryEntry, LiveAssistantSession};
use crate::classify::PortClassifier;
use crate::config::load_user_config;
use crate::discovery::{DiscoveryEntry, DiscoveryLedger};
use crate::editor::{self, EditorWorkspace, UNFILTERED_WORKSPACE_LIMIT};
use crate::error::Result;
use crate::history::{self, WorkspaceHistoryEntry};
use crate::listing::parse_listing;
use crate::ordering::finalize_records;
use crate::probe::{ProcessProbe, SystemProbe};
use crate::reconcile::{reconcile, ReconcileInput, ReconciledItem};
use crate::resolver::{MetadataCache, ResolveReport, Resolver};
use crate::storage::StorageConfig;
use crate::types::{PortRecord, SortKey};
use crate::workspace_log::{self, ClosedWorkspace, WorkspaceLedger};

/// How many of the slowest resolutions `--debug` reports.
const SLOWEST_REPORTED: usize = 5;

/// Options for one port scan.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub sort: SortKey,
    /// Skip the user-relevance filter (`--all`).
    pub include_all: bool,
    /// Max processes resolved at once.
    pub concurrency: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            sort: SortKey::default(),
            include_all: false,
            concurrency: 1,
        }
    }
}

/// Result of a scan: the final records plus what it took to get them.
#[derive(Debug)]
pub struct ScanOutcome {
    pub records: Vec<PortRecord>,
    pub report: ResolveReport,
    /// Entries appended to the discovery ledger by this scan.
    pub newly_logged: usize,
}

/// The main engine for Portage operations.
pub struct PortageEngine<P: ProcessProbe = SystemProbe> {
    storage: StorageConfig,
    probe: P,
    classifier: PortClassifier,
}

impl PortageEngine<SystemProbe> {
    /// Creates an engine over the real home directory and system commands.
    pub fn new() -> Result<Self> {
        Ok(Self::with_probe(StorageConfig::from_env()?, SystemProbe::new()))
    }
}

impl<P: ProcessProbe> PortageEngine<P> {
    /// Creates an engine with custom storage and probe.
    ///
    /// Used by tests with temp directories and scripted probes.
    pub fn with_probe(storage: StorageConfig, probe: P) -> Self {
        let classifier = PortClassifier::from_home(storage.home());
        Self {
            storage,
            probe,
            classifier,
        }
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    pub fn classifier(&self) -> &PortClassifier {
        &self.classifier
    }

    pub fn discovery_ledger(&self) -> DiscoveryLedger {
        DiscoveryLedger::new(self.storage.discovery_log_file())
    }

    pub fn workspace_ledger(&self) -> WorkspaceLedger {
        WorkspaceLedger::new(self.storage.workspace_log_file())
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Ports
    // ─────────────────────────────────────────────────────────────────────────────

    /// Runs the full port pipeline with a fresh cache, observed now.
    pub fn scan(&self, options: &ScanOptions) -> Result<ScanOutcome> {
        let mut cache = MetadataCache::new();
        self.scan_with_cache(options, &mut cache, Local::now().naive_local())
    }

    /// Runs the full port pipeline against a caller-owned cache.
    ///
    /// Fails only when the socket listing cannot be obtained.
    pub fn scan_with_cache(
        &self,
        options: &ScanOptions,
        cache: &mut MetadataCache,
        now: NaiveDateTime,
    ) -> Result<ScanOutcome> {
        let started = Instant::now();

        let listing = self.probe.socket_listing()?;
        let mut records = parse_listing(&listing);
        debug!(ports = records.len(), elapsed = ?started.elapsed(), "parsed socket listing");

        let resolve_started = Instant::now();
        let report = Resolver::new(&self.probe)
            .with_concurrency(options.concurrency)
            .enrich(&mut records, cache);
        debug!(elapsed = ?resolve_started.elapsed(), "process scan timing");
        for timing in report.slowest(SLOWEST_REPORTED) {
            debug!(pid = %timing.pid, command = %timing.command, duration = ?timing.duration, "slow process");
        }

        if !options.include_all {
            records.retain(|r| self.classifier.is_user_port(r));
        }
        let records = load_user_config(&self.storage).filter_hidden(records);
        let records = finalize_records(records, options.sort);

        let newly_logged = self.discovery_ledger().record_new(&records, now);
        debug!(total = ?started.elapsed(), records = records.len(), "scan finished");

        Ok(ScanOutcome {
            records,
            report,
            newly_logged,
        })
    }

    /// User-relevant discovery ledger entries, most recent first.
    pub fn discovery_history(&self, limit: Option<usize>) -> Result<Vec<DiscoveryEntry>> {
        self.discovery_ledger().history(&self.classifier, limit)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Editor
    // ─────────────────────────────────────────────────────────────────────────────

    /// Paths of open Cursor windows, or `None` when they cannot be queried.
    pub fn open_windows(&self) -> Option<HashSet<String>> {
        self.probe
            .editor_window_titles()
            .map(|titles| editor::parse_window_titles(&titles, &self.storage))
    }

    /// Workspaces known to Cursor, restricted to open windows when those
    /// are known.
    pub fn editor_workspaces(&self, open: Option<&HashSet<String>>) -> Vec<EditorWorkspace> {
        editor::scan_workspace_storage(&self.storage.cursor_workspace_storage_dir(), open)
    }

    /// The `--cursor` view: open workspaces, or the most recently active
    /// few when window titles are unavailable. Oldest first.
    pub fn active_editor_workspaces(&self, open: Option<&HashSet<String>>) -> Vec<EditorWorkspace> {
        let filtered = open.is_some_and(|set| !set.is_empty());
        let mut workspaces = self.editor_workspaces(open);
        if !filtered && workspaces.len() > UNFILTERED_WORKSPACE_LIMIT {
            workspaces.drain(..workspaces.len() - UNFILTERED_WORKSPACE_LIMIT);
        }
        workspaces
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Workspace events
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn log_close(&self, path: &str) -> Result<()> {
        self.workspace_ledger().add_close(path)
    }

    pub fn log_open(&self, path: &str) -> Result<()> {
        self.workspace_ledger().add_open(path)
    }

    /// Closed workspaces, excluding any currently open in a live window.
    pub fn closed_workspaces(&self, open: &HashSet<String>) -> Result<Vec<ClosedWorkspace>> {
        let events = self.workspace_ledger().read_events()?;
        Ok(workspace_log::closed_workspaces(&events, open, path_exists))
    }

    /// Recently closed workspace paths, topped up from Cursor's own
    /// recently-opened list.
    pub fn recently_closed(&self, limit: usize) -> Result<Vec<String>> {
        let open = self.open_windows().unwrap_or_default();
        let closed = self.closed_workspaces(&open)?;

        let db = self.storage.cursor_global_state_db();
        let recent = if db.exists() {
            editor::recently_opened_paths(&db).unwrap_or_else(|err| {
                warn!(error = %err, "could not read Cursor recently-opened list");
                Vec::new()
            })
        } else {
            Vec::new()
        };

        Ok(history::recently_closed(&closed, &recent, &open, path_exists, limit))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Assistant
    // ─────────────────────────────────────────────────────────────────────────────

    /// Raw Claude prompt history. Missing file is an error.
    pub fn assistant_entries(&self) -> Result<Vec<HistoryEntry>> {
        assistant::load_history(&self.storage.claude_history_file())
    }

    /// Claude sessions grouped from history, most recent first.
    pub fn assistant_history(&self) -> Result<Vec<AssistantSession>> {
        Ok(assistant::group_sessions(&self.assistant_entries()?))
    }

    /// Running Claude processes. Never fails; missing history only means
    /// session ids are unknown.
    pub fn live_sessions(&self) -> Vec<LiveAssistantSession> {
        let history = self.assistant_entries().unwrap_or_else(|err| {
            debug!(error = %err, "no Claude history for session ids");
            Vec::new()
        });
        assistant::live_sessions(&self.probe, &history)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Combined views
    // ─────────────────────────────────────────────────────────────────────────────

    /// Claude sessions and closed Cursor workspaces on one timeline.
    pub fn workspace_history(&self, limit: usize) -> Result<Vec<WorkspaceHistoryEntry>> {
        let sessions = self.assistant_history().unwrap_or_else(|err| {
            debug!(error = %err, "no Claude history for combined view");
            Vec::new()
        });
        let open = self.open_windows().unwrap_or_default();
        let closed = self.closed_workspaces(&open)?;
        Ok(history::combined_history(&sessions, &closed, limit))
    }

    /// The `--unified` view: user ports grouped under the workspaces they
    /// run in. System ports are always filtered out, whatever
    /// `include_all` says.
    pub fn unified(&self, options: &ScanOptions) -> Result<Vec<ReconciledItem>> {
        let options = ScanOptions {
            include_all: false,
            ..options.clone()
        };
        let outcome = self.scan(&options)?;

        let open = self.open_windows();
        let editor_workspaces = self.editor_workspaces(open.as_ref());
        let closed = self
            .closed_workspaces(&open.unwrap_or_default())
            .unwrap_or_else(|err| {
                warn!(error = %err, "workspace log unreadable");
                Vec::new()
            });
        let sessions = self.live_sessions();

        Ok(reconcile(ReconcileInput {
            ports: &outcome.records,
            editor_workspaces: &editor_workspaces,
            closed: &closed,
            sessions: &sessions,
            now: Utc::now(),
        }))
    }
}

fn path_exists(path: &str) -> bool {
    Path::new(path).exists()
}
