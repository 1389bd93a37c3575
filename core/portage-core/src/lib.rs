//! # portage-core
//!
//! Engine behind the `portage` CLI: finds locally listening ports, ties each
//! to its owning process, and reconciles them with Cursor workspaces and
//! Claude Code sessions.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime. Resolver fan-out uses scoped threads.
//! - **Probe seam**: Every external command sits behind `ProcessProbe`;
//!   the pipeline only parses output.
//! - **Graceful degradation**: Only a failed socket listing is fatal.
//!   Missing editor, assistant or log files mean empty inputs.
//! - **Append-only state**: Both ledgers are flat text files that are
//!   never rewritten.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use portage_core::{PortageEngine, ScanOptions};
//!
//! let engine = PortageEngine::new()?;
//! let ports = engine.scan(&ScanOptions::default())?.records;
//! let unified = engine.unified(&ScanOptions::default())?;
//! ```

pub mod assistant;
pub mod classify;
pub mod config;
pub mod discovery;
pub mod editor;
pub mod engine;
pub mod error;
pub mod history;
pub mod listing;
pub mod ordering;
pub mod probe;
pub mod projection;
pub mod reconcile;
pub mod resolver;
pub mod storage;
pub mod types;
pub mod uptime;
pub mod workspace_log;

// Re-export commonly used items at crate root
pub use assistant::{AssistantSession, HistoryEntry, LiveAssistantSession};
pub use classify::PortClassifier;
pub use config::{load_user_config, UserConfig};
pub use discovery::{DiscoveryEntry, DiscoveryLedger};
pub use editor::EditorWorkspace;
pub use engine::{PortageEngine, ScanOptions, ScanOutcome};
pub use error::{PortageError, Result};
pub use history::{HistorySource, WorkspaceHistoryEntry};
pub use listing::parse_listing;
pub use probe::{ProcessProbe, SystemProbe};
pub use reconcile::{reconcile, ReconcileInput, ReconciledItem};
pub use resolver::{MetadataCache, ProcessMetadata, ResolveReport, Resolver};
pub use storage::StorageConfig;
pub use types::{PortRecord, SortKey, NOT_AVAILABLE};
pub use uptime::format_uptime;
pub use workspace_log::{ClosedWorkspace, WorkspaceEvent, WorkspaceEventKind, WorkspaceLedger};
