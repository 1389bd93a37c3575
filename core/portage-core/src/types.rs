//! Core types shared by the pipeline stages and the CLI.

/// Sentinel for a metadata lookup that produced nothing usable.
pub const NOT_AVAILABLE: &str = "N/A";

// ═══════════════════════════════════════════════════════════════════════════════
// Port Records
// ═══════════════════════════════════════════════════════════════════════════════

/// A listening socket and the process that owns it.
///
/// The parser fills in the listing fields; `working_directory` and the
/// uptime pair start as `N/A`/0 and are filled by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortRecord {
    pub port: u16,
    pub process_id: String,
    pub command: String,
    pub address: String,
    pub owning_user: String,
    pub working_directory: String,
    pub uptime_label: String,
    pub uptime_seconds: u64,
}

impl PortRecord {
    /// Creates an unenriched record straight from a listing line.
    pub fn from_listing(
        port: u16,
        process_id: &str,
        command: &str,
        owning_user: &str,
        address: &str,
    ) -> Self {
        Self {
            port,
            process_id: process_id.to_string(),
            command: command.to_string(),
            address: address.to_string(),
            owning_user: owning_user.to_string(),
            working_directory: NOT_AVAILABLE.to_string(),
            uptime_label: NOT_AVAILABLE.to_string(),
            uptime_seconds: 0,
        }
    }

    /// Identity key within one run.
    pub fn key(&self) -> (u16, &str) {
        (self.port, self.process_id.as_str())
    }

    /// Key used by the hidden-ports config (`"3000-501"`).
    pub fn hidden_key(&self) -> String {
        format!("{}-{}", self.port, self.process_id)
    }

    /// True when the working directory resolved to something other than
    /// the sentinel or the filesystem root.
    pub fn has_meaningful_directory(&self) -> bool {
        is_meaningful_directory(&self.working_directory)
    }
}

pub(crate) fn is_meaningful_directory(path: &str) -> bool {
    path != NOT_AVAILABLE && path != "/"
}

// ═══════════════════════════════════════════════════════════════════════════════
// Sort Order
// ═══════════════════════════════════════════════════════════════════════════════

/// Ordering applied to the final port list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    /// Ascending by port number.
    Port,
    /// Descending by uptime, longest-running first.
    #[default]
    Uptime,
}

impl std::str::FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "port" => Ok(SortKey::Port),
            "uptime" => Ok(SortKey::Uptime),
            other => Err(format!("unknown sort key: {}", other)),
        }
    }
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortKey::Port => write!(f, "port"),
            SortKey::Uptime => write!(f, "uptime"),
        }
    }
}
