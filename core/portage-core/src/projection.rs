//! JSON output contracts.
//!
//! Field names here are consumed by editor extensions and shell scripts;
//! renaming any of them is a breaking change.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::editor::EditorWorkspace;
use crate::reconcile::ReconciledItem;
use crate::types::PortRecord;

/// Port listing row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortJson {
    pub port: u16,
    pub command: String,
    pub pid: String,
    pub uptime: String,
    pub uptime_seconds: u64,
    pub address: String,
    pub path: String,
}

impl From<&PortRecord> for PortJson {
    fn from(record: &PortRecord) -> Self {
        Self {
            port: record.port,
            command: record.command.clone(),
            pid: record.process_id.clone(),
            uptime: record.uptime_label.clone(),
            uptime_seconds: record.uptime_seconds,
            address: record.address.clone(),
            path: record.working_directory.clone(),
        }
    }
}

/// Port as nested inside a reconciled item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnifiedPortJson {
    pub port: u16,
    pub command: String,
    pub pid: String,
    pub uptime: String,
    pub workdir: String,
}

impl From<&PortRecord> for UnifiedPortJson {
    fn from(record: &PortRecord) -> Self {
        Self {
            port: record.port,
            command: record.command.clone(),
            pid: record.process_id.clone(),
            uptime: record.uptime_label.clone(),
            workdir: record.working_directory.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnifiedItemType {
    Workspace,
    Orphaned,
}

/// Reconciled view item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnifiedItemJson {
    #[serde(rename = "type")]
    pub item_type: UnifiedItemType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_active: Option<i64>,
    pub ports: Vec<UnifiedPortJson>,
}

impl From<&ReconciledItem> for UnifiedItemJson {
    fn from(item: &ReconciledItem) -> Self {
        match item {
            ReconciledItem::Workspace {
                path,
                name,
                last_active_seconds,
                ports,
            } => Self {
                item_type: UnifiedItemType::Workspace,
                workspace_path: Some(path.clone()),
                workspace_name: Some(name.clone()),
                last_active: Some(*last_active_seconds),
                ports: ports.iter().map(UnifiedPortJson::from).collect(),
            },
            ReconciledItem::Orphaned { ports } => Self {
                item_type: UnifiedItemType::Orphaned,
                workspace_path: None,
                workspace_name: None,
                last_active: None,
                ports: ports.iter().map(UnifiedPortJson::from).collect(),
            },
        }
    }
}

/// Recently closed workspace row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClosedWorkspaceJson {
    pub path: String,
}

/// Open editor workspace row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditorWorkspaceJson {
    pub path: String,
    pub last_modified: String,
    pub last_modified_unix: i64,
    pub seconds_since_active: i64,
}

impl EditorWorkspaceJson {
    pub fn new(workspace: &EditorWorkspace, now: DateTime<Utc>) -> Self {
        Self {
            path: workspace.path.clone(),
            last_modified: workspace
                .last_modified
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            last_modified_unix: workspace.last_modified.timestamp(),
            seconds_since_active: workspace.seconds_since_active(now),
        }
    }
}

pub fn ports_json(records: &[PortRecord]) -> Vec<PortJson> {
    records.iter().map(PortJson::from).collect()
}

pub fn unified_json(items: &[ReconciledItem]) -> Vec<UnifiedItemJson> {
    items.iter().map(UnifiedItemJson::from).collect()
}
