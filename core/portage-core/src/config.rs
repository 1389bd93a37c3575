//! User configuration loading.
//!
//! `~/.portmon.json` lists ports the user chose to hide, keyed by
//! `"port-pid"`:
//!
//! ```json
//! { "hidden_ports": { "3000-501": true } }
//! ```

use std::collections::BTreeMap;

use fs_err as fs;
use serde::Deserialize;

use crate::storage::StorageConfig;
use crate::types::PortRecord;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub hidden_ports: BTreeMap<String, bool>,
}

impl UserConfig {
    pub fn is_hidden(&self, record: &PortRecord) -> bool {
        self.hidden_ports
            .get(&record.hidden_key())
            .copied()
            .unwrap_or(false)
    }

    /// Drops records the user has hidden.
    pub fn filter_hidden(&self, records: Vec<PortRecord>) -> Vec<PortRecord> {
        records.into_iter().filter(|r| !self.is_hidden(r)).collect()
    }
}

/// Loads the user config, returning defaults if the file is missing or
/// malformed.
pub fn load_user_config(storage: &StorageConfig) -> UserConfig {
    fs::read_to_string(storage.user_config_file())
        .ok()
        .and_then(|c| serde_json::from_str(&c).ok())
        .unwrap_or_default()
}
