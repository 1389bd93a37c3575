//! Deduplication and ordering of the final port list.

use std::collections::HashSet;

use crate::types::{PortRecord, SortKey};

/// Drops repeated (port, pid) pairs, keeping the first record for each.
pub fn dedup_records(records: Vec<PortRecord>) -> Vec<PortRecord> {
    let mut seen: HashSet<(u16, String)> = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|record| seen.insert((record.port, record.process_id.clone())))
        .collect()
}

/// Stable sort, so equal keys keep their discovery order.
pub fn sort_records(records: &mut [PortRecord], key: SortKey) {
    match key {
        SortKey::Port => records.sort_by_key(|r| r.port),
        SortKey::Uptime => records.sort_by(|a, b| b.uptime_seconds.cmp(&a.uptime_seconds)),
    }
}

/// Dedup, drop root-directory processes, then sort.
pub fn finalize_records(records: Vec<PortRecord>, key: SortKey) -> Vec<PortRecord> {
    let mut records: Vec<PortRecord> = dedup_records(records)
        .into_iter()
        .filter(|r| r.working_directory != "/")
        .collect();
    sort_records(&mut records, key);
    records
}
