//! Per-process metadata resolution with a per-run cache.
//!
//! A dev server often listens on several sockets (IPv4 + IPv6, app + HMR
//! port), so many records share a pid. Each distinct pid is looked up once
//! per run; later records reuse the cached tuple.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::probe::ProcessProbe;
use crate::types::{PortRecord, NOT_AVAILABLE};
use crate::uptime::format_uptime;

/// Line prefix lsof uses for the name field in `-F` output.
const PATH_MARKER: char = 'n';

/// Resolved metadata for one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessMetadata {
    pub working_directory: String,
    pub uptime_label: String,
    pub uptime_seconds: u64,
}

impl ProcessMetadata {
    fn unavailable() -> Self {
        Self {
            working_directory: NOT_AVAILABLE.to_string(),
            uptime_label: NOT_AVAILABLE.to_string(),
            uptime_seconds: 0,
        }
    }
}

/// Memoized metadata keyed by pid. Owned by the caller and scoped to a
/// single pipeline execution.
#[derive(Debug, Default)]
pub struct MetadataCache {
    entries: HashMap<String, ProcessMetadata>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, pid: &str) -> Option<&ProcessMetadata> {
        self.entries.get(pid)
    }

    pub fn contains(&self, pid: &str) -> bool {
        self.entries.contains_key(pid)
    }

    pub fn insert(&mut self, pid: String, metadata: ProcessMetadata) {
        self.entries.insert(pid, metadata);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Timing for one resolved process, kept for `--debug` output.
#[derive(Debug, Clone)]
pub struct ProcessTiming {
    pub pid: String,
    pub command: String,
    pub duration: Duration,
}

/// What a call to `Resolver::enrich` did.
#[derive(Debug, Default)]
pub struct ResolveReport {
    /// Number of pids that needed external lookups.
    pub unique_processes: usize,
    pub timings: Vec<ProcessTiming>,
}

impl ResolveReport {
    /// The `n` slowest resolutions, slowest first.
    pub fn slowest(&self, n: usize) -> Vec<&ProcessTiming> {
        let mut sorted: Vec<&ProcessTiming> = self.timings.iter().collect();
        sorted.sort_by(|a, b| b.duration.cmp(&a.duration));
        sorted.truncate(n);
        sorted
    }
}

/// Resolves working directory and uptime through a probe.
pub struct Resolver<'a, P: ProcessProbe + ?Sized> {
    probe: &'a P,
    concurrency: usize,
}

impl<'a, P: ProcessProbe + ?Sized> Resolver<'a, P> {
    pub fn new(probe: &'a P) -> Self {
        Self {
            probe,
            concurrency: 1,
        }
    }

    /// Resolve up to `limit` processes at once on scoped threads.
    /// A limit of 0 or 1 resolves sequentially.
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    /// Looks up one process without consulting any cache.
    pub fn resolve_pid(&self, pid: &str) -> ProcessMetadata {
        let working_directory = self
            .probe
            .working_directory(pid)
            .map(|out| parse_working_directory(&out))
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        let (uptime_label, uptime_seconds) =
            parse_elapsed_time(self.probe.elapsed_time(pid).as_deref());

        ProcessMetadata {
            working_directory,
            uptime_label,
            uptime_seconds,
        }
    }

    /// Fills in metadata for every record, resolving each uncached pid once.
    ///
    /// Record order is untouched regardless of the order lookups finish in.
    pub fn enrich(&self, records: &mut [PortRecord], cache: &mut MetadataCache) -> ResolveReport {
        let mut pending: Vec<(String, String)> = Vec::new();
        let mut queued: HashSet<&str> = HashSet::new();
        for record in records.iter() {
            if !cache.contains(&record.process_id) && queued.insert(&record.process_id) {
                pending.push((record.process_id.clone(), record.command.clone()));
            }
        }

        let mut report = ResolveReport {
            unique_processes: pending.len(),
            timings: Vec::with_capacity(pending.len()),
        };

        if self.concurrency <= 1 {
            for (pid, command) in pending {
                let started = Instant::now();
                let metadata = self.resolve_pid(&pid);
                report.timings.push(ProcessTiming {
                    pid: pid.clone(),
                    command,
                    duration: started.elapsed(),
                });
                cache.insert(pid, metadata);
            }
        } else {
            for chunk in pending.chunks(self.concurrency) {
                let resolved = self.resolve_chunk(chunk);
                for ((pid, command), (metadata, duration)) in chunk.iter().zip(resolved) {
                    report.timings.push(ProcessTiming {
                        pid: pid.clone(),
                        command: command.clone(),
                        duration,
                    });
                    cache.insert(pid.clone(), metadata);
                }
            }
        }

        for record in records.iter_mut() {
            if let Some(metadata) = cache.get(&record.process_id) {
                record.working_directory = metadata.working_directory.clone();
                record.uptime_label = metadata.uptime_label.clone();
                record.uptime_seconds = metadata.uptime_seconds;
            }
        }

        debug!(
            unique_processes = report.unique_processes,
            cached = cache.len(),
            "resolved process metadata"
        );
        report
    }

    fn resolve_chunk(&self, chunk: &[(String, String)]) -> Vec<(ProcessMetadata, Duration)> {
        std::thread::scope(|scope| {
            let handles: Vec<_> = chunk
                .iter()
                .map(|(pid, _)| {
                    scope.spawn(move || {
                        let started = Instant::now();
                        let metadata = self.resolve_pid(pid);
                        (metadata, started.elapsed())
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|_| (ProcessMetadata::unavailable(), Duration::ZERO))
                })
                .collect()
        })
    }
}

/// Extracts the working directory from `lsof -Fn` output.
///
/// The first `n`-prefixed line with a non-empty remainder wins; no such
/// line yields `N/A`.
pub fn parse_working_directory(output: &str) -> String {
    output
        .lines()
        .filter_map(|line| line.strip_prefix(PATH_MARKER))
        .find(|path| !path.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Turns raw `ps -o etime=` output into an uptime pair.
pub fn parse_elapsed_time(output: Option<&str>) -> (String, u64) {
    match output.map(str::trim) {
        Some(etime) if !etime.is_empty() => format_uptime(etime),
        _ => (NOT_AVAILABLE.to_string(), 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PortageError, Result};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingProbe {
        cwd_calls: AtomicUsize,
        etime_calls: AtomicUsize,
    }

    impl ProcessProbe for CountingProbe {
        fn socket_listing(&self) -> Result<String> {
            Err(PortageError::ListingUnavailable {
                details: "not used".to_string(),
            })
        }

        fn working_directory(&self, pid: &str) -> Option<String> {
            self.cwd_calls.fetch_add(1, Ordering::SeqCst);
            match pid {
                "404" => None,
                _ => Some(format!("p{}\nfcwd\nn/Users/alice/app-{}\n", pid, pid)),
            }
        }

        fn elapsed_time(&self, pid: &str) -> Option<String> {
            self.etime_calls.fetch_add(1, Ordering::SeqCst);
            match pid {
                "404" => None,
                _ => Some("  01:00:00\n".to_string()),
            }
        }

        fn editor_window_titles(&self) -> Option<String> {
            None
        }

        fn assistant_processes(&self) -> Option<String> {
            None
        }

        fn open_files(&self, _pid: &str) -> Option<String> {
            None
        }
    }

    fn records(pids: &[(u16, &str)]) -> Vec<PortRecord> {
        pids.iter()
            .map(|(port, pid)| PortRecord::from_listing(*port, pid, "node", "alice", "*:0"))
            .collect()
    }

    #[test]
    fn test_parse_working_directory_first_n_line() {
        let output = "p501\nfcwd\nn/Users/alice/app\nn/other\n";
        assert_eq!(parse_working_directory(output), "/Users/alice/app");
    }

    #[test]
    fn test_parse_working_directory_skips_empty_name() {
        assert_eq!(parse_working_directory("p1\nn\nn/tmp/x\n"), "/tmp/x");
    }

    #[test]
    fn test_parse_working_directory_missing() {
        assert_eq!(parse_working_directory("p501\nfcwd\n"), NOT_AVAILABLE);
    }

    #[test]
    fn test_parse_elapsed_time_empty() {
        assert_eq!(parse_elapsed_time(Some("   \n")), ("N/A".to_string(), 0));
        assert_eq!(parse_elapsed_time(None), ("N/A".to_string(), 0));
    }

    #[test]
    fn test_shared_pid_resolved_once() {
        let probe = CountingProbe::default();
        let resolver = Resolver::new(&probe);
        let mut cache = MetadataCache::new();
        let mut recs = records(&[(3000, "501"), (3001, "501"), (24678, "501")]);

        let report = resolver.enrich(&mut recs, &mut cache);

        assert_eq!(report.unique_processes, 1);
        assert_eq!(probe.cwd_calls.load(Ordering::SeqCst), 1);
        assert_eq!(probe.etime_calls.load(Ordering::SeqCst), 1);
        assert!(recs
            .iter()
            .all(|r| r.working_directory == "/Users/alice/app-501" && r.uptime_label == "60m"));
    }

    #[test]
    fn test_cache_survives_across_enrich_calls() {
        let probe = CountingProbe::default();
        let resolver = Resolver::new(&probe);
        let mut cache = MetadataCache::new();

        let mut first = records(&[(3000, "501")]);
        resolver.enrich(&mut first, &mut cache);
        let mut second = records(&[(4000, "501"), (5000, "9")]);
        let report = resolver.enrich(&mut second, &mut cache);

        assert_eq!(report.unique_processes, 1);
        assert_eq!(probe.cwd_calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_failed_lookups_degrade_to_sentinel() {
        let probe = CountingProbe::default();
        let resolver = Resolver::new(&probe);
        let mut cache = MetadataCache::new();
        let mut recs = records(&[(3000, "404")]);

        resolver.enrich(&mut recs, &mut cache);

        assert_eq!(recs[0].working_directory, NOT_AVAILABLE);
        assert_eq!(recs[0].uptime_label, NOT_AVAILABLE);
        assert_eq!(recs[0].uptime_seconds, 0);
    }

    #[test]
    fn test_concurrent_resolution_matches_sequential() {
        let probe = CountingProbe::default();
        let resolver = Resolver::new(&probe).with_concurrency(4);
        let mut cache = MetadataCache::new();
        let mut recs = records(&[
            (3000, "1"),
            (3001, "2"),
            (3002, "3"),
            (3003, "1"),
            (3004, "5"),
            (3005, "6"),
        ]);

        let report = resolver.enrich(&mut recs, &mut cache);

        assert_eq!(report.unique_processes, 5);
        assert_eq!(probe.cwd_calls.load(Ordering::SeqCst), 5);
        let ports: Vec<u16> = recs.iter().map(|r| r.port).collect();
        assert_eq!(ports, vec![3000, 3001, 3002, 3003, 3004, 3005]);
        assert_eq!(recs[3].working_directory, "/Users/alice/app-1");
    }

    #[test]
    fn test_slowest_is_bounded() {
        let report = ResolveReport {
            unique_processes: 3,
            timings: vec![
                ProcessTiming {
                    pid: "1".into(),
                    command: "a".into(),
                    duration: Duration::from_millis(5),
                },
                ProcessTiming {
                    pid: "2".into(),
                    command: "b".into(),
                    duration: Duration::from_millis(50),
                },
                ProcessTiming {
                    pid: "3".into(),
                    command: "c".into(),
                    duration: Duration::from_millis(20),
                },
            ],
        };
        let slowest: Vec<&str> = report.slowest(2).iter().map(|t| t.pid.as_str()).collect();
        assert_eq!(slowest, vec!["2", "3"]);
    }
}
