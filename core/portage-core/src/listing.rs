//! Parser for `lsof -i -P -n` output.
//!
//! Only sockets in the accept state are kept. A line looks like:
//!
//! ```text
//! node  501 alice  23u  IPv4 0x1234  0t0  TCP 127.0.0.1:3000 (LISTEN)
//! ```
//!
//! Anything that does not fit that shape is dropped without complaint.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::PortRecord;

/// Token lsof prints for sockets in the accept state.
pub const LISTEN_MARKER: &str = "LISTEN";

/// Fewer fields than this means the line is not a socket row.
const MIN_FIELDS: usize = 10;

static RE_LISTEN_PORT: Lazy<Regex> = Lazy::new(|| Regex::new(r":(\d+)\s+\(LISTEN\)").unwrap());

/// Parses raw listing text into unenriched port records.
///
/// Records come out in input order, deduplicated by (port, pid) with the
/// first occurrence kept.
pub fn parse_listing(output: &str) -> Vec<PortRecord> {
    let mut seen: HashSet<(u16, String)> = HashSet::new();
    let mut records = Vec::new();

    for line in output.lines() {
        let Some(record) = parse_line(line) else {
            continue;
        };
        if seen.insert((record.port, record.process_id.clone())) {
            records.push(record);
        }
    }

    records
}

fn parse_line(line: &str) -> Option<PortRecord> {
    if !line.contains(LISTEN_MARKER) {
        return None;
    }

    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < MIN_FIELDS {
        return None;
    }

    let captures = RE_LISTEN_PORT.captures(line)?;
    let port: u16 = captures.get(1)?.as_str().parse().ok()?;
    if port == 0 {
        return None;
    }

    Some(PortRecord::from_listing(
        port, fields[1], fields[0], fields[2], fields[8],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "COMMAND   PID  USER   FD   TYPE             DEVICE SIZE/OFF NODE NAME";

    fn line(command: &str, pid: &str, address: &str, state: &str) -> String {
        format!(
            "{} {} alice 23u IPv4 0xabc123 0t0 TCP {} {}",
            command, pid, address, state
        )
    }

    #[test]
    fn test_parses_single_listen_line() {
        let output = format!(
            "{}\n{}\n",
            HEADER,
            line("node", "501", "127.0.0.1:3000", "(LISTEN)")
        );
        let records = parse_listing(&output);

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.port, 3000);
        assert_eq!(record.process_id, "501");
        assert_eq!(record.command, "node");
        assert_eq!(record.owning_user, "alice");
        assert_eq!(record.address, "127.0.0.1:3000");
    }

    #[test]
    fn test_skips_established_connections() {
        let output = "node 501 alice 24u IPv4 0xabc 0t0 TCP 127.0.0.1:3000->127.0.0.1:52000 (ESTABLISHED)";
        assert!(parse_listing(output).is_empty());
    }

    #[test]
    fn test_skips_short_lines() {
        let output = "node 501 alice TCP 127.0.0.1:3000 (LISTEN)";
        assert!(parse_listing(output).is_empty());
    }

    #[test]
    fn test_skips_unparseable_port() {
        let output = line("node", "501", "127.0.0.1:99999", "(LISTEN)");
        assert!(parse_listing(&output).is_empty());
    }

    #[test]
    fn test_skips_line_without_port_token() {
        let output = line("node", "501", "127.0.0.1:http", "(LISTEN)");
        assert!(parse_listing(&output).is_empty());
    }

    #[test]
    fn test_dedups_same_port_and_pid() {
        let output = [
            line("node", "501", "127.0.0.1:3000", "(LISTEN)"),
            line("node", "501", "[::1]:3000", "(LISTEN)"),
            line("node", "777", "*:3000", "(LISTEN)"),
        ]
        .join("\n");
        let records = parse_listing(&output);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].address, "127.0.0.1:3000");
        assert_eq!(records[1].process_id, "777");
    }

    #[test]
    fn test_preserves_input_order() {
        let output = [
            line("python", "9", "*:8000", "(LISTEN)"),
            line("node", "501", "127.0.0.1:3000", "(LISTEN)"),
        ]
        .join("\n");
        let ports: Vec<u16> = parse_listing(&output).iter().map(|r| r.port).collect();
        assert_eq!(ports, vec![8000, 3000]);
    }

    #[test]
    fn test_ipv6_wildcard_address() {
        let output = line("vite", "88", "*:5173", "(LISTEN)");
        let records = parse_listing(&output);
        assert_eq!(records[0].port, 5173);
        assert_eq!(records[0].address, "*:5173");
    }
}
