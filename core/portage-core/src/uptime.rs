//! Uptime formatting for `ps -o etime=` output.
//!
//! Labels are bucketed into minutes, hours or days so the uptime column
//! keeps a stable width.

const SECS_PER_DAY: u64 = 86_400;
const SECS_PER_HOUR: u64 = 3_600;

/// Below this many hours the label is in minutes.
const MINUTES_UNTIL_HOURS: u64 = 3;
/// From this many hours on the label is in days.
const HOURS_UNTIL_DAYS: u64 = 200;

/// Converts `[[days-]hours:]minutes:seconds` into `(label, total_seconds)`.
///
/// Input with an unexpected number of `:` groups comes back unchanged with
/// zero seconds. Non-numeric groups count as zero.
pub fn format_uptime(etime: &str) -> (String, u64) {
    let (days, clock) = match etime.split_once('-') {
        Some((days, rest)) => (parse_group(days), rest),
        None => (0, etime),
    };

    let groups: Vec<&str> = clock.split(':').collect();
    let (hours, minutes, seconds) = match groups.as_slice() {
        [m, s] => (0, parse_group(m), parse_group(s)),
        [h, m, s] => (parse_group(h), parse_group(m), parse_group(s)),
        _ => return (clock.to_string(), 0),
    };

    let total_seconds = days
        .saturating_mul(SECS_PER_DAY)
        .saturating_add(hours.saturating_mul(SECS_PER_HOUR))
        .saturating_add(minutes.saturating_mul(60))
        .saturating_add(seconds);
    let total_hours = days.saturating_mul(24).saturating_add(hours);
    let total_minutes = total_hours.saturating_mul(60).saturating_add(minutes);

    let label = if total_hours < MINUTES_UNTIL_HOURS {
        format!("{}m", total_minutes)
    } else if total_hours >= HOURS_UNTIL_DAYS {
        format!("{}d", total_hours / 24)
    } else {
        format!("{}h", total_hours)
    };

    (label, total_seconds)
}

fn parse_group(group: &str) -> u64 {
    group.trim().parse().unwrap_or(0)
}
