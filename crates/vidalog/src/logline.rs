//! Parsing of the diagnostic tool's timestamped log lines
use std::sync::LazyLock;

use chrono::NaiveTime;
use regex::Regex;

/// One recognized log line
///
/// The timestamp is a time of day with millisecond resolution; the log format
/// carries no date, so a session is assumed to complete within one day and
/// never cross midnight.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: NaiveTime,
    pub message: String,
}

/// `HH:MM:SS,mmm [field][field][field] message`
///
/// The three bracketed metadata fields (thread, level, component) are
/// discarded; the message is everything after them with leading spaces
/// trimmed.
static LOG_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d\d):(\d\d):(\d\d),(\d\d\d) \[.*?\]\[.*?\]\[.*?\] +(.+)$").unwrap()
});

/// Parse one line of log text into a [LogEntry]
///
/// Lines that don't match the entry pattern (including ones whose timestamp
/// digits are out of range) are not errors; they yield `None`.
pub fn parse_log_entry(line: &str) -> Option<LogEntry> {
    let line = line.trim_end_matches(['\r', '\n']);
    let caps = LOG_ENTRY.captures(line)?;

    let hour: u32 = caps[1].parse().ok()?;
    let min: u32 = caps[2].parse().ok()?;
    let sec: u32 = caps[3].parse().ok()?;
    let milli: u32 = caps[4].parse().ok()?;
    let timestamp = NaiveTime::from_hms_milli_opt(hour, min, sec, milli)?;

    Some(LogEntry {
        timestamp,
        message: caps[5].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_entry() {
        let line = "10:30:00,123 [pool-1-thread-8][DEBUG][vehcomm ]  VehComm response: '07AE01'\n";
        let entry = parse_log_entry(line).unwrap();
        assert_eq!(
            entry,
            LogEntry {
                timestamp: NaiveTime::from_hms_milli_opt(10, 30, 0, 123).unwrap(),
                message: String::from("VehComm response: '07AE01'"),
            }
        );
    }

    #[test]
    fn test_leading_spaces_trimmed() {
        let line = "00:00:01,000 [a][b][c]     spaced out";
        let entry = parse_log_entry(line).unwrap();
        assert_eq!(entry.message, "spaced out");
    }

    #[test]
    fn test_not_an_entry() {
        // No timestamp at all
        assert_eq!(parse_log_entry("just some text"), None);
        // Only two bracket fields
        assert_eq!(parse_log_entry("10:30:00,123 [a][b] message"), None);
        // Empty message
        assert_eq!(parse_log_entry("10:30:00,123 [a][b][c] "), None);
        assert_eq!(parse_log_entry(""), None);
    }

    #[test]
    fn test_out_of_range_timestamp_is_not_an_entry() {
        assert_eq!(parse_log_entry("25:30:00,123 [a][b][c] message"), None);
        assert_eq!(parse_log_entry("10:61:00,123 [a][b][c] message"), None);
    }

    #[test]
    fn test_crlf_line_ending() {
        let entry = parse_log_entry("23:59:59,999 [a][b][c] end of day\r\n").unwrap();
        assert_eq!(entry.message, "end of day");
        assert_eq!(
            entry.timestamp,
            NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap()
        );
    }
}
