//! Archived capture sessions.

use crate::Request;
use chrono::{DateTime, TimeZone};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Longest note fragment kept in a generated session ID.
const MAX_NOTE_LEN: usize = 30;

static NOTE_DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9-]").expect("static regex"));

/// A named, immutable snapshot of captured requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// `YYYYMMDD-HHMMSS` or `YYYYMMDD-HHMMSS-note`.
    pub id: String,
    /// Creation time, ms since Unix epoch.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub note: String,
    #[serde(default)]
    pub requests: Vec<Request>,
}

impl Session {
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Recompute derived fields on every request.
    pub fn compute_fields(&mut self) {
        for request in &mut self.requests {
            request.compute_fields();
        }
    }
}

/// Build a session ID from a timestamp and an optional free-text note.
///
/// The note is lowercased, spaces become hyphens, anything outside
/// `[a-z0-9-]` is dropped and the result is cut to 30 characters.
pub fn generate_session_id<Tz>(note: &str, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let base = now.format("%Y%m%d-%H%M%S").to_string();
    let sanitized = sanitize_note(note);
    if sanitized.is_empty() {
        base
    } else {
        format!("{base}-{sanitized}")
    }
}

/// ID of the session synthesized when upgrading a legacy store file.
pub fn migration_session_id<Tz>(now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("migrated-{}", now.format("%Y%m%d"))
}

fn sanitize_note(note: &str) -> String {
    let lowered = note.to_lowercase().replace(' ', "-");
    let mut cleaned = NOTE_DISALLOWED.replace_all(&lowered, "").into_owned();
    // Only ASCII survives the regex, so byte truncation is safe.
    cleaned.truncate(MAX_NOTE_LEN);
    cleaned.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 5).unwrap()
    }

    #[test]
    fn test_session_id_without_note() {
        assert_eq!(generate_session_id("", &fixed_time()), "20240115-093005");
    }

    #[test]
    fn test_session_id_sanitizes_note() {
        assert_eq!(
            generate_session_id("Auth Flow #2!", &fixed_time()),
            "20240115-093005-auth-flow-2"
        );
    }

    #[test]
    fn test_session_id_note_that_sanitizes_to_nothing() {
        assert_eq!(generate_session_id("!!! ???", &fixed_time()), "20240115-093005");
    }

    #[test]
    fn test_session_id_truncates_and_trims_hyphens() {
        let note = "a very long note that keeps going - and on";
        let id = generate_session_id(note, &fixed_time());
        let suffix = id.strip_prefix("20240115-093005-").unwrap();
        assert!(suffix.len() <= MAX_NOTE_LEN);
        assert!(!suffix.ends_with('-'));
        assert_eq!(suffix, "a-very-long-note-that-keeps-go");
    }

    #[test]
    fn test_migration_session_id() {
        assert_eq!(migration_session_id(&fixed_time()), "migrated-20240115");
    }
}
