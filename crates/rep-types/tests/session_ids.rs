//! Property tests for generated session identifiers.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use rep_types::{generate_session_id, StatusClass};

proptest! {
    #[test]
    fn test_generated_ids_are_filename_safe(note in "\\PC{0,60}") {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
        let id = generate_session_id(&note, &now);

        prop_assert!(id.starts_with("20240601-080000"));
        let suffix = &id["20240601-080000".len()..];
        if let Some(note_part) = suffix.strip_prefix('-') {
            prop_assert!(!note_part.is_empty());
            prop_assert!(note_part.len() <= 30);
            prop_assert!(!note_part.ends_with('-'));
            prop_assert!(note_part.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        } else {
            prop_assert!(suffix.is_empty());
        }
    }

    #[test]
    fn test_status_class_buckets_by_hundreds(class in 1u16..=5, status in 100u16..600) {
        let parsed: StatusClass = format!("{class}xx").parse().unwrap();
        prop_assert_eq!(parsed.contains(status), status / 100 == class);
    }
}
