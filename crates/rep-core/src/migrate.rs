//! One-shot upgrade of store files written before sessions existed.

use crate::StoreData;
use chrono::{DateTime, Local};
use rep_types::{Session, migration_session_id};

const MIGRATION_NOTE: &str = "Auto-migrated from old format";

/// Move legacy flat `requests` into a single migration session.
///
/// Runs only when the file has legacy requests and no sessions. The legacy
/// fields are cleared afterwards, so a second run finds nothing to do.
/// Returns whether a migration session was created.
pub fn upgrade_legacy(data: &mut StoreData, now: DateTime<Local>) -> bool {
    if data.requests.is_empty() || !data.sessions.is_empty() {
        return false;
    }

    let mut session = Session {
        id: migration_session_id(&now),
        timestamp: now.timestamp_millis(),
        note: MIGRATION_NOTE.to_string(),
        requests: std::mem::take(&mut data.requests),
    };
    session.compute_fields();

    tracing::info!(
        target: "rep::store",
        "Migrated {} legacy request(s) into session {}",
        session.len(),
        session.id
    );

    data.sessions.push(session);
    data.last_import = 0;
    true
}
