//! On-disk shapes written by the capture host and the capture agent.

use crate::Request;
use serde::{Deserialize, Serialize};

/// Format version written into live snapshots.
pub const LIVE_FORMAT_VERSION: &str = "1.0";

/// The live snapshot file (`live.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveSnapshot {
    #[serde(default)]
    pub version: String,
    /// RFC 3339 time of the last write.
    #[serde(default)]
    pub exported_at: String,
    /// Binding of the buffer to one capture run. Survives agent reconnects
    /// while the buffer is non-empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub requests: Vec<Request>,
}

impl Default for LiveSnapshot {
    fn default() -> Self {
        Self {
            version: LIVE_FORMAT_VERSION.to_string(),
            exported_at: String::new(),
            session_id: None,
            requests: Vec::new(),
        }
    }
}

/// A capture agent export file, as accepted by import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportFile {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub exported_at: String,
    #[serde(default)]
    pub requests: Vec<Request>,
}

impl From<LiveSnapshot> for ExportFile {
    fn from(snapshot: LiveSnapshot) -> Self {
        Self {
            version: snapshot.version,
            exported_at: snapshot.exported_at,
            requests: snapshot.requests,
        }
    }
}
