//! Fingerprint-based de-duplication.

use rep_types::Request;
use std::collections::HashSet;

/// Drop requests that share an index key (content hash or stable ID) with
/// an earlier request. First occurrences keep their order.
pub fn dedup_requests(requests: Vec<Request>) -> Vec<Request> {
    let total = requests.len();
    let mut seen: HashSet<String> = HashSet::new();
    let mut kept = Vec::with_capacity(total);

    for req in requests {
        let keys = req.index_keys();
        if keys.iter().any(|k| seen.contains(k)) {
            continue;
        }
        seen.extend(keys);
        kept.push(req);
    }

    if kept.len() < total {
        tracing::debug!(
            target: "rep::store",
            "Dropped {} duplicate request(s)",
            total - kept.len()
        );
    }
    kept
}
