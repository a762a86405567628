//! End-to-end scenarios over on-disk store and live files.
//!
//! Each test works on files in a temp directory the way the ingest host and
//! a query process would.

use chrono::Local;
use rep_core::{
    read_live_snapshot, LiveBuffer, LiveOptions, RepError, Store, WorkingSet,
};
use rep_types::{FilterOptions, Request, Response};
use serde_json::json;
use tempfile::TempDir;

fn req(id: &str, url: &str, initiator: &str, status: Option<u16>, timestamp: i64) -> Request {
    Request {
        id: id.into(),
        method: "GET".into(),
        url: url.into(),
        initiator: initiator.into(),
        response: status.map(|status| Response {
            status,
            ..Default::default()
        }),
        timestamp,
        ..Default::default()
    }
}

// ============================================================================
// Chains
// ============================================================================

#[test]
fn test_three_step_chain_from_live_data() {
    let dir = TempDir::new().unwrap();
    let live = LiveBuffer::open(dir.path().join("live.json"), LiveOptions::default());
    live.add(req("h_1", "https://app.test/", "", Some(200), 1)).unwrap();
    live.add(req("h_2", "https://app.test/main.js", "https://app.test/", Some(200), 2))
        .unwrap();
    live.add(req(
        "h_3",
        "https://api.app.test/v1/me",
        "https://app.test/main.js",
        Some(200),
        3,
    ))
    .unwrap();

    // a reader process only sees the file
    let snapshot = read_live_snapshot(&dir.path().join("live.json")).unwrap();
    let set = WorkingSet::from_requests(snapshot.requests);
    let chain = set.chain_for("h_3").unwrap();

    let ids: Vec<_> = chain.links.iter().map(|l| l.id.as_deref()).collect();
    assert_eq!(ids, vec![Some("h_1"), Some("h_2"), Some("h_3")]);
}

// ============================================================================
// Legacy Migration
// ============================================================================

#[test]
fn test_legacy_store_migrates_once() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.json");
    let legacy: Vec<_> = (0..5)
        .map(|i| json!({"id": format!("{i}"), "method": "GET", "url": format!("https://old.test/{i}"), "timestamp": i}))
        .collect();
    std::fs::write(
        &path,
        serde_json::to_vec(&json!({"requests": legacy, "last_import": 99})).unwrap(),
    )
    .unwrap();

    let store = Store::open(&path).unwrap();
    let sessions = store.list_sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(
        sessions[0].id,
        format!("migrated-{}", Local::now().format("%Y%m%d"))
    );
    assert_eq!(sessions[0].requests.len(), 5);
    assert_eq!(sessions[0].requests[0].domain, "old.test");

    store.save().unwrap();
    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert!(raw.get("requests").is_none());
    assert!(raw.get("last_import").is_none());

    let reopened = Store::open(&path).unwrap();
    assert_eq!(reopened.session_count(), 1);
}

#[test]
fn test_legacy_requests_with_sessions_do_not_migrate() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.json");
    std::fs::write(
        &path,
        serde_json::to_vec(&json!({
            "sessions": [{"id": "20240101-000000", "timestamp": 1, "requests": []}],
            "requests": [{"id": "1", "method": "GET", "url": "https://old.test/", "timestamp": 1}]
        }))
        .unwrap(),
    )
    .unwrap();

    let store = Store::open(&path).unwrap();
    assert_eq!(store.session_count(), 1);
    assert_eq!(store.latest_session().unwrap().id, "20240101-000000");
    assert_eq!(store.snapshot().requests.len(), 1);
}

#[test]
fn test_corrupt_store_fails_closed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.json");
    std::fs::write(&path, b"[1, 2").unwrap();
    assert!(matches!(
        Store::open(&path),
        Err(RepError::StoreCorrupt { .. })
    ));
}

// ============================================================================
// Filtering
// ============================================================================

#[test]
fn test_error_status_ranges() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path().join("store.json")).unwrap();
    store
        .add_session(
            "20240101-000000",
            "",
            vec![
                req("a", "https://x.test/ok", "", Some(200), 1),
                req("b", "https://x.test/missing", "", Some(404), 2),
                req("d", "https://x.test/boom", "", Some(500), 4),
            ],
        )
        .unwrap();

    let opts = FilterOptions {
        status_ranges: vec!["4xx".into(), "5xx".into()],
        ..Default::default()
    };
    let ids: Vec<_> = store.filter(&opts).into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec!["b", "d"]);
}

#[test]
fn test_pending_requests_survive_range_filters() {
    let set = WorkingSet::from_requests(vec![
        req("ok", "https://x.test/", "", Some(200), 1),
        req("pending", "https://x.test/slow", "", None, 2),
        req("nf", "https://x.test/missing", "", Some(404), 3),
    ]);
    let ids = |opts: FilterOptions| -> Vec<String> {
        set.filter(&opts).into_iter().map(|r| r.id).collect()
    };

    assert_eq!(
        ids(FilterOptions {
            status_range: Some("4xx".into()),
            ..Default::default()
        }),
        vec!["pending", "nf"]
    );
    assert_eq!(
        ids(FilterOptions {
            status_ranges: vec!["4xx".into()],
            ..Default::default()
        }),
        vec!["pending", "nf"]
    );
    assert_eq!(
        ids(FilterOptions {
            status_range: Some("9xx".into()),
            ..Default::default()
        }),
        vec!["ok", "pending", "nf"]
    );
    // exact status still needs a response
    assert_eq!(
        ids(FilterOptions {
            status: Some(404),
            ..Default::default()
        }),
        vec!["nf"]
    );
}

#[test]
fn test_live_working_set_uses_store_rules() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path().join("store.json")).unwrap();
    store.ignore(["ads.test"]).unwrap();
    store.mute(["*/ping"]).unwrap();

    let live = LiveBuffer::open(dir.path().join("live.json"), LiveOptions::default());
    live.sync(vec![
        req("1", "https://app.test/", "", Some(200), 1),
        req("2", "https://ads.test/pixel", "", Some(200), 2),
        req("3", "https://app.test/ping?t=1", "", Some(204), 3),
    ])
    .unwrap();

    let set = store.working_set(live.snapshot().requests);
    let opts = FilterOptions {
        exclude_ignored: true,
        exclude_muted: true,
        ..Default::default()
    };
    let (page, total) = set.filter_with_total(&opts);
    assert_eq!(total, 1);
    assert_eq!(page[0].id, "1");
    assert_eq!(store.session_count(), 0);
}

// ============================================================================
// Live Snapshot Recovery
// ============================================================================

#[test]
fn test_corrupt_live_snapshot_fails_open() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("live.json");
    std::fs::write(&path, "{\"requests\": [oops").unwrap();

    assert!(read_live_snapshot(&path).is_err());

    let live = LiveBuffer::open(&path, LiveOptions::default());
    assert!(live.is_empty());
    live.add(req("h_1", "https://app.test/", "", None, 1)).unwrap();
    assert_eq!(read_live_snapshot(&path).unwrap().requests.len(), 1);
}
