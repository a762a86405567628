//! Persistent session archive.
//!
//! A [`Store`] is opened once per process and passed to whatever needs it.
//! Reads take a shared lock; every mutation takes the exclusive lock, applies
//! the change and rewrites the backing file before releasing it.

use crate::aggregate::{domain_stats, page_flows};
use crate::filter::{filter_requests, filter_with_total};
use crate::migrate::upgrade_legacy;
use crate::persist::write_json_atomic;
use crate::{DataPaths, DomainRules, RepError, Result, WorkingSet};
use chrono::{Local, Utc};
use rep_types::{
    generate_session_id, DomainInfo, FilterOptions, MutedPath, PageFlowInfo, Request, Session,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Selectors that resolve to the most recent session.
const LATEST_SELECTORS: [&str; 2] = ["latest", "last"];

/// On-disk layout of `store.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub sessions: Vec<Session>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ignored_domains: BTreeMap<String, bool>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub primary_domains: BTreeMap<String, bool>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub muted_paths: Vec<MutedPath>,
    /// Flat request list from before sessions existed.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub requests: Vec<Request>,
    /// Legacy import marker, ms since Unix epoch.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "is_zero"
    )]
    pub last_import: i64,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

impl StoreData {
    /// Parse a store file body, upgrade legacy content and restore derived
    /// request fields.
    pub fn from_slice(bytes: &[u8], path: &Path) -> Result<Self> {
        let mut data: StoreData =
            serde_json::from_slice(bytes).map_err(|source| RepError::StoreCorrupt {
                path: path.to_path_buf(),
                source,
            })?;
        upgrade_legacy(&mut data, Local::now());
        data.normalize();
        Ok(data)
    }

    fn normalize(&mut self) {
        normalize_domain_set(&mut self.ignored_domains);
        normalize_domain_set(&mut self.primary_domains);
        for session in &mut self.sessions {
            session.compute_fields();
        }
        for request in &mut self.requests {
            request.compute_fields();
        }
    }

    fn rules(&self) -> DomainRules {
        DomainRules::new(
            self.ignored_domains.keys(),
            self.primary_domains.keys(),
            &self.muted_paths,
        )
    }

    fn all_requests(&self) -> Vec<Request> {
        self.sessions
            .iter()
            .flat_map(|s| s.requests.iter().cloned())
            .collect()
    }
}

/// Drop `false` entries and case-insensitive duplicates.
fn normalize_domain_set(set: &mut BTreeMap<String, bool>) {
    set.retain(|_, enabled| *enabled);
    let mut seen: Vec<String> = Vec::with_capacity(set.len());
    set.retain(|domain, _| {
        let lowered = domain.to_lowercase();
        if seen.contains(&lowered) {
            false
        } else {
            seen.push(lowered);
            true
        }
    });
}

fn domain_set_contains(set: &BTreeMap<String, bool>, domain: &str) -> bool {
    set.keys().any(|d| d.eq_ignore_ascii_case(domain))
}

fn domain_set_insert(set: &mut BTreeMap<String, bool>, domain: &str) -> bool {
    let domain = domain.trim();
    if domain.is_empty() || domain_set_contains(set, domain) {
        return false;
    }
    set.insert(domain.to_string(), true);
    true
}

fn domain_set_remove(set: &mut BTreeMap<String, bool>, domain: &str) -> bool {
    let domain = domain.trim();
    let before = set.len();
    set.retain(|d, _| !d.eq_ignore_ascii_case(domain));
    set.len() < before
}

/// Handle to the on-disk archive of sessions and domain rules.
#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    data: RwLock<StoreData>,
}

impl Store {
    /// Load the store at `path`.
    ///
    /// A missing file yields an empty store. A file that does not parse is
    /// [`RepError::StoreCorrupt`]; nothing is discarded.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = match std::fs::read(&path) {
            Ok(bytes) => StoreData::from_slice(&bytes, &path)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(target: "rep::store", "No store at {}, starting empty", path.display());
                StoreData::default()
            }
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(
            target: "rep::store",
            "Loaded {} session(s) from {}",
            data.sessions.len(),
            path.display()
        );

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Open the store in the default data directory.
    pub fn open_default() -> Result<Self> {
        Self::open(DataPaths::resolve()?.store_file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreData> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` to a copy and persist it, all under the exclusive lock. The
    /// in-memory state only changes once the write succeeds.
    fn mutate<T>(&self, f: impl FnOnce(&mut StoreData) -> T) -> Result<T> {
        let mut data = self.write();
        let mut next = data.clone();
        let out = f(&mut next);
        write_json_atomic(&self.path, &next)?;
        *data = next;
        Ok(out)
    }

    /// Write the current state to disk.
    pub fn save(&self) -> Result<()> {
        let data = self.write();
        write_json_atomic(&self.path, &*data)
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> StoreData {
        self.read().clone()
    }

    // ---- sessions ----

    /// Append a session built from `requests` and persist.
    pub fn add_session(
        &self,
        id: impl Into<String>,
        note: impl Into<String>,
        requests: Vec<Request>,
    ) -> Result<Session> {
        let mut session = Session {
            id: id.into(),
            timestamp: Utc::now().timestamp_millis(),
            note: note.into(),
            requests,
        };
        session.compute_fields();

        let added = session.clone();
        self.mutate(move |data| data.sessions.push(session))?;

        tracing::info!(
            target: "rep::store",
            "Saved session {} with {} request(s)",
            added.id,
            added.len()
        );
        Ok(added)
    }

    /// Archive `requests` under a freshly generated session ID.
    pub fn archive(&self, note: &str, requests: Vec<Request>) -> Result<Session> {
        let id = generate_session_id(note, &Local::now());
        self.add_session(id, note.trim(), requests)
    }

    /// Exact ID match first, then the first session whose ID starts with
    /// `id`.
    pub fn get_session(&self, id: &str) -> Option<Session> {
        if id.is_empty() {
            return None;
        }
        let data = self.read();
        data.sessions
            .iter()
            .find(|s| s.id == id)
            .or_else(|| data.sessions.iter().find(|s| s.id.starts_with(id)))
            .cloned()
    }

    /// Like [`Store::get_session`], with `latest` and `last` naming the most
    /// recent session.
    pub fn resolve_session(&self, selector: &str) -> Option<Session> {
        if LATEST_SELECTORS
            .iter()
            .any(|s| s.eq_ignore_ascii_case(selector))
        {
            self.latest_session()
        } else {
            self.get_session(selector)
        }
    }

    /// All sessions, newest first.
    pub fn list_sessions(&self) -> Vec<Session> {
        self.read().sessions.iter().rev().cloned().collect()
    }

    pub fn latest_session(&self) -> Option<Session> {
        self.read().sessions.last().cloned()
    }

    pub fn session_count(&self) -> usize {
        self.read().sessions.len()
    }

    /// Find an archived request by ID or fingerprint, newest session first.
    pub fn find_request(&self, id: &str) -> Option<Request> {
        if id.is_empty() {
            return None;
        }
        let data = self.read();
        data.sessions
            .iter()
            .rev()
            .flat_map(|s| s.requests.iter())
            .find(|r| r.id == id || r.fingerprint() == id)
            .cloned()
    }

    /// Every archived request in chronological session order.
    pub fn all_requests(&self) -> Vec<Request> {
        self.read().all_requests()
    }

    /// Remove every session. Returns how many were removed.
    pub fn clear_sessions(&self) -> Result<usize> {
        self.mutate(|data| std::mem::take(&mut data.sessions).len())
    }

    /// Remove sessions and every domain rule.
    pub fn clear_all(&self) -> Result<()> {
        self.mutate(|data| *data = StoreData::default())
    }

    // ---- ignore / primary ----

    /// Add domains to the ignore list. Returns how many were new.
    pub fn ignore<I>(&self, domains: I) -> Result<usize>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.mutate(|data| {
            domains
                .into_iter()
                .filter(|d| domain_set_insert(&mut data.ignored_domains, d.as_ref()))
                .count()
        })
    }

    /// Remove domains from the ignore list. Returns how many were present.
    pub fn unignore<I>(&self, domains: I) -> Result<usize>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.mutate(|data| {
            domains
                .into_iter()
                .filter(|d| domain_set_remove(&mut data.ignored_domains, d.as_ref()))
                .count()
        })
    }

    pub fn clear_ignored(&self) -> Result<usize> {
        self.mutate(|data| std::mem::take(&mut data.ignored_domains).len())
    }

    /// Mark domains as primary. Returns how many were new.
    pub fn set_primary<I>(&self, domains: I) -> Result<usize>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.mutate(|data| {
            domains
                .into_iter()
                .filter(|d| domain_set_insert(&mut data.primary_domains, d.as_ref()))
                .count()
        })
    }

    pub fn unset_primary<I>(&self, domains: I) -> Result<usize>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.mutate(|data| {
            domains
                .into_iter()
                .filter(|d| domain_set_remove(&mut data.primary_domains, d.as_ref()))
                .count()
        })
    }

    pub fn is_ignored(&self, domain: &str) -> bool {
        domain_set_contains(&self.read().ignored_domains, domain)
    }

    pub fn is_primary(&self, domain: &str) -> bool {
        domain_set_contains(&self.read().primary_domains, domain)
    }

    /// Ignored domains, sorted.
    pub fn ignored_domains(&self) -> Vec<String> {
        self.read().ignored_domains.keys().cloned().collect()
    }

    /// Primary domains, sorted.
    pub fn primary_domains(&self) -> Vec<String> {
        self.read().primary_domains.keys().cloned().collect()
    }

    // ---- mute ----

    /// Add `domain/path` mute rules. Rules that do not parse or are already
    /// present are skipped. Returns how many were added.
    pub fn mute<I>(&self, rules: I) -> Result<usize>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.mutate(|data| {
            let mut added = 0;
            for raw in rules {
                let Some(rule) = MutedPath::parse(raw.as_ref()) else {
                    tracing::warn!(
                        target: "rep::store",
                        "Ignoring mute rule without a path: '{}'",
                        raw.as_ref()
                    );
                    continue;
                };
                if data.muted_paths.iter().any(|m| m.same_rule(&rule)) {
                    continue;
                }
                data.muted_paths.push(rule);
                added += 1;
            }
            added
        })
    }

    /// Remove mute rules. Returns how many were removed.
    pub fn unmute<I>(&self, rules: I) -> Result<usize>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.mutate(|data| {
            let before = data.muted_paths.len();
            for rule in rules.into_iter().filter_map(|r| MutedPath::parse(r.as_ref())) {
                data.muted_paths.retain(|m| !m.same_rule(&rule));
            }
            before - data.muted_paths.len()
        })
    }

    pub fn clear_muted(&self) -> Result<usize> {
        self.mutate(|data| std::mem::take(&mut data.muted_paths).len())
    }

    /// Mute rules, sorted.
    pub fn muted_paths(&self) -> Vec<MutedPath> {
        let mut rules = self.read().muted_paths.clone();
        rules.sort();
        rules
    }

    // ---- queries ----

    /// Current ignore, primary and mute rules, prepared for matching.
    pub fn rules(&self) -> DomainRules {
        self.read().rules()
    }

    /// Transient view over `requests` carrying this store's rules.
    pub fn working_set(&self, requests: Vec<Request>) -> WorkingSet {
        WorkingSet::with_rules(requests, self.rules())
    }

    /// Filter every archived request.
    pub fn filter(&self, opts: &FilterOptions) -> Vec<Request> {
        let data = self.read();
        filter_requests(&data.all_requests(), &data.rules(), opts)
    }

    pub fn filter_with_total(&self, opts: &FilterOptions) -> (Vec<Request>, usize) {
        let data = self.read();
        filter_with_total(&data.all_requests(), &data.rules(), opts)
    }

    pub fn get_domains(&self) -> Vec<DomainInfo> {
        let data = self.read();
        domain_stats(&data.all_requests(), &data.rules())
    }

    pub fn get_page_flows(&self) -> Vec<PageFlowInfo> {
        page_flows(&self.read().all_requests())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn req(id: &str, url: &str) -> Request {
        Request {
            id: id.into(),
            method: "GET".into(),
            url: url.into(),
            timestamp: 1,
            ..Default::default()
        }
    }

    fn temp_store() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join("store.json")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let (_dir, store) = temp_store();
        assert_eq!(store.session_count(), 0);
        assert!(store.latest_session().is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_failed_write_leaves_state_unchanged() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join("sub").join("store.json")).unwrap();
        // a plain file where the directory should be
        std::fs::write(dir.path().join("sub"), b"").unwrap();

        assert!(store.add_session("20240101-000000", "", vec![req("1", "https://a.com/")]).is_err());
        assert_eq!(store.session_count(), 0);
        assert!(store.ignore(["ads.test"]).is_err());
        assert!(store.snapshot().ignored_domains.is_empty());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{\"sessions\": [").unwrap();

        let err = Store::open(&path).unwrap_err();
        assert!(matches!(err, RepError::StoreCorrupt { .. }));
        // the broken file is left for the user to inspect
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"sessions\": [");
    }

    #[test]
    fn test_null_sets_load_as_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(
            &path,
            r#"{"sessions":null,"ignored_domains":null,"primary_domains":{"a.com":true,"b.com":false}}"#,
        )
        .unwrap();

        let store = Store::open(&path).unwrap();
        assert_eq!(store.session_count(), 0);
        assert!(store.ignored_domains().is_empty());
        assert_eq!(store.primary_domains(), vec!["a.com"]);
    }

    #[test]
    fn test_add_session_persists_and_computes_fields() {
        let (dir, store) = temp_store();
        let session = store
            .add_session("20240101-000000", "", vec![req("1", "https://a.com/x?y=1")])
            .unwrap();
        assert_eq!(session.requests[0].domain, "a.com");
        assert_eq!(session.requests[0].path, "/x?y=1");

        let reopened = Store::open(dir.path().join("store.json")).unwrap();
        let loaded = reopened.get_session("20240101-000000").unwrap();
        assert_eq!(loaded.requests[0].domain, "a.com");
    }

    #[test]
    fn test_get_session_exact_then_prefix() {
        let (_dir, store) = temp_store();
        store.add_session("20240101-000000", "", vec![]).unwrap();
        store.add_session("20240101-000000-login", "login", vec![]).unwrap();
        store.add_session("20240102-120000", "", vec![]).unwrap();

        assert_eq!(store.get_session("20240101-000000").unwrap().id, "20240101-000000");
        assert_eq!(store.get_session("20240102").unwrap().id, "20240102-120000");
        assert!(store.get_session("2023").is_none());
        assert!(store.get_session("").is_none());
    }

    #[test]
    fn test_list_newest_first_and_latest() {
        let (_dir, store) = temp_store();
        store.add_session("a", "", vec![]).unwrap();
        store.add_session("b", "", vec![]).unwrap();

        let ids: Vec<_> = store.list_sessions().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(store.resolve_session("latest").unwrap().id, "b");
        assert_eq!(store.resolve_session("LAST").unwrap().id, "b");
        assert_eq!(store.resolve_session("a").unwrap().id, "a");
    }

    #[test]
    fn test_archive_generates_id_from_note() {
        let (_dir, store) = temp_store();
        let session = store.archive("Login Flow", vec![req("1", "https://a.com/")]).unwrap();
        assert!(session.id.ends_with("-login-flow"));
        assert_eq!(session.note, "Login Flow");
    }

    #[test]
    fn test_domain_sets_idempotent_and_case_insensitive() {
        let (_dir, store) = temp_store();
        assert_eq!(store.ignore(["Ads.com", "cdn.net"]).unwrap(), 2);
        assert_eq!(store.ignore(["ads.com"]).unwrap(), 0);
        assert!(store.is_ignored("ADS.COM"));
        assert_eq!(store.ignored_domains(), vec!["Ads.com", "cdn.net"]);

        assert_eq!(store.unignore(["ads.COM", "missing.com"]).unwrap(), 1);
        assert_eq!(store.ignored_domains(), vec!["cdn.net"]);

        assert_eq!(store.set_primary(["target.com"]).unwrap(), 1);
        assert_eq!(store.set_primary(["TARGET.com"]).unwrap(), 0);
        assert!(store.is_primary("target.com"));
        assert_eq!(store.unset_primary(["target.com"]).unwrap(), 1);
        assert!(!store.is_primary("target.com"));
    }

    #[test]
    fn test_domain_sets_wire_format() {
        let (dir, store) = temp_store();
        store.ignore(["ads.com"]).unwrap();
        store.set_primary(["target.com"]).unwrap();

        let raw = std::fs::read_to_string(dir.path().join("store.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["ignored_domains"], serde_json::json!({"ads.com": true}));
        assert_eq!(value["primary_domains"], serde_json::json!({"target.com": true}));
        assert!(value.get("muted_paths").is_none());
        assert!(value.get("requests").is_none());
        assert!(value.get("last_import").is_none());
    }

    #[test]
    fn test_mute_rules() {
        let (_dir, store) = temp_store();
        assert_eq!(store.mute(["a.com/log", "*/health*", "no-slash"]).unwrap(), 2);
        assert_eq!(store.mute(["A.com/log"]).unwrap(), 0);
        assert_eq!(store.muted_paths().len(), 2);

        assert_eq!(store.unmute(["a.com/log"]).unwrap(), 1);
        assert_eq!(store.unmute(["a.com/log"]).unwrap(), 0);
        assert_eq!(store.clear_muted().unwrap(), 1);
        assert!(store.muted_paths().is_empty());
    }

    #[test]
    fn test_find_request_by_id_or_fingerprint() {
        let (_dir, store) = temp_store();
        let unstable = req("42", "https://a.com/x");
        let hash = unstable.content_hash();
        store
            .add_session("s1", "", vec![unstable, req("h_7", "https://a.com/y")])
            .unwrap();

        assert_eq!(store.find_request("h_7").unwrap().url, "https://a.com/y");
        assert_eq!(store.find_request(&hash).unwrap().url, "https://a.com/x");
        assert!(store.find_request("nope").is_none());
    }

    #[test]
    fn test_store_queries_cover_all_sessions() {
        let (_dir, store) = temp_store();
        store.add_session("s1", "", vec![req("1", "https://a.com/x")]).unwrap();
        store.add_session("s2", "", vec![req("2", "https://b.com/x")]).unwrap();
        store.ignore(["b.com"]).unwrap();

        let opts = FilterOptions {
            exclude_ignored: true,
            ..Default::default()
        };
        let out = store.filter(&opts);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "1");

        let domains = store.get_domains();
        assert_eq!(domains.len(), 2);
        assert!(domains.iter().any(|d| d.domain == "b.com" && d.is_ignored));
    }

    #[test]
    fn test_clear_all() {
        let (dir, store) = temp_store();
        store.add_session("s1", "", vec![]).unwrap();
        store.ignore(["a.com"]).unwrap();
        store.mute(["a.com/x"]).unwrap();

        store.clear_all().unwrap();
        assert_eq!(store.session_count(), 0);
        assert!(store.ignored_domains().is_empty());
        assert!(store.muted_paths().is_empty());

        let reopened = Store::open(dir.path().join("store.json")).unwrap();
        assert_eq!(reopened.snapshot(), StoreData::default());
    }

    #[test]
    fn test_working_set_carries_rules() {
        let (_dir, store) = temp_store();
        store.ignore(["b.com"]).unwrap();
        let set = store.working_set(vec![
            req("1", "https://a.com/"),
            req("2", "https://b.com/"),
        ]);
        let opts = FilterOptions {
            exclude_ignored: true,
            ..Default::default()
        };
        assert_eq!(set.filter(&opts).len(), 1);
        // the working set never touches the archive
        assert_eq!(store.session_count(), 0);
    }
}
