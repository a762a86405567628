//! Captured request records and their identity.

use crate::HeaderMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

/// ID prefix the capture agent uses for IDs it guarantees to be stable.
pub const STABLE_ID_PREFIX: &str = "h_";

/// A captured HTTP request, in the capture agent's export format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub original_id: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub url: String,
    /// Document that was loaded when the request fired.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub page_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_type: String,
    /// URL of the request or document that triggered this one.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub initiator: String,
    #[serde(default, skip_serializing_if = "HeaderMap::is_empty")]
    pub headers: HeaderMap,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Response>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub response_encoding: String,
    /// Capture time, ms since Unix epoch.
    #[serde(default)]
    pub timestamp: i64,

    /// Host (with explicit port) derived from `url`. Never persisted.
    #[serde(skip)]
    pub domain: String,
    /// Path plus `?query` derived from `url`. Never persisted.
    #[serde(skip)]
    pub path: String,
}

/// A captured HTTP response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub status: u16,
    #[serde(default, skip_serializing_if = "HeaderMap::is_empty")]
    pub headers: HeaderMap,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,
}

impl Request {
    /// Recompute `domain` and `path` from `url`.
    ///
    /// URLs that do not parse, or that have no hierarchical part, leave both
    /// fields empty.
    pub fn compute_fields(&mut self) {
        self.domain.clear();
        self.path.clear();

        let Ok(parsed) = Url::parse(&self.url) else {
            return;
        };
        if parsed.cannot_be_a_base() {
            return;
        }

        if let Some(host) = parsed.host_str() {
            self.domain = match parsed.port() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_string(),
            };
        }
        self.path = parsed.path().to_string();
        if let Some(query) = parsed.query().filter(|q| !q.is_empty()) {
            self.path.push('?');
            self.path.push_str(query);
        }
    }

    /// Builder-style variant of [`Request::compute_fields`].
    pub fn with_fields(mut self) -> Self {
        self.compute_fields();
        self
    }

    /// `path` with any query string removed.
    pub fn path_without_query(&self) -> &str {
        match self.path.find('?') {
            Some(idx) => &self.path[..idx],
            None => &self.path,
        }
    }

    /// Response status, if a response was captured.
    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status)
    }

    /// Whether the agent-supplied ID can be trusted as an identity.
    pub fn is_stable_id(&self) -> bool {
        if self.id.is_empty() {
            return false;
        }
        !self.original_id.is_empty() || self.id.starts_with(STABLE_ID_PREFIX)
    }

    /// SHA-256 over method, URL, body and timestamp, hex encoded.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(
            format!(
                "{}|{}|{}|{}",
                self.method, self.url, self.body, self.timestamp
            )
            .as_bytes(),
        );
        format!("{:x}", hasher.finalize())
    }

    /// Identity used for de-duplication: the stable ID when there is one,
    /// otherwise the content hash.
    pub fn fingerprint(&self) -> String {
        if self.is_stable_id() {
            self.id.clone()
        } else {
            self.content_hash()
        }
    }

    /// Keys under which this request is indexed for de-duplication.
    pub fn index_keys(&self) -> Vec<String> {
        let mut keys = vec![format!("hash:{}", self.content_hash())];
        if self.is_stable_id() {
            keys.push(format!("id:{}", self.id));
        }
        keys
    }
}

/// Host part of a URL, or an empty string when it does not parse.
pub fn url_host(raw: &str) -> String {
    Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}

/// Last two labels of a domain (`api.example.com` -> `example.com`).
pub fn base_domain(domain: &str) -> &str {
    let mut dots = domain.rmatch_indices('.');
    match (dots.next(), dots.next()) {
        (Some(_), Some((idx, _))) => &domain[idx + 1..],
        _ => domain,
    }
}

/// Whether `request_domain` belongs to the same site as `page_domain`.
pub fn is_first_party(request_domain: &str, page_domain: &str) -> bool {
    base_domain(request_domain).eq_ignore_ascii_case(base_domain(page_domain))
}
