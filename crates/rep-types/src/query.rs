//! Query options and aggregate views over request collections.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Options for filtering a request collection.
///
/// All predicates are optional and combined with AND. `limit` and `offset`
/// of 0 mean "no limit" and "no skip".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterOptions {
    pub domain: Option<String>,
    pub domains: Vec<String>,
    pub method: Option<String>,
    pub methods: Vec<String>,
    pub status: Option<u16>,
    /// A single status class such as `"4xx"`.
    pub status_range: Option<String>,
    /// Several status classes, any of which may match.
    pub status_ranges: Vec<String>,
    pub resource_types: Vec<String>,
    /// URL regex; falls back to a case-insensitive substring when it does
    /// not compile.
    pub pattern: Option<String>,
    pub exclude_ignored: bool,
    pub exclude_muted: bool,
    pub primary_only: bool,
    pub limit: usize,
    pub offset: usize,
}

impl FilterOptions {
    /// Copy of these options with pagination removed.
    pub fn unpaged(&self) -> Self {
        Self {
            limit: 0,
            offset: 0,
            ..self.clone()
        }
    }
}

/// Status class `1xx` through `5xx`, bucketed by `status / 100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusClass(u16);

impl StatusClass {
    pub fn hundreds(&self) -> u16 {
        self.0
    }

    pub fn contains(&self, status: u16) -> bool {
        status / 100 == self.0
    }
}

impl FromStr for StatusClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_bytes() {
            [digit @ b'1'..=b'5', b'x', b'x'] => Ok(StatusClass(u16::from(digit - b'0'))),
            _ => Err(format!("Invalid status range: '{}'. Use 1xx-5xx.", s)),
        }
    }
}

impl std::fmt::Display for StatusClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}xx", self.0)
    }
}

/// Per-domain statistics, computed on demand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainInfo {
    pub domain: String,
    pub request_count: usize,
    /// Method to request count.
    pub methods: BTreeMap<String, usize>,
    /// Distinct `METHOD path` signatures (query stripped), first seen first.
    pub endpoints: Vec<String>,
    pub is_ignored: bool,
    pub is_primary: bool,
}

/// Requests grouped by the page that issued them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageFlowInfo {
    pub page_url: String,
    pub page_domain: String,
    /// Distinct domains contacted from the page, sorted.
    pub requested_domains: Vec<String>,
    /// Subset of `requested_domains` on a different site than the page.
    pub third_party_domains: Vec<String>,
    pub request_count: usize,
}

impl PageFlowInfo {
    /// Whether the page sent requests to any other site.
    pub fn is_cross_domain(&self) -> bool {
        !self.third_party_domains.is_empty()
    }
}
