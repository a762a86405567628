//! Causal request chains built from initiator back-references.

use crate::Request;
use serde::{Deserialize, Serialize};

/// One step in a request chain.
///
/// A root link synthesized from an unmatched initiator URL has no `id` and
/// no `method`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainLink {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub initiator: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_type: String,
}

impl ChainLink {
    /// Terminal link for an initiator that is not among the captured requests.
    pub fn root(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn is_synthetic_root(&self) -> bool {
        self.id.is_none()
    }
}

impl From<&Request> for ChainLink {
    fn from(req: &Request) -> Self {
        Self {
            id: Some(req.id.clone()),
            method: Some(req.method.clone()),
            url: req.url.clone(),
            status: req.status(),
            initiator: req.initiator.clone(),
            resource_type: req.resource_type.clone(),
        }
    }
}

/// A chain of requests, ordered root first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestChain {
    pub page_url: String,
    pub links: Vec<ChainLink>,
}

impl RequestChain {
    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// URLs from root to target.
    pub fn urls(&self) -> Vec<&str> {
        self.links.iter().map(|l| l.url.as_str()).collect()
    }
}
