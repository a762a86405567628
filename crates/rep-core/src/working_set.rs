//! In-memory request collections queried like the archive but never saved.

use crate::aggregate::{domain_stats, page_flows};
use crate::chain::{chain_for, page_chains};
use crate::filter::{filter_requests, filter_with_total};
use crate::DomainRules;
use rep_types::{DomainInfo, FilterOptions, PageFlowInfo, Request, RequestChain};

/// A transient view over live or session data.
///
/// Holds a snapshot of the rules it was built with. There is no way to
/// persist a working set.
#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
    requests: Vec<Request>,
    rules: DomainRules,
}

impl WorkingSet {
    /// A working set with no ignore, primary or mute rules.
    pub fn from_requests(requests: Vec<Request>) -> Self {
        Self::with_rules(requests, DomainRules::default())
    }

    pub fn with_rules(mut requests: Vec<Request>, rules: DomainRules) -> Self {
        for request in &mut requests {
            request.compute_fields();
        }
        Self { requests, rules }
    }

    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    pub fn rules(&self) -> &DomainRules {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn filter(&self, opts: &FilterOptions) -> Vec<Request> {
        filter_requests(&self.requests, &self.rules, opts)
    }

    pub fn filter_with_total(&self, opts: &FilterOptions) -> (Vec<Request>, usize) {
        filter_with_total(&self.requests, &self.rules, opts)
    }

    pub fn get_domains(&self) -> Vec<DomainInfo> {
        domain_stats(&self.requests, &self.rules)
    }

    pub fn get_page_flows(&self) -> Vec<PageFlowInfo> {
        page_flows(&self.requests)
    }

    /// Look up a request by ID or fingerprint.
    pub fn get_request(&self, id: &str) -> Option<&Request> {
        if id.is_empty() {
            return None;
        }
        self.requests
            .iter()
            .find(|r| r.id == id)
            .or_else(|| self.requests.iter().find(|r| r.fingerprint() == id))
    }

    /// Root-to-target chain for the request with `id`.
    pub fn chain_for(&self, id: &str) -> Option<RequestChain> {
        let target = self.get_request(id)?;
        Some(chain_for(&self.requests, target))
    }

    /// Per-page chains over requests from non-ignored domains.
    pub fn page_chains(&self) -> Vec<RequestChain> {
        let opts = FilterOptions {
            exclude_ignored: true,
            ..Default::default()
        };
        page_chains(&self.filter(&opts))
    }
}
