//! Per-domain and per-page aggregation.

use crate::DomainRules;
use rep_types::{DomainInfo, PageFlowInfo, Request, is_first_party, url_host};
use std::collections::{BTreeSet, HashMap};

/// Distinct endpoints tracked per domain.
const MAX_ENDPOINTS_PER_DOMAIN: usize = 100;

/// Group requests by domain, most active first.
///
/// Requests without a domain are skipped. Each domain keeps at most 100
/// distinct `METHOD path` endpoints.
pub fn domain_stats(requests: &[Request], rules: &DomainRules) -> Vec<DomainInfo> {
    let mut by_domain: HashMap<&str, DomainInfo> = HashMap::new();

    for req in requests {
        if req.domain.is_empty() {
            continue;
        }

        let info = by_domain.entry(req.domain.as_str()).or_insert_with(|| DomainInfo {
            domain: req.domain.clone(),
            is_ignored: rules.is_ignored(&req.domain),
            is_primary: rules.is_primary(&req.domain),
            ..Default::default()
        });

        info.request_count += 1;
        *info.methods.entry(req.method.clone()).or_default() += 1;

        let endpoint = format!("{} {}", req.method, req.path_without_query());
        if info.endpoints.len() < MAX_ENDPOINTS_PER_DOMAIN && !info.endpoints.contains(&endpoint)
        {
            info.endpoints.push(endpoint);
        }
    }

    let mut result: Vec<DomainInfo> = by_domain.into_values().collect();
    result.sort_by(|a, b| {
        b.request_count
            .cmp(&a.request_count)
            .then_with(|| a.domain.cmp(&b.domain))
    });
    result
}

/// Group requests by the page that issued them, tracking which domains each
/// page talked to.
pub fn page_flows(requests: &[Request]) -> Vec<PageFlowInfo> {
    struct Flow {
        page_domain: String,
        domains: BTreeSet<String>,
        count: usize,
    }

    let mut by_page: HashMap<&str, Flow> = HashMap::new();

    for req in requests {
        if req.page_url.is_empty() {
            continue;
        }
        let flow = by_page.entry(req.page_url.as_str()).or_insert_with(|| Flow {
            page_domain: url_host(&req.page_url),
            domains: BTreeSet::new(),
            count: 0,
        });
        flow.count += 1;
        if !req.domain.is_empty() {
            flow.domains.insert(req.domain.clone());
        }
    }

    let mut result: Vec<PageFlowInfo> = by_page
        .into_iter()
        .map(|(page_url, flow)| {
            let third_party_domains = flow
                .domains
                .iter()
                .filter(|d| !is_first_party(d, &flow.page_domain))
                .cloned()
                .collect();
            PageFlowInfo {
                page_url: page_url.to_string(),
                page_domain: flow.page_domain,
                requested_domains: flow.domains.into_iter().collect(),
                third_party_domains,
                request_count: flow.count,
            }
        })
        .collect();

    result.sort_by(|a, b| {
        b.request_count
            .cmp(&a.request_count)
            .then_with(|| a.page_url.cmp(&b.page_url))
    });
    result
}
