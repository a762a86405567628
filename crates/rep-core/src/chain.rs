//! Request chain reconstruction.

use rep_types::{ChainLink, Request, RequestChain};
use std::collections::{HashMap, HashSet};

/// Walk initiator references back from `target` and return the chain from
/// root to target.
///
/// The first request whose URL equals the current initiator is taken as its
/// parent. An initiator with no matching request (or one that resolves to
/// the current request) becomes a synthetic root link. Each request is
/// visited at most once, so cyclic initiators end the walk.
pub fn chain_for(requests: &[Request], target: &Request) -> RequestChain {
    let mut links = Vec::new();
    let mut visited = HashSet::new();
    let mut current = target;

    while visited.insert(current.fingerprint()) {
        links.push(ChainLink::from(current));

        if current.initiator.is_empty() {
            break;
        }

        match requests.iter().find(|r| r.url == current.initiator) {
            Some(parent) if parent.fingerprint() != current.fingerprint() => current = parent,
            _ => {
                links.push(ChainLink::root(current.initiator.clone()));
                break;
            }
        }
    }

    links.reverse();
    RequestChain {
        page_url: target.page_url.clone(),
        links,
    }
}

/// Group requests by page (falling back to the request's own URL) with each
/// group ordered by timestamp. Largest groups come first.
pub fn page_chains(requests: &[Request]) -> Vec<RequestChain> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&Request>> = HashMap::new();

    for req in requests {
        let page = if req.page_url.is_empty() {
            req.url.as_str()
        } else {
            req.page_url.as_str()
        };
        groups
            .entry(page)
            .or_insert_with(|| {
                order.push(page);
                Vec::new()
            })
            .push(req);
    }

    let mut chains: Vec<RequestChain> = order
        .into_iter()
        .filter_map(|page| groups.remove(page).map(|reqs| (page, reqs)))
        .map(|(page, mut reqs)| {
            reqs.sort_by_key(|r| r.timestamp);
            RequestChain {
                page_url: page.to_string(),
                links: reqs.into_iter().map(ChainLink::from).collect(),
            }
        })
        .collect();

    chains.sort_by(|a, b| {
        b.links
            .len()
            .cmp(&a.links.len())
            .then_with(|| a.page_url.cmp(&b.page_url))
    });
    chains
}
