//! Predicate pipeline over request collections.

use crate::DomainRules;
use regex::Regex;
use rep_types::{FilterOptions, Request, StatusClass};

/// URL matcher: a regex when the pattern compiles, otherwise a
/// case-insensitive substring.
enum UrlPattern {
    Regex(Regex),
    Substring(String),
}

impl UrlPattern {
    fn new(raw: &str) -> Option<Self> {
        let pattern = raw.trim();
        if pattern.is_empty() {
            return None;
        }
        Some(match Regex::new(pattern) {
            Ok(re) => UrlPattern::Regex(re),
            Err(_) => UrlPattern::Substring(pattern.to_lowercase()),
        })
    }

    fn matches(&self, url: &str) -> bool {
        match self {
            UrlPattern::Regex(re) => re.is_match(url),
            UrlPattern::Substring(needle) => url.to_lowercase().contains(needle.as_str()),
        }
    }
}

/// Status predicate prepared once per query.
///
/// Range predicates only constrain requests that have a response; pending
/// requests pass them.
enum StatusRange {
    /// No predicate requested, or an unrecognised single range.
    Any,
    /// At least one class must match.
    Classes(Vec<StatusClass>),
    /// A range set with no recognised entries.
    Nothing,
}

impl StatusRange {
    fn single(raw: Option<&str>) -> Self {
        match raw.map(str::parse::<StatusClass>) {
            Some(Ok(class)) => StatusRange::Classes(vec![class]),
            _ => StatusRange::Any,
        }
    }

    fn set(raw: &[String]) -> Self {
        if raw.is_empty() {
            return StatusRange::Any;
        }
        let classes: Vec<StatusClass> = raw.iter().filter_map(|r| r.parse().ok()).collect();
        if classes.is_empty() {
            StatusRange::Nothing
        } else {
            StatusRange::Classes(classes)
        }
    }

    fn matches(&self, status: Option<u16>) -> bool {
        let Some(status) = status else {
            return true;
        };
        match self {
            StatusRange::Any => true,
            StatusRange::Nothing => false,
            StatusRange::Classes(classes) => classes.iter().any(|c| c.contains(status)),
        }
    }
}

fn any_eq_ignore_case(candidates: &[String], value: &str) -> bool {
    candidates.iter().any(|c| c.eq_ignore_ascii_case(value))
}

/// Apply `opts` to `requests`, preserving input order.
///
/// Predicates run left to right and stop at the first miss. Pagination is
/// applied last: `offset` matches are skipped, then at most `limit` are kept.
pub fn filter_requests(
    requests: &[Request],
    rules: &DomainRules,
    opts: &FilterOptions,
) -> Vec<Request> {
    let pattern = opts.pattern.as_deref().and_then(UrlPattern::new);
    let status_range = StatusRange::single(opts.status_range.as_deref());
    let status_ranges = StatusRange::set(&opts.status_ranges);
    let domain = opts.domain.as_deref().filter(|d| !d.is_empty());
    let method = opts.method.as_deref().filter(|m| !m.is_empty());

    let mut skip = opts.offset;
    let mut result = Vec::new();

    for req in requests {
        if opts.exclude_ignored && rules.is_ignored(&req.domain) {
            continue;
        }
        if opts.primary_only && !rules.is_primary(&req.domain) {
            continue;
        }
        if opts.exclude_muted && rules.is_muted(req) {
            continue;
        }
        if let Some(domain) = domain {
            if !req.domain.eq_ignore_ascii_case(domain) {
                continue;
            }
        }
        if !opts.domains.is_empty() && !any_eq_ignore_case(&opts.domains, &req.domain) {
            continue;
        }
        if let Some(method) = method {
            if !req.method.eq_ignore_ascii_case(method) {
                continue;
            }
        }
        if !opts.methods.is_empty() && !any_eq_ignore_case(&opts.methods, &req.method) {
            continue;
        }
        if let Some(status) = opts.status {
            if req.status() != Some(status) {
                continue;
            }
        }
        if !status_range.matches(req.status()) || !status_ranges.matches(req.status()) {
            continue;
        }
        if !opts.resource_types.is_empty()
            && !any_eq_ignore_case(&opts.resource_types, &req.resource_type)
        {
            continue;
        }
        if let Some(pattern) = &pattern {
            if !pattern.matches(&req.url) {
                continue;
            }
        }

        if skip > 0 {
            skip -= 1;
            continue;
        }

        result.push(req.clone());

        if opts.limit > 0 && result.len() >= opts.limit {
            break;
        }
    }

    result
}

/// Filter with pagination, plus the number of matches without pagination.
///
/// The total comes from a second pass with `limit` and `offset` cleared.
pub fn filter_with_total(
    requests: &[Request],
    rules: &DomainRules,
    opts: &FilterOptions,
) -> (Vec<Request>, usize) {
    let page = filter_requests(requests, rules, opts);
    let total = if opts.limit == 0 && opts.offset == 0 {
        page.len()
    } else {
        filter_requests(requests, rules, &opts.unpaged()).len()
    };
    (page, total)
}
