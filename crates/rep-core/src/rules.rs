//! Ignore, primary and mute rules, prepared for matching.

use regex::Regex;
use rep_types::{MutePatternKind, MutedPath, Request};
use std::collections::HashSet;

/// Case-insensitive snapshot of a store's domain configuration.
#[derive(Debug, Clone, Default)]
pub struct DomainRules {
    ignored: HashSet<String>,
    primary: HashSet<String>,
    muted: Vec<MuteMatcher>,
}

#[derive(Debug, Clone)]
struct MuteMatcher {
    /// Lowercased domain, `None` for the `*` wildcard.
    domain: Option<String>,
    path: PathMatcher,
}

#[derive(Debug, Clone)]
enum PathMatcher {
    Exact(String),
    Prefix(String),
    Regex(Regex),
}

impl PathMatcher {
    fn matches(&self, path: &str) -> bool {
        match self {
            PathMatcher::Exact(expected) => path == expected,
            PathMatcher::Prefix(prefix) => path.starts_with(prefix.as_str()),
            PathMatcher::Regex(re) => re.is_match(path),
        }
    }
}

impl From<&MutedPath> for MuteMatcher {
    fn from(rule: &MutedPath) -> Self {
        let domain = (!rule.applies_to_all_domains()).then(|| rule.domain.to_lowercase());
        let path = match rule.kind() {
            MutePatternKind::Regex => {
                let source = rule.regex_source().unwrap_or(&rule.pattern);
                match Regex::new(source) {
                    Ok(re) => PathMatcher::Regex(re),
                    Err(e) => {
                        tracing::warn!(
                            target: "rep::store",
                            "Invalid mute regex '{}', matching literally: {}",
                            rule,
                            e
                        );
                        PathMatcher::Exact(rule.pattern.clone())
                    }
                }
            }
            MutePatternKind::Prefix => {
                PathMatcher::Prefix(rule.pattern.trim_end_matches('*').to_string())
            }
            MutePatternKind::Exact => PathMatcher::Exact(rule.pattern.clone()),
        };
        Self { domain, path }
    }
}

impl DomainRules {
    pub fn new<I, P>(ignored: I, primary: P, muted: &[MutedPath]) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        P: IntoIterator,
        P::Item: AsRef<str>,
    {
        Self {
            ignored: ignored.into_iter().map(|d| d.as_ref().to_lowercase()).collect(),
            primary: primary.into_iter().map(|d| d.as_ref().to_lowercase()).collect(),
            muted: muted.iter().map(MuteMatcher::from).collect(),
        }
    }

    pub fn is_ignored(&self, domain: &str) -> bool {
        self.ignored.contains(&domain.to_lowercase())
    }

    pub fn is_primary(&self, domain: &str) -> bool {
        self.primary.contains(&domain.to_lowercase())
    }

    pub fn has_primary(&self) -> bool {
        !self.primary.is_empty()
    }

    /// Whether a request's endpoint is muted. Matches the path without its
    /// query string.
    pub fn is_muted(&self, request: &Request) -> bool {
        if self.muted.is_empty() {
            return false;
        }
        let domain = request.domain.to_lowercase();
        let path = request.path_without_query();
        self.muted.iter().any(|m| {
            m.domain.as_deref().is_none_or(|d| d == domain) && m.path.matches(path)
        })
    }
}
