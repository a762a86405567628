//! Mute rules: per-endpoint noise suppression.

use serde::{Deserialize, Serialize};

/// Domain value that makes a rule apply to every domain.
pub const ANY_DOMAIN: &str = "*";

/// A muted endpoint, written by users as `domain/path-pattern`.
///
/// Pattern forms (the pattern always keeps its leading `/`):
/// - `/log` exact path
/// - `/health*` path prefix
/// - `/^/api/v[0-9]+/log` regex over the path (text after the first `/`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MutedPath {
    pub domain: String,
    pub pattern: String,
}

/// How a mute pattern is matched against a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutePatternKind {
    Exact,
    Prefix,
    Regex,
}

impl MutedPath {
    /// Parse `domain/path-pattern`. Returns `None` when there is no `/`
    /// or the domain part is empty.
    pub fn parse(rule: &str) -> Option<Self> {
        let rule = rule.trim();
        let idx = rule.find('/')?;
        let (domain, pattern) = rule.split_at(idx);
        if domain.is_empty() {
            return None;
        }
        Some(Self {
            domain: domain.to_string(),
            pattern: pattern.to_string(),
        })
    }

    pub fn applies_to_all_domains(&self) -> bool {
        self.domain == ANY_DOMAIN
    }

    pub fn kind(&self) -> MutePatternKind {
        if self.regex_source().is_some() {
            MutePatternKind::Regex
        } else if self.pattern.ends_with('*') {
            MutePatternKind::Prefix
        } else {
            MutePatternKind::Exact
        }
    }

    /// Regex source for `/^...` patterns.
    pub fn regex_source(&self) -> Option<&str> {
        self.pattern
            .strip_prefix('/')
            .filter(|rest| rest.starts_with('^'))
    }

    /// Same rule, ignoring domain case.
    pub fn same_rule(&self, other: &MutedPath) -> bool {
        self.domain.eq_ignore_ascii_case(&other.domain) && self.pattern == other.pattern
    }
}

impl std::fmt::Display for MutedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.domain, self.pattern)
    }
}
