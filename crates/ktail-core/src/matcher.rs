//! Include/exclude filtering on log group names.
//!
//! Matching is plain substring containment, not regex or glob.

use serde::{Deserialize, Serialize};

/// Returns `true` if any token is contained in `msg`.
///
/// An empty token list returns `fallback`, so callers choose whether "no
/// filter" means "match everything" (includes) or "match nothing" (excludes).
pub fn matches_tokens<S: AsRef<str>>(tokens: &[S], msg: &str, fallback: bool) -> bool {
    if tokens.is_empty() {
        return fallback;
    }
    tokens.iter().any(|t| msg.contains(t.as_ref()))
}

/// Log group filter built from repeated `--include` / `--exclude` flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupFilter {
    /// Pass only groups containing one of these (empty = pass all).
    #[serde(default)]
    pub includes: Vec<String>,
    /// Drop groups containing one of these (empty = drop none).
    #[serde(default)]
    pub excludes: Vec<String>,
}

impl GroupFilter {
    pub fn new(includes: Vec<String>, excludes: Vec<String>) -> Self {
        Self { includes, excludes }
    }

    pub fn include(mut self, token: impl Into<String>) -> Self {
        self.includes.push(token.into());
        self
    }

    pub fn exclude(mut self, token: impl Into<String>) -> Self {
        self.excludes.push(token.into());
        self
    }

    /// Returns `true` if messages from `group` should be emitted.
    pub fn admits(&self, group: &str) -> bool {
        matches_tokens(&self.includes, group, true) && !matches_tokens(&self.excludes, group, false)
    }

    pub fn is_empty(&self) -> bool {
        self.includes.is_empty() && self.excludes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: [&str; 0] = [];

    #[test]
    fn empty_tokens_use_fallback() {
        assert!(matches_tokens(&NONE, "anything", true));
        assert!(!matches_tokens(&NONE, "anything", false));
    }

    #[test]
    fn substring_containment() {
        assert!(matches_tokens(&["foo"], "barfoo", true));
        assert!(!matches_tokens(&["foo"], "bar", true));
        assert!(matches_tokens(&["nope", "ar"], "bar", false));
    }

    #[test]
    fn tokens_are_not_patterns() {
        assert!(!matches_tokens(&["b.r"], "bar", true));
        assert!(!matches_tokens(&["*"], "bar", true));
    }

    #[test]
    fn empty_filter_admits_everything() {
        let f = GroupFilter::default();
        assert!(f.is_empty());
        assert!(f.admits("/aws/lambda/anything"));
    }

    #[test]
    fn include_and_exclude() {
        let f = GroupFilter::default().include("lambda").exclude("staging");
        assert!(f.admits("/aws/lambda/prod-api"));
        assert!(!f.admits("/aws/lambda/staging-api"));
        assert!(!f.admits("/ecs/prod-api"));
    }

    #[test]
    fn exclude_only() {
        let f = GroupFilter::default().exclude("noisy");
        assert!(f.admits("/ecs/api"));
        assert!(!f.admits("/ecs/noisy-worker"));
    }
}
