//! Glob matcher for proxy-rule path patterns and retention-rule branch patterns
//!
//! Patterns are compiled once into a regex and re-used for every match, so
//! evaluation cost is independent of how many times a pattern is checked.
//! Four shapes are supported:
//!
//! - exact: `/docs/index.html`
//! - prefix wildcard: `/api/*` matches `/api` and everything under it, at
//!   any depth (`/api/v1/users`, not just one segment)
//! - suffix wildcard: `*.json` matches any path ending in `.json`
//! - double-star: `feature/**` matches `feature/` and any nested path below it
//!
//! Paths are matched case-sensitively; commit SHAs are matched
//! case-insensitively (construct with [`GlobPattern::compile_ci`]).

use std::fmt;

use regex::{escape, Regex, RegexBuilder};

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    regex: Regex,
    specificity: u32,
}

/// Error compiling a glob pattern.
#[derive(Debug, thiserror::Error)]
pub enum GlobError {
    #[error("empty pattern")]
    Empty,
    #[error("invalid pattern regex: {0}")]
    Regex(#[from] regex::Error),
}

impl GlobPattern {
    /// Compile a case-sensitive pattern (used for request paths).
    pub fn compile(pattern: &str) -> Result<Self, GlobError> {
        Self::compile_with_case(pattern, true)
    }

    /// Compile a case-insensitive pattern (used for commit SHAs and branch names).
    pub fn compile_ci(pattern: &str) -> Result<Self, GlobError> {
        Self::compile_with_case(pattern, false)
    }

    fn compile_with_case(pattern: &str, case_sensitive: bool) -> Result<Self, GlobError> {
        if pattern.is_empty() {
            return Err(GlobError::Empty);
        }

        let normalized = normalize_pattern(pattern);
        let regex_source = to_regex_source(&normalized);
        let regex = RegexBuilder::new(&regex_source)
            .case_insensitive(!case_sensitive)
            .build()?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
            specificity: specificity_of(&normalized),
        })
    }

    /// Test whether `candidate` matches this pattern.
    ///
    /// The candidate is normalized the same way patterns are: leading
    /// slashes are collapsed to one. A trailing slash on the candidate only
    /// matches a pattern that itself ends with `/*` or `/**`.
    pub fn is_match(&self, candidate: &str) -> bool {
        let normalized = normalize_leading_slashes(candidate);
        self.regex.is_match(&normalized)
    }

    /// The original, uncompiled pattern text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Higher is more specific (fewer wildcards, longer literal prefix).
    /// Used to pick a winner when several patterns in a rule set match the
    /// same path.
    pub fn specificity(&self) -> u32 {
        self.specificity
    }
}

impl fmt::Display for GlobPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl PartialEq for GlobPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for GlobPattern {}

fn normalize_leading_slashes(s: &str) -> String {
    let trimmed = s.trim_start_matches('/');
    format!("/{}", trimmed)
}

fn normalize_pattern(pattern: &str) -> String {
    normalize_leading_slashes(pattern)
}

/// Translate a normalized glob pattern into an anchored regex source string.
///
/// `**` expands to `.*` (crosses segment boundaries); a lone `*` expands to
/// `[^/]*` (confined to one path segment), except when it is the final
/// character of the pattern and preceded by `/`, in which case it expands to
/// "rest of path" (`(?:/.*)?`) so `/api/*` matches the bare `/api` prefix as
/// well as anything nested under it, at any depth.
fn to_regex_source(pattern: &str) -> String {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();
    let mut literal = String::new();

    fn flush(out: &mut String, literal: &mut String) {
        if !literal.is_empty() {
            out.push_str(&escape(literal));
            literal.clear();
        }
    }

    while let Some(c) = chars.next() {
        if c == '*' {
            if chars.peek() == Some(&'*') {
                chars.next();
                flush(&mut out, &mut literal);
                out.push_str(".*");
            } else {
                flush(&mut out, &mut literal);
                if out.ends_with('/') && chars.peek().is_none() {
                    // `/api/*` also matches the bare `/api` prefix and anything nested below it.
                    out.pop();
                    out.push_str("(?:/.*)?");
                } else {
                    out.push_str("[^/]*");
                }
            }
        } else {
            literal.push(c);
        }
    }
    flush(&mut out, &mut literal);
    out.push('$');
    out
}

/// Score a normalized pattern: longer literal runs and fewer wildcards win.
fn specificity_of(pattern: &str) -> u32 {
    let wildcard_penalty = pattern.matches("**").count() as u32 * 100
        + pattern.matches('*').count() as u32 * 10
        - pattern.matches("**").count() as u32 * 10; // `**` was double-counted by the `*` term above
    let literal_len = pattern.chars().filter(|c| *c != '*').count() as u32;
    literal_len.saturating_mul(10).saturating_sub(wildcard_penalty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_pattern_matches_only_itself() {
        let p = GlobPattern::compile("/docs/index.html").unwrap();
        assert!(p.is_match("/docs/index.html"));
        assert!(!p.is_match("/docs/index.htm"));
        assert!(!p.is_match("/docs/index.html/"));
    }

    #[test]
    fn prefix_wildcard_matches_bare_and_nested() {
        let p = GlobPattern::compile("/api/*").unwrap();
        assert!(p.is_match("/api"));
        assert!(p.is_match("/api/"));
        assert!(p.is_match("/api/v1/users"));
        assert!(!p.is_match("/apix"));
    }

    #[test]
    fn prefix_wildcard_matches_nested_segments() {
        let p = GlobPattern::compile("/assets/*").unwrap();
        assert!(p.is_match("/assets/logo.png"));
        assert!(p.is_match("/assets/img/logo.png"));
        assert!(!p.is_match("/assetsx"));
    }

    #[test]
    fn suffix_wildcard_matches_extension() {
        let p = GlobPattern::compile("*.json").unwrap();
        assert!(p.is_match("/data/manifest.json"));
        assert!(!p.is_match("/data/manifest.jsonc"));
    }

    #[test]
    fn double_star_crosses_segments() {
        let p = GlobPattern::compile("feature/**").unwrap();
        assert!(p.is_match("/feature/"));
        assert!(p.is_match("/feature/login/oauth"));
        assert!(!p.is_match("/feat/login"));
    }

    #[test]
    fn leading_slashes_are_collapsed() {
        let p = GlobPattern::compile("//api/*").unwrap();
        assert!(p.is_match("api/users"));
        assert!(p.is_match("//api/users"));
    }

    #[test]
    fn commit_sha_patterns_are_case_insensitive() {
        let p = GlobPattern::compile_ci("/deploy/abc123DEF").unwrap();
        assert!(p.is_match("/deploy/ABC123def"));
    }

    #[test]
    fn paths_are_case_sensitive_by_default() {
        let p = GlobPattern::compile("/Docs/*").unwrap();
        assert!(!p.is_match("/docs/index.html"));
    }

    #[test]
    fn more_specific_pattern_scores_higher() {
        let broad = GlobPattern::compile("/**").unwrap();
        let narrow = GlobPattern::compile("/api/v1/users").unwrap();
        assert!(narrow.specificity() > broad.specificity());
    }

    #[test]
    fn empty_pattern_is_rejected() {
        assert!(matches!(GlobPattern::compile(""), Err(GlobError::Empty)));
    }
}
