//! Cache-Header Engine
//!
//! Synthesizes the `Cache-Control` directive (and a derived origin-cache
//! TTL) for a direct-served asset response, consulting the compiled
//! [`CacheRuleCache`](crate::rule_cache::CacheRuleCache) for a project-scoped
//! override before falling back to content-type defaults.

use crate::models::Cacheability;
use crate::rule_cache::CompiledCacheRule;

/// Inputs to the directive-synthesis algorithm.
#[derive(Debug, Clone, Copy)]
pub struct CacheHeaderInput<'a> {
    pub file_path: &'a str,
    pub is_immutable_url: bool,
    pub is_public_content: bool,
}

/// A synthesized `Cache-Control` directive plus the TTL the origin should
/// hold the object for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDirective {
    pub header_value: String,
    pub origin_cache_ttl_secs: u64,
}

/// Evaluate `rules` in ascending priority order and synthesize the
/// directive for `input`.
pub fn resolve(input: CacheHeaderInput<'_>, rules: &[CompiledCacheRule]) -> CacheDirective {
    let mut sorted: Vec<&CompiledCacheRule> = rules.iter().filter(|r| r.rule.is_enabled).collect();
    sorted.sort_by_key(|r| r.rule.priority);

    let matched = sorted
        .iter()
        .find(|r| r.matcher.is_match(input.file_path))
        .map(|r| &r.rule);

    let (cacheability, max_age, cdn_max_age, stale_while_revalidate, immutable) = match matched {
        Some(rule) => (
            rule.cacheability,
            rule.browser_max_age,
            rule.cdn_max_age,
            rule.stale_while_revalidate,
            rule.immutable,
        ),
        None => default_for(input),
    };

    let public = match cacheability {
        Cacheability::Public => true,
        Cacheability::Private => false,
        Cacheability::Inherit => input.is_public_content,
    };

    let mut parts = vec![if public { "public".to_string() } else { "private".to_string() }];
    parts.push(format!("max-age={}", max_age));
    if let Some(s_maxage) = cdn_max_age {
        if s_maxage != max_age {
            parts.push(format!("s-maxage={}", s_maxage));
        }
    }
    if let Some(swr) = stale_while_revalidate {
        parts.push(format!("stale-while-revalidate={}", swr));
    }
    parts.push(if immutable { "immutable".to_string() } else { "must-revalidate".to_string() });

    let origin_cache_ttl_secs = (max_age.max(cdn_max_age.unwrap_or(0)) + 60).max(300);

    CacheDirective {
        header_value: parts.join(", "),
        origin_cache_ttl_secs,
    }
}

/// Defaults applied when no cache rule matches.
///
/// Content-hashed URLs cache for a year and are immutable; HTML documents
/// default to `max-age=0` since an alias can move underneath them at any
/// time; everything else gets a conservative five-minute default.
fn default_for(input: CacheHeaderInput<'_>) -> (Cacheability, u64, Option<u64>, Option<u64>, bool) {
    if input.is_immutable_url {
        return (Cacheability::Inherit, 31_536_000, None, None, true);
    }
    if is_html(input.file_path) {
        return (Cacheability::Inherit, 0, None, None, false);
    }
    (Cacheability::Inherit, 300, None, None, false)
}

fn is_html(path: &str) -> bool {
    path.ends_with(".html") || path.ends_with(".htm")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(path: &'static str) -> CacheHeaderInput<'static> {
        CacheHeaderInput {
            file_path: path,
            is_immutable_url: false,
            is_public_content: true,
        }
    }

    #[test]
    fn immutable_url_gets_year_long_immutable_directive() {
        let mut i = input("/assets/app.a1b2c3.js");
        i.is_immutable_url = true;
        let d = resolve(i, &[]);
        assert_eq!(d.header_value, "public, max-age=31536000, immutable");
        assert_eq!(d.origin_cache_ttl_secs, 31_536_060);
    }

    #[test]
    fn html_defaults_to_zero_max_age_and_must_revalidate() {
        let d = resolve(input("/index.html"), &[]);
        assert_eq!(d.header_value, "public, max-age=0, must-revalidate");
        assert_eq!(d.origin_cache_ttl_secs, 300);
    }

    #[test]
    fn other_files_default_to_five_minutes() {
        let d = resolve(input("/data.bin"), &[]);
        assert_eq!(d.header_value, "public, max-age=300, must-revalidate");
    }

    #[test]
    fn private_content_defaults_to_private_directive() {
        let mut i = input("/data.bin");
        i.is_public_content = false;
        let d = resolve(i, &[]);
        assert_eq!(d.header_value, "private, max-age=300, must-revalidate");
    }

    #[test]
    fn s_maxage_omitted_when_equal_to_max_age() {
        use crate::ids::{CacheRuleId, ProjectId};
        use crate::glob::GlobPattern;
        use crate::models::CacheRule;
        use chrono::Utc;

        let rule = CacheRule {
            id: CacheRuleId::new(),
            project_id: ProjectId::new(),
            path_pattern: "*.json".to_string(),
            browser_max_age: 60,
            cdn_max_age: Some(60),
            stale_while_revalidate: Some(30),
            immutable: false,
            cacheability: Cacheability::Public,
            priority: 0,
            is_enabled: true,
            created_at: Utc::now(),
        };
        let compiled = CompiledCacheRule {
            matcher: GlobPattern::compile(&rule.path_pattern).unwrap(),
            rule,
        };
        let d = resolve(input("/data.json"), std::slice::from_ref(&compiled));
        assert_eq!(d.header_value, "public, max-age=60, stale-while-revalidate=30, must-revalidate");
    }

    #[test]
    fn first_match_in_priority_order_wins() {
        use crate::ids::{CacheRuleId, ProjectId};
        use crate::glob::GlobPattern;
        use crate::models::CacheRule;
        use chrono::Utc;

        let project_id = ProjectId::new();
        let make = |pattern: &str, priority: i32, max_age: u64| CompiledCacheRule {
            matcher: GlobPattern::compile(pattern).unwrap(),
            rule: CacheRule {
                id: CacheRuleId::new(),
                project_id: project_id.clone(),
                path_pattern: pattern.to_string(),
                browser_max_age: max_age,
                cdn_max_age: None,
                stale_while_revalidate: None,
                immutable: false,
                cacheability: Cacheability::Public,
                priority,
                is_enabled: true,
                created_at: Utc::now(),
            },
        };
        let rules = vec![make("*.json", 5, 10), make("/data/*", 1, 20)];
        let d = resolve(input("/data/manifest.json"), &rules);
        assert_eq!(d.header_value, "public, max-age=20, must-revalidate");
    }
}
