//! Rule-Set Cache
//!
//! Two TTL-bounded, explicitly-invalidated in-process caches sit in front of
//! the repository layer: one keyed by `ruleSetId` for compiled proxy rules
//! (10 s TTL), one keyed by `projectId` for compiled cache rules (5 min TTL).
//!
//! Entries are immutable snapshots behind an `Arc`; a write replaces the map
//! entry's pointer rather than mutating through it, so concurrent readers
//! never observe a torn value. Staleness is bounded by the TTL; an explicit
//! `invalidate` call (driven by any mutating admin operation) drops an entry
//! immediately regardless of its age.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::glob::GlobPattern;
use crate::ids::{CacheRuleId, ProjectId, ProxyRuleId, RuleSetId};
use crate::models::{CacheRule, ProxyRule};

const PROXY_RULE_TTL: Duration = Duration::from_secs(10);
const CACHE_RULE_TTL: Duration = Duration::from_secs(5 * 60);

/// A proxy rule paired with its compiled path-pattern matcher.
#[derive(Debug, Clone)]
pub struct CompiledProxyRule {
    pub rule: ProxyRule,
    pub matcher: GlobPattern,
}

/// A cache rule paired with its compiled path-pattern matcher.
#[derive(Debug, Clone)]
pub struct CompiledCacheRule {
    pub rule: CacheRule,
    pub matcher: GlobPattern,
}

struct Entry<T> {
    value: Arc<T>,
    inserted_at: Instant,
}

impl<T> Entry<T> {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() < ttl
    }
}

/// Snapshot cache for compiled proxy rules, keyed by rule-set id.
pub struct ProxyRuleCache {
    entries: DashMap<RuleSetId, Entry<Vec<CompiledProxyRule>>>,
}

impl ProxyRuleCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Return a cached, still-fresh snapshot for `rule_set_id`, or `None` on
    /// a miss or expiry (callers should recompile and call [`put`](Self::put)).
    pub fn get(&self, rule_set_id: &RuleSetId) -> Option<Arc<Vec<CompiledProxyRule>>> {
        self.entries.get(rule_set_id).and_then(|entry| {
            if entry.is_fresh(PROXY_RULE_TTL) {
                Some(Arc::clone(&entry.value))
            } else {
                None
            }
        })
    }

    /// Install a freshly-compiled snapshot, replacing whatever was there.
    pub fn put(&self, rule_set_id: RuleSetId, rules: Vec<CompiledProxyRule>) -> Arc<Vec<CompiledProxyRule>> {
        let value = Arc::new(rules);
        self.entries.insert(
            rule_set_id,
            Entry {
                value: Arc::clone(&value),
                inserted_at: Instant::now(),
            },
        );
        value
    }

    /// Drop the entry for `rule_set_id` immediately, bypassing TTL.
    ///
    /// Called synchronously by every mutating operation on a `ProxyRule` or
    /// `ProxyRuleSet` before the mutation is reported as committed.
    pub fn invalidate(&self, rule_set_id: &RuleSetId) {
        self.entries.remove(rule_set_id);
    }

    /// Drop every entry whose compiled rules reference `rule_id` — used when
    /// a rule moves between rule sets and the owning set isn't known.
    pub fn invalidate_containing(&self, rule_id: &ProxyRuleId) {
        self.entries.retain(|_, entry| {
            !entry.value.iter().any(|r| &r.rule.id == rule_id)
        });
    }
}

impl Default for ProxyRuleCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot cache for compiled cache rules, keyed by project id.
pub struct CacheRuleCache {
    entries: DashMap<ProjectId, Entry<Vec<CompiledCacheRule>>>,
}

impl CacheRuleCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, project_id: &ProjectId) -> Option<Arc<Vec<CompiledCacheRule>>> {
        self.entries.get(project_id).and_then(|entry| {
            if entry.is_fresh(CACHE_RULE_TTL) {
                Some(Arc::clone(&entry.value))
            } else {
                None
            }
        })
    }

    pub fn put(&self, project_id: ProjectId, rules: Vec<CompiledCacheRule>) -> Arc<Vec<CompiledCacheRule>> {
        let value = Arc::new(rules);
        self.entries.insert(
            project_id,
            Entry {
                value: Arc::clone(&value),
                inserted_at: Instant::now(),
            },
        );
        value
    }

    /// Drop the entry for `project_id` immediately, bypassing TTL.
    ///
    /// Called synchronously by every mutating operation on a `CacheRule`
    /// before the mutation is reported as committed.
    pub fn invalidate(&self, project_id: &ProjectId) {
        self.entries.remove(project_id);
    }

    pub fn invalidate_containing(&self, rule_id: &CacheRuleId) {
        self.entries.retain(|_, entry| {
            !entry.value.iter().any(|r| &r.rule.id == rule_id)
        });
    }
}

impl Default for CacheRuleCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Compile a proxy rule's path pattern into a [`CompiledProxyRule`].
pub fn compile_proxy_rule(rule: ProxyRule) -> Result<CompiledProxyRule, crate::glob::GlobError> {
    let matcher = GlobPattern::compile(&rule.path_pattern)?;
    Ok(CompiledProxyRule { rule, matcher })
}

/// Compile a cache rule's path pattern into a [`CompiledCacheRule`].
pub fn compile_cache_rule(rule: CacheRule) -> Result<CompiledCacheRule, crate::glob::GlobError> {
    let matcher = GlobPattern::compile(&rule.path_pattern)?;
    Ok(CompiledCacheRule { rule, matcher })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_proxy_rule(rule_set_id: RuleSetId, order: i32) -> ProxyRule {
        ProxyRule {
            id: ProxyRuleId::new(),
            rule_set_id,
            path_pattern: "/api/*".to_string(),
            target_url: "https://backend/v1".to_string(),
            proxy_type: crate::models::ProxyType::ExternalProxy,
            strip_prefix: true,
            order,
            timeout_ms: 5_000,
            preserve_host: false,
            forward_cookies: false,
            header_config: Default::default(),
            auth_transform: None,
            email_handler_config: None,
            is_enabled: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn miss_then_put_then_hit() {
        let cache = ProxyRuleCache::new();
        let rule_set_id = RuleSetId::new();
        assert!(cache.get(&rule_set_id).is_none());

        let rule = compile_proxy_rule(sample_proxy_rule(rule_set_id.clone(), 0)).unwrap();
        cache.put(rule_set_id.clone(), vec![rule]);

        assert!(cache.get(&rule_set_id).is_some());
    }

    #[test]
    fn invalidate_drops_the_entry_immediately() {
        let cache = ProxyRuleCache::new();
        let rule_set_id = RuleSetId::new();
        let rule = compile_proxy_rule(sample_proxy_rule(rule_set_id.clone(), 0)).unwrap();
        cache.put(rule_set_id.clone(), vec![rule]);
        assert!(cache.get(&rule_set_id).is_some());

        cache.invalidate(&rule_set_id);
        assert!(cache.get(&rule_set_id).is_none());
    }

    #[test]
    fn distinct_rule_sets_do_not_collide() {
        let cache = ProxyRuleCache::new();
        let a = RuleSetId::new();
        let b = RuleSetId::new();
        cache.put(a.clone(), vec![compile_proxy_rule(sample_proxy_rule(a.clone(), 0)).unwrap()]);
        assert!(cache.get(&a).is_some());
        assert!(cache.get(&b).is_none());
    }

    #[test]
    fn cache_rule_cache_round_trips() {
        let cache = CacheRuleCache::new();
        let project_id = ProjectId::new();
        let rule = CacheRule {
            id: CacheRuleId::new(),
            project_id: project_id.clone(),
            path_pattern: "*.json".to_string(),
            browser_max_age: 300,
            cdn_max_age: None,
            stale_while_revalidate: None,
            immutable: false,
            cacheability: crate::models::Cacheability::Inherit,
            priority: 0,
            is_enabled: true,
            created_at: Utc::now(),
        };
        cache.put(project_id.clone(), vec![compile_cache_rule(rule).unwrap()]);
        assert!(cache.get(&project_id).is_some());
        cache.invalidate(&project_id);
        assert!(cache.get(&project_id).is_none());
    }
}
