//! Core data model: tenants, assets, aliases, domain bindings, and the
//! proxy/cache/retention rule entities that the serving pipeline evaluates.
//!
//! Relations that the source expresses as ORM self-references (`Project` →
//! default rule set → `ProxyRule`s; `DeploymentAlias` → rule set; both →
//! `Project`) are plain foreign keys here, resolved via explicit repository
//! lookups rather than bidirectional in-memory pointers — there is no
//! ownership cycle at runtime.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{
    AliasId, AssetId, CacheRuleId, DeploymentId, DomainId, ProjectId, ProxyRuleId,
    RetentionRuleId, RuleSetId, UserId,
};

/// What to do with an unauthorized request for private content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnauthorizedBehavior {
    NotFound,
    RedirectLogin,
}

/// The minimum project role a viewer must hold, ordered least to most privileged.
///
/// `Ord` reflects the role hierarchy so the Permission Oracle (component C)
/// can compare an effective role against a required one with `>=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredRole {
    Authenticated,
    Viewer,
    Contributor,
    Admin,
    Owner,
}

/// Tenant unit. Owns assets, aliases, domain mappings, and rule sets.
///
/// Invariant: `(owner, name)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub owner: String,
    pub name: String,
    pub is_public: bool,
    pub unauthorized_behavior: UnauthorizedBehavior,
    pub required_role: RequiredRole,
    pub default_rule_set_id: Option<RuleSetId>,
    pub created_at: DateTime<Utc>,
}

/// Data required to create a [`Project`]; `id` and `created_at` are server-generated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProject {
    pub owner: String,
    pub name: String,
    pub is_public: bool,
    pub unauthorized_behavior: UnauthorizedBehavior,
    pub required_role: RequiredRole,
    pub default_rule_set_id: Option<RuleSetId>,
}

/// Partial update to a [`Project`]; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub is_public: Option<bool>,
    pub unauthorized_behavior: Option<UnauthorizedBehavior>,
    pub required_role: Option<RequiredRole>,
    pub default_rule_set_id: Option<Option<RuleSetId>>,
}

/// One stored file belonging to a project, optionally scoped to a commit.
///
/// Invariants: `storage_key` is unique; for commit-scoped assets it begins
/// with `{owner}/{name}/commits/{commit_sha}/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub project_id: ProjectId,
    pub file_name: String,
    pub storage_key: String,
    pub mime_type: String,
    pub size: u64,
    /// MD5 content hash, used verbatim as the `ETag`.
    pub content_hash: String,
    pub commit_sha: Option<String>,
    pub branch: Option<String>,
    pub deployment_id: Option<DeploymentId>,
    pub public_path: Option<String>,
    pub uploaded_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAsset {
    pub project_id: ProjectId,
    pub file_name: String,
    pub storage_key: String,
    pub mime_type: String,
    pub size: u64,
    pub content_hash: String,
    pub commit_sha: Option<String>,
    pub branch: Option<String>,
    pub deployment_id: Option<DeploymentId>,
    pub public_path: Option<String>,
    pub uploaded_by: Option<UserId>,
}

/// Assets are never mutated in place; this exists
/// only to satisfy [`crate::repository::Repository`]'s shape and carries no
/// fields callers are expected to populate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAsset {}

/// A mutable, human-readable pointer at an immutable commit.
///
/// Invariant: `(project_id, alias)` is unique. A `None` override means
/// "inherit from project" (see the Visibility Resolver, component E).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentAlias {
    pub id: AliasId,
    pub project_id: ProjectId,
    pub alias: String,
    pub commit_sha: String,
    pub deployment_id: DeploymentId,
    pub is_auto_preview: bool,
    pub base_path: Option<String>,
    pub proxy_rule_set_id: Option<RuleSetId>,
    pub is_public: Option<bool>,
    pub unauthorized_behavior: Option<UnauthorizedBehavior>,
    pub required_role: Option<RequiredRole>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDeploymentAlias {
    pub project_id: ProjectId,
    pub alias: String,
    pub commit_sha: String,
    pub deployment_id: DeploymentId,
    pub is_auto_preview: bool,
    pub base_path: Option<String>,
    pub proxy_rule_set_id: Option<RuleSetId>,
    pub is_public: Option<bool>,
    pub unauthorized_behavior: Option<UnauthorizedBehavior>,
    pub required_role: Option<RequiredRole>,
}

/// Re-pointing an alias atomically swaps `commit_sha`/`deployment_id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDeploymentAlias {
    pub commit_sha: Option<String>,
    pub deployment_id: Option<DeploymentId>,
    pub base_path: Option<Option<String>>,
    pub proxy_rule_set_id: Option<Option<RuleSetId>>,
    pub is_public: Option<Option<bool>>,
    pub unauthorized_behavior: Option<Option<UnauthorizedBehavior>>,
    pub required_role: Option<Option<RequiredRole>>,
}

/// How an external domain is bound into the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainType {
    Subdomain,
    Custom,
    Redirect,
}

/// Whether the `www` and apex forms of a custom domain should redirect into
/// each other, or be served independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WwwBehavior {
    RedirectToWww,
    RedirectToApex,
    None,
}

/// An external domain binding.
///
/// Invariants: `domain` is globally unique; exactly one mapping may have
/// `is_primary = true`; `Redirect` rows carry `redirect_target` and no
/// project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainMapping {
    pub id: DomainId,
    pub project_id: Option<ProjectId>,
    pub alias_id: Option<AliasId>,
    pub path: Option<String>,
    pub domain: String,
    pub domain_type: DomainType,
    pub redirect_target: Option<String>,
    pub is_active: bool,
    pub is_public: Option<bool>,
    pub is_spa: bool,
    pub is_primary: bool,
    pub www_behavior: Option<WwwBehavior>,
    pub sticky_sessions_enabled: bool,
    pub sticky_session_duration_secs: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDomainMapping {
    pub project_id: Option<ProjectId>,
    pub alias_id: Option<AliasId>,
    pub path: Option<String>,
    pub domain: String,
    pub domain_type: DomainType,
    pub redirect_target: Option<String>,
    pub is_active: bool,
    pub is_public: Option<bool>,
    pub is_spa: bool,
    pub is_primary: bool,
    pub www_behavior: Option<WwwBehavior>,
    pub sticky_sessions_enabled: bool,
    pub sticky_session_duration_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDomainMapping {
    pub alias_id: Option<Option<AliasId>>,
    pub redirect_target: Option<Option<String>>,
    pub is_active: Option<bool>,
    pub is_public: Option<Option<bool>>,
    pub is_spa: Option<bool>,
    pub is_primary: Option<bool>,
    pub www_behavior: Option<Option<WwwBehavior>>,
    pub sticky_sessions_enabled: Option<bool>,
    pub sticky_session_duration_secs: Option<u64>,
}

/// A named, reusable collection of proxy rules attachable to aliases or as
/// a project default.
///
/// Invariant: `(project_id, name)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyRuleSet {
    pub id: RuleSetId,
    pub project_id: ProjectId,
    pub name: String,
    pub environment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProxyRuleSet {
    pub project_id: ProjectId,
    pub name: String,
    pub environment: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProxyRuleSet {
    pub name: Option<String>,
    pub environment: Option<Option<String>>,
}

/// How a matched `ProxyRule` is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyType {
    ExternalProxy,
    InternalRewrite,
    EmailFormHandler,
}

/// Header forwarding policy applied by the Proxy Engine (component G).
///
/// `add` values are encrypted at rest with AEAD and decrypted in-process
/// only (see [`crate::crypto`]); this struct always holds the plaintext
/// form once loaded from the repository layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeaderConfig {
    #[serde(default)]
    pub forward: Vec<String>,
    #[serde(default)]
    pub strip: Vec<String>,
    #[serde(default)]
    pub add: HashMap<String, String>,
}

/// Transform applied to outbound auth headers after header assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthTransform {
    /// Extract cookie `cookie_name` and set `Authorization: Bearer <value>`.
    CookieToBearer { cookie_name: String },
}

/// Config specific to `proxy_type == email_form_handler` rules (component I).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailHandlerConfig {
    pub destination_email: Option<String>,
    pub honeypot_field: Option<String>,
    pub reply_to_field: Option<String>,
    pub success_redirect: Option<String>,
    pub cors_origin: Option<String>,
    #[serde(default)]
    pub require_auth: bool,
}

/// One reverse-proxy / rewrite / form-handler rule within a [`ProxyRuleSet`].
///
/// Invariants: `(rule_set_id, path_pattern)` unique; `timeout_ms ∈
/// [1000, 60000]`; evaluation is ordered ascending by `order`, first
/// enabled match wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyRule {
    pub id: ProxyRuleId,
    pub rule_set_id: RuleSetId,
    pub path_pattern: String,
    pub target_url: String,
    pub proxy_type: ProxyType,
    pub strip_prefix: bool,
    pub order: i32,
    pub timeout_ms: u32,
    pub preserve_host: bool,
    pub forward_cookies: bool,
    #[serde(default)]
    pub header_config: HeaderConfig,
    pub auth_transform: Option<AuthTransform>,
    pub email_handler_config: Option<EmailHandlerConfig>,
    pub is_enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl ProxyRule {
    /// `timeout_ms` clamped into the allowed `[1000, 60000]` range.
    pub fn clamped_timeout_ms(&self) -> u32 {
        self.timeout_ms.clamp(1_000, 60_000)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProxyRule {
    pub rule_set_id: RuleSetId,
    pub path_pattern: String,
    pub target_url: String,
    pub proxy_type: ProxyType,
    pub strip_prefix: bool,
    pub order: i32,
    pub timeout_ms: u32,
    pub preserve_host: bool,
    pub forward_cookies: bool,
    pub header_config: HeaderConfig,
    pub auth_transform: Option<AuthTransform>,
    pub email_handler_config: Option<EmailHandlerConfig>,
    pub is_enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProxyRule {
    pub path_pattern: Option<String>,
    pub target_url: Option<String>,
    pub strip_prefix: Option<bool>,
    pub order: Option<i32>,
    pub timeout_ms: Option<u32>,
    pub preserve_host: Option<bool>,
    pub forward_cookies: Option<bool>,
    pub header_config: Option<HeaderConfig>,
    pub auth_transform: Option<Option<AuthTransform>>,
    pub email_handler_config: Option<Option<EmailHandlerConfig>>,
    pub is_enabled: Option<bool>,
}

/// How the `Cache-Control` response visibility is determined (component H).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cacheability {
    Public,
    Private,
    /// Defer to `is_public_content` at evaluation time.
    Inherit,
}

/// A project-scoped `Cache-Control` synthesis rule.
///
/// Lower `priority` evaluates first; first enabled match wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRule {
    pub id: CacheRuleId,
    pub project_id: ProjectId,
    pub path_pattern: String,
    pub browser_max_age: u64,
    pub cdn_max_age: Option<u64>,
    pub stale_while_revalidate: Option<u64>,
    pub immutable: bool,
    pub cacheability: Cacheability,
    pub priority: i32,
    pub is_enabled: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCacheRule {
    pub project_id: ProjectId,
    pub path_pattern: String,
    pub browser_max_age: u64,
    pub cdn_max_age: Option<u64>,
    pub stale_while_revalidate: Option<u64>,
    pub immutable: bool,
    pub cacheability: Cacheability,
    pub priority: i32,
    pub is_enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCacheRule {
    pub path_pattern: Option<String>,
    pub browser_max_age: Option<u64>,
    pub cdn_max_age: Option<Option<u64>>,
    pub stale_while_revalidate: Option<Option<u64>>,
    pub immutable: Option<bool>,
    pub cacheability: Option<Cacheability>,
    pub priority: Option<i32>,
    pub is_enabled: Option<bool>,
}

/// Whether `path_patterns` on a [`RetentionRule`] selects or excludes assets
/// from deletion within an otherwise-eligible commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathMode {
    Include,
    Exclude,
}

/// Aggregate counters and errors from the most recent execution of a
/// [`RetentionRule`], attached without failing the whole run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetentionRunSummary {
    pub commits_deleted: u64,
    pub commits_partially_deleted: u64,
    pub assets_deleted: u64,
    pub bytes_freed: u64,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// A declarative storage-reclamation policy for a project.
///
/// Invariant: `execution_started_at` is non-null iff an execution is in
/// flight (the singleton lock described below).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionRule {
    pub id: RetentionRuleId,
    pub project_id: ProjectId,
    pub name: String,
    pub branch_pattern: String,
    #[serde(default)]
    pub exclude_branches: Vec<String>,
    pub retention_days: u32,
    pub keep_with_alias: bool,
    pub keep_minimum: u32,
    pub path_patterns: Option<Vec<String>>,
    pub path_mode: Option<PathMode>,
    pub enabled: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: DateTime<Utc>,
    pub execution_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_run_summary: RetentionRunSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRetentionRule {
    pub project_id: ProjectId,
    pub name: String,
    pub branch_pattern: String,
    pub exclude_branches: Vec<String>,
    pub retention_days: u32,
    pub keep_with_alias: bool,
    pub keep_minimum: u32,
    pub path_patterns: Option<Vec<String>>,
    pub path_mode: Option<PathMode>,
    pub enabled: bool,
    pub next_run_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRetentionRule {
    pub name: Option<String>,
    pub branch_pattern: Option<String>,
    pub exclude_branches: Option<Vec<String>>,
    pub retention_days: Option<u32>,
    pub keep_with_alias: Option<bool>,
    pub keep_minimum: Option<u32>,
    pub path_patterns: Option<Option<Vec<String>>>,
    pub path_mode: Option<Option<PathMode>>,
    pub enabled: Option<bool>,
}

/// Append-only record of one retention deletion decision.
///
/// Sealed into the BLAKE3 hash chain in [`crate::audit`] before persistence,
/// giving every row a tamper-evident `hash`/`previous_hash` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionLog {
    pub project_id: ProjectId,
    pub rule_id: Option<RetentionRuleId>,
    pub commit_sha: String,
    pub branch: Option<String>,
    pub asset_count: u64,
    pub freed_bytes: u64,
    pub is_partial: bool,
    pub deleted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_role_orders_least_to_most_privileged() {
        assert!(RequiredRole::Viewer < RequiredRole::Contributor);
        assert!(RequiredRole::Contributor < RequiredRole::Admin);
        assert!(RequiredRole::Admin < RequiredRole::Owner);
        assert!(RequiredRole::Authenticated < RequiredRole::Viewer);
    }

    #[test]
    fn proxy_rule_clamps_timeout_into_allowed_bounds() {
        let mut rule = sample_proxy_rule();
        rule.timeout_ms = 500;
        assert_eq!(rule.clamped_timeout_ms(), 1_000);
        rule.timeout_ms = 120_000;
        assert_eq!(rule.clamped_timeout_ms(), 60_000);
        rule.timeout_ms = 5_000;
        assert_eq!(rule.clamped_timeout_ms(), 5_000);
    }

    #[test]
    fn header_config_default_is_empty() {
        let config = HeaderConfig::default();
        assert!(config.forward.is_empty());
        assert!(config.strip.is_empty());
        assert!(config.add.is_empty());
    }

    #[test]
    fn auth_transform_serde_roundtrip() {
        let transform = AuthTransform::CookieToBearer {
            cookie_name: "sAccessToken".to_string(),
        };
        let json = serde_json::to_string(&transform).unwrap();
        assert!(json.contains("cookie_to_bearer"));
        let back: AuthTransform = serde_json::from_str(&json).unwrap();
        assert_eq!(back, transform);
    }

    fn sample_proxy_rule() -> ProxyRule {
        ProxyRule {
            id: ProxyRuleId::new(),
            rule_set_id: RuleSetId::new(),
            path_pattern: "/api/*".to_string(),
            target_url: "https://backend/v1".to_string(),
            proxy_type: ProxyType::ExternalProxy,
            strip_prefix: true,
            order: 0,
            timeout_ms: 5_000,
            preserve_host: false,
            forward_cookies: false,
            header_config: HeaderConfig::default(),
            auth_transform: None,
            email_handler_config: None,
            is_enabled: true,
            created_at: Utc::now(),
        }
    }
}
