//! In-memory backend implementing the serving pipeline's external
//! collaborators (`RouterRepository`, `RetentionRepository`,
//! `PermissionOracle`, `Storage`).
//!
//! Object storage, relational persistence, and authentication are external
//! collaborators the core crate only defines capability traits for; a real
//! deployment wires a Postgres-backed repository, an S3/GCS-backed store,
//! and a session/API-key oracle instead of this type. This backend exists so
//! `platform-server` has something to drive its HTTP routes against and so
//! the wiring can be exercised end-to-end without external services.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::RwLock;

use axum::body::Bytes;
use chrono::{DateTime, Utc};
use futures::stream;
use platform_core::ids::{AliasId, AssetId, CacheRuleId, DomainId, ProjectId, RetentionRuleId, RuleSetId, UserId};
use platform_core::models::{
    Asset, CacheRule, DeploymentAlias, DomainMapping, Project, ProxyRule, RequiredRole,
    RetentionLog, RetentionRule, RetentionRunSummary,
};
use platform_core::permission::PermissionOracle;
use platform_core::retention::{AssetRef, CommitGroup, RetentionRepository};
use platform_core::router::RouterRepository;
use platform_core::storage::{ByteStream, Storage, StorageError};
use platform_core::{Error, Result};

/// Everything the backend holds, guarded by a single lock per table.
///
/// A real repository would split these across transactional queries; this
/// stand-in only needs to be internally consistent for one process.
#[derive(Default)]
struct Tables {
    projects: HashMap<ProjectId, Project>,
    domains: HashMap<DomainId, DomainMapping>,
    aliases: HashMap<AliasId, DeploymentAlias>,
    proxy_rules: HashMap<RuleSetId, Vec<ProxyRule>>,
    cache_rules: HashMap<ProjectId, Vec<CacheRule>>,
    assets: HashMap<AssetId, Asset>,
    retention_rules: HashMap<RetentionRuleId, RetentionRule>,
    retention_logs: Vec<RetentionLog>,
    admins: Vec<UserId>,
    grants: HashMap<(UserId, ProjectId), RequiredRole>,
    objects: HashMap<String, Bytes>,
}

/// The in-memory stand-in for every non-goal external collaborator.
///
/// Cheap to clone (an `Arc` around this is what callers actually share); the
/// lock itself never crosses an `.await` point.
pub struct MemoryBackend {
    tables: RwLock<Tables>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }

    fn tables(&self) -> std::sync::RwLockReadGuard<'_, Tables> {
        self.tables.read().expect("memory backend lock poisoned")
    }

    fn tables_mut(&self) -> std::sync::RwLockWriteGuard<'_, Tables> {
        self.tables.write().expect("memory backend lock poisoned")
    }

    pub fn insert_project(&self, project: Project) {
        self.tables_mut().projects.insert(project.id.clone(), project);
    }

    pub fn insert_domain(&self, domain: DomainMapping) {
        self.tables_mut().domains.insert(domain.id.clone(), domain);
    }

    pub fn insert_alias(&self, alias: DeploymentAlias) {
        self.tables_mut().aliases.insert(alias.id.clone(), alias);
    }

    pub fn insert_proxy_rule(&self, rule: ProxyRule) {
        self.tables_mut()
            .proxy_rules
            .entry(rule.rule_set_id.clone())
            .or_default()
            .push(rule);
    }

    pub fn insert_cache_rule(&self, rule: CacheRule) {
        self.tables_mut()
            .cache_rules
            .entry(rule.project_id.clone())
            .or_default()
            .push(rule);
    }

    pub fn insert_asset(&self, asset: Asset) {
        self.tables_mut().assets.insert(asset.id.clone(), asset);
    }

    pub fn insert_retention_rule(&self, rule: RetentionRule) {
        self.tables_mut().retention_rules.insert(rule.id.clone(), rule);
    }

    pub fn grant_role(&self, user_id: UserId, project_id: ProjectId, role: RequiredRole) {
        self.tables_mut().grants.insert((user_id, project_id), role);
    }

    pub fn grant_platform_admin(&self, user_id: UserId) {
        self.tables_mut().admins.push(user_id);
    }

    /// Cache rules configured for `project_id`, used by the serving route to
    /// populate `CacheRuleCache` on a miss. Not part of [`RouterRepository`]
    /// — the core crate leaves cache-rule lookup unspecified.
    pub fn cache_rules(&self, project_id: &ProjectId) -> Vec<CacheRule> {
        self.tables().cache_rules.get(project_id).cloned().unwrap_or_default()
    }

    /// The stored asset backing a resolved `(project, commit, public_path)`
    /// triple, used by the serving route after [`RouterRepository::asset_exists`]
    /// confirms it's there. Also not part of the trait — the router only
    /// needs an existence check, the route handler needs the row itself.
    pub fn asset_at(&self, project_id: &ProjectId, commit_sha: &str, public_path: &str) -> Option<Asset> {
        self.tables()
            .assets
            .values()
            .find(|a| {
                &a.project_id == project_id
                    && a.commit_sha.as_deref() == Some(commit_sha)
                    && a.public_path.as_deref() == Some(public_path)
            })
            .cloned()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterRepository for MemoryBackend {
    async fn domain_by_host(&self, host: &str) -> Result<Option<DomainMapping>> {
        Ok(self.tables().domains.values().find(|d| d.domain == host).cloned())
    }

    async fn project_by_id(&self, id: &ProjectId) -> Result<Option<Project>> {
        Ok(self.tables().projects.get(id).cloned())
    }

    async fn project_by_owner_repo(&self, owner: &str, name: &str) -> Result<Option<Project>> {
        Ok(self
            .tables()
            .projects
            .values()
            .find(|p| p.owner == owner && p.name == name)
            .cloned())
    }

    async fn alias_by_name(&self, project_id: &ProjectId, name: &str) -> Result<Option<DeploymentAlias>> {
        Ok(self
            .tables()
            .aliases
            .values()
            .find(|a| &a.project_id == project_id && a.alias == name)
            .cloned())
    }

    async fn alias_by_id(&self, id: &AliasId) -> Result<Option<DeploymentAlias>> {
        Ok(self.tables().aliases.get(id).cloned())
    }

    async fn alias_by_name_any_project(&self, name: &str) -> Result<Option<(Project, DeploymentAlias)>> {
        let tables = self.tables();
        let Some(alias) = tables.aliases.values().find(|a| a.alias == name) else {
            return Ok(None);
        };
        let Some(project) = tables.projects.get(&alias.project_id) else {
            return Ok(None);
        };
        Ok(Some((project.clone(), alias.clone())))
    }

    async fn primary_alias_for_project(&self, project_id: &ProjectId) -> Result<Option<DeploymentAlias>> {
        Ok(self
            .tables()
            .aliases
            .values()
            .filter(|a| &a.project_id == project_id)
            .min_by_key(|a| a.created_at)
            .cloned())
    }

    async fn non_preview_alias_on_commit(&self, project_id: &ProjectId, commit_sha: &str) -> Result<Option<DeploymentAlias>> {
        Ok(self
            .tables()
            .aliases
            .values()
            .find(|a| &a.project_id == project_id && a.commit_sha == commit_sha && !a.is_auto_preview)
            .cloned())
    }

    async fn proxy_rules(&self, rule_set_id: &RuleSetId) -> Result<Vec<ProxyRule>> {
        Ok(self.tables().proxy_rules.get(rule_set_id).cloned().unwrap_or_default())
    }

    async fn asset_exists(&self, project_id: &ProjectId, commit_sha: &str, public_path: &str) -> Result<bool> {
        Ok(self.tables().assets.values().any(|a| {
            &a.project_id == project_id
                && a.commit_sha.as_deref() == Some(commit_sha)
                && a.public_path.as_deref() == Some(public_path)
        }))
    }
}

impl RetentionRepository for MemoryBackend {
    async fn due_rules(&self, now: DateTime<Utc>) -> Result<Vec<RetentionRule>> {
        Ok(self
            .tables()
            .retention_rules
            .values()
            .filter(|r| r.enabled && r.execution_started_at.is_none() && r.next_run_at <= now)
            .cloned()
            .collect())
    }

    async fn try_acquire_lock(&self, rule_id: &RetentionRuleId, now: DateTime<Utc>) -> Result<bool> {
        let mut tables = self.tables_mut();
        let Some(rule) = tables.retention_rules.get_mut(rule_id) else {
            return Ok(false);
        };
        if rule.execution_started_at.is_some() {
            return Ok(false);
        }
        rule.execution_started_at = Some(now);
        Ok(true)
    }

    async fn release_lock(
        &self,
        rule_id: &RetentionRuleId,
        summary: RetentionRunSummary,
        last_run_at: DateTime<Utc>,
        next_run_at: DateTime<Utc>,
    ) -> Result<()> {
        if let Some(rule) = self.tables_mut().retention_rules.get_mut(rule_id) {
            rule.execution_started_at = None;
            rule.last_run_at = Some(last_run_at);
            rule.next_run_at = next_run_at;
            rule.last_run_summary = summary;
        }
        Ok(())
    }

    async fn candidate_commits(&self, project_id: &ProjectId) -> Result<Vec<CommitGroup>> {
        let tables = self.tables();
        let mut groups: HashMap<(String, Option<String>), CommitGroup> = HashMap::new();
        for asset in tables.assets.values().filter(|a| &a.project_id == project_id) {
            let Some(commit_sha) = &asset.commit_sha else { continue };
            let key = (commit_sha.clone(), asset.branch.clone());
            let entry = groups.entry(key).or_insert_with(|| CommitGroup {
                commit_sha: commit_sha.clone(),
                branch: asset.branch.clone(),
                min_created_at: asset.created_at,
                asset_count: 0,
                total_size: 0,
            });
            entry.min_created_at = entry.min_created_at.min(asset.created_at);
            entry.asset_count += 1;
            entry.total_size += asset.size;
        }
        Ok(groups.into_values().collect())
    }

    async fn assets_for_commit(&self, project_id: &ProjectId, commit_sha: &str) -> Result<Vec<AssetRef>> {
        Ok(self
            .tables()
            .assets
            .values()
            .filter(|a| &a.project_id == project_id && a.commit_sha.as_deref() == Some(commit_sha))
            .map(|a| AssetRef {
                id: a.id.clone(),
                storage_key: a.storage_key.clone(),
                public_path: a.public_path.clone(),
                size: a.size,
            })
            .collect())
    }

    async fn has_non_preview_alias(&self, project_id: &ProjectId, commit_sha: &str) -> Result<bool> {
        Ok(self
            .tables()
            .aliases
            .values()
            .any(|a| &a.project_id == project_id && a.commit_sha == commit_sha && !a.is_auto_preview))
    }

    async fn delete_commit(&self, project_id: &ProjectId, commit_sha: &str) -> Result<()> {
        self.tables_mut()
            .assets
            .retain(|_, a| !(&a.project_id == project_id && a.commit_sha.as_deref() == Some(commit_sha)));
        Ok(())
    }

    async fn delete_assets(&self, asset_ids: &[AssetId]) -> Result<()> {
        let mut tables = self.tables_mut();
        for id in asset_ids {
            tables.assets.remove(id);
        }
        Ok(())
    }

    async fn append_log(&self, log: RetentionLog) -> Result<()> {
        self.tables_mut().retention_logs.push(log);
        Ok(())
    }
}

impl PermissionOracle for MemoryBackend {
    async fn project_role(&self, user_id: &UserId, project_id: &ProjectId) -> Option<RequiredRole> {
        self.tables().grants.get(&(user_id.clone(), project_id.clone())).copied()
    }

    async fn is_platform_admin(&self, user_id: &UserId) -> bool {
        self.tables().admins.contains(user_id)
    }
}

impl Storage for MemoryBackend {
    async fn upload(&self, key: &str, body: Bytes, _content_type: Option<&str>) -> std::result::Result<(), StorageError> {
        self.tables_mut().objects.insert(key.to_string(), body);
        Ok(())
    }

    async fn download(&self, key: &str) -> std::result::Result<ByteStream, StorageError> {
        let bytes = self
            .tables()
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        let s = stream::once(async move { Ok(bytes) });
        Ok(Box::pin(s) as Pin<Box<_>>)
    }

    async fn delete(&self, key: &str) -> std::result::Result<(), StorageError> {
        self.tables_mut().objects.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> std::result::Result<u64, StorageError> {
        let mut tables = self.tables_mut();
        let keys: Vec<String> = tables
            .objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        let count = keys.len() as u64;
        for key in keys {
            tables.objects.remove(&key);
        }
        Ok(count)
    }

    async fn get_url(&self, key: &str, expires_in_secs: u64) -> std::result::Result<String, StorageError> {
        Ok(format!("memory://{key}?expires_in={expires_in_secs}"))
    }

    async fn exists(&self, key: &str) -> std::result::Result<bool, StorageError> {
        Ok(self.tables().objects.contains_key(key))
    }
}

/// Map a storage-level failure into the crate-wide error, the way a real
/// backend's glue code would at the handler boundary.
pub fn storage_error(err: StorageError) -> Error {
    match err {
        StorageError::NotFound(key) => Error::NotFound(format!("object {key}")),
        other => Error::Storage(other.to_string()),
    }
}
