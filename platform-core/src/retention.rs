//! Retention Engine
//!
//! Scheduled traversal of commits by age/branch/path-glob, selecting
//! full-commit or partial-file deletions, cleaning up storage and DB rows,
//! and writing an append-only audit log. Runs on a daily tick
//! (03:00 UTC) with a sequential per-rule loop — no fan-out across rules,
//! per the concurrency model.
//!
//! Persistence is abstracted behind [`RetentionRepository`] (relational
//! persistence is treated as an external collaborator here; the entities
//! and invariants are what matter, not the SQL dialect).

use std::future::Future;

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::error::{Error, Result};
use crate::glob::GlobPattern;
use crate::ids::{AssetId, ProjectId, RetentionRuleId};
use crate::models::{PathMode, RetentionLog, RetentionRule, RetentionRunSummary};
use crate::storage::Storage;
use crate::usage::{NoopUsageReporter, UsageReporter};

/// One distinct `(commitSha, branch)` grouping of assets, as the candidate
/// candidate-enumeration query would return it.
#[derive(Debug, Clone)]
pub struct CommitGroup {
    pub commit_sha: String,
    pub branch: Option<String>,
    pub min_created_at: DateTime<Utc>,
    pub asset_count: u64,
    pub total_size: u64,
}

/// One asset belonging to a candidate commit, enough to classify and delete it.
#[derive(Debug, Clone)]
pub struct AssetRef {
    pub id: AssetId,
    pub storage_key: String,
    pub public_path: Option<String>,
    pub size: u64,
}

/// Relational persistence the retention engine needs, abstracted from the
/// SQL dialect per the repository non-goal.
pub trait RetentionRepository: Send + Sync {
    fn due_rules(&self, now: DateTime<Utc>) -> impl Future<Output = Result<Vec<RetentionRule>>> + Send;

    /// Atomically set `executionStartedAt` from null to `now`; `Ok(false)`
    /// means another execution already holds the lock.
    fn try_acquire_lock(&self, rule_id: &RetentionRuleId, now: DateTime<Utc>) -> impl Future<Output = Result<bool>> + Send;

    fn release_lock(
        &self,
        rule_id: &RetentionRuleId,
        summary: RetentionRunSummary,
        last_run_at: DateTime<Utc>,
        next_run_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send;

    fn candidate_commits(&self, project_id: &ProjectId) -> impl Future<Output = Result<Vec<CommitGroup>>> + Send;

    fn assets_for_commit(&self, project_id: &ProjectId, commit_sha: &str) -> impl Future<Output = Result<Vec<AssetRef>>> + Send;

    fn has_non_preview_alias(&self, project_id: &ProjectId, commit_sha: &str) -> impl Future<Output = Result<bool>> + Send;

    fn delete_commit(&self, project_id: &ProjectId, commit_sha: &str) -> impl Future<Output = Result<()>> + Send;

    fn delete_assets(&self, asset_ids: &[AssetId]) -> impl Future<Output = Result<()>> + Send;

    fn append_log(&self, log: RetentionLog) -> impl Future<Output = Result<()>> + Send;
}

/// Whether a candidate commit survives the age/branch/alias filters of step 3.
fn passes_filters(
    group: &CommitGroup,
    rule: &RetentionRule,
    now: DateTime<Utc>,
    has_alias: bool,
) -> Result<bool> {
    let branch = group.branch.as_deref().unwrap_or("");

    let branch_matcher = GlobPattern::compile(&rule.branch_pattern)
        .map_err(|e| Error::Internal(format!("invalid branch_pattern: {e}")))?;
    if !branch_matcher.is_match(branch) {
        return Ok(false);
    }

    for exclude in &rule.exclude_branches {
        let matcher = GlobPattern::compile(exclude)
            .map_err(|e| Error::Internal(format!("invalid exclude_branches entry: {e}")))?;
        if matcher.is_match(branch) {
            return Ok(false);
        }
    }

    let cutoff = now - ChronoDuration::days(rule.retention_days as i64);
    if group.min_created_at >= cutoff {
        return Ok(false);
    }

    if rule.keep_with_alias && has_alias {
        return Ok(false);
    }

    Ok(true)
}

/// Drop the most recently created `keep_minimum` commits per branch from the
/// deletion set (step 4).
fn apply_keep_minimum(mut candidates: Vec<CommitGroup>, keep_minimum: u32) -> Vec<CommitGroup> {
    use std::collections::HashMap;

    candidates.sort_by_key(|c| c.min_created_at);

    let mut per_branch_remaining: HashMap<String, u32> = HashMap::new();
    for c in &candidates {
        *per_branch_remaining.entry(c.branch.clone().unwrap_or_default()).or_insert(0) += 1;
    }

    let mut kept_so_far: HashMap<String, u32> = HashMap::new();
    candidates
        .into_iter()
        .rev()
        .filter(|c| {
            let branch = c.branch.clone().unwrap_or_default();
            let total = *per_branch_remaining.get(&branch).unwrap_or(&0);
            let kept = kept_so_far.entry(branch).or_insert(0);
            if *kept < keep_minimum.min(total) {
                *kept += 1;
                false
            } else {
                true
            }
        })
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect()
}

/// The outcome of classifying one surviving commit in step 5.
enum DeletionPlan {
    Skip,
    Full,
    Partial(Vec<AssetRef>),
}

fn classify(assets: &[AssetRef], rule: &RetentionRule) -> Result<DeletionPlan> {
    let Some(patterns) = &rule.path_patterns else {
        return Ok(DeletionPlan::Full);
    };
    if patterns.is_empty() {
        return Ok(DeletionPlan::Full);
    }

    let matchers: Vec<GlobPattern> = patterns
        .iter()
        .map(|p| GlobPattern::compile(p).map_err(|e| Error::Internal(format!("invalid path pattern: {e}"))))
        .collect::<Result<_>>()?;

    let mode = rule.path_mode.unwrap_or(PathMode::Include);
    let matches_any = |path: &str| matchers.iter().any(|m| m.is_match(path));

    let selected: Vec<AssetRef> = assets
        .iter()
        .filter(|a| {
            let path = a.public_path.as_deref().unwrap_or("");
            let matched = matches_any(path);
            match mode {
                PathMode::Exclude => matched,
                PathMode::Include => !matched,
            }
        })
        .cloned()
        .collect();

    if selected.is_empty() {
        Ok(DeletionPlan::Skip)
    } else if selected.len() == assets.len() {
        Ok(DeletionPlan::Full)
    } else {
        Ok(DeletionPlan::Partial(selected))
    }
}

/// The retention engine, parameterized over its storage backend, repository,
/// and usage reporter. `U` defaults to [`NoopUsageReporter`] for deployments
/// with no control plane to report to.
pub struct RetentionEngine<S, R, U = NoopUsageReporter> {
    storage: S,
    repo: R,
    dry_run: bool,
    usage: U,
}

impl<S: Storage, R: RetentionRepository> RetentionEngine<S, R, NoopUsageReporter> {
    pub fn new(storage: S, repo: R, dry_run: bool) -> Self {
        Self { storage, repo, dry_run, usage: NoopUsageReporter }
    }
}

impl<S: Storage, R: RetentionRepository, U: UsageReporter> RetentionEngine<S, R, U> {
    /// Swap in a usage reporter, e.g. one that posts to a control plane.
    pub fn with_usage_reporter<U2: UsageReporter>(self, usage: U2) -> RetentionEngine<S, R, U2> {
        RetentionEngine {
            storage: self.storage,
            repo: self.repo,
            dry_run: self.dry_run,
            usage,
        }
    }

    /// Run every rule due at `now`, sequentially.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<Vec<RetentionRunSummary>> {
        let rules = self.repo.due_rules(now).await?;
        let mut summaries = Vec::with_capacity(rules.len());
        for rule in rules {
            summaries.push(self.run_rule(&rule, now).await?);
        }
        Ok(summaries)
    }

    /// Execute one rule: acquire the singleton lock, select commits, delete,
    /// release the lock with an updated summary, and report the aggregated
    /// freed bytes upstream.
    pub async fn run_rule(&self, rule: &RetentionRule, now: DateTime<Utc>) -> Result<RetentionRunSummary> {
        if !self.repo.try_acquire_lock(&rule.id, now).await? {
            return Ok(RetentionRunSummary::default());
        }

        let summary = self.execute(rule, now).await;

        let next_run_at = next_daily_tick(now);
        let final_summary = summary.unwrap_or_else(|e| {
            let mut s = RetentionRunSummary::default();
            s.errors.push(e.to_string());
            s
        });

        self.repo
            .release_lock(&rule.id, final_summary.clone(), now, next_run_at)
            .await?;

        if final_summary.bytes_freed > 0 {
            self.usage.report_freed_bytes(&rule.project_id, final_summary.bytes_freed).await;
        }

        Ok(final_summary)
    }

    async fn execute(&self, rule: &RetentionRule, now: DateTime<Utc>) -> Result<RetentionRunSummary> {
        let mut summary = RetentionRunSummary::default();

        let groups = self.repo.candidate_commits(&rule.project_id).await?;

        let mut surviving = Vec::new();
        for group in groups {
            let has_alias = self.repo.has_non_preview_alias(&rule.project_id, &group.commit_sha).await?;
            if passes_filters(&group, rule, now, has_alias)? {
                surviving.push(group);
            }
        }

        let to_delete = apply_keep_minimum(surviving, rule.keep_minimum);

        for group in to_delete {
            let assets = self.repo.assets_for_commit(&rule.project_id, &group.commit_sha).await?;
            let plan = match classify(&assets, rule) {
                Ok(p) => p,
                Err(e) => {
                    summary.errors.push(format!("{}: {e}", group.commit_sha));
                    continue;
                }
            };

            match plan {
                DeletionPlan::Skip => continue,
                DeletionPlan::Full => {
                    if let Err(e) = self.delete_full(rule, &group, &assets, &mut summary, now).await {
                        summary.errors.push(format!("{}: {e}", group.commit_sha));
                    }
                }
                DeletionPlan::Partial(selected) => {
                    if let Err(e) = self.delete_partial(rule, &group, &selected, &mut summary, now).await {
                        summary.errors.push(format!("{}: {e}", group.commit_sha));
                    }
                }
            }
        }

        Ok(summary)
    }

    async fn delete_full(
        &self,
        rule: &RetentionRule,
        group: &CommitGroup,
        assets: &[AssetRef],
        summary: &mut RetentionRunSummary,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if self.dry_run {
            summary.commits_deleted += 1;
            summary.assets_deleted += assets.len() as u64;
            summary.bytes_freed += group.total_size;
            return Ok(());
        }

        let prefix = commit_prefix(&rule.project_id, &group.commit_sha);
        if let Err(e) = self.storage.delete_prefix(&prefix).await {
            tracing::warn!(error = %e, commit_sha = %group.commit_sha, "storage-level delete_prefix failed, continuing with DB cleanup");
        }

        self.repo.delete_commit(&rule.project_id, &group.commit_sha).await?;

        summary.commits_deleted += 1;
        summary.assets_deleted += assets.len() as u64;
        summary.bytes_freed += group.total_size;

        self.repo
            .append_log(RetentionLog {
                project_id: rule.project_id.clone(),
                rule_id: Some(rule.id.clone()),
                commit_sha: group.commit_sha.clone(),
                branch: group.branch.clone(),
                asset_count: assets.len() as u64,
                freed_bytes: group.total_size,
                is_partial: false,
                deleted_at: now,
            })
            .await
    }

    async fn delete_partial(
        &self,
        rule: &RetentionRule,
        group: &CommitGroup,
        selected: &[AssetRef],
        summary: &mut RetentionRunSummary,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let freed: u64 = selected.iter().map(|a| a.size).sum();

        if !self.dry_run {
            for asset in selected {
                if let Err(e) = self.storage.delete(&asset.storage_key).await {
                    tracing::warn!(error = %e, storage_key = %asset.storage_key, "storage-level delete failed, continuing with DB cleanup");
                }
            }
            self.repo.delete_assets(&selected.iter().map(|a| a.id.clone()).collect::<Vec<_>>()).await?;
        }

        summary.commits_partially_deleted += 1;
        summary.assets_deleted += selected.len() as u64;
        summary.bytes_freed += freed;

        if self.dry_run {
            return Ok(());
        }

        self.repo
            .append_log(RetentionLog {
                project_id: rule.project_id.clone(),
                rule_id: Some(rule.id.clone()),
                commit_sha: group.commit_sha.clone(),
                branch: group.branch.clone(),
                asset_count: selected.len() as u64,
                freed_bytes: freed,
                is_partial: true,
                deleted_at: now,
            })
            .await
    }
}

fn commit_prefix(project_id: &ProjectId, commit_sha: &str) -> String {
    format!("{}/commits/{}/", project_id.as_str(), commit_sha)
}

/// The next daily 03:00 UTC tick strictly after `now`.
pub fn next_daily_tick(now: DateTime<Utc>) -> DateTime<Utc> {
    use chrono::{NaiveTime, TimeZone};

    let tick_time = NaiveTime::from_hms_opt(3, 0, 0).expect("valid time");
    let today_tick = Utc.from_utc_datetime(&now.date_naive().and_time(tick_time));
    if now < today_tick {
        today_tick
    } else {
        Utc.from_utc_datetime(&(now.date_naive() + ChronoDuration::days(1)).and_time(tick_time))
    }
}

/// Drives a [`RetentionEngine`] on the daily 03:00 UTC tick from inside a
/// [`BackgroundWorker`](crate::agents::BackgroundWorker) task, so the
/// retention sweep shares the same managed-task lifecycle (named,
/// cancellable, awaited on shutdown) as every other background job.
pub struct RetentionScheduler;

impl RetentionScheduler {
    /// Submit the daily tick loop to `worker` under `task_id`. The loop
    /// sleeps until the next 03:00 UTC tick, runs every due rule
    /// sequentially through `engine`, then sleeps again; it only exits on
    /// cancellation.
    pub async fn spawn<S, R, U>(
        worker: &crate::agents::BackgroundWorker,
        task_id: impl Into<String>,
        engine: std::sync::Arc<RetentionEngine<S, R, U>>,
    ) where
        S: Storage + Send + Sync + 'static,
        R: RetentionRepository + Send + Sync + 'static,
        U: UsageReporter + Send + Sync + 'static,
    {
        worker
            .submit(task_id, move || async move {
                loop {
                    let now = Utc::now();
                    let next_tick = next_daily_tick(now);
                    let wait = (next_tick - now).to_std().unwrap_or(std::time::Duration::ZERO);
                    tokio::time::sleep(wait).await;

                    let tick_at = Utc::now();
                    match engine.tick(tick_at).await {
                        Ok(summaries) => {
                            tracing::info!(rules_run = summaries.len(), "retention tick complete");
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "retention tick failed");
                        }
                    }
                }
            })
            .await;
    }
}
