//! Request Router
//!
//! The state machine that turns an inbound `(host, path, cookies, query)`
//! into a dispatch decision: a redirect, a hand-off to the Proxy Engine or
//! Form-Handler Engine, or a decision to serve a stored asset (with SPA
//! fallback). Host/domain/alias/rule-set lookups are abstracted behind
//! [`RouterRepository`]; path parsing, rule matching, rewrite computation,
//! sticky-session selection, and ETag handling are pure functions below it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::ids::{AliasId, ProjectId, RuleSetId};
use crate::models::{
    DeploymentAlias, DomainMapping, DomainType, Project, ProxyRule, ProxyType, WwwBehavior,
};
use crate::rule_cache::{CompiledProxyRule, ProxyRuleCache};

/// Persistence the router needs, abstracted from the SQL dialect.
pub trait RouterRepository: Send + Sync {
    fn domain_by_host(&self, host: &str) -> impl Future<Output = Result<Option<DomainMapping>>> + Send;
    fn project_by_id(&self, id: &ProjectId) -> impl Future<Output = Result<Option<Project>>> + Send;
    fn project_by_owner_repo(&self, owner: &str, name: &str) -> impl Future<Output = Result<Option<Project>>> + Send;
    fn alias_by_name(&self, project_id: &ProjectId, name: &str) -> impl Future<Output = Result<Option<DeploymentAlias>>> + Send;
    fn alias_by_id(&self, id: &AliasId) -> impl Future<Output = Result<Option<DeploymentAlias>>> + Send;
    /// Look up an alias by name across all projects — used for the
    /// `/public/subdomain-alias/{name}/...` shape, which carries no owner/repo.
    fn alias_by_name_any_project(&self, name: &str) -> impl Future<Output = Result<Option<(Project, DeploymentAlias)>>> + Send;
    /// The alias a project serves on a domain mapping that points at the
    /// project directly rather than at one specific alias.
    fn primary_alias_for_project(&self, project_id: &ProjectId) -> impl Future<Output = Result<Option<DeploymentAlias>>> + Send;
    fn non_preview_alias_on_commit(&self, project_id: &ProjectId, commit_sha: &str) -> impl Future<Output = Result<Option<DeploymentAlias>>> + Send;
    fn proxy_rules(&self, rule_set_id: &RuleSetId) -> impl Future<Output = Result<Vec<ProxyRule>>> + Send;
    fn asset_exists(&self, project_id: &ProjectId, commit_sha: &str, public_path: &str) -> impl Future<Output = Result<bool>> + Send;
}

/// Strip the port suffix and lowercase a `Host` header value.
pub fn normalize_host(host: &str) -> String {
    host.split(':').next().unwrap_or(host).to_ascii_lowercase()
}

/// The www/apex twin of a normalized host.
pub fn www_twin(host: &str) -> String {
    match host.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => format!("www.{host}"),
    }
}

fn www_redirect_host(domain: &DomainMapping, requested_host: &str) -> Option<String> {
    let behavior = domain.www_behavior?;
    let is_www = requested_host.starts_with("www.");
    match behavior {
        WwwBehavior::RedirectToWww if !is_www => Some(format!("www.{requested_host}")),
        WwwBehavior::RedirectToApex if is_www => Some(www_twin(requested_host)),
        _ => None,
    }
}

/// Find the active [`DomainMapping`] for `host` or its www/apex twin.
///
/// Returns `None` when the host is the configured primary domain (or
/// nothing matches at all) — callers treat that as "fall through to public
/// path parsing" rather than an error.
pub async fn resolve_domain<R: RouterRepository>(
    host: &str,
    primary_domain: &str,
    repo: &R,
) -> Result<Option<DomainMapping>> {
    let normalized = normalize_host(host);

    if let Some(domain) = repo.domain_by_host(&normalized).await? {
        if domain.is_active {
            return Ok(Some(domain));
        }
    }

    let twin = www_twin(&normalized);
    if let Some(domain) = repo.domain_by_host(&twin).await? {
        if domain.is_active {
            return Ok(Some(domain));
        }
    }

    let _ = primary_domain;
    Ok(None)
}

/// A fully resolved, 40-hex-char commit SHA or a named alias, as classified
/// by a path's `{ref}` segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    CommitSha(String),
    Alias(String),
}

fn classify_reference(segment: &str) -> Reference {
    if segment.len() == 40 && segment.bytes().all(|b| b.is_ascii_hexdigit()) {
        Reference::CommitSha(segment.to_ascii_lowercase())
    } else {
        Reference::Alias(segment.to_string())
    }
}

/// The three shapes a `/public/...` path may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedPath {
    OwnerRepoRef { owner: String, repo: String, reference: Reference, subpath: String },
    SubdomainAlias { alias_name: String, subpath: String },
    NotPublicPath,
}

/// Parse a `/public/...` path into one of the three supported shapes.
pub fn parse_public_path(path: &str) -> ParsedPath {
    let trimmed = path.trim_start_matches('/');
    let Some(rest) = trimmed.strip_prefix("public/") else {
        return ParsedPath::NotPublicPath;
    };

    let mut parts = rest.split('/');
    let Some(first) = parts.next() else {
        return ParsedPath::NotPublicPath;
    };

    if first == "subdomain-alias" {
        let Some(alias_name) = parts.next() else {
            return ParsedPath::NotPublicPath;
        };
        return ParsedPath::SubdomainAlias {
            alias_name: alias_name.to_string(),
            subpath: parts.collect::<Vec<_>>().join("/"),
        };
    }

    let owner = first.to_string();
    let Some(repo) = parts.next() else {
        return ParsedPath::NotPublicPath;
    };
    let repo = repo.to_string();

    let Some(third) = parts.next() else {
        return ParsedPath::NotPublicPath;
    };

    if third == "alias" {
        let Some(alias_name) = parts.next() else {
            return ParsedPath::NotPublicPath;
        };
        ParsedPath::OwnerRepoRef {
            owner,
            repo,
            reference: Reference::Alias(alias_name.to_string()),
            subpath: parts.collect::<Vec<_>>().join("/"),
        }
    } else {
        ParsedPath::OwnerRepoRef {
            owner,
            repo,
            reference: classify_reference(third),
            subpath: parts.collect::<Vec<_>>().join("/"),
        }
    }
}

/// An empty subpath means "serve the directory's default document".
pub fn effective_public_path(subpath: &str) -> String {
    if subpath.is_empty() {
        "index.html".to_string()
    } else {
        subpath.to_string()
    }
}

/// Resolve the alias a domain mapping serves: the bound `alias_id` if set,
/// else the project's primary alias.
async fn resolve_domain_alias<R: RouterRepository>(domain: &DomainMapping, project: &Project, repo: &R) -> Result<Option<DeploymentAlias>> {
    if let Some(alias_id) = &domain.alias_id {
        return repo.alias_by_id(alias_id).await;
    }
    repo.primary_alias_for_project(&project.id).await
}

/// `project`, the alias it was resolved through (if any), and the commit SHA
/// the request ultimately targets.
pub struct ResolvedTarget {
    pub project: Project,
    pub alias: Option<DeploymentAlias>,
    pub commit_sha: String,
    pub subpath: String,
}

/// Resolve a parsed public path to a project/alias/commit, per step 5.
pub async fn resolve_target<R: RouterRepository>(parsed: ParsedPath, forwarded_host: Option<&str>, primary_domain: &str, repo: &R) -> Result<ResolvedTarget> {
    match parsed {
        ParsedPath::OwnerRepoRef { owner, repo: name, reference, subpath } => {
            let project = repo
                .project_by_owner_repo(&owner, &name)
                .await?
                .ok_or_else(|| Error::NotFound(format!("project {owner}/{name}")))?;

            let (alias, commit_sha) = match reference {
                Reference::CommitSha(sha) => (None, sha),
                Reference::Alias(name) => {
                    let alias = repo
                        .alias_by_name(&project.id, &name)
                        .await?
                        .ok_or_else(|| Error::NotFound(format!("alias {name}")))?;
                    let sha = alias.commit_sha.clone();
                    (Some(alias), sha)
                }
            };

            Ok(ResolvedTarget { project, alias, commit_sha, subpath })
        }
        ParsedPath::SubdomainAlias { alias_name, subpath } => {
            if let Some((project, alias)) = repo.alias_by_name_any_project(&alias_name).await? {
                let commit_sha = alias.commit_sha.clone();
                return Ok(ResolvedTarget { project, alias: Some(alias), commit_sha, subpath });
            }

            let forwarded_host = forwarded_host
                .ok_or_else(|| Error::NotFound(format!("alias {alias_name}")))?;
            let domain = resolve_domain(forwarded_host, primary_domain, repo)
                .await?
                .ok_or_else(|| Error::NotFound(format!("alias {alias_name}")))?;
            let project_id = domain
                .project_id
                .ok_or_else(|| Error::NotFound(format!("alias {alias_name}")))?;
            let project = repo
                .project_by_id(&project_id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("project for domain {}", domain.domain)))?;
            let alias = resolve_domain_alias(&domain, &project, repo).await?;
            let commit_sha = alias
                .as_ref()
                .ok_or_else(|| Error::NotFound(format!("alias {alias_name}")))?
                .commit_sha
                .clone();
            Ok(ResolvedTarget { project, alias, commit_sha, subpath })
        }
        ParsedPath::NotPublicPath => Err(Error::BadRequest("not a /public/ path".to_string())),
    }
}

/// Resolve the effective proxy rule-set id per the precedence chain of step 6:
/// `alias.proxyRuleSetId -> (auto-preview only) sibling non-preview alias's
/// rule set -> project.defaultRuleSetId -> none`.
pub async fn resolve_rule_set_id<R: RouterRepository>(
    project: &Project,
    alias: Option<&DeploymentAlias>,
    commit_sha: &str,
    repo: &R,
) -> Result<Option<RuleSetId>> {
    if let Some(alias) = alias {
        if let Some(id) = &alias.proxy_rule_set_id {
            return Ok(Some(id.clone()));
        }
        if alias.is_auto_preview {
            if let Some(sibling) = repo.non_preview_alias_on_commit(&project.id, commit_sha).await? {
                if let Some(id) = sibling.proxy_rule_set_id {
                    return Ok(Some(id));
                }
            }
        }
    }
    Ok(project.default_rule_set_id.clone())
}

/// The first enabled rule (by ascending `order`) whose precompiled matcher
/// matches `subpath`. `rules` is always a precompiled list from
/// [`load_proxy_rules`]; no pattern is ever recompiled here.
pub fn match_proxy_rule(rules: &[CompiledProxyRule], subpath: &str) -> Option<ProxyRule> {
    let mut sorted: Vec<&CompiledProxyRule> = rules.iter().filter(|r| r.rule.is_enabled).collect();
    sorted.sort_by_key(|r| r.rule.order);
    sorted
        .into_iter()
        .find(|r| r.matcher.is_match(subpath))
        .map(|r| r.rule.clone())
}

/// Load this rule set's compiled rules from `cache`, falling back to `repo`
/// (and re-populating the cache) on a miss.
pub async fn load_proxy_rules<R: RouterRepository>(
    rule_set_id: &RuleSetId,
    cache: &ProxyRuleCache,
    repo: &R,
) -> Result<Arc<Vec<CompiledProxyRule>>> {
    if let Some(cached) = cache.get(rule_set_id) {
        return Ok(cached);
    }
    let rules = repo.proxy_rules(rule_set_id).await?;
    let compiled: Vec<_> = rules
        .into_iter()
        .filter_map(|r| crate::rule_cache::compile_proxy_rule(r).ok())
        .collect();
    Ok(cache.put(rule_set_id.clone(), compiled))
}

/// Compute the rewritten subpath for an `internal_rewrite` rule.
///
/// - Prefix wildcard (`/p/*` or `/p/**`) + `targetUrl=/q`: request `/p/x/y`
///   rewrites to `/q/x/y`.
/// - Exact pattern: rewrites to `targetUrl` verbatim.
/// - Suffix wildcard (`*.ext`) + `targetUrl=/dir/`: rewrites to `/dir/<basename>`.
pub fn compute_internal_rewrite(pattern: &str, target_url: &str, subpath: &str) -> String {
    if let Some(prefix) = pattern.strip_suffix("/**").or_else(|| pattern.strip_suffix("/*")) {
        let rest = subpath.strip_prefix(prefix).unwrap_or(subpath).trim_start_matches('/');
        let base = target_url.trim_end_matches('/');
        if rest.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{rest}")
        }
    } else if pattern.starts_with('*') {
        let basename = subpath.rsplit('/').next().unwrap_or(subpath);
        format!("{}/{}", target_url.trim_end_matches('/'), basename)
    } else {
        target_url.to_string()
    }
}

/// The router's dispatch decision for one request.
pub enum RouteOutcome {
    Redirect { status: u16, location: String },
    Proxy { rule: ProxyRule, subpath: String },
    FormHandler { rule: ProxyRule, subpath: String },
    Serve { project: Project, commit_sha: String, public_path: String, is_spa: bool },
}

/// Everything the router needs about one inbound request.
pub struct RequestInput<'a> {
    pub host: &'a str,
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub original_uri: Option<&'a str>,
    pub forwarded_host: Option<&'a str>,
}

/// Run the full router state machine for one request.
pub async fn resolve<R: RouterRepository>(
    input: RequestInput<'_>,
    primary_domain: &str,
    repo: &R,
    proxy_cache: &ProxyRuleCache,
) -> Result<RouteOutcome> {
    let domain = resolve_domain(input.host, primary_domain, repo).await?;

    if let Some(domain) = &domain {
        if domain.domain_type == DomainType::Redirect {
            let target = domain
                .redirect_target
                .clone()
                .ok_or_else(|| Error::Internal("redirect domain missing redirectTarget".to_string()))?;
            let mut location = target.trim_end_matches('/').to_string();
            location.push_str(input.path);
            if let Some(q) = input.query.filter(|q| !q.is_empty()) {
                location.push('?');
                location.push_str(q);
            }
            return Ok(RouteOutcome::Redirect { status: 301, location });
        }

        if let Some(new_host) = www_redirect_host(domain, &normalize_host(input.host)) {
            let mut location = format!("https://{new_host}{}", input.path);
            if let Some(q) = input.query.filter(|q| !q.is_empty()) {
                location.push('?');
                location.push_str(q);
            }
            return Ok(RouteOutcome::Redirect { status: 301, location });
        }
    }

    let (project, alias, commit_sha, base_subpath) = match &domain {
        Some(domain) => {
            let project_id = domain
                .project_id
                .clone()
                .ok_or_else(|| Error::NotFound("domain has no bound project".to_string()))?;
            let project = repo
                .project_by_id(&project_id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("project {project_id}")))?;
            let alias = resolve_domain_alias(domain, &project, repo).await?;
            let commit_sha = alias
                .as_ref()
                .ok_or_else(|| Error::NotFound("domain has no resolvable alias".to_string()))?
                .commit_sha
                .clone();
            let subpath = domain
                .path
                .as_deref()
                .map(|p| input.path.strip_prefix(p).unwrap_or(input.path))
                .unwrap_or(input.path)
                .trim_start_matches('/')
                .to_string();
            (project, alias, commit_sha, subpath)
        }
        None => {
            let parsed = parse_public_path(input.path);
            let target = resolve_target(parsed, input.forwarded_host, primary_domain, repo).await?;
            (target.project, target.alias, target.commit_sha, target.subpath)
        }
    };

    let effective_subpath = input
        .original_uri
        .map(|uri| uri.split('?').next().unwrap_or(uri).to_string())
        .unwrap_or(base_subpath);

    let rule_set_id = resolve_rule_set_id(&project, alias.as_ref(), &commit_sha, repo).await?;

    let matched_rule = match &rule_set_id {
        Some(id) => {
            let rules = load_proxy_rules(id, proxy_cache, repo).await?;
            match_proxy_rule(&rules, &format!("/{}", effective_subpath.trim_start_matches('/')))
        }
        None => None,
    };

    let public_path = match matched_rule {
        Some(rule) => match rule.proxy_type {
            ProxyType::ExternalProxy => {
                return Ok(RouteOutcome::Proxy { rule, subpath: effective_subpath });
            }
            ProxyType::EmailFormHandler => {
                return Ok(RouteOutcome::FormHandler { rule, subpath: effective_subpath });
            }
            ProxyType::InternalRewrite => {
                compute_internal_rewrite(&rule.path_pattern, &rule.target_url, &effective_subpath)
            }
        },
        None => effective_public_path(&effective_subpath),
    };

    let is_spa = domain.as_ref().map(|d| d.is_spa).unwrap_or(false);

    Ok(RouteOutcome::Serve {
        project,
        commit_sha,
        public_path: public_path.trim_start_matches('/').to_string(),
        is_spa,
    })
}

/// Retry path for SPA fallback: if `asset_exists` is false for `public_path`
/// and `is_spa`, retry once with `index.html`.
pub async fn resolve_spa_fallback<R: RouterRepository>(
    repo: &R,
    project_id: &ProjectId,
    commit_sha: &str,
    public_path: &str,
    is_spa: bool,
) -> Result<String> {
    if repo.asset_exists(project_id, commit_sha, public_path).await? {
        return Ok(public_path.to_string());
    }
    if is_spa {
        return Ok("index.html".to_string());
    }
    Err(Error::NotFound(format!("asset {public_path}")))
}

/// Quote a content hash into an `ETag` value.
pub fn etag_for(content_hash: &str) -> String {
    format!("\"{content_hash}\"")
}

/// Whether `if_none_match` (a raw `If-None-Match` header value, possibly a
/// comma-separated list) already carries `content_hash` — a 304 candidate.
pub fn is_not_modified(if_none_match: Option<&str>, content_hash: &str) -> bool {
    match if_none_match {
        Some(value) => value
            .split(',')
            .any(|v| v.trim() == "*" || v.trim().trim_matches('"') == content_hash),
        None => false,
    }
}

/// Cookie name used to bind a client to an alias within a weighted traffic split.
pub const STICKY_COOKIE_NAME: &str = "platform_sticky_alias";

/// A predicate-based override within a weighted traffic split.
#[derive(Debug, Clone)]
pub enum TrafficPredicate {
    QueryParam { name: String, value: String },
    Cookie { name: String, value: String },
}

/// One alias in a weighted traffic split.
#[derive(Debug, Clone)]
pub struct TrafficRuleAlias {
    pub alias_id: AliasId,
    pub weight: u32,
    pub predicate: Option<TrafficPredicate>,
}

fn predicate_matches(predicate: &TrafficPredicate, query_params: &HashMap<String, String>, cookies: &HashMap<String, String>) -> bool {
    match predicate {
        TrafficPredicate::QueryParam { name, value } => query_params.get(name) == Some(value),
        TrafficPredicate::Cookie { name, value } => cookies.get(name) == Some(value),
    }
}

/// Select the alias to serve for a weighted traffic split.
///
/// A currently-matching traffic-rule predicate wins even over a sticky
/// cookie; a traffic-rule alias is honored as sticky even if it is not
/// currently a member of the weight set (so an asset request inherits the
/// alias chosen for its parent HTML). Absent a predicate match, an existing
/// sticky cookie wins; only with neither does `pick_weighted` run.
pub fn select_alias(
    rules: &[TrafficRuleAlias],
    query_params: &HashMap<String, String>,
    cookies: &HashMap<String, String>,
    sticky_alias: Option<&AliasId>,
    pick_weighted: impl FnOnce(&[TrafficRuleAlias]) -> AliasId,
) -> AliasId {
    for rule in rules {
        if let Some(predicate) = &rule.predicate {
            if predicate_matches(predicate, query_params, cookies) {
                return rule.alias_id.clone();
            }
        }
    }
    if let Some(sticky) = sticky_alias {
        return sticky.clone();
    }
    pick_weighted(rules)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_host_strips_port_and_lowercases() {
        assert_eq!(normalize_host("ACME.Example:8443"), "acme.example");
    }

    #[test]
    fn www_twin_adds_or_strips_prefix() {
        assert_eq!(www_twin("acme.example"), "www.acme.example");
        assert_eq!(www_twin("www.acme.example"), "acme.example");
    }

    #[test]
    fn parses_owner_repo_commit_sha_shape() {
        let sha = "a".repeat(40);
        let parsed = parse_public_path(&format!("/public/acme/site/{sha}/index.html"));
        match parsed {
            ParsedPath::OwnerRepoRef { owner, repo, reference, subpath } => {
                assert_eq!(owner, "acme");
                assert_eq!(repo, "site");
                assert_eq!(reference, Reference::CommitSha(sha));
                assert_eq!(subpath, "index.html");
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn parses_owner_repo_alias_shape() {
        let parsed = parse_public_path("/public/acme/site/alias/production/index.html");
        match parsed {
            ParsedPath::OwnerRepoRef { reference, subpath, .. } => {
                assert_eq!(reference, Reference::Alias("production".to_string()));
                assert_eq!(subpath, "index.html");
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn parses_subdomain_alias_shape() {
        let parsed = parse_public_path("/public/subdomain-alias/pr-42/app.js");
        match parsed {
            ParsedPath::SubdomainAlias { alias_name, subpath } => {
                assert_eq!(alias_name, "pr-42");
                assert_eq!(subpath, "app.js");
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn non_40_char_ref_classified_as_alias() {
        let parsed = parse_public_path("/public/acme/site/staging/x");
        match parsed {
            ParsedPath::OwnerRepoRef { reference, .. } => {
                assert_eq!(reference, Reference::Alias("staging".to_string()));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn empty_subpath_maps_to_index_html() {
        assert_eq!(effective_public_path(""), "index.html");
        assert_eq!(effective_public_path("about"), "about");
    }

    #[test]
    fn internal_rewrite_prefix_wildcard() {
        let rewritten = compute_internal_rewrite("/p/*", "/q", "/p/x/y");
        assert_eq!(rewritten, "/q/x/y");
    }

    #[test]
    fn internal_rewrite_exact_pattern() {
        let rewritten = compute_internal_rewrite("/env.json", "/environments/prod.json", "/env.json");
        assert_eq!(rewritten, "/environments/prod.json");
    }

    #[test]
    fn internal_rewrite_suffix_wildcard() {
        let rewritten = compute_internal_rewrite("*.ext", "/dir/", "/a/b/file.ext");
        assert_eq!(rewritten, "/dir/file.ext");
    }

    #[test]
    fn etag_is_double_quoted() {
        assert_eq!(etag_for("abc123"), "\"abc123\"");
    }

    #[test]
    fn if_none_match_recognizes_matching_hash() {
        assert!(is_not_modified(Some("\"abc123\""), "abc123"));
        assert!(!is_not_modified(Some("\"def456\""), "abc123"));
        assert!(!is_not_modified(None, "abc123"));
    }

    #[test]
    fn select_alias_predicate_wins_over_sticky() {
        let a = AliasId::new();
        let b = AliasId::new();
        let rules = vec![TrafficRuleAlias {
            alias_id: a.clone(),
            weight: 50,
            predicate: Some(TrafficPredicate::QueryParam { name: "variant".to_string(), value: "beta".to_string() }),
        }];
        let mut query = HashMap::new();
        query.insert("variant".to_string(), "beta".to_string());
        let chosen = select_alias(&rules, &query, &HashMap::new(), Some(&b), |_| b.clone());
        assert_eq!(chosen, a);
    }

    #[test]
    fn select_alias_sticky_wins_without_predicate_match() {
        let a = AliasId::new();
        let b = AliasId::new();
        let rules = vec![TrafficRuleAlias { alias_id: a.clone(), weight: 50, predicate: None }];
        let chosen = select_alias(&rules, &HashMap::new(), &HashMap::new(), Some(&b), |_| a.clone());
        assert_eq!(chosen, b);
    }

    #[test]
    fn select_alias_falls_back_to_weighted_pick() {
        let a = AliasId::new();
        let rules = vec![TrafficRuleAlias { alias_id: a.clone(), weight: 100, predicate: None }];
        let chosen = select_alias(&rules, &HashMap::new(), &HashMap::new(), None, |_| a.clone());
        assert_eq!(chosen, a);
    }

    fn sample_proxy_rule(pattern: &str) -> ProxyRule {
        ProxyRule {
            id: crate::ids::ProxyRuleId::new(),
            rule_set_id: RuleSetId::new(),
            path_pattern: pattern.to_string(),
            target_url: "https://backend.internal/v1".to_string(),
            proxy_type: ProxyType::ExternalProxy,
            strip_prefix: true,
            order: 0,
            timeout_ms: 5_000,
            preserve_host: false,
            forward_cookies: false,
            header_config: Default::default(),
            auth_transform: None,
            email_handler_config: None,
            is_enabled: true,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn match_proxy_rule_matches_multi_segment_subpath() {
        let rule = sample_proxy_rule("/api/*");
        let compiled = crate::rule_cache::compile_proxy_rule(rule.clone()).unwrap();
        let matched = match_proxy_rule(&[compiled], "/api/users/123").expect("should match nested subpath");
        assert_eq!(matched.id, rule.id);
    }

    #[test]
    fn match_proxy_rule_picks_lowest_order_precompiled_match() {
        let mut low = sample_proxy_rule("/api/*");
        low.order = 1;
        let mut high = sample_proxy_rule("/api/users/*");
        high.order = 0;
        let compiled = vec![
            crate::rule_cache::compile_proxy_rule(low).unwrap(),
            crate::rule_cache::compile_proxy_rule(high.clone()).unwrap(),
        ];
        let matched = match_proxy_rule(&compiled, "/api/users/123").expect("should match");
        assert_eq!(matched.id, high.id);
    }

    #[tokio::test]
    async fn load_proxy_rules_returns_precompiled_matchers_usable_by_match_proxy_rule() {
        struct FakeRepo {
            rules: Vec<ProxyRule>,
        }
        impl RouterRepository for FakeRepo {
            async fn domain_by_host(&self, _host: &str) -> Result<Option<DomainMapping>> {
                Ok(None)
            }
            async fn project_by_id(&self, _id: &ProjectId) -> Result<Option<Project>> {
                Ok(None)
            }
            async fn project_by_owner_repo(&self, _owner: &str, _name: &str) -> Result<Option<Project>> {
                Ok(None)
            }
            async fn alias_by_name(&self, _project_id: &ProjectId, _name: &str) -> Result<Option<DeploymentAlias>> {
                Ok(None)
            }
            async fn alias_by_id(&self, _id: &AliasId) -> Result<Option<DeploymentAlias>> {
                Ok(None)
            }
            async fn alias_by_name_any_project(&self, _name: &str) -> Result<Option<(Project, DeploymentAlias)>> {
                Ok(None)
            }
            async fn primary_alias_for_project(&self, _project_id: &ProjectId) -> Result<Option<DeploymentAlias>> {
                Ok(None)
            }
            async fn non_preview_alias_on_commit(
                &self,
                _project_id: &ProjectId,
                _commit_sha: &str,
            ) -> Result<Option<DeploymentAlias>> {
                Ok(None)
            }
            async fn proxy_rules(&self, _rule_set_id: &RuleSetId) -> Result<Vec<ProxyRule>> {
                Ok(self.rules.clone())
            }
            async fn asset_exists(&self, _project_id: &ProjectId, _commit_sha: &str, _public_path: &str) -> Result<bool> {
                Ok(false)
            }
        }

        let rule_set_id = RuleSetId::new();
        let rule = sample_proxy_rule("/api/*");
        let repo = FakeRepo { rules: vec![rule.clone()] };
        let cache = ProxyRuleCache::new();

        let compiled = load_proxy_rules(&rule_set_id, &cache, &repo).await.unwrap();
        let matched = match_proxy_rule(&compiled, "/api/v1/users/42").expect("should match through cache miss path");
        assert_eq!(matched.id, rule.id);

        let compiled_again = load_proxy_rules(&rule_set_id, &cache, &repo).await.unwrap();
        let matched_again =
            match_proxy_rule(&compiled_again, "/api/v1/users/42").expect("should match through cache hit path");
        assert_eq!(matched_again.id, rule.id);
    }
}
