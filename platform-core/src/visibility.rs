//! Visibility Resolver
//!
//! For any request, effective visibility is `domainOverride ?? aliasOverride
//! ?? projectDefault`, evaluated independently per axis
//! (`isPublic`, `unauthorizedBehavior`, `requiredRole`). `DomainMapping`
//! only ever overrides `isPublic` — it carries no per-axis
//! `unauthorizedBehavior`/`requiredRole` fields — so the domain tier
//! contributes `None` on those two axes and resolution falls through to the
//! alias or project tier. Resolution skips the alias tier entirely when the
//! domain has no alias binding.

use crate::models::{DeploymentAlias, DomainMapping, Project, RequiredRole, UnauthorizedBehavior};

/// Which tier ultimately supplied an effective value, for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilitySource {
    Domain,
    Alias,
    Project,
}

/// The resolved visibility for a request, with provenance per axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveVisibility {
    pub is_public: bool,
    pub is_public_source: VisibilitySource,
    pub unauthorized_behavior: UnauthorizedBehavior,
    pub unauthorized_behavior_source: VisibilitySource,
    pub required_role: RequiredRole,
    pub required_role_source: VisibilitySource,
}

/// Resolve the domain → alias → project fallback chain.
///
/// `domain` is `None` when the request was resolved purely by public path
/// (no `DomainMapping` in play); `alias` is `None` when the domain has no
/// alias binding, in which case that tier is skipped entirely rather than
/// contributing `None ?? None`.
pub fn resolve(
    project: &Project,
    alias: Option<&DeploymentAlias>,
    domain: Option<&DomainMapping>,
) -> EffectiveVisibility {
    let (is_public, is_public_source) = first_some([
        (domain.and_then(|d| d.is_public), VisibilitySource::Domain),
        (alias.and_then(|a| a.is_public), VisibilitySource::Alias),
    ])
    .unwrap_or((project.is_public, VisibilitySource::Project));

    let (unauthorized_behavior, unauthorized_behavior_source) = first_some([(
        alias.and_then(|a| a.unauthorized_behavior),
        VisibilitySource::Alias,
    )])
    .unwrap_or((project.unauthorized_behavior, VisibilitySource::Project));

    let (required_role, required_role_source) = first_some([(
        alias.and_then(|a| a.required_role),
        VisibilitySource::Alias,
    )])
    .unwrap_or((project.required_role, VisibilitySource::Project));

    EffectiveVisibility {
        is_public,
        is_public_source,
        unauthorized_behavior,
        unauthorized_behavior_source,
        required_role,
        required_role_source,
    }
}

/// Return the first `(Some(value), source)` pair from `tiers`, highest
/// priority first.
fn first_some<T, const N: usize>(tiers: [(Option<T>, VisibilitySource); N]) -> Option<(T, VisibilitySource)> {
    tiers.into_iter().find_map(|(value, source)| value.map(|v| (v, source)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{AliasId, DeploymentId, DomainId, ProjectId, RuleSetId};
    use chrono::Utc;

    fn project(is_public: bool) -> Project {
        Project {
            id: ProjectId::new(),
            owner: "acme".to_string(),
            name: "site".to_string(),
            is_public,
            unauthorized_behavior: UnauthorizedBehavior::NotFound,
            required_role: RequiredRole::Viewer,
            default_rule_set_id: None,
            created_at: Utc::now(),
        }
    }

    fn alias(is_public: Option<bool>, required_role: Option<RequiredRole>) -> DeploymentAlias {
        DeploymentAlias {
            id: AliasId::new(),
            project_id: ProjectId::new(),
            alias: "production".to_string(),
            commit_sha: "a".repeat(40),
            deployment_id: DeploymentId::new(),
            is_auto_preview: false,
            base_path: None,
            proxy_rule_set_id: None,
            is_public,
            unauthorized_behavior: None,
            required_role,
            created_at: Utc::now(),
        }
    }

    fn domain(is_public: Option<bool>) -> DomainMapping {
        DomainMapping {
            id: DomainId::new(),
            project_id: None,
            alias_id: None,
            path: None,
            domain: "acme.example".to_string(),
            domain_type: crate::models::DomainType::Custom,
            redirect_target: None,
            is_active: true,
            is_public,
            is_spa: false,
            is_primary: false,
            www_behavior: None,
            sticky_sessions_enabled: false,
            sticky_session_duration_secs: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn falls_through_to_project_default_with_no_overrides() {
        let p = project(true);
        let v = resolve(&p, None, None);
        assert!(v.is_public);
        assert_eq!(v.is_public_source, VisibilitySource::Project);
        assert_eq!(v.required_role_source, VisibilitySource::Project);
    }

    #[test]
    fn domain_override_wins_over_alias_and_project() {
        let p = project(true);
        let a = alias(Some(true), None);
        let d = domain(Some(false));
        let v = resolve(&p, Some(&a), Some(&d));
        assert!(!v.is_public);
        assert_eq!(v.is_public_source, VisibilitySource::Domain);
    }

    #[test]
    fn alias_override_wins_when_domain_has_no_override() {
        let p = project(true);
        let a = alias(Some(false), Some(RequiredRole::Admin));
        let v = resolve(&p, Some(&a), None);
        assert!(!v.is_public);
        assert_eq!(v.is_public_source, VisibilitySource::Alias);
        assert_eq!(v.required_role, RequiredRole::Admin);
        assert_eq!(v.required_role_source, VisibilitySource::Alias);
    }

    #[test]
    fn missing_alias_binding_skips_that_tier_entirely() {
        let p = project(false);
        let v = resolve(&p, None, Some(&domain(None)));
        assert!(!v.is_public);
        assert_eq!(v.is_public_source, VisibilitySource::Project);
    }

    #[test]
    fn axes_resolve_independently() {
        let p = project(false);
        let a = alias(Some(true), None);
        let v = resolve(&p, Some(&a), None);
        assert!(v.is_public);
        assert_eq!(v.is_public_source, VisibilitySource::Alias);
        assert_eq!(v.required_role, RequiredRole::Viewer);
        assert_eq!(v.required_role_source, VisibilitySource::Project);
    }
}
