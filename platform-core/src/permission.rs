//! Permission Oracle capability
//!
//! Authentication and the user/role directory are external collaborators:
//! this crate consumes identity as an [`AuthContext`] and effective
//! per-project role as a [`PermissionOracle`] capability. Concrete
//! implementations (session cookies, API keys, group membership lookups)
//! live outside this crate.

use std::future::Future;

use crate::ids::{ProjectId, UserId};
use crate::models::RequiredRole;

/// Identity attached to an inbound request by the authentication layer.
///
/// `api_key_project_id`, when set, scopes the request to a single project
/// regardless of the caller's broader role — used for CI-pipeline API keys
/// that should only ever touch the project they were minted for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: Option<UserId>,
    pub role: Option<RequiredRole>,
    pub api_key_project_id: Option<ProjectId>,
}

impl AuthContext {
    /// An anonymous, unauthenticated caller.
    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            role: None,
            api_key_project_id: None,
        }
    }

    /// Whether this context carries any authenticated identity at all.
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// Whether an API key scopes this context to a single project, and if
    /// so, whether it matches `project_id`.
    pub fn api_key_permits(&self, project_id: &ProjectId) -> bool {
        match &self.api_key_project_id {
            Some(scoped) => scoped == project_id,
            None => true,
        }
    }
}

/// Given `(userId, projectId)`, return the caller's effective role.
///
/// Implementations are expected to honor group memberships (a user may
/// inherit a role through a group rather than a direct grant) and an admin
/// short-circuit (a platform admin holds [`RequiredRole::Owner`] on every
/// project without an explicit grant).
pub trait PermissionOracle: Send + Sync {
    /// Resolve the effective role, or `None` if the user has no access at
    /// all to the project.
    fn project_role(
        &self,
        user_id: &UserId,
        project_id: &ProjectId,
    ) -> impl Future<Output = Option<RequiredRole>> + Send;

    /// Whether `user_id` holds the platform-admin short-circuit — if true,
    /// callers should treat [`project_role`](Self::project_role) as
    /// [`RequiredRole::Owner`] without querying per-project grants.
    fn is_platform_admin(&self, user_id: &UserId) -> impl Future<Output = bool> + Send;
}

/// Check whether `ctx` satisfies `required`, consulting `oracle` for the
/// caller's effective role when `ctx` doesn't already carry one.
///
/// This is the single chokepoint the Request Router calls before serving a
/// non-public asset or honoring a non-public domain/alias override.
pub async fn satisfies<O: PermissionOracle>(
    ctx: &AuthContext,
    project_id: &ProjectId,
    required: RequiredRole,
    oracle: &O,
) -> bool {
    if required == RequiredRole::Authenticated {
        return ctx.is_authenticated();
    }

    let Some(user_id) = &ctx.user_id else {
        return false;
    };

    if !ctx.api_key_permits(project_id) {
        return false;
    }

    if oracle.is_platform_admin(user_id).await {
        return true;
    }

    match oracle.project_role(user_id, project_id).await {
        Some(role) => role >= required,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeOracle {
        admins: Mutex<Vec<UserId>>,
        grants: Mutex<HashMap<(UserId, ProjectId), RequiredRole>>,
    }

    impl PermissionOracle for FakeOracle {
        async fn project_role(&self, user_id: &UserId, project_id: &ProjectId) -> Option<RequiredRole> {
            self.grants
                .lock()
                .unwrap()
                .get(&(user_id.clone(), project_id.clone()))
                .copied()
        }

        async fn is_platform_admin(&self, user_id: &UserId) -> bool {
            self.admins.lock().unwrap().contains(user_id)
        }
    }

    #[tokio::test]
    async fn anonymous_context_fails_any_role_check_above_authenticated() {
        let oracle = FakeOracle {
            admins: Mutex::new(vec![]),
            grants: Mutex::new(HashMap::new()),
        };
        let ctx = AuthContext::anonymous();
        let project_id = ProjectId::new();
        assert!(!satisfies(&ctx, &project_id, RequiredRole::Viewer, &oracle).await);
    }

    #[tokio::test]
    async fn admin_short_circuit_grants_owner_without_explicit_grant() {
        let user_id = UserId::new();
        let project_id = ProjectId::new();
        let oracle = FakeOracle {
            admins: Mutex::new(vec![user_id.clone()]),
            grants: Mutex::new(HashMap::new()),
        };
        let ctx = AuthContext {
            user_id: Some(user_id),
            role: None,
            api_key_project_id: None,
        };
        assert!(satisfies(&ctx, &project_id, RequiredRole::Owner, &oracle).await);
    }

    #[tokio::test]
    async fn api_key_scoped_to_other_project_is_denied() {
        let user_id = UserId::new();
        let project_id = ProjectId::new();
        let other_project_id = ProjectId::new();
        let oracle = FakeOracle {
            admins: Mutex::new(vec![]),
            grants: Mutex::new(HashMap::from([((user_id.clone(), project_id.clone()), RequiredRole::Owner)])),
        };
        let ctx = AuthContext {
            user_id: Some(user_id),
            role: None,
            api_key_project_id: Some(other_project_id),
        };
        assert!(!satisfies(&ctx, &project_id, RequiredRole::Viewer, &oracle).await);
    }

    #[tokio::test]
    async fn explicit_grant_meeting_required_role_passes() {
        let user_id = UserId::new();
        let project_id = ProjectId::new();
        let oracle = FakeOracle {
            admins: Mutex::new(vec![]),
            grants: Mutex::new(HashMap::from([((user_id.clone(), project_id.clone()), RequiredRole::Contributor)])),
        };
        let ctx = AuthContext {
            user_id: Some(user_id),
            role: None,
            api_key_project_id: None,
        };
        assert!(satisfies(&ctx, &project_id, RequiredRole::Viewer, &oracle).await);
        assert!(!satisfies(&ctx, &project_id, RequiredRole::Admin, &oracle).await);
    }
}
