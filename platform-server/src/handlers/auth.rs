//! Identity extraction at the edge of the serving route.
//!
//! Session-cookie verification and the user/role directory are external
//! collaborators the core crate only consumes through [`AuthContext`] and
//! [`PermissionOracle`]; a production deployment sits an auth proxy or
//! session-verifying middleware in front of this binary and forwards the
//! resolved identity. This trusts a pair of forwarded headers instead, the
//! shape a reverse proxy in front of this service would set after verifying
//! a session itself.

use axum::http::HeaderMap;
use platform_core::ids::UserId;
use platform_core::permission::AuthContext;

const USER_ID_HEADER: &str = "x-platform-user-id";
const API_KEY_PROJECT_HEADER: &str = "x-platform-api-key-project";

pub fn extract(headers: &HeaderMap) -> AuthContext {
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<UserId>().ok());

    let api_key_project_id = headers
        .get(API_KEY_PROJECT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok());

    match user_id {
        Some(user_id) => AuthContext {
            user_id: Some(user_id),
            role: None,
            api_key_project_id,
        },
        None => AuthContext::anonymous(),
    }
}
