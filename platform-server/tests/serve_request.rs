//! End-to-end tests driving the resolution pipeline through the axum
//! router, backed by the in-memory repository/storage stand-in.

use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use tower::ServiceExt;

use platform_core::config::Config;
use platform_core::ids::{AliasId, AssetId, DeploymentId, DomainId, ProjectId, UserId};
use platform_core::models::{
    Asset, DeploymentAlias, DomainMapping, DomainType, Project, RequiredRole, UnauthorizedBehavior,
};
use platform_core::storage::Storage;

use platform_server::handlers::{health, readiness, serve_request};
use platform_server::AppState;

fn test_config() -> Config {
    let mut config = Config::default();
    config.serving.primary_domain = "example.test".to_string();
    config
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(readiness))
        .fallback(serve_request)
        .with_state(state)
}

fn base_project(is_public: bool) -> Project {
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

fn base_domain(project_id: ProjectId, domain: &str, is_spa: bool) -> DomainMapping {
    DomainMapping {
        id: DomainId::new(),
        project_id: Some(project_id),
        alias_id: None,
        path: None,
        domain: domain.to_string(),
        domain_type: DomainType::Custom,
        redirect_target: None,
        is_active: true,
        is_public: None,
        is_spa,
        is_primary: true,
        www_behavior: None,
        sticky_sessions_enabled: false,
        sticky_session_duration_secs: 0,
        created_at: Utc::now(),
    }
}

fn base_alias(project_id: ProjectId, commit_sha: &str) -> DeploymentAlias {
    DeploymentAlias {
        id: AliasId::new(),
        project_id,
        alias: "production".to_string(),
        commit_sha: commit_sha.to_string(),
        deployment_id: DeploymentId::new(),
        is_auto_preview: false,
        base_path: None,
        proxy_rule_set_id: None,
        is_public: None,
        unauthorized_behavior: None,
        required_role: None,
        created_at: Utc::now(),
    }
}

fn base_asset(project_id: ProjectId, commit_sha: &str, public_path: &str, content_hash: &str) -> Asset {
    Asset {
        id: AssetId::new(),
        project_id,
        file_name: public_path.to_string(),
        storage_key: format!("acme/site/commits/{commit_sha}/{public_path}"),
        mime_type: "text/html".to_string(),
        size: 13,
        content_hash: content_hash.to_string(),
        commit_sha: Some(commit_sha.to_string()),
        branch: Some("main".to_string()),
        deployment_id: None,
        public_path: Some(public_path.to_string()),
        uploaded_by: None,
        created_at: Utc::now(),
    }
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap()
        .to_vec()
}

#[tokio::test]
async fn serves_public_asset_with_etag_and_cache_control() {
    let state = AppState::new(test_config());
    let project = base_project(true);
    let domain = base_domain(project.id.clone(), "www.acme-site.test", false);
    let alias = base_alias(project.id.clone(), "abc123");
    let asset = base_asset(project.id.clone(), "abc123", "index.html", "deadbeef");
    state
        .backend
        .upload(&asset.storage_key, Bytes::from_static(b"<h1>hi</h1>"), None)
        .await
        .unwrap();
    state.backend.insert_project(project);
    state.backend.insert_domain(domain);
    state.backend.insert_alias(alias);
    state.backend.insert_asset(asset);

    let response = app(state)
        .oneshot(
            Request::builder()
                .uri("/index.html")
                .header("host", "www.acme-site.test")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("etag").unwrap(), "\"deadbeef\"");
    assert!(response.headers().contains_key("cache-control"));
    assert_eq!(response.headers().get("content-length").unwrap(), "13");
    assert!(response.headers().contains_key("last-modified"));
    let body = body_bytes(response).await;
    assert_eq!(body, b"<h1>hi</h1>");
}

#[tokio::test]
async fn conditional_get_returns_not_modified() {
    let state = AppState::new(test_config());
    let project = base_project(true);
    let domain = base_domain(project.id.clone(), "www.acme-site.test", false);
    let alias = base_alias(project.id.clone(), "abc123");
    let asset = base_asset(project.id.clone(), "abc123", "index.html", "deadbeef");
    state.backend.insert_project(project);
    state.backend.insert_domain(domain);
    state.backend.insert_alias(alias);
    state.backend.insert_asset(asset);

    let response = app(state)
        .oneshot(
            Request::builder()
                .uri("/index.html")
                .header("host", "www.acme-site.test")
                .header("if-none-match", "\"deadbeef\"")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
}

#[tokio::test]
async fn head_request_omits_body_but_keeps_headers() {
    let state = AppState::new(test_config());
    let project = base_project(true);
    let domain = base_domain(project.id.clone(), "www.acme-site.test", false);
    let alias = base_alias(project.id.clone(), "abc123");
    let asset = base_asset(project.id.clone(), "abc123", "index.html", "deadbeef");
    state.backend.insert_project(project);
    state.backend.insert_domain(domain);
    state.backend.insert_alias(alias);
    state.backend.insert_asset(asset);

    let response = app(state)
        .oneshot(
            Request::builder()
                .method("HEAD")
                .uri("/index.html")
                .header("host", "www.acme-site.test")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("etag").unwrap(), "\"deadbeef\"");
    assert_eq!(response.headers().get("content-length").unwrap(), "13");
    assert!(response.headers().contains_key("last-modified"));
    let body = body_bytes(response).await;
    assert!(body.is_empty());
}

#[tokio::test]
async fn private_project_without_auth_is_forbidden() {
    let state = AppState::new(test_config());
    let project = base_project(false);
    let domain = base_domain(project.id.clone(), "private.acme-site.test", false);
    let alias = base_alias(project.id.clone(), "abc123");
    let asset = base_asset(project.id.clone(), "abc123", "index.html", "deadbeef");
    state.backend.insert_project(project);
    state.backend.insert_domain(domain);
    state.backend.insert_alias(alias);
    state.backend.insert_asset(asset);

    let response = app(state)
        .oneshot(
            Request::builder()
                .uri("/index.html")
                .header("host", "private.acme-site.test")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn private_project_with_granted_role_is_served() {
    let state = AppState::new(test_config());
    let project = base_project(false);
    let domain = base_domain(project.id.clone(), "private.acme-site.test", false);
    let alias = base_alias(project.id.clone(), "abc123");
    let asset = base_asset(project.id.clone(), "abc123", "index.html", "deadbeef");
    let user_id = UserId::new();
    state
        .backend
        .upload(&asset.storage_key, Bytes::from_static(b"<h1>hi</h1>"), None)
        .await
        .unwrap();
    state.backend.grant_role(user_id.clone(), project.id.clone(), RequiredRole::Viewer);
    state.backend.insert_project(project);
    state.backend.insert_domain(domain);
    state.backend.insert_alias(alias);
    state.backend.insert_asset(asset);

    let response = app(state)
        .oneshot(
            Request::builder()
                .uri("/index.html")
                .header("host", "private.acme-site.test")
                .header("x-platform-user-id", user_id.as_str())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn redirect_domain_returns_301_with_location() {
    let state = AppState::new(test_config());
    let mut domain = base_domain(ProjectId::new(), "old.acme-site.test", false);
    domain.project_id = None;
    domain.domain_type = DomainType::Redirect;
    domain.redirect_target = Some("https://new.acme-site.test".to_string());
    state.backend.insert_domain(domain);

    let response = app(state)
        .oneshot(
            Request::builder()
                .uri("/docs?ref=1")
                .header("host", "old.acme-site.test")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(
        response.headers().get("location").unwrap(),
        "https://new.acme-site.test/docs?ref=1"
    );
}

#[tokio::test]
async fn spa_fallback_serves_index_for_missing_path() {
    let state = AppState::new(test_config());
    let project = base_project(true);
    let domain = base_domain(project.id.clone(), "spa.acme-site.test", true);
    let alias = base_alias(project.id.clone(), "abc123");
    let index = base_asset(project.id.clone(), "abc123", "index.html", "deadbeef");
    state
        .backend
        .upload(&index.storage_key, Bytes::from_static(b"<h1>hi</h1>"), None)
        .await
        .unwrap();
    state.backend.insert_project(project);
    state.backend.insert_domain(domain);
    state.backend.insert_alias(alias);
    state.backend.insert_asset(index);

    let response = app(state)
        .oneshot(
            Request::builder()
                .uri("/dashboard/settings")
                .header("host", "spa.acme-site.test")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("etag").unwrap(), "\"deadbeef\"");
}

#[tokio::test]
async fn unknown_host_and_path_is_not_found() {
    let state = AppState::new(test_config());

    let response = app(state)
        .oneshot(
            Request::builder()
                .uri("/anything")
                .header("host", "nowhere.test")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_and_readiness_routes_respond_ok() {
    let state = AppState::new(test_config());

    let health_response = app(state.clone())
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(health_response.status(), StatusCode::OK);

    let ready_response = app(state)
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(ready_response.status(), StatusCode::OK);
}
