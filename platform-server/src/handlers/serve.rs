//! The catch-all handler: runs every inbound request through the resolution
//! pipeline and dispatches on the resulting [`RouteOutcome`].

use std::net::IpAddr;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use futures::TryStreamExt;

use platform_core::cache_header::{self, CacheHeaderInput};
use platform_core::error::{Error, Result};
use platform_core::forms;
use platform_core::permission;
use platform_core::proxy::{self, ForwardRequest};
use platform_core::router::{self, RequestInput, RouteOutcome};
use platform_core::storage::Storage;
use platform_core::visibility;

use crate::handlers::auth;
use crate::memory::storage_error;
use crate::AppState;

/// Dispatch one request through the router and serve, proxy, redirect, or
/// hand it to the form-handler engine as the outcome demands.
pub async fn serve_request(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> Response {
    match dispatch(&state, method, uri, headers, body).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn dispatch(
    state: &AppState,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> Result<Response> {
    let host = host_header(&headers).unwrap_or_default();
    let path = uri.path();
    let query = uri.query();
    let forwarded_host = headers
        .get("x-forwarded-host")
        .and_then(|v| v.to_str().ok());

    let input = RequestInput {
        host: &host,
        path,
        query,
        original_uri: Some(uri.path()),
        forwarded_host,
    };

    let outcome = router::resolve(
        input,
        &state.config.serving.primary_domain,
        state.backend.as_ref(),
        &state.proxy_cache,
    )
    .await?;

    match outcome {
        RouteOutcome::Redirect { status, location } => Ok(redirect(status, &location)),
        RouteOutcome::Proxy { rule, subpath } => proxy_request(state, &method, &headers, body, rule, subpath, query).await,
        RouteOutcome::FormHandler { rule, subpath: _ } => form_request(state, &method, &headers, body, rule).await,
        RouteOutcome::Serve {
            project,
            commit_sha,
            public_path,
            is_spa,
        } => serve_asset(state, &headers, &method, project, commit_sha, public_path, is_spa).await,
    }
}

fn host_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

fn redirect(status: u16, location: &str) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::MOVED_PERMANENTLY);
    Response::builder()
        .status(status)
        .header(axum::http::header::LOCATION, location)
        .body(Body::empty())
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

async fn proxy_request(
    state: &AppState,
    method: &Method,
    headers: &HeaderMap,
    body: Body,
    rule: platform_core::models::ProxyRule,
    subpath: String,
    query: Option<&str>,
) -> Result<Response> {
    let target = proxy::compose_target_url(&rule, &subpath, query)?;
    let peer_ip = forms::source_ip(headers, "unknown");

    let req = ForwardRequest {
        method: method.clone(),
        subpath: &subpath,
        query,
        headers,
        peer_ip: &peer_ip,
        body,
    };

    let out_headers = proxy::assemble_headers(&req, &rule, &target, state.cipher.as_ref())?;

    proxy::guard_target(&target, resolve_host).await?;

    proxy::forward(
        &state.http_client,
        req,
        target,
        out_headers,
        Duration::from_millis(rule.clamped_timeout_ms() as u64),
    )
    .await
}

/// DNS resolution for the post-compose SSRF re-check.
async fn resolve_host(host: String) -> Vec<IpAddr> {
    tokio::net::lookup_host((host.as_str(), 0))
        .await
        .map(|iter| iter.map(|addr| addr.ip()).collect())
        .unwrap_or_default()
}

async fn form_request(
    state: &AppState,
    method: &Method,
    headers: &HeaderMap,
    body: Body,
    rule: platform_core::models::ProxyRule,
) -> Result<Response> {
    let config = rule
        .email_handler_config
        .ok_or_else(|| Error::Internal("email form handler rule missing handler config".to_string()))?;

    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let body_bytes = axum::body::to_bytes(body, 1024 * 1024)
        .await
        .map_err(|e| Error::BadRequest(format!("failed to read form body: {e}")))?;

    let source_ip = forms::source_ip(headers, "unknown");

    let outcome = forms::handle_submission(
        method,
        &content_type,
        &body_bytes,
        &source_ip,
        &config,
        &state.rate_limiter,
        |destination, _html, text, reply_to| async move {
            tracing::info!(
                destination = %destination,
                reply_to = ?reply_to,
                body = %text,
                "form submission logged (no SMTP transport configured for this deployment)"
            );
            Ok(())
        },
    )
    .await?;

    let status = forms::response_status(&outcome);
    match &outcome {
        forms::FormOutcome::Sent { redirect_to: Some(location) } => Response::builder()
            .status(status)
            .header(axum::http::header::LOCATION, location)
            .body(Body::empty())
            .map_err(|e| Error::Internal(e.to_string())),
        _ => Response::builder()
            .status(status)
            .body(Body::empty())
            .map_err(|e| Error::Internal(e.to_string())),
    }
}

async fn serve_asset(
    state: &AppState,
    headers: &HeaderMap,
    method: &Method,
    project: platform_core::models::Project,
    commit_sha: String,
    public_path: String,
    is_spa: bool,
) -> Result<Response> {
    let resolved_path = router::resolve_spa_fallback(
        state.backend.as_ref(),
        &project.id,
        &commit_sha,
        &public_path,
        is_spa,
    )
    .await?;

    let visibility = visibility::resolve(&project, None, None);

    if !visibility.is_public {
        let ctx = auth::extract(headers);
        let allowed = permission::satisfies(&ctx, &project.id, visibility.required_role, state.backend.as_ref()).await;
        if !allowed {
            return Err(Error::Forbidden(format!("project {} is not publicly visible", project.id)));
        }
    }

    let asset = state
        .backend
        .asset_at(&project.id, &commit_sha, &resolved_path)
        .ok_or_else(|| Error::NotFound(format!("asset {resolved_path}")))?;

    let if_none_match = headers
        .get(axum::http::header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok());
    if router::is_not_modified(if_none_match, &asset.content_hash) {
        return Response::builder()
            .status(StatusCode::NOT_MODIFIED)
            .header(axum::http::header::ETAG, router::etag_for(&asset.content_hash))
            .body(Body::empty())
            .map_err(|e| Error::Internal(e.to_string()));
    }

    let cache_rules = state.backend.cache_rules(&project.id);
    let compiled: Vec<_> = cache_rules
        .into_iter()
        .filter_map(|r| platform_core::rule_cache::compile_cache_rule(r).ok())
        .collect();
    let directive = cache_header::resolve(
        CacheHeaderInput {
            file_path: &resolved_path,
            is_immutable_url: false,
            is_public_content: visibility.is_public,
        },
        &compiled,
    );

    let last_modified = httpdate::fmt_http_date(asset.created_at.into());

    if *method == Method::HEAD {
        return Response::builder()
            .status(StatusCode::OK)
            .header(axum::http::header::CONTENT_TYPE, asset.mime_type.clone())
            .header(axum::http::header::CONTENT_LENGTH, asset.size.to_string())
            .header(axum::http::header::LAST_MODIFIED, last_modified)
            .header(axum::http::header::ETAG, router::etag_for(&asset.content_hash))
            .header(axum::http::header::CACHE_CONTROL, directive.header_value)
            .body(Body::empty())
            .map_err(|e| Error::Internal(e.to_string()));
    }

    let stream = state.backend.download(&asset.storage_key).await.map_err(storage_error)?;
    let body = Body::from_stream(stream.map_err(storage_error));

    Response::builder()
        .status(StatusCode::OK)
        .header(axum::http::header::CONTENT_TYPE, asset.mime_type.clone())
        .header(axum::http::header::CONTENT_LENGTH, asset.size.to_string())
        .header(axum::http::header::LAST_MODIFIED, last_modified)
        .header(axum::http::header::ETAG, router::etag_for(&asset.content_hash))
        .header(axum::http::header::CACHE_CONTROL, directive.header_value)
        .body(body)
        .map_err(|e| Error::Internal(e.to_string()))
}
