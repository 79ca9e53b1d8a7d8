//! Proxy Engine
//!
//! Stream-forwards a request matched by an `external_proxy` rule to its
//! upstream target: composes the outbound URL, assembles headers (allowlist,
//! strip list, decrypted `add` map, `cookie-to-bearer` transform), re-checks
//! the SSRF guard against the resolved target, and copies the upstream
//! response back without buffering, subject to `timeoutMs`.

use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use futures::StreamExt;

use crate::crypto::HeaderCipher;
use crate::error::{Error, Result};
use crate::models::{AuthTransform, ProxyRule};
use crate::ssrf;

/// Headers forwarded from the inbound request by default.
const SAFE_FORWARD_ALLOWLIST: &[&str] = &["accept", "accept-language", "content-type", "user-agent", "x-request-id"];

/// Headers never forwarded unless explicitly requested.
const DEFAULT_STRIP: &[&str] = &["host", "connection", "keep-alive", "transfer-encoding", "authorization", "cookie"];

/// Hop-by-hop response headers that must never be relayed downstream.
const HOP_BY_HOP_RESPONSE: &[&str] = &[
    "transfer-encoding",
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "upgrade",
    "content-encoding",
    "content-length",
];

/// Everything the proxy engine needs about the inbound request to forward it.
pub struct ForwardRequest<'a> {
    pub method: Method,
    pub subpath: &'a str,
    pub query: Option<&'a str>,
    pub headers: &'a HeaderMap,
    pub peer_ip: &'a str,
    pub body: Body,
}

/// Compose the outbound target URL for `rule` given the matched `subpath`.
///
/// If `rule.strip_prefix` is set and the pattern is a prefix wildcard
/// (`/p/*`), the matched prefix is stripped before concatenation, so
/// `target_url=https://api.host/v1` + pattern `/api/*` + request `/api/users`
/// yields `https://api.host/v1/users`.
pub fn compose_target_url(rule: &ProxyRule, subpath: &str, query: Option<&str>) -> Result<Uri> {
    let effective_path = if rule.strip_prefix {
        strip_glob_prefix(&rule.path_pattern, subpath)
    } else {
        subpath.to_string()
    };

    let base = rule.target_url.trim_end_matches('/');
    let path = effective_path.trim_start_matches('/');
    let mut composed = if path.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base, path)
    };

    if let Some(q) = query.filter(|q| !q.is_empty()) {
        composed.push('?');
        composed.push_str(q);
    }

    composed
        .parse::<Uri>()
        .map_err(|e| Error::BadRequest(format!("invalid composed proxy target: {e}")))
}

fn strip_glob_prefix(pattern: &str, subpath: &str) -> String {
    let literal_prefix = pattern.trim_end_matches("**").trim_end_matches('*');
    let literal_prefix = literal_prefix.trim_end_matches('/');
    subpath.strip_prefix(literal_prefix).unwrap_or(subpath).to_string()
}

/// Assemble the outbound header map from the inbound headers plus `rule`'s
/// header configuration, applying the cookie→bearer transform last.
pub fn assemble_headers(
    req: &ForwardRequest<'_>,
    rule: &ProxyRule,
    target: &Uri,
    cipher: Option<&HeaderCipher>,
) -> Result<HeaderMap> {
    let mut out = HeaderMap::new();

    let mut allow: Vec<String> = SAFE_FORWARD_ALLOWLIST.iter().map(|s| s.to_string()).collect();
    allow.extend(rule.header_config.forward.iter().cloned());
    if rule.forward_cookies {
        allow.push("cookie".to_string());
    }

    let mut strip: Vec<String> = DEFAULT_STRIP.iter().map(|s| s.to_string()).collect();
    if rule.forward_cookies {
        strip.retain(|h| h != "cookie");
    }
    strip.extend(rule.header_config.strip.iter().cloned());

    for name in &allow {
        if strip.contains(name) {
            continue;
        }
        if let Some(value) = req.headers.get(name.as_str()) {
            if let Ok(header_name) = HeaderName::try_from(name.as_str()) {
                out.insert(header_name, value.clone());
            }
        }
    }

    for (key, value) in &rule.header_config.add {
        let decrypted = match cipher {
            Some(c) => c.decrypt_or_passthrough(value),
            None => value.clone(),
        };
        if let (Ok(name), Ok(val)) = (HeaderName::try_from(key.as_str()), HeaderValue::from_str(&decrypted)) {
            out.insert(name, val);
        }
    }

    if !rule.preserve_host {
        if let Some(authority) = target.authority() {
            if let Ok(val) = HeaderValue::from_str(authority.as_str()) {
                out.insert(HeaderName::from_static("host"), val);
            }
        }
    }

    out.remove("content-length");

    if let Ok(val) = HeaderValue::from_str(req.peer_ip) {
        out.insert(HeaderName::from_static("x-forwarded-for"), val);
    }
    let proto = if target.scheme_str() == Some("https") { "https" } else { "http" };
    out.insert(HeaderName::from_static("x-forwarded-proto"), HeaderValue::from_static(proto));
    if let Some(host_value) = req.headers.get("host").cloned() {
        out.insert(HeaderName::from_static("x-forwarded-host"), host_value);
    }

    if let Some(AuthTransform::CookieToBearer { cookie_name }) = &rule.auth_transform {
        match extract_cookie(req.headers, cookie_name) {
            Some(value) => {
                if let Ok(bearer) = HeaderValue::from_str(&format!("Bearer {value}")) {
                    out.insert(HeaderName::from_static("authorization"), bearer);
                }
            }
            None => {
                out.remove("authorization");
            }
        }
        if !rule.forward_cookies {
            out.remove("cookie");
        }
    }

    Ok(out)
}

fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get("cookie")?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k == name).then(|| v.to_string())
    })
}

/// Re-check the SSRF guard against `target`'s resolved addresses.
///
/// `resolve` is injected so callers can supply a cached/fake resolver in
/// tests; production callers pass a DNS lookup.
pub async fn guard_target<F, Fut>(target: &Uri, resolve: F) -> Result<()>
where
    F: FnOnce(String) -> Fut,
    Fut: std::future::Future<Output = Vec<std::net::IpAddr>>,
{
    let host = target
        .host()
        .ok_or_else(|| Error::BadRequest("proxy target has no host".to_string()))?
        .to_string();
    let ips = resolve(host).await;
    ssrf::check(target, &ips).map_err(|e| Error::SsrfRejected(e.to_string()))
}

/// Forward `req` to `target` using `client`, honoring `timeout` and
/// returning a response with hop-by-hop headers stripped.
pub async fn forward(
    client: &reqwest::Client,
    req: ForwardRequest<'_>,
    target: Uri,
    headers: HeaderMap,
    timeout: Duration,
) -> Result<axum::response::Response> {
    let method = reqwest::Method::from_bytes(req.method.as_str().as_bytes())
        .map_err(|e| Error::Internal(format!("invalid method: {e}")))?;

    let mut builder = client.request(method, target.to_string());

    let mut reqwest_headers = reqwest::header::HeaderMap::new();
    for (name, value) in headers.iter() {
        if let (Ok(n), Ok(v)) = (
            reqwest::header::HeaderName::from_bytes(name.as_str().as_bytes()),
            reqwest::header::HeaderValue::from_bytes(value.as_bytes()),
        ) {
            reqwest_headers.insert(n, v);
        }
    }
    builder = builder.headers(reqwest_headers);

    if !matches!(req.method, Method::GET | Method::HEAD | Method::OPTIONS) {
        let body_bytes = axum::body::to_bytes(req.body, usize::MAX)
            .await
            .map_err(|e| Error::Internal(format!("failed to buffer outbound body: {e}")))?;
        builder = builder.body(body_bytes);
    }

    let outcome = tokio::time::timeout(timeout, builder.send()).await;

    let upstream_response = match outcome {
        Err(_) => return Err(Error::UpstreamTimeout),
        Ok(Err(e)) => return Err(Error::UpstreamFailure(e.to_string())),
        Ok(Ok(r)) => r,
    };

    let status = StatusCode::from_u16(upstream_response.status().as_u16())
        .unwrap_or(StatusCode::BAD_GATEWAY);

    let mut response_headers = HeaderMap::new();
    for (name, value) in upstream_response.headers().iter() {
        if HOP_BY_HOP_RESPONSE.contains(&name.as_str()) {
            continue;
        }
        if let (Ok(n), Ok(v)) = (
            HeaderName::try_from(name.as_str()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) {
            response_headers.insert(n, v);
        }
    }

    let stream = upstream_response
        .bytes_stream()
        .map(|chunk| chunk.map_err(|e| std::io::Error::other(e.to_string())));
    let body = Body::from_stream(stream);

    let mut builder = axum::response::Response::builder().status(status);
    for (name, value) in response_headers.iter() {
        builder = builder.header(name, value);
    }
    builder
        .body(body)
        .map_err(|e| Error::Internal(format!("failed to build proxied response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{ProxyRuleId, RuleSetId};
    use chrono::Utc;

    fn rule(path_pattern: &str, target_url: &str, strip_prefix: bool) -> ProxyRule {
        ProxyRule {
            id: ProxyRuleId::new(),
            rule_set_id: RuleSetId::new(),
            path_pattern: path_pattern.to_string(),
            target_url: target_url.to_string(),
            proxy_type: crate::models::ProxyType::ExternalProxy,
            strip_prefix,
            order: 0,
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
    fn strip_prefix_composes_correctly() {
        let r = rule("/api/*", "https://backend/v1", true);
        let url = compose_target_url(&r, "/api/users", Some("x=1")).unwrap();
        assert_eq!(url.to_string(), "https://backend/v1/users?x=1");
    }

    #[test]
    fn no_strip_prefix_keeps_full_subpath() {
        let r = rule("/api/*", "https://h/v1", false);
        let url = compose_target_url(&r, "/api/x", None).unwrap();
        assert_eq!(url.to_string(), "https://h/v1/api/x");
    }

    #[test]
    fn cookie_to_bearer_sets_authorization_and_drops_cookie() {
        let mut r = rule("/admin/*", "https://h", false);
        r.auth_transform = Some(AuthTransform::CookieToBearer {
            cookie_name: "sAccessToken".to_string(),
        });
        let mut headers = HeaderMap::new();
        headers.insert("cookie", HeaderValue::from_static("sAccessToken=XYZ; other=1"));
        let target: Uri = "https://h/admin/x".parse().unwrap();
        let req = ForwardRequest {
            method: Method::GET,
            subpath: "/admin/x",
            query: None,
            headers: &headers,
            peer_ip: "1.2.3.4",
            body: Body::empty(),
        };
        let out = assemble_headers(&req, &r, &target, None).unwrap();
        assert_eq!(out.get("authorization").unwrap(), "Bearer XYZ");
        assert!(out.get("cookie").is_none());
    }

    #[test]
    fn forwarded_headers_are_always_set() {
        let r = rule("/api/*", "https://h", false);
        let headers = HeaderMap::new();
        let target: Uri = "https://h/api/x".parse().unwrap();
        let req = ForwardRequest {
            method: Method::GET,
            subpath: "/api/x",
            query: None,
            headers: &headers,
            peer_ip: "5.6.7.8",
            body: Body::empty(),
        };
        let out = assemble_headers(&req, &r, &target, None).unwrap();
        assert_eq!(out.get("x-forwarded-for").unwrap(), "5.6.7.8");
        assert_eq!(out.get("x-forwarded-proto").unwrap(), "https");
    }

    #[test]
    fn preserve_host_leaves_host_header_alone() {
        let mut r = rule("/api/*", "https://h", false);
        r.preserve_host = true;
        let headers = HeaderMap::new();
        let target: Uri = "https://h/api/x".parse().unwrap();
        let req = ForwardRequest {
            method: Method::GET,
            subpath: "/api/x",
            query: None,
            headers: &headers,
            peer_ip: "1.1.1.1",
            body: Body::empty(),
        };
        let out = assemble_headers(&req, &r, &target, None).unwrap();
        assert!(out.get("host").is_none());
    }
}
