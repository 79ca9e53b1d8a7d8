//! Form-Handler Engine
//!
//! Handles `POST`s matched by an `email_form_handler` proxy rule: validates
//! the method and auth requirement, enforces the per-IP rate limit, parses
//! the body by content type, applies the honeypot, and composes + dispatches
//! the notification email.

use std::collections::HashMap;

use axum::http::{HeaderMap, Method, StatusCode};

use crate::error::{Error, Result};
use crate::middleware::FormRateLimiter;
use crate::models::EmailHandlerConfig;

/// Parsed form fields, in submission order where the content type preserves it.
pub type FormFields = Vec<(String, String)>;

/// Outcome of a form submission, used by the router to build the HTTP response.
pub enum FormOutcome {
    /// Honeypot tripped — respond success without having sent anything.
    SilentDrop,
    /// Email sent; redirect to `success_redirect` if configured.
    Sent { redirect_to: Option<String> },
}

/// Extract the client IP for rate-limit accounting: the first
/// `X-Forwarded-For` entry, else the peer address.
pub fn source_ip(headers: &HeaderMap, peer_addr: &str) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| peer_addr.to_string())
}

/// Parse a request body into form fields according to its content type.
///
/// Supports `application/json` (top-level object, scalar values stringified),
/// `application/x-www-form-urlencoded`, and `multipart/form-data` restricted
/// to text fields — file parts are rejected outright rather than stored.
pub fn parse_body(content_type: &str, body: &[u8]) -> Result<FormFields> {
    let mime = content_type.split(';').next().unwrap_or("").trim();
    match mime {
        "application/json" => parse_json(body),
        "application/x-www-form-urlencoded" => Ok(parse_urlencoded(body)),
        "multipart/form-data" => parse_multipart(content_type, body),
        other => Err(Error::BadRequest(format!("unsupported form content-type: {other}"))),
    }
}

fn parse_json(body: &[u8]) -> Result<FormFields> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| Error::BadRequest(format!("invalid JSON body: {e}")))?;
    let object = value
        .as_object()
        .ok_or_else(|| Error::BadRequest("form body must be a JSON object".to_string()))?;
    Ok(object
        .iter()
        .map(|(k, v)| {
            let s = match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), s)
        })
        .collect())
}

fn parse_urlencoded(body: &[u8]) -> FormFields {
    let text = String::from_utf8_lossy(body);
    text.split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            Some((url_decode(k), url_decode(v)))
        })
        .collect()
}

fn url_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                if let Ok(hex) = std::str::from_utf8(&bytes[i + 1..i + 3]) {
                    if let Ok(byte) = u8::from_str_radix(hex, 16) {
                        out.push(byte);
                        i += 3;
                        continue;
                    }
                }
                out.push(bytes[i]);
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn parse_multipart(content_type: &str, body: &[u8]) -> Result<FormFields> {
    let boundary = content_type
        .split(';')
        .find_map(|part| part.trim().strip_prefix("boundary="))
        .ok_or_else(|| Error::BadRequest("multipart body missing boundary".to_string()))?
        .trim_matches('"');
    let delimiter = format!("--{boundary}");
    let text = String::from_utf8_lossy(body);

    let mut fields = Vec::new();
    for part in text.split(&delimiter) {
        let part = part.trim_start_matches("\r\n").trim_end_matches("\r\n");
        if part.is_empty() || part == "--" {
            continue;
        }
        let Some((headers_block, value)) = part.split_once("\r\n\r\n") else {
            continue;
        };
        if headers_block.to_ascii_lowercase().contains("filename=") {
            return Err(Error::BadRequest("multipart file fields are not supported".to_string()));
        }
        let name = headers_block
            .lines()
            .find_map(|line| {
                let lower = line.to_ascii_lowercase();
                lower.contains("content-disposition").then(|| {
                    line.split("name=\"")
                        .nth(1)
                        .and_then(|rest| rest.split('"').next())
                        .unwrap_or("")
                        .to_string()
                })
            })
            .unwrap_or_default();
        if !name.is_empty() {
            fields.push((name, value.trim_end_matches("--").to_string()));
        }
    }
    Ok(fields)
}

/// Validate method and emit the CORS preflight/response headers this rule requires.
pub fn enforce_method(method: &Method, config: &EmailHandlerConfig) -> Result<HeaderMap> {
    if method != Method::POST {
        return Err(Error::BadRequest(format!("form handler accepts POST only, got {method}")));
    }
    let mut headers = HeaderMap::new();
    if let Some(origin) = &config.cors_origin {
        if let Ok(v) = axum::http::HeaderValue::from_str(origin) {
            headers.insert("access-control-allow-origin", v);
        }
    }
    Ok(headers)
}

/// Honeypot check: if the configured field is present and non-empty,
/// report a silent drop — success response, nothing sent.
pub fn check_honeypot(fields: &FormFields, config: &EmailHandlerConfig) -> bool {
    let Some(field_name) = &config.honeypot_field else {
        return false;
    };
    fields
        .iter()
        .any(|(k, v)| k == field_name && !v.trim().is_empty())
}

/// Compose the HTML and plain-text bodies from submitted fields.
pub fn compose_bodies(fields: &FormFields) -> (String, String) {
    let mut text = String::new();
    let mut html = String::from("<table>");
    for (key, value) in fields {
        text.push_str(&format!("{key}: {value}\n"));
        html.push_str(&format!(
            "<tr><th>{}</th><td>{}</td></tr>",
            html_escape(key),
            html_escape(value)
        ));
    }
    html.push_str("</table>");
    (html, text)
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// A syntactically valid reply-to field value, if `fields` carries one under
/// `config.reply_to_field` and it looks like an email address.
pub fn extract_reply_to(fields: &FormFields, config: &EmailHandlerConfig) -> Option<String> {
    let field_name = config.reply_to_field.as_ref()?;
    let value = fields.iter().find(|(k, _)| k == field_name).map(|(_, v)| v.clone())?;
    is_plausible_email(&value).then_some(value)
}

fn is_plausible_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

/// Full pipeline: rate-limit, parse, honeypot-check, and hand the composed
/// message to `send`. `send` performs the actual SMTP dispatch (kept
/// injectable so the engine itself stays transport-agnostic and testable).
pub async fn handle_submission<S, Fut>(
    method: &Method,
    content_type: &str,
    body: &[u8],
    source_ip: &str,
    config: &EmailHandlerConfig,
    rate_limiter: &FormRateLimiter,
    send: S,
) -> Result<FormOutcome>
where
    S: FnOnce(String, String, String, Option<String>) -> Fut,
    Fut: std::future::Future<Output = Result<()>>,
{
    if method != Method::POST {
        return Err(Error::BadRequest(format!("form handler accepts POST only, got {method}")));
    }

    rate_limiter.check_and_record(source_ip).await?;

    let fields = parse_body(content_type, body)?;

    if check_honeypot(&fields, config) {
        return Ok(FormOutcome::SilentDrop);
    }

    let destination = config
        .destination_email
        .clone()
        .ok_or_else(|| Error::EmailDestinationMissing("destination email not configured".to_string()))?;

    let (html, text) = compose_bodies(&fields);
    let reply_to = extract_reply_to(&fields, config);

    send(destination, html, text, reply_to).await?;

    Ok(FormOutcome::Sent {
        redirect_to: config.success_redirect.clone(),
    })
}

/// The HTTP response shape for a successful submission: `303 See Other` to
/// `success_redirect` when set, else `200 OK`.
pub fn response_status(outcome: &FormOutcome) -> StatusCode {
    match outcome {
        FormOutcome::SilentDrop => StatusCode::OK,
        FormOutcome::Sent { redirect_to: Some(_) } => StatusCode::SEE_OTHER,
        FormOutcome::Sent { redirect_to: None } => StatusCode::OK,
    }
}
