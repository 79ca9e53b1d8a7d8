//! Configuration management using Figment
//!
//! Precedence (highest to lowest):
//! 1. Environment variables (prefix: `PLATFORM_`; a few well-known vars are
//!    exempt from the prefix and read as-is: `PRIMARY_DOMAIN`,
//!    `ENCRYPTION_KEY`, `RETENTION_ENABLED`, `RETENTION_DRY_RUN`,
//!    `CONTROL_PLANE_URL`, `WORKSPACE_ID`, `WORKSPACE_SECRET`)
//! 2. Current working directory: ./config.toml
//! 3. Default values

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service-level configuration
    pub service: ServiceConfig,

    /// Serving-core configuration: primary domain, retention toggles, encryption
    pub serving: ServingConfig,

    /// Rule-set cache TTLs (component D)
    #[serde(default)]
    pub rule_cache: RuleCacheConfig,

    /// Form-handler rate limiting (component I)
    #[serde(default)]
    pub form_rate_limit: FormRateLimitConfig,

    /// Middleware configuration
    #[serde(default)]
    pub middleware: MiddlewareConfig,

    /// Database configuration (optional; library callers may bring their own pool instead)
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// Redis configuration backing the rule caches and form rate limiter
    #[serde(default)]
    pub redis: Option<RedisConfig>,

    /// Usage-reporting control plane (optional; fire-and-forget)
    #[serde(default)]
    pub control_plane: Option<ControlPlaneConfig>,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_environment")]
    pub environment: String,
}

/// Serving-core configuration: the well-known environment variables below
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServingConfig {
    /// `PRIMARY_DOMAIN` — the platform's configured base domain, used for
    /// primary-domain fallback and subdomain-alias resolution
    pub primary_domain: String,

    /// `ENCRYPTION_KEY` — base64-encoded 32 bytes, AEAD key for `headerConfig.add`
    pub encryption_key_base64: String,

    /// `RETENTION_ENABLED`
    #[serde(default = "default_true")]
    pub retention_enabled: bool,

    /// `RETENTION_DRY_RUN`
    #[serde(default = "default_false")]
    pub retention_dry_run: bool,
}

/// Rule-set cache TTLs (component D — proxy rules 10s, cache rules 5min)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleCacheConfig {
    #[serde(default = "default_proxy_rule_ttl_secs")]
    pub proxy_rule_ttl_secs: u64,

    #[serde(default = "default_cache_rule_ttl_secs")]
    pub cache_rule_ttl_secs: u64,
}

impl Default for RuleCacheConfig {
    fn default() -> Self {
        Self {
            proxy_rule_ttl_secs: default_proxy_rule_ttl_secs(),
            cache_rule_ttl_secs: default_cache_rule_ttl_secs(),
        }
    }
}

impl RuleCacheConfig {
    pub fn proxy_rule_ttl(&self) -> Duration {
        Duration::from_secs(self.proxy_rule_ttl_secs)
    }

    pub fn cache_rule_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_rule_ttl_secs)
    }
}

/// Form-handler rate limiting: 10 successful submissions per source IP per rolling hour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormRateLimitConfig {
    #[serde(default = "default_form_submissions_per_window")]
    pub submissions_per_window: u32,

    #[serde(default = "default_form_window_secs")]
    pub window_secs: u64,

    #[serde(default = "default_form_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for FormRateLimitConfig {
    fn default() -> Self {
        Self {
            submissions_per_window: default_form_submissions_per_window(),
            window_secs: default_form_window_secs(),
            sweep_interval_secs: default_form_sweep_interval_secs(),
        }
    }
}

impl FormRateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    /// If true, failure to establish a pool at startup is tolerated
    #[serde(default = "default_false")]
    pub optional: bool,

    /// If true, the pool is connected lazily on a background task rather
    /// than blocking startup
    #[serde(default = "default_true")]
    pub lazy_init: bool,
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,

    #[serde(default = "default_redis_max_connections")]
    pub max_connections: usize,

    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    /// If true, failure to establish a pool at startup is tolerated
    #[serde(default = "default_false")]
    pub optional: bool,

    /// If true, the pool is connected lazily on a background task rather
    /// than blocking startup
    #[serde(default = "default_true")]
    pub lazy_init: bool,
}

/// Usage-reporting control plane: `CONTROL_PLANE_URL` + `WORKSPACE_ID` + `WORKSPACE_SECRET`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlPlaneConfig {
    pub control_plane_url: String,
    pub workspace_id: String,
    pub workspace_secret: String,
}

/// Middleware configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiddlewareConfig {
    #[serde(default)]
    pub request_tracking: RequestTrackingConfig,

    #[serde(default = "default_body_limit_mb")]
    pub body_limit_mb: usize,

    #[serde(default = "default_true")]
    pub catch_panic: bool,

    #[serde(default = "default_true")]
    pub compression: bool,

    #[serde(default = "default_cors_mode")]
    pub cors_mode: String,

    #[serde(default)]
    pub security_headers: SecurityHeadersConfig,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            request_tracking: RequestTrackingConfig::default(),
            body_limit_mb: default_body_limit_mb(),
            catch_panic: true,
            compression: true,
            cors_mode: default_cors_mode(),
            security_headers: SecurityHeadersConfig::default(),
        }
    }
}

/// Request tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestTrackingConfig {
    #[serde(default = "default_true")]
    pub request_id_enabled: bool,

    #[serde(default = "default_request_id_header")]
    pub request_id_header: String,

    /// Headers propagated from the inbound request onto the outbound response
    #[serde(default)]
    pub propagate_headers: bool,

    #[serde(default = "default_true")]
    pub mask_sensitive_headers: bool,
}

impl Default for RequestTrackingConfig {
    fn default() -> Self {
        Self {
            request_id_enabled: true,
            request_id_header: default_request_id_header(),
            propagate_headers: false,
            mask_sensitive_headers: true,
        }
    }
}

/// Security-header hardening applied to every response (HSTS, frame options, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityHeadersConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub hsts: bool,

    #[serde(default = "default_hsts_max_age_secs")]
    pub hsts_max_age_secs: u64,

    #[serde(default = "default_true")]
    pub hsts_include_subdomains: bool,

    #[serde(default = "default_false")]
    pub hsts_preload: bool,

    #[serde(default = "default_true")]
    pub x_content_type_options: bool,

    #[serde(default = "default_x_frame_options")]
    pub x_frame_options: String,

    #[serde(default = "default_true")]
    pub x_xss_protection: bool,

    #[serde(default = "default_referrer_policy")]
    pub referrer_policy: String,

    #[serde(default)]
    pub permissions_policy: Option<String>,
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hsts: true,
            hsts_max_age_secs: default_hsts_max_age_secs(),
            hsts_include_subdomains: true,
            hsts_preload: false,
            x_content_type_options: true,
            x_frame_options: default_x_frame_options(),
            x_xss_protection: true,
            referrer_policy: default_referrer_policy(),
            permissions_policy: None,
        }
    }
}

fn default_hsts_max_age_secs() -> u64 {
    31_536_000
}
fn default_x_frame_options() -> String {
    "DENY".to_string()
}
fn default_referrer_policy() -> String {
    "strict-origin-when-cross-origin".to_string()
}

fn default_port() -> u16 {
    8080
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_timeout() -> u64 {
    30
}
fn default_environment() -> String {
    "dev".to_string()
}
fn default_proxy_rule_ttl_secs() -> u64 {
    10
}
fn default_cache_rule_ttl_secs() -> u64 {
    300
}
fn default_form_submissions_per_window() -> u32 {
    10
}
fn default_form_window_secs() -> u64 {
    3600
}
fn default_form_sweep_interval_secs() -> u64 {
    600
}
fn default_max_connections() -> u32 {
    50
}
fn default_min_connections() -> u32 {
    5
}
fn default_connection_timeout() -> u64 {
    10
}
fn default_redis_max_connections() -> usize {
    20
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_max_retries() -> u32 {
    5
}
fn default_retry_delay() -> u64 {
    2
}
fn default_body_limit_mb() -> usize {
    10
}
fn default_cors_mode() -> String {
    "permissive".to_string()
}
fn default_request_id_header() -> String {
    "x-request-id".to_string()
}

fn parse_bool_env(v: &str) -> bool {
    matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Environment variables override `./config.toml` which overrides defaults.
    /// A handful of well-known env vars (`PRIMARY_DOMAIN`, `ENCRYPTION_KEY`, ...)
    /// are merged unprefixed so operators can set them directly without the
    /// `PLATFORM_` namespace.
    pub fn load() -> Result<Self> {
        Self::load_from(PathBuf::from("config.toml"))
    }

    pub fn load_from(path: PathBuf) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default_skeleton()));

        if path.exists() {
            tracing::info!("loading configuration from {}", path.display());
            figment = figment.merge(Toml::file(&path));
        }

        figment = figment.merge(Env::prefixed("PLATFORM_").split("__"));

        // These six vars are well-known and read unprefixed, rather than
        // through the `PLATFORM_` namespace.
        if let Ok(v) = std::env::var("PRIMARY_DOMAIN") {
            figment = figment.merge(("serving.primary_domain", v));
        }
        if let Ok(v) = std::env::var("ENCRYPTION_KEY") {
            figment = figment.merge(("serving.encryption_key_base64", v));
        }
        if let Ok(v) = std::env::var("RETENTION_ENABLED") {
            figment = figment.merge(("serving.retention_enabled", parse_bool_env(&v)));
        }
        if let Ok(v) = std::env::var("RETENTION_DRY_RUN") {
            figment = figment.merge(("serving.retention_dry_run", parse_bool_env(&v)));
        }
        if let (Ok(url), Ok(id), Ok(secret)) = (
            std::env::var("CONTROL_PLANE_URL"),
            std::env::var("WORKSPACE_ID"),
            std::env::var("WORKSPACE_SECRET"),
        ) {
            figment = figment.merge((
                "control_plane",
                ControlPlaneConfig {
                    control_plane_url: url,
                    workspace_id: id,
                    workspace_secret: secret,
                },
            ));
        }

        let config: Config = figment.extract().map_err(|e| crate::error::Error::Config(Box::new(e)))?;
        Ok(config)
    }

    fn default_skeleton() -> Self {
        Self {
            service: ServiceConfig {
                name: "platform-core".to_string(),
                port: default_port(),
                log_level: default_log_level(),
                timeout_secs: default_timeout(),
                environment: default_environment(),
            },
            serving: ServingConfig {
                primary_domain: "example.test".to_string(),
                encryption_key_base64: String::new(),
                retention_enabled: true,
                retention_dry_run: false,
            },
            rule_cache: RuleCacheConfig::default(),
            form_rate_limit: FormRateLimitConfig::default(),
            middleware: MiddlewareConfig::default(),
            database: None,
            redis: None,
            control_plane: None,
        }
    }

    pub fn database_url(&self) -> Option<&str> {
        self.database.as_ref().map(|db| db.url.as_str())
    }

    pub fn redis_url(&self) -> Option<&str> {
        self.redis.as_ref().map(|r| r.url.as_str())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_skeleton()
    }
}
