//! # platform-core
//!
//! Serving-plane core for a multi-tenant static-asset/deployment-hosting
//! platform: request resolution, the proxy-rule and cache-rule engines, the
//! retention engine, and the in-process rule caches that back them.
//!
//! ## Example
//!
//! ```rust,no_run
//! use platform_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!
//!     let state = AppState::builder()
//!         .config(config.clone())
//!         .build()
//!         .await?;
//!
//!     let app = Router::new()
//!         .route("/health", get(health))
//!         .route("/ready", get(readiness))
//!         .with_state(state);
//!
//!     Server::new(config)
//!         .serve(app)
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod cache_header;
pub mod config;
pub mod crypto;

#[cfg(feature = "email")]
pub mod email;

pub mod error;
pub mod forms;
pub mod glob;
pub mod ids;
pub mod middleware;
pub mod health;
pub mod models;
pub mod pool_health;
pub mod responses;
pub mod server;
pub mod state;

#[cfg(feature = "database")]
pub mod database;

#[cfg(feature = "cache")]
pub mod cache;

pub mod observability;

pub mod permission;
pub mod proxy;
pub mod retention;
pub mod router;
pub mod rule_cache;
pub mod ssrf;
pub mod storage;
pub mod visibility;

pub mod repository;
pub mod handlers;
pub mod audit;
pub mod usage;

/// Internal agent-based components
///
/// Connection pool management and the Retention Engine's daily scheduler are
/// handled internally by agents. The only user-facing types from this module
/// are [`BackgroundWorker`](agents::BackgroundWorker) and
/// [`TaskStatus`](agents::TaskStatus), for submitting and checking managed
/// background tasks.
pub mod agents;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::Config;

    pub use crate::error::{Error, Result};
    pub use crate::health::{health, readiness, pool_metrics};
    pub use crate::ids::{
        AliasId, AssetId, CacheRuleId, DeploymentId, DomainId, MakeTypedRequestId, ProjectId,
        ProxyRuleId, RequestId, RequestIdError, RetentionRuleId, RuleSetId, UserId,
    };
    pub use crate::pool_health::PoolHealthSummary;

    pub use crate::models::{
        Asset, AuthTransform, CacheRule, Cacheability, CreateAsset, CreateCacheRule,
        CreateDeploymentAlias, CreateDomainMapping, CreateProject, CreateProxyRule,
        CreateProxyRuleSet, CreateRetentionRule, DeploymentAlias, DomainMapping, DomainType,
        EmailHandlerConfig, HeaderConfig, PathMode, Project, ProxyRule, ProxyRuleSet, ProxyType,
        RequiredRole, RetentionLog, RetentionRule, RetentionRunSummary, UnauthorizedBehavior,
        UpdateAsset, UpdateCacheRule, UpdateDeploymentAlias, UpdateDomainMapping, UpdateProject,
        UpdateProxyRule, UpdateProxyRuleSet, UpdateRetentionRule, WwwBehavior,
    };

    #[cfg(feature = "database")]
    pub use crate::pool_health::DatabasePoolHealth;

    #[cfg(feature = "cache")]
    pub use crate::pool_health::RedisPoolHealth;

    pub use crate::cache_header::{resolve as resolve_cache_header, CacheDirective, CacheHeaderInput};
    pub use crate::crypto::{CryptoError, HeaderCipher};

    #[cfg(feature = "email")]
    pub use crate::email::{EmailConfig, SmtpEmailSender};

    pub use crate::forms::{handle_submission, source_ip as form_source_ip, FormFields, FormOutcome};
    pub use crate::glob::{GlobError, GlobPattern};

    pub use crate::middleware::{
        FormRateLimiter, RequestTrackingConfig,
        PROPAGATE_HEADERS, SENSITIVE_HEADERS,
        request_id_layer, request_id_propagation_layer, sensitive_headers_layer,
    };

    pub use crate::server::Server;
    pub use crate::state::{AppState, AppStateBuilder};
    pub use crate::responses::{
        Accepted, Conflict, Created, FieldError, NoContent, Success, ValidationError,
    };

    #[cfg(feature = "resilience")]
    pub use crate::middleware::ResilienceConfig;

    #[cfg(feature = "otel-metrics")]
    pub use crate::middleware::{MetricsConfig, metric_labels, metric_names};

    pub use crate::observability::init_tracing;

    pub use crate::permission::{satisfies, AuthContext, PermissionOracle};
    pub use crate::proxy::{assemble_headers, compose_target_url, forward, guard_target, ForwardRequest};
    pub use crate::ssrf::{check as ssrf_check, is_blocked_ip, SsrfError};
    pub use crate::rule_cache::{
        compile_cache_rule, compile_proxy_rule, CacheRuleCache, CompiledCacheRule,
        CompiledProxyRule, ProxyRuleCache,
    };
    pub use crate::storage::{commit_storage_key, upload_storage_key, ByteStream, Storage, StorageError};
    pub use crate::visibility::{resolve as resolve_visibility, EffectiveVisibility, VisibilitySource};
    pub use crate::retention::{
        next_daily_tick, AssetRef, CommitGroup, RetentionEngine, RetentionRepository,
        RetentionScheduler,
    };
    pub use crate::router::{
        compute_internal_rewrite, effective_public_path, etag_for, is_not_modified,
        match_proxy_rule, normalize_host, parse_public_path, resolve as resolve_route,
        resolve_domain, resolve_rule_set_id, resolve_spa_fallback, resolve_target, select_alias,
        www_twin, ParsedPath, Reference, RequestInput, ResolvedTarget, RouteOutcome,
        RouterRepository, TrafficPredicate, TrafficRuleAlias, STICKY_COOKIE_NAME,
    };

    pub use crate::repository::{
        FilterCondition, FilterOperator, FilterValue, OrderDirection, Pagination, Repository,
        RepositoryError,
    };

    pub use crate::handlers::{ApiError, ListQuery, SortOrder};

    pub use crate::audit::{AuditChain, AuditEvent, AuditEventKind, AuditLogger, AuditSeverity};

    pub use crate::usage::{NoopUsageReporter, UsageReporter};

    // Background task management (user-facing)
    pub use crate::agents::{BackgroundWorker, TaskStatus};

    pub use axum::{
        extract::{Path, Query, State},
        http::{HeaderMap, HeaderValue, StatusCode},
        response::{IntoResponse, Json, Response},
        routing::{delete, get, patch, post, put},
        Extension, Router,
    };

    pub use serde::{Deserialize, Serialize};

    // Re-export tracing macros and types
    pub use tracing::{debug, error, info, instrument, trace, warn, Level, Span};

    // Re-export tokio for async runtime
    pub use tokio;

    // Re-export async-trait for async trait definitions
    pub use async_trait::async_trait;

    // Re-export error handling utilities
    pub use thiserror::Error;
    pub use anyhow::{self, Context as AnyhowContext};

    // Re-export time utilities
    pub use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, Utc};

    // Re-export UUID
    pub use uuid::Uuid;

    // Re-export futures utilities
    pub use futures::{future, stream, Future, Stream, StreamExt, TryFutureExt, TryStreamExt};

    // Re-export HTTP types
    pub use http::{Method, Uri};

    // Re-export acton-reactive prelude for actor system
    pub use acton_reactive::prelude::*;
}
