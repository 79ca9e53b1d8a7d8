//! Middleware: request tracking, security headers, and rate limiting

pub mod rate_limit;
pub mod request_tracking;
pub mod security_headers;

#[cfg(feature = "resilience")]
pub mod resilience;

#[cfg(feature = "otel-metrics")]
pub mod metrics;

pub use rate_limit::FormRateLimiter;
pub use request_tracking::{
    request_id_layer, request_id_propagation_layer, sensitive_headers_layer,
    RequestTrackingConfig, PROPAGATE_HEADERS, SENSITIVE_HEADERS,
};
pub use security_headers::apply_security_headers;

#[cfg(feature = "resilience")]
pub use resilience::ResilienceConfig;

#[cfg(feature = "otel-metrics")]
pub use metrics::{metric_labels, metric_names, MetricsConfig};
