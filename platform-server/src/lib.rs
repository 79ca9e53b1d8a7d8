//! Serving-plane binary: wires the platform-core resolution pipeline,
//! proxy engine, cache-header engine, and form-handler engine to an axum
//! router, backed by an in-process [`memory::MemoryBackend`] standing in for
//! the relational repository and object store the real deployment brings.

pub mod handlers;
pub mod memory;

use std::sync::Arc;

use platform_core::config::Config;
use platform_core::crypto::HeaderCipher;
use platform_core::middleware::FormRateLimiter;
use platform_core::rule_cache::{CacheRuleCache, ProxyRuleCache};

use memory::MemoryBackend;

/// Everything a request handler needs, shared behind `Arc`/cheap clones.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backend: Arc<MemoryBackend>,
    pub proxy_cache: Arc<ProxyRuleCache>,
    pub cache_cache: Arc<CacheRuleCache>,
    pub http_client: reqwest::Client,
    pub cipher: Option<HeaderCipher>,
    pub rate_limiter: Arc<FormRateLimiter>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let cipher = if config.serving.encryption_key_base64.is_empty() {
            None
        } else {
            match HeaderCipher::from_base64_key(&config.serving.encryption_key_base64) {
                Ok(cipher) => Some(cipher),
                Err(err) => {
                    tracing::warn!(error = %err, "ENCRYPTION_KEY invalid, header values will be passed through unencrypted");
                    None
                }
            }
        };

        let rate_limiter = FormRateLimiter::new(config.form_rate_limit.clone());

        Self {
            backend: Arc::new(MemoryBackend::new()),
            proxy_cache: Arc::new(ProxyRuleCache::new()),
            cache_cache: Arc::new(CacheRuleCache::new()),
            http_client: reqwest::Client::new(),
            cipher,
            rate_limiter: Arc::new(rate_limiter),
            config: Arc::new(config),
        }
    }
}
