//! Form-Handler submission rate limiting (Component I)
//!
//! Ten successful submissions per source IP per rolling hour, backed by
//! Redis `INCR`/`EXPIRE` the same way the lineage's original per-client
//! limiter did it, just keyed on IP instead of a JWT subject.

#[cfg(feature = "cache")]
use deadpool_redis::Pool as RedisPool;
#[cfg(feature = "cache")]
use std::ops::DerefMut;

use crate::config::FormRateLimitConfig;
use crate::error::Error;

/// Form submission rate limiter state, one instance shared across requests
#[derive(Clone)]
pub struct FormRateLimiter {
    config: FormRateLimitConfig,
    #[cfg(feature = "cache")]
    redis_pool: Option<RedisPool>,
}

impl FormRateLimiter {
    #[cfg(feature = "cache")]
    pub fn new(config: FormRateLimitConfig, redis_pool: RedisPool) -> Self {
        Self {
            config,
            redis_pool: Some(redis_pool),
        }
    }

    #[cfg(not(feature = "cache"))]
    pub fn new(config: FormRateLimitConfig) -> Self {
        Self { config }
    }

    /// Check and record a submission attempt for `source_ip`, counting only
    /// on success (a form submission that fails validation
    /// before rate-limit accounting is not counted).
    ///
    /// Returns `Ok(())` if the submission is allowed, `Err(Error::Conflict)`
    /// with a 429-mapped message if the rolling-hour budget is exhausted.
    #[cfg(feature = "cache")]
    pub async fn check_and_record(&self, source_ip: &str) -> Result<(), Error> {
        let redis_pool = self
            .redis_pool
            .as_ref()
            .ok_or_else(|| Error::Internal("redis pool not configured for form rate limiter".to_string()))?;

        let mut conn = redis_pool.get().await.map_err(|e| {
            let redis_err = redis::RedisError::from((
                redis::ErrorKind::IoError,
                "failed to get redis connection",
                e.to_string(),
            ));
            Error::Redis(Box::new(redis_err))
        })?;

        let key = format!("formrate:{}", source_ip);

        let count: u32 = redis::cmd("INCR")
            .arg(&key)
            .query_async(conn.deref_mut())
            .await
            .map_err(|e| Error::Redis(Box::new(e)))?;

        if count == 1 {
            let _: () = redis::cmd("EXPIRE")
                .arg(&key)
                .arg(self.config.window_secs as i64)
                .query_async(conn.deref_mut())
                .await
                .map_err(|e| Error::Redis(Box::new(e)))?;
        }

        if count > self.config.submissions_per_window {
            tracing::warn!(
                source_ip,
                count,
                limit = self.config.submissions_per_window,
                "form submission rate limit exceeded"
            );
            return Err(Error::Conflict(format!(
                "rate limit exceeded: {} submissions per {}s",
                self.config.submissions_per_window, self.config.window_secs
            )));
        }

        Ok(())
    }

    #[cfg(not(feature = "cache"))]
    pub async fn check_and_record(&self, _source_ip: &str) -> Result<(), Error> {
        Ok(())
    }
}
