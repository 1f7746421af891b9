//! Per-client admission control using token buckets.
//!
//! One bucket exists per (area, client) pair and is created on first use.
//! Buckets live for the lifetime of the process; nothing evicts idle clients.
//! Clients are keyed by their raw address string, so addresses from the same
//! IPv6 prefix do not share a bucket.

/// Token bucket accounting.
pub mod bucket;

pub use bucket::TokenBucket;

use crate::error::AppError;
use dashmap::DashMap;
use serde::Deserialize;
use std::fmt;
use std::time::Instant;

/// Functional area a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Area {
    Read,
    Create,
    Delete,
}

impl Area {
    /// Lowercase name used in configuration and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bucket parameters for one area.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RateLimitSettings {
    /// Maximum burst, in tokens.
    pub capacity: u32,
    /// Tokens taken per request.
    pub consume: u32,
    /// Tokens regained per second.
    pub refill: f64,
}

impl RateLimitSettings {
    pub const fn new(capacity: u32, consume: u32, refill: f64) -> Self {
        Self {
            capacity,
            consume,
            refill,
        }
    }
}

/// Bucket parameters for every area.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub read: RateLimitSettings,
    pub create: RateLimitSettings,
    pub delete: RateLimitSettings,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            read: RateLimitSettings::new(100, 1, 2.0),
            create: RateLimitSettings::new(2, 2, 1.0),
            delete: RateLimitSettings::new(2, 2, 1.0),
        }
    }
}

impl RateLimitConfig {
    /// Settings for `area`.
    pub fn settings(&self, area: Area) -> RateLimitSettings {
        match area {
            Area::Read => self.read,
            Area::Create => self.create,
            Area::Delete => self.delete,
        }
    }

    /// Reject settings that can never admit a request or never refill.
    ///
    /// # Errors
    /// Returns [`AppError::Config`] naming the offending area.
    pub fn validate(&self) -> Result<(), AppError> {
        for area in [Area::Read, Area::Create, Area::Delete] {
            let settings = self.settings(area);
            if settings.consume > settings.capacity {
                return Err(AppError::Config(format!(
                    "ratelimit.{}: consume ({}) exceeds capacity ({})",
                    area, settings.consume, settings.capacity
                )));
            }
            if !(settings.refill.is_finite() && settings.refill > 0.0) {
                return Err(AppError::Config(format!(
                    "ratelimit.{}: refill must be a positive number",
                    area
                )));
            }
        }
        Ok(())
    }
}

/// Process-wide bucket map keyed by (area, client).
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: DashMap<(Area, String), TokenBucket>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: DashMap::new(),
        }
    }

    /// Decide whether `client` must be turned away from `area` right now.
    ///
    /// # Returns
    /// `true` when the request should be rejected.
    pub fn should_limit(&self, client: &str, area: Area) -> bool {
        self.should_limit_at(client, area, Instant::now())
    }

    /// [`RateLimiter::should_limit`] against an explicit clock reading.
    pub fn should_limit_at(&self, client: &str, area: Area, now: Instant) -> bool {
        let settings = self.config.settings(area);
        let admitted = self
            .buckets
            .entry((area, client.to_string()))
            .or_insert_with(|| TokenBucket::full(settings.capacity, now))
            .try_consume(settings.capacity, settings.consume, settings.refill, now);

        if !admitted {
            tracing::warn!("{} hit rate limit for {}", client, area);
        }
        !admitted
    }

    /// Fail with [`AppError::RateLimited`] when `client` is over its budget.
    ///
    /// # Errors
    /// Returns [`AppError::RateLimited`] for `area`.
    pub fn check(&self, client: &str, area: Area) -> Result<(), AppError> {
        if self.should_limit(client, area) {
            return Err(AppError::RateLimited { area });
        }
        Ok(())
    }

    /// Tokens `client` currently holds in `area`, if it has a bucket.
    pub fn tokens_at(&self, client: &str, area: Area, now: Instant) -> Option<f64> {
        let settings = self.config.settings(area);
        self.buckets
            .get(&(area, client.to_string()))
            .map(|bucket| bucket.available(settings.capacity, settings.refill, now))
    }

    /// Number of buckets created so far.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}
