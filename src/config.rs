use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::error::MealError;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

/// Settings for the chat-completion service that estimates macros.
#[derive(Debug, Clone)]
pub struct EstimatorConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub retry: RetryPolicy,
}

/// How many times an estimation call is attempted and how long to wait
/// between attempts. `max_attempts == 1` means a single try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_millis(4000),
        }
    }
}

impl RetryPolicy {
    /// Upper bound of the wait before attempt `attempt + 1`, where `attempt`
    /// counts from 1. Doubles per attempt and saturates at `max_delay`.
    pub fn backoff_ceiling(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt: JwtConfig,
    pub estimator: EstimatorConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "meallog".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "authenticated".into()),
        };

        let api_key = std::env::var("ESTIMATOR_API_KEY")
            .or_else(|_| std::env::var("MOONSHOT_API_KEY"))
            .unwrap_or_default();
        let estimator = EstimatorConfig::new(api_key)?.with_overrides(|name| std::env::var(name).ok());

        Ok(Self {
            database_url,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 10),
            jwt,
            estimator,
        })
    }
}

impl EstimatorConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.moonshot.cn/v1";
    pub const DEFAULT_MODEL: &'static str = "moonshot-v1-8k";
    pub const DEFAULT_TEMPERATURE: f32 = 0.1;

    /// Fails with `MissingCredential` when the key is blank, so a
    /// misconfigured process never starts serving.
    pub fn new(api_key: impl Into<String>) -> Result<Self, MealError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(MealError::MissingCredential);
        }
        Ok(Self {
            api_key,
            base_url: Self::DEFAULT_BASE_URL.into(),
            model: Self::DEFAULT_MODEL.into(),
            temperature: Self::DEFAULT_TEMPERATURE,
            retry: RetryPolicy::default(),
        })
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup("ESTIMATOR_BASE_URL") {
            self.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = lookup("ESTIMATOR_MODEL") {
            self.model = model;
        }
        if let Some(t) = lookup("ESTIMATOR_TEMPERATURE").and_then(|v| v.parse::<f32>().ok()) {
            self.temperature = t;
        }
        if let Some(n) = lookup("ESTIMATOR_MAX_ATTEMPTS").and_then(|v| v.parse::<u32>().ok()) {
            self.retry.max_attempts = n.max(1);
        }
        if let Some(ms) = lookup("ESTIMATOR_RETRY_BASE_MS").and_then(|v| v.parse::<u64>().ok()) {
            self.retry.base_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = lookup("ESTIMATOR_RETRY_MAX_MS").and_then(|v| v.parse::<u64>().ok()) {
            self.retry.max_delay = Duration::from_millis(ms);
        }
        self
    }
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
