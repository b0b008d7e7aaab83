use chrono::Duration;
use serde::Deserialize;

use cms_core::config::Config;

use crate::domain::types::{
    RESET_CODE_LEN, RESET_CODE_MAX_ATTEMPTS, RESET_CODE_TTL_SECS, RESET_REQUEST_LIMIT,
    RESET_REQUEST_WINDOW_SECS, RateLimitPolicy, ResetCodePolicy, USED_CODE_RETENTION_DAYS,
};

/// Accounts configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountsConfig {
    /// PostgreSQL connection URL. Env var: `DATABASE_URL`.
    pub database_url: String,
    /// Redis connection URL for rate-limit buckets. Env var: `REDIS_URL`.
    pub redis_url: String,
    /// Digits per reset code (default 6). Env var: `RESET_CODE_LENGTH`.
    #[serde(default = "default_code_length")]
    pub reset_code_length: usize,
    /// Seconds a reset code stays valid (default 900). Env var: `RESET_CODE_TTL_SECS`.
    #[serde(default = "default_code_ttl_secs")]
    pub reset_code_ttl_secs: i64,
    /// Failed validations before lockout (default 5). Env var: `RESET_CODE_MAX_ATTEMPTS`.
    #[serde(default = "default_max_attempts")]
    pub reset_code_max_attempts: i32,
    /// Days a used code is kept (default 7). Env var: `RESET_CODE_RETENTION_DAYS`.
    #[serde(default = "default_retention_days")]
    pub reset_code_retention_days: i64,
    /// Reset requests per email per window (default 5). Env var: `RESET_REQUEST_LIMIT`.
    #[serde(default = "default_request_limit")]
    pub reset_request_limit: u64,
    /// Rate-limit window (default 3600). Env var: `RESET_REQUEST_WINDOW_SECS`.
    #[serde(default = "default_request_window_secs")]
    pub reset_request_window_secs: u64,
}

impl Config for AccountsConfig {}

fn default_code_length() -> usize {
    RESET_CODE_LEN
}

fn default_code_ttl_secs() -> i64 {
    RESET_CODE_TTL_SECS
}

fn default_max_attempts() -> i32 {
    RESET_CODE_MAX_ATTEMPTS
}

fn default_retention_days() -> i64 {
    USED_CODE_RETENTION_DAYS
}

fn default_request_limit() -> u64 {
    RESET_REQUEST_LIMIT
}

fn default_request_window_secs() -> u64 {
    RESET_REQUEST_WINDOW_SECS
}

/// Shortest code accepted from configuration.
pub const MIN_CODE_LEN: usize = 4;

/// A policy knob that parsed but cannot be used.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("RESET_CODE_LENGTH must be at least {MIN_CODE_LEN}, got {0}")]
    CodeTooShort(usize),
    #[error("RESET_CODE_TTL_SECS must be positive, got {0}")]
    NonPositiveTtl(i64),
    #[error("RESET_CODE_MAX_ATTEMPTS must be at least 1, got {0}")]
    NoAttempts(i32),
    #[error("RESET_CODE_RETENTION_DAYS must not be negative, got {0}")]
    NegativeRetention(i64),
    #[error("{name} is out of range: {value}")]
    OutOfRange { name: &'static str, value: i64 },
    #[error("RESET_REQUEST_LIMIT must be at least 1")]
    NoRequests,
    #[error("RESET_REQUEST_WINDOW_SECS must be positive")]
    EmptyWindow,
}

impl AccountsConfig {
    pub fn reset_code_policy(&self) -> Result<ResetCodePolicy, PolicyError> {
        if self.reset_code_length < MIN_CODE_LEN {
            return Err(PolicyError::CodeTooShort(self.reset_code_length));
        }
        if self.reset_code_ttl_secs <= 0 {
            return Err(PolicyError::NonPositiveTtl(self.reset_code_ttl_secs));
        }
        if self.reset_code_max_attempts < 1 {
            return Err(PolicyError::NoAttempts(self.reset_code_max_attempts));
        }
        if self.reset_code_retention_days < 0 {
            return Err(PolicyError::NegativeRetention(self.reset_code_retention_days));
        }

        let ttl =
            Duration::try_seconds(self.reset_code_ttl_secs).ok_or(PolicyError::OutOfRange {
                name: "RESET_CODE_TTL_SECS",
                value: self.reset_code_ttl_secs,
            })?;
        let retention =
            Duration::try_days(self.reset_code_retention_days).ok_or(PolicyError::OutOfRange {
                name: "RESET_CODE_RETENTION_DAYS",
                value: self.reset_code_retention_days,
            })?;

        Ok(ResetCodePolicy {
            code_len: self.reset_code_length,
            ttl,
            max_attempts: self.reset_code_max_attempts,
            retention,
        })
    }

    pub fn rate_limit_policy(&self) -> Result<RateLimitPolicy, PolicyError> {
        if self.reset_request_limit == 0 {
            return Err(PolicyError::NoRequests);
        }
        if self.reset_request_window_secs == 0 {
            return Err(PolicyError::EmptyWindow);
        }
        Ok(RateLimitPolicy {
            limit: self.reset_request_limit,
            window_secs: self.reset_request_window_secs,
        })
    }
}
