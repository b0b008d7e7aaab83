use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Account data the reset flow needs: identity plus where to send the code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

/// One-time code authorizing a password change without the old password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordResetCode {
    pub id: Uuid,
    pub user_id: Uuid,
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
    pub used_at: Option<DateTime<Utc>>,
    /// Failed validations charged to this code. Never decremented.
    pub attempts: i32,
}

/// Lifecycle state of a reset code. Derived from the stored columns at query
/// time; only `Active` codes can be consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeStatus {
    Active,
    Used,
    Expired,
    Locked,
}

impl PasswordResetCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_locked(&self, max_attempts: i32) -> bool {
        self.attempts >= max_attempts
    }

    /// Used wins over Expired, which wins over Locked.
    pub fn status(&self, now: DateTime<Utc>, max_attempts: i32) -> CodeStatus {
        if self.is_used {
            CodeStatus::Used
        } else if self.is_expired(now) {
            CodeStatus::Expired
        } else if self.is_locked(max_attempts) {
            CodeStatus::Locked
        } else {
            CodeStatus::Active
        }
    }

    pub fn is_valid(&self, now: DateTime<Utc>, max_attempts: i32) -> bool {
        self.status(now, max_attempts) == CodeStatus::Active
    }
}

/// Expiry assigned to a code that a newer issuance replaces. Strictly in the
/// past so the old code fails validation even within the same instant.
pub fn superseded_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::seconds(1)
}

/// Tunables for code issuance, validation, and cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetCodePolicy {
    pub code_len: usize,
    pub ttl: Duration,
    pub max_attempts: i32,
    /// How long a consumed code is kept for audit before cleanup removes it.
    pub retention: Duration,
}

impl Default for ResetCodePolicy {
    fn default() -> Self {
        Self {
            code_len: RESET_CODE_LEN,
            ttl: Duration::seconds(RESET_CODE_TTL_SECS),
            max_attempts: RESET_CODE_MAX_ATTEMPTS,
            retention: Duration::days(USED_CODE_RETENTION_DAYS),
        }
    }
}

/// Fixed-window limit on reset requests per email address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub limit: u64,
    pub window_secs: u64,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            limit: RESET_REQUEST_LIMIT,
            window_secs: RESET_REQUEST_WINDOW_SECS,
        }
    }
}

/// Rows removed (or, in a dry run, removable) by reset-code cleanup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Past `expires_at`, used or not.
    pub expired: u64,
    /// Used before the retention cutoff and not already counted in `expired`.
    pub old_used: u64,
}

impl CleanupReport {
    pub fn total(&self) -> u64 {
        self.expired + self.old_used
    }
}

/// Outbox event for async delivery by the mail worker.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxEvent {
    pub id: Uuid,
    pub kind: String,
    pub recipient: String,
    pub payload: serde_json::Value,
    pub idempotency_key: String,
    /// Instant of the state change that queued the event.
    pub created_at: DateTime<Utc>,
}

pub const OUTBOX_KIND_RESET_CODE_ISSUED: &str = "password_reset_code_issued";
pub const OUTBOX_KIND_TEST_EMAIL: &str = "test_email";

/// Rate-limit bucket prefix for password-reset requests.
pub const PASSWORD_RESET_BUCKET_PREFIX: &str = "password_reset:";

/// Rate-limit bucket for reset requests against one (normalized) email.
pub fn password_reset_bucket(email: &str) -> String {
    format!("{PASSWORD_RESET_BUCKET_PREFIX}{email}")
}

/// Reset code length in digits.
pub const RESET_CODE_LEN: usize = 6;

/// Reset code time-to-live in seconds.
pub const RESET_CODE_TTL_SECS: i64 = 15 * 60;

/// Failed validations after which a code is locked.
pub const RESET_CODE_MAX_ATTEMPTS: i32 = 5;

/// Days a used code is retained before cleanup.
pub const USED_CODE_RETENTION_DAYS: i64 = 7;

/// Reset requests allowed per email per window.
pub const RESET_REQUEST_LIMIT: u64 = 5;

/// Rate-limit window in seconds.
pub const RESET_REQUEST_WINDOW_SECS: u64 = 3600;

/// Regenerations tried when a fresh code collides with an active one.
pub const MAX_CODE_GENERATION_TRIES: usize = 5;
