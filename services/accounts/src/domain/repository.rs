#![allow(async_fn_in_trait)]

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::types::{AccountUser, CleanupReport, OutboxEvent, PasswordResetCode};
use crate::error::PasswordResetError;

/// Port for looking up accounts.
pub trait UserRepository: Send + Sync {
    async fn find_by_email(
        &self,
        email: &str,
    ) -> Result<Option<AccountUser>, PasswordResetError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<AccountUser>, PasswordResetError>;
}

/// Repository for password-reset codes.
///
/// Every state change is a single conditional statement (or one transaction)
/// so concurrent requests cannot double-consume a code or lose an attempt.
pub trait ResetCodeRepository: Send + Sync {
    /// In one transaction, serialized per user: expire the user's other active
    /// codes (see `superseded_expiry`), insert `code`, and enqueue `event`.
    ///
    /// Returns `false` and writes nothing when an unused, unexpired record
    /// already holds the same value.
    async fn create_superseding(
        &self,
        code: &PasswordResetCode,
        event: &OutboxEvent,
    ) -> Result<bool, PasswordResetError>;

    /// Most recent record of `user_id` whose value equals `code`, in any state.
    async fn find_by_user_and_code(
        &self,
        user_id: Uuid,
        code: &str,
    ) -> Result<Option<PasswordResetCode>, PasswordResetError>;

    /// Most recent record of `user_id`, in any state.
    async fn find_latest(
        &self,
        user_id: Uuid,
    ) -> Result<Option<PasswordResetCode>, PasswordResetError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PasswordResetCode>, PasswordResetError>;

    /// `attempts = attempts + 1`, evaluated by the store.
    async fn increment_attempts(&self, id: Uuid) -> Result<(), PasswordResetError>;

    /// Flip `is_used` false → true and set `used_at = now`, only if the code is
    /// still valid at `now`. Returns `true` when this call performed the flip.
    async fn mark_used_if_valid(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        max_attempts: i32,
    ) -> Result<bool, PasswordResetError>;

    /// Count what `delete_cleanup` would remove.
    async fn count_cleanup(
        &self,
        now: DateTime<Utc>,
        used_before: DateTime<Utc>,
    ) -> Result<CleanupReport, PasswordResetError>;

    /// Delete codes expired at `now` and used codes with `used_at < used_before`,
    /// in one transaction.
    async fn delete_cleanup(
        &self,
        now: DateTime<Utc>,
        used_before: DateTime<Utc>,
    ) -> Result<CleanupReport, PasswordResetError>;
}

/// Outbox for emails handed to the external mail worker.
pub trait OutboxRepository: Send + Sync {
    async fn enqueue(&self, event: &OutboxEvent) -> Result<(), PasswordResetError>;
}

/// Counter buckets with a TTL, used to throttle reset requests.
pub trait RateLimitStore: Send + Sync {
    /// Increment `key`, starting a `window_secs` window on the first hit.
    /// Returns the count including this hit.
    async fn hit(&self, key: &str, window_secs: u64) -> Result<u64, PasswordResetError>;

    /// Current count in `key`'s window (0 when absent or expired).
    async fn count(&self, key: &str) -> Result<u64, PasswordResetError>;

    /// Drop one bucket. Returns `true` if it existed.
    async fn reset(&self, key: &str) -> Result<bool, PasswordResetError>;

    /// Drop every password-reset bucket. Returns how many were removed.
    async fn reset_all(&self) -> Result<u64, PasswordResetError>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Source of unguessable code values.
pub trait CodeGenerator: Send + Sync {
    fn generate(&self, len: usize) -> String;
}
