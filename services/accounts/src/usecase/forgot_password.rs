use tracing::{info, warn};

use crate::domain::repository::{
    Clock, CodeGenerator, RateLimitStore, ResetCodeRepository, UserRepository,
};
use crate::domain::types::{PasswordResetCode, RateLimitPolicy, password_reset_bucket};
use crate::error::PasswordResetError;
use crate::usecase::reset_code::IssueResetCodeUseCase;

pub struct RequestPasswordResetInput {
    pub email: String,
}

/// Lowercased, trimmed form used for lookups and rate-limit buckets.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub struct RequestPasswordResetUseCase<U, L, R, C, G>
where
    U: UserRepository,
    L: RateLimitStore,
    R: ResetCodeRepository,
    C: Clock,
    G: CodeGenerator,
{
    pub users: U,
    pub limiter: L,
    pub rate_limit: RateLimitPolicy,
    pub issue: IssueResetCodeUseCase<R, C, G>,
}

impl<U, L, R, C, G> RequestPasswordResetUseCase<U, L, R, C, G>
where
    U: UserRepository,
    L: RateLimitStore,
    R: ResetCodeRepository,
    C: Clock,
    G: CodeGenerator,
{
    /// Handle a "forgot password" request.
    ///
    /// Returns `Ok(None)` for unknown addresses so the caller can answer the
    /// same way whether or not the account exists.
    pub async fn execute(
        &self,
        input: RequestPasswordResetInput,
    ) -> Result<Option<PasswordResetCode>, PasswordResetError> {
        let email = normalize_email(&input.email);

        // Throttle before the user lookup so unknown addresses are limited too.
        let hits = self
            .limiter
            .hit(&password_reset_bucket(&email), self.rate_limit.window_secs)
            .await?;
        if hits > self.rate_limit.limit {
            warn!(hits, limit = self.rate_limit.limit, "password reset rate limit exceeded");
            return Err(PasswordResetError::RateLimited);
        }

        let Some(user) = self.users.find_by_email(&email).await? else {
            info!("password reset requested for unknown email");
            return Ok(None);
        };

        self.issue.execute(&user).await.map(Some)
    }
}
