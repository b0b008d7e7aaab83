use tracing::info;

use crate::domain::repository::RateLimitStore;
use crate::domain::types::password_reset_bucket;
use crate::error::PasswordResetError;
use crate::usecase::forgot_password::normalize_email;

pub struct ClearRateLimitsUseCase<L: RateLimitStore> {
    pub limiter: L,
}

impl<L: RateLimitStore> ClearRateLimitsUseCase<L> {
    /// Reset the bucket of one email, or every password-reset bucket when
    /// `email` is `None`. Returns the number of buckets removed.
    pub async fn execute(&self, email: Option<&str>) -> Result<u64, PasswordResetError> {
        let cleared = match email {
            Some(email) => {
                let email = normalize_email(email);
                u64::from(self.limiter.reset(&password_reset_bucket(&email)).await?)
            }
            None => self.limiter.reset_all().await?,
        };
        info!(cleared, scoped = email.is_some(), "password reset rate limits cleared");
        Ok(cleared)
    }
}
