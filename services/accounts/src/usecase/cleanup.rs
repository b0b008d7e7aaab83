use tracing::info;

use crate::domain::repository::{Clock, ResetCodeRepository};
use crate::domain::types::{CleanupReport, ResetCodePolicy};
use crate::error::PasswordResetError;

pub struct CleanupResetCodesUseCase<R: ResetCodeRepository, C: Clock> {
    pub codes: R,
    pub clock: C,
    pub policy: ResetCodePolicy,
}

impl<R: ResetCodeRepository, C: Clock> CleanupResetCodesUseCase<R, C> {
    /// Delete expired codes and used codes past the retention window.
    ///
    /// With `dry_run` the same partition is counted and nothing is deleted.
    /// A storage error aborts the whole run; nothing is partially removed.
    pub async fn execute(&self, dry_run: bool) -> Result<CleanupReport, PasswordResetError> {
        let now = self.clock.now();
        let used_before = now - self.policy.retention;

        let report = if dry_run {
            self.codes.count_cleanup(now, used_before).await?
        } else {
            self.codes.delete_cleanup(now, used_before).await?
        };

        info!(
            dry_run,
            expired = report.expired,
            old_used = report.old_used,
            total = report.total(),
            "password reset code cleanup finished"
        );
        Ok(report)
    }
}
