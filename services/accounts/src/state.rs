use anyhow::Context as _;
use deadpool_redis::Pool as RedisPool;
use sea_orm::{Database, DatabaseConnection};

use crate::config::AccountsConfig;
use crate::domain::types::{RateLimitPolicy, ResetCodePolicy};
use crate::infra::cache::RedisRateLimitStore;
use crate::infra::db::{DbOutboxRepository, DbResetCodeRepository, DbUserRepository};
use crate::infra::system::{RandomCodeGenerator, SystemClock};
use crate::usecase::cleanup::CleanupResetCodesUseCase;
use crate::usecase::forgot_password::RequestPasswordResetUseCase;
use crate::usecase::rate_limit::ClearRateLimitsUseCase;
use crate::usecase::reset_code::{
    ConsumeResetCodeUseCase, IssueResetCodeUseCase, RedeemResetCodeUseCase,
    ValidateResetCodeUseCase,
};
use crate::usecase::test_email::SendTestEmailUseCase;

/// Connections and policies shared by every entry point.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub redis: RedisPool,
    pub reset_code_policy: ResetCodePolicy,
    pub rate_limit_policy: RateLimitPolicy,
}

impl AppState {
    pub async fn connect(config: &AccountsConfig) -> anyhow::Result<Self> {
        let db = Database::connect(&config.database_url)
            .await
            .context("connect to database")?;
        let redis = deadpool_redis::Config::from_url(&config.redis_url)
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .context("create Redis pool")?;
        Ok(Self {
            db,
            redis,
            reset_code_policy: config.reset_code_policy().context("reset code policy")?,
            rate_limit_policy: config.rate_limit_policy().context("rate limit policy")?,
        })
    }

    pub fn user_repo(&self) -> DbUserRepository {
        DbUserRepository {
            db: self.db.clone(),
        }
    }

    pub fn reset_code_repo(&self) -> DbResetCodeRepository {
        DbResetCodeRepository {
            db: self.db.clone(),
        }
    }

    pub fn outbox_repo(&self) -> DbOutboxRepository {
        DbOutboxRepository {
            db: self.db.clone(),
        }
    }

    pub fn rate_limiter(&self) -> RedisRateLimitStore {
        RedisRateLimitStore {
            pool: self.redis.clone(),
        }
    }

    pub fn issue_reset_code(
        &self,
    ) -> IssueResetCodeUseCase<DbResetCodeRepository, SystemClock, RandomCodeGenerator> {
        IssueResetCodeUseCase {
            codes: self.reset_code_repo(),
            clock: SystemClock,
            generator: RandomCodeGenerator,
            policy: self.reset_code_policy,
        }
    }

    pub fn request_password_reset(
        &self,
    ) -> RequestPasswordResetUseCase<
        DbUserRepository,
        RedisRateLimitStore,
        DbResetCodeRepository,
        SystemClock,
        RandomCodeGenerator,
    > {
        RequestPasswordResetUseCase {
            users: self.user_repo(),
            limiter: self.rate_limiter(),
            rate_limit: self.rate_limit_policy,
            issue: self.issue_reset_code(),
        }
    }

    pub fn validate_reset_code(
        &self,
    ) -> ValidateResetCodeUseCase<DbResetCodeRepository, SystemClock> {
        ValidateResetCodeUseCase {
            codes: self.reset_code_repo(),
            clock: SystemClock,
            policy: self.reset_code_policy,
        }
    }

    pub fn consume_reset_code(
        &self,
    ) -> ConsumeResetCodeUseCase<DbResetCodeRepository, SystemClock> {
        ConsumeResetCodeUseCase {
            codes: self.reset_code_repo(),
            clock: SystemClock,
            policy: self.reset_code_policy,
        }
    }

    pub fn redeem_reset_code(&self) -> RedeemResetCodeUseCase<DbResetCodeRepository, SystemClock> {
        RedeemResetCodeUseCase {
            codes: self.reset_code_repo(),
            clock: SystemClock,
            policy: self.reset_code_policy,
        }
    }

    pub fn cleanup_reset_codes(
        &self,
    ) -> CleanupResetCodesUseCase<DbResetCodeRepository, SystemClock> {
        CleanupResetCodesUseCase {
            codes: self.reset_code_repo(),
            clock: SystemClock,
            policy: self.reset_code_policy,
        }
    }

    pub fn clear_rate_limits(&self) -> ClearRateLimitsUseCase<RedisRateLimitStore> {
        ClearRateLimitsUseCase {
            limiter: self.rate_limiter(),
        }
    }

    pub fn send_test_email(&self) -> SendTestEmailUseCase<DbOutboxRepository, SystemClock> {
        SendTestEmailUseCase {
            outbox: self.outbox_repo(),
            clock: SystemClock,
        }
    }
}
