use deadpool_redis::Pool;
use deadpool_redis::redis::{self, AsyncCommands};

use crate::domain::repository::RateLimitStore;
use crate::domain::types::PASSWORD_RESET_BUCKET_PREFIX;
use crate::error::PasswordResetError;

/// Namespace for every rate-limit key this service writes.
const KEY_NAMESPACE: &str = "cms:ratelimit:";

fn bucket_key(key: &str) -> String {
    format!("{KEY_NAMESPACE}{key}")
}

fn password_reset_pattern() -> String {
    format!("{KEY_NAMESPACE}{PASSWORD_RESET_BUCKET_PREFIX}*")
}

fn redis_err(e: redis::RedisError) -> PasswordResetError {
    PasswordResetError::Persistence(anyhow::Error::new(e).context("redis command"))
}

/// Fixed-window counters in Redis. A bucket is `SET NX EX` to zero on the
/// first hit of a window, then `INCR`ed; Redis drops it when the window ends.
#[derive(Clone)]
pub struct RedisRateLimitStore {
    pub pool: Pool,
}

impl RedisRateLimitStore {
    async fn conn(&self) -> Result<deadpool_redis::Connection, PasswordResetError> {
        self.pool
            .get()
            .await
            .map_err(|e| PasswordResetError::Persistence(e.into()))
    }
}

impl RateLimitStore for RedisRateLimitStore {
    async fn hit(&self, key: &str, window_secs: u64) -> Result<u64, PasswordResetError> {
        let mut conn = self.conn().await?;
        let key = bucket_key(key);
        let (count,): (u64,) = redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(&key)
            .arg(0)
            .arg("NX")
            .arg("EX")
            .arg(window_secs)
            .ignore()
            .incr(&key, 1)
            .query_async(&mut conn)
            .await
            .map_err(redis_err)?;
        Ok(count)
    }

    async fn count(&self, key: &str) -> Result<u64, PasswordResetError> {
        let mut conn = self.conn().await?;
        let value: Option<u64> = conn.get(bucket_key(key)).await.map_err(redis_err)?;
        Ok(value.unwrap_or(0))
    }

    async fn reset(&self, key: &str) -> Result<bool, PasswordResetError> {
        let mut conn = self.conn().await?;
        let removed: u64 = conn.del(bucket_key(key)).await.map_err(redis_err)?;
        Ok(removed > 0)
    }

    async fn reset_all(&self) -> Result<u64, PasswordResetError> {
        let mut conn = self.conn().await?;
        // KEYS is O(n) over the keyspace; acceptable for an operator command.
        let keys: Vec<String> = conn
            .keys(password_reset_pattern())
            .await
            .map_err(redis_err)?;
        if keys.is_empty() {
            return Ok(0);
        }
        let removed: u64 = conn.del(keys).await.map_err(redis_err)?;
        Ok(removed)
    }
}
