use anyhow::Context as _;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    sea_query::Expr,
};
use uuid::Uuid;

use cms_accounts_schema::{outbox_events, password_reset_codes, users};

use crate::domain::repository::{OutboxRepository, ResetCodeRepository, UserRepository};
use crate::domain::types::{
    AccountUser, CleanupReport, OutboxEvent, PasswordResetCode, superseded_expiry,
};
use crate::error::PasswordResetError;

// ── User repository ──────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbUserRepository {
    pub db: DatabaseConnection,
}

impl UserRepository for DbUserRepository {
    async fn find_by_email(
        &self,
        email: &str,
    ) -> Result<Option<AccountUser>, PasswordResetError> {
        let model = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.db)
            .await
            .context("find user by email")?;
        Ok(model.map(user_from_model))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AccountUser>, PasswordResetError> {
        let model = users::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("find user by id")?;
        Ok(model.map(user_from_model))
    }
}

fn user_from_model(model: users::Model) -> AccountUser {
    AccountUser {
        id: model.id,
        email: model.email,
        name: model.name,
    }
}

// ── Reset code repository ────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbResetCodeRepository {
    pub db: DatabaseConnection,
}

impl ResetCodeRepository for DbResetCodeRepository {
    async fn create_superseding(
        &self,
        code: &PasswordResetCode,
        event: &OutboxEvent,
    ) -> Result<bool, PasswordResetError> {
        let created = self
            .db
            .transaction::<_, bool, DbErr>(|txn| {
                let code = code.clone();
                let event = event.clone();
                Box::pin(async move {
                    // Row lock on the user serializes concurrent issues for the
                    // same account, so each supersede sees the previous insert.
                    users::Entity::find_by_id(code.user_id)
                        .lock_exclusive()
                        .one(txn)
                        .await?
                        .ok_or_else(|| {
                            DbErr::RecordNotFound(format!("user {}", code.user_id))
                        })?;
                    if is_code_active(txn, &code.code, code.created_at).await? {
                        return Ok(false);
                    }
                    supersede_active_codes(txn, code.user_id, code.created_at).await?;
                    insert_reset_code(txn, &code).await?;
                    insert_outbox_event(txn, &event).await?;
                    Ok(true)
                })
            })
            .await
            .context("create reset code with outbox")?;
        Ok(created)
    }

    async fn find_by_user_and_code(
        &self,
        user_id: Uuid,
        code: &str,
    ) -> Result<Option<PasswordResetCode>, PasswordResetError> {
        let model = password_reset_codes::Entity::find()
            .filter(password_reset_codes::Column::UserId.eq(user_id))
            .filter(password_reset_codes::Column::Code.eq(code))
            .order_by_desc(password_reset_codes::Column::CreatedAt)
            .one(&self.db)
            .await
            .context("find reset code by user and value")?;
        Ok(model.map(reset_code_from_model))
    }

    async fn find_latest(
        &self,
        user_id: Uuid,
    ) -> Result<Option<PasswordResetCode>, PasswordResetError> {
        let model = password_reset_codes::Entity::find()
            .filter(password_reset_codes::Column::UserId.eq(user_id))
            .order_by_desc(password_reset_codes::Column::CreatedAt)
            .one(&self.db)
            .await
            .context("find latest reset code")?;
        Ok(model.map(reset_code_from_model))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PasswordResetCode>, PasswordResetError> {
        let model = password_reset_codes::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("find reset code by id")?;
        Ok(model.map(reset_code_from_model))
    }

    async fn increment_attempts(&self, id: Uuid) -> Result<(), PasswordResetError> {
        password_reset_codes::Entity::update_many()
            .col_expr(
                password_reset_codes::Column::Attempts,
                Expr::col(password_reset_codes::Column::Attempts).add(1),
            )
            .filter(password_reset_codes::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .context("increment reset code attempts")?;
        Ok(())
    }

    async fn mark_used_if_valid(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        max_attempts: i32,
    ) -> Result<bool, PasswordResetError> {
        // Single UPDATE … WHERE is_used = false: of two racing consumers only
        // one sees rows_affected = 1.
        let result = password_reset_codes::Entity::update_many()
            .col_expr(password_reset_codes::Column::IsUsed, Expr::value(true))
            .col_expr(password_reset_codes::Column::UsedAt, Expr::value(now))
            .filter(password_reset_codes::Column::Id.eq(id))
            .filter(password_reset_codes::Column::IsUsed.eq(false))
            .filter(password_reset_codes::Column::ExpiresAt.gte(now))
            .filter(password_reset_codes::Column::Attempts.lt(max_attempts))
            .exec(&self.db)
            .await
            .context("mark reset code used")?;
        Ok(result.rows_affected == 1)
    }

    async fn count_cleanup(
        &self,
        now: DateTime<Utc>,
        used_before: DateTime<Utc>,
    ) -> Result<CleanupReport, PasswordResetError> {
        let expired = password_reset_codes::Entity::find()
            .filter(password_reset_codes::Column::ExpiresAt.lt(now))
            .count(&self.db)
            .await
            .context("count expired reset codes")?;
        let old_used = password_reset_codes::Entity::find()
            .filter(password_reset_codes::Column::IsUsed.eq(true))
            .filter(password_reset_codes::Column::UsedAt.lt(used_before))
            .filter(password_reset_codes::Column::ExpiresAt.gte(now))
            .count(&self.db)
            .await
            .context("count old used reset codes")?;
        Ok(CleanupReport { expired, old_used })
    }

    async fn delete_cleanup(
        &self,
        now: DateTime<Utc>,
        used_before: DateTime<Utc>,
    ) -> Result<CleanupReport, PasswordResetError> {
        let report = self
            .db
            .transaction::<_, CleanupReport, DbErr>(|txn| {
                Box::pin(async move {
                    let expired = password_reset_codes::Entity::delete_many()
                        .filter(password_reset_codes::Column::ExpiresAt.lt(now))
                        .exec(txn)
                        .await?
                        .rows_affected;
                    // Expired rows are already gone, so this only sees unexpired ones.
                    let old_used = password_reset_codes::Entity::delete_many()
                        .filter(password_reset_codes::Column::IsUsed.eq(true))
                        .filter(password_reset_codes::Column::UsedAt.lt(used_before))
                        .exec(txn)
                        .await?
                        .rows_affected;
                    Ok(CleanupReport { expired, old_used })
                })
            })
            .await
            .context("delete expired and old used reset codes")?;
        Ok(report)
    }
}

async fn is_code_active<C: ConnectionTrait>(
    conn: &C,
    code: &str,
    now: DateTime<Utc>,
) -> Result<bool, DbErr> {
    let count = password_reset_codes::Entity::find()
        .filter(password_reset_codes::Column::Code.eq(code))
        .filter(password_reset_codes::Column::IsUsed.eq(false))
        .filter(password_reset_codes::Column::ExpiresAt.gte(now))
        .count(conn)
        .await?;
    Ok(count > 0)
}

async fn supersede_active_codes<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<(), DbErr> {
    password_reset_codes::Entity::update_many()
        .col_expr(
            password_reset_codes::Column::ExpiresAt,
            Expr::value(superseded_expiry(now)),
        )
        .filter(password_reset_codes::Column::UserId.eq(user_id))
        .filter(password_reset_codes::Column::IsUsed.eq(false))
        .filter(password_reset_codes::Column::ExpiresAt.gte(now))
        .exec(conn)
        .await?;
    Ok(())
}

async fn insert_reset_code<C: ConnectionTrait>(
    conn: &C,
    code: &PasswordResetCode,
) -> Result<(), DbErr> {
    password_reset_codes::ActiveModel {
        id: Set(code.id),
        user_id: Set(code.user_id),
        code: Set(code.code.clone()),
        created_at: Set(code.created_at),
        expires_at: Set(code.expires_at),
        is_used: Set(code.is_used),
        used_at: Set(code.used_at),
        attempts: Set(code.attempts),
    }
    .insert(conn)
    .await?;
    Ok(())
}

fn reset_code_from_model(model: password_reset_codes::Model) -> PasswordResetCode {
    PasswordResetCode {
        id: model.id,
        user_id: model.user_id,
        code: model.code,
        created_at: model.created_at,
        expires_at: model.expires_at,
        is_used: model.is_used,
        used_at: model.used_at,
        attempts: model.attempts,
    }
}

// ── Outbox repository ────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbOutboxRepository {
    pub db: DatabaseConnection,
}

impl OutboxRepository for DbOutboxRepository {
    async fn enqueue(&self, event: &OutboxEvent) -> Result<(), PasswordResetError> {
        insert_outbox_event(&self.db, event)
            .await
            .context("enqueue outbox event")?;
        Ok(())
    }
}

async fn insert_outbox_event<C: ConnectionTrait>(
    conn: &C,
    event: &OutboxEvent,
) -> Result<(), DbErr> {
    outbox_events::ActiveModel {
        id: Set(event.id),
        kind: Set(event.kind.clone()),
        recipient: Set(event.recipient.clone()),
        payload: Set(event.payload.clone()),
        idempotency_key: Set(event.idempotency_key.clone()),
        attempts: Set(0),
        last_error: Set(None),
        created_at: Set(event.created_at),
        next_attempt_at: Set(event.created_at),
        processed_at: Set(None),
        failed_at: Set(None),
    }
    .insert(conn)
    .await?;
    Ok(())
}
