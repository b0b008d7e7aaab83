use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::repository::{Clock, CodeGenerator, ResetCodeRepository};
use crate::domain::types::{
    AccountUser, CodeStatus, MAX_CODE_GENERATION_TRIES, OUTBOX_KIND_RESET_CODE_ISSUED,
    OutboxEvent, PasswordResetCode, ResetCodePolicy,
};
use crate::error::PasswordResetError;

/// Payload of the `password_reset_code_issued` outbox event.
#[derive(Serialize)]
struct ResetCodeMail<'a> {
    email: &'a str,
    name: &'a str,
    code: &'a str,
    #[serde(serialize_with = "cms_core::serde::to_rfc3339_ms")]
    expires_at: DateTime<Utc>,
}

// ── IssueResetCode ───────────────────────────────────────────────────────────

pub struct IssueResetCodeUseCase<R, C, G>
where
    R: ResetCodeRepository,
    C: Clock,
    G: CodeGenerator,
{
    pub codes: R,
    pub clock: C,
    pub generator: G,
    pub policy: ResetCodePolicy,
}

impl<R, C, G> IssueResetCodeUseCase<R, C, G>
where
    R: ResetCodeRepository,
    C: Clock,
    G: CodeGenerator,
{
    /// Issue a fresh code for `user`, superseding any code still active, and
    /// queue the email that delivers it.
    pub async fn execute(
        &self,
        user: &AccountUser,
    ) -> Result<PasswordResetCode, PasswordResetError> {
        let now = self.clock.now();

        for _ in 0..MAX_CODE_GENERATION_TRIES {
            let code = PasswordResetCode {
                id: Uuid::new_v4(),
                user_id: user.id,
                code: self.generator.generate(self.policy.code_len),
                created_at: now,
                expires_at: now + self.policy.ttl,
                is_used: false,
                used_at: None,
                attempts: 0,
            };
            let event = issued_event(user, &code)?;

            // `false` means the value collided with an active code; draw again.
            if self.codes.create_superseding(&code, &event).await? {
                info!(
                    user_id = %user.id,
                    code_id = %code.id,
                    expires_at = %code.expires_at,
                    "password reset code issued"
                );
                return Ok(code);
            }
        }
        Err(PasswordResetError::Persistence(anyhow!(
            "no unused reset code after {MAX_CODE_GENERATION_TRIES} tries"
        )))
    }
}

fn issued_event(
    user: &AccountUser,
    code: &PasswordResetCode,
) -> Result<OutboxEvent, PasswordResetError> {
    let payload = serde_json::to_value(ResetCodeMail {
        email: &user.email,
        name: &user.name,
        code: &code.code,
        expires_at: code.expires_at,
    })
    .map_err(|e| PasswordResetError::Persistence(e.into()))?;

    Ok(OutboxEvent {
        id: Uuid::new_v4(),
        kind: OUTBOX_KIND_RESET_CODE_ISSUED.to_owned(),
        recipient: user.email.clone(),
        payload,
        idempotency_key: format!("{OUTBOX_KIND_RESET_CODE_ISSUED}:{}", code.id),
        created_at: code.created_at,
    })
}

// ── ValidateResetCode ────────────────────────────────────────────────────────

pub struct ValidateResetCodeInput {
    pub user_id: Uuid,
    pub code: String,
}

pub struct ValidateResetCodeUseCase<R: ResetCodeRepository, C: Clock> {
    pub codes: R,
    pub clock: C,
    pub policy: ResetCodePolicy,
}

impl<R: ResetCodeRepository, C: Clock> ValidateResetCodeUseCase<R, C> {
    /// Check a submitted code without consuming it.
    pub async fn execute(
        &self,
        input: ValidateResetCodeInput,
    ) -> Result<PasswordResetCode, PasswordResetError> {
        let now = self.clock.now();
        validate_code(&self.codes, now, &self.policy, input.user_id, &input.code).await
    }
}

// ── ConsumeResetCode ─────────────────────────────────────────────────────────

pub struct ConsumeResetCodeUseCase<R: ResetCodeRepository, C: Clock> {
    pub codes: R,
    pub clock: C,
    pub policy: ResetCodePolicy,
}

impl<R: ResetCodeRepository, C: Clock> ConsumeResetCodeUseCase<R, C> {
    /// Mark a validated code used. A second call on the same code fails with
    /// `AlreadyUsed`.
    pub async fn execute(
        &self,
        code: &PasswordResetCode,
    ) -> Result<PasswordResetCode, PasswordResetError> {
        let now = self.clock.now();
        consume_code(&self.codes, now, &self.policy, code).await
    }
}

// ── RedeemResetCode ──────────────────────────────────────────────────────────

pub struct RedeemResetCodeUseCase<R: ResetCodeRepository, C: Clock> {
    pub codes: R,
    pub clock: C,
    pub policy: ResetCodePolicy,
}

impl<R: ResetCodeRepository, C: Clock> RedeemResetCodeUseCase<R, C> {
    /// Validate then consume in one call, for the step that sets the new password.
    pub async fn execute(
        &self,
        input: ValidateResetCodeInput,
    ) -> Result<PasswordResetCode, PasswordResetError> {
        let now = self.clock.now();
        let code =
            validate_code(&self.codes, now, &self.policy, input.user_id, &input.code).await?;
        consume_code(&self.codes, now, &self.policy, &code).await
    }
}

// ── shared steps ─────────────────────────────────────────────────────────────

async fn validate_code<R: ResetCodeRepository>(
    codes: &R,
    now: DateTime<Utc>,
    policy: &ResetCodePolicy,
    user_id: Uuid,
    submitted: &str,
) -> Result<PasswordResetCode, PasswordResetError> {
    let Some(code) = codes.find_by_user_and_code(user_id, submitted).await? else {
        return Err(charge_wrong_guess(codes, now, policy, user_id).await?);
    };

    let failure = match code.status(now, policy.max_attempts) {
        CodeStatus::Active => return Ok(code),
        CodeStatus::Used => PasswordResetError::AlreadyUsed,
        CodeStatus::Expired => PasswordResetError::Expired,
        CodeStatus::Locked => PasswordResetError::TooManyAttempts,
    };
    codes.increment_attempts(code.id).await?;
    warn!(
        %user_id,
        code_id = %code.id,
        attempts = code.attempts + 1,
        kind = failure.kind(),
        "reset code rejected"
    );
    Err(failure)
}

/// A value matching none of the user's codes counts against the user's
/// newest code, so guessing exhausts the same attempt budget. Once the newest
/// code is used there is nothing left to guess at and nothing is charged.
async fn charge_wrong_guess<R: ResetCodeRepository>(
    codes: &R,
    now: DateTime<Utc>,
    policy: &ResetCodePolicy,
    user_id: Uuid,
) -> Result<PasswordResetError, PasswordResetError> {
    let Some(current) = codes.find_latest(user_id).await? else {
        return Ok(PasswordResetError::NotFound);
    };
    let failure = match current.status(now, policy.max_attempts) {
        CodeStatus::Used => return Ok(PasswordResetError::NotFound),
        CodeStatus::Expired => PasswordResetError::Expired,
        CodeStatus::Locked => PasswordResetError::TooManyAttempts,
        CodeStatus::Active => PasswordResetError::NotFound,
    };
    codes.increment_attempts(current.id).await?;

    warn!(
        %user_id,
        code_id = %current.id,
        attempts = current.attempts + 1,
        kind = failure.kind(),
        "wrong reset code submitted"
    );
    Ok(failure)
}

async fn consume_code<R: ResetCodeRepository>(
    codes: &R,
    now: DateTime<Utc>,
    policy: &ResetCodePolicy,
    code: &PasswordResetCode,
) -> Result<PasswordResetCode, PasswordResetError> {
    if codes
        .mark_used_if_valid(code.id, now, policy.max_attempts)
        .await?
    {
        info!(user_id = %code.user_id, code_id = %code.id, "password reset code consumed");
        return Ok(PasswordResetCode {
            is_used: true,
            used_at: Some(now),
            ..code.clone()
        });
    }

    // Lost the conditional update: re-read to report why.
    let current = codes
        .find_by_id(code.id)
        .await?
        .ok_or(PasswordResetError::NotFound)?;
    match current.status(now, policy.max_attempts) {
        CodeStatus::Used => Err(PasswordResetError::AlreadyUsed),
        CodeStatus::Expired => Err(PasswordResetError::Expired),
        CodeStatus::Locked => Err(PasswordResetError::TooManyAttempts),
        CodeStatus::Active => Err(PasswordResetError::Persistence(anyhow!(
            "reset code {} still active after failed consume",
            code.id
        ))),
    }
}
