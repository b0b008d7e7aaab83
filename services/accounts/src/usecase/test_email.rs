use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::domain::repository::{Clock, OutboxRepository};
use crate::domain::types::{OUTBOX_KIND_TEST_EMAIL, OutboxEvent};
use crate::error::PasswordResetError;
use crate::usecase::forgot_password::normalize_email;

pub const DEFAULT_TEST_SUBJECT: &str = "CMS test email";

pub struct SendTestEmailInput {
    pub to: String,
    pub subject: Option<String>,
}

pub struct SendTestEmailUseCase<O: OutboxRepository, C: Clock> {
    pub outbox: O,
    pub clock: C,
}

impl<O: OutboxRepository, C: Clock> SendTestEmailUseCase<O, C> {
    /// Queue a test message through the same outbox the reset emails use.
    /// Returns the outbox event id so the operator can trace delivery.
    pub async fn execute(&self, input: SendTestEmailInput) -> Result<Uuid, PasswordResetError> {
        let to = normalize_email(&input.to);
        if !looks_like_email(&to) {
            return Err(PasswordResetError::InvalidEmail);
        }

        let subject = input
            .subject
            .unwrap_or_else(|| DEFAULT_TEST_SUBJECT.to_owned());
        let sent_at = self.clock.now();
        let id = Uuid::new_v4();
        let event = OutboxEvent {
            id,
            kind: OUTBOX_KIND_TEST_EMAIL.to_owned(),
            recipient: to.clone(),
            payload: json!({
                "email": to,
                "subject": subject,
                "body": format!("This is a test email sent at {}.", sent_at.to_rfc3339()),
            }),
            idempotency_key: format!("{OUTBOX_KIND_TEST_EMAIL}:{id}"),
            created_at: sent_at,
        };

        self.outbox.enqueue(&event).await?;
        info!(event_id = %id, "test email queued");
        Ok(id)
    }
}

/// One `@` with a non-empty local part and a dotted domain.
fn looks_like_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}
