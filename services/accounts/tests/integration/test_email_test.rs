use cms_accounts::domain::repository::Clock;
use cms_accounts::domain::types::OUTBOX_KIND_TEST_EMAIL;
use cms_accounts::error::PasswordResetError;
use cms_accounts::usecase::test_email::{
    DEFAULT_TEST_SUBJECT, SendTestEmailInput, SendTestEmailUseCase,
};

use crate::helpers::{MockOutboxRepo, TestClock};

fn make_usecase(outbox: MockOutboxRepo) -> SendTestEmailUseCase<MockOutboxRepo, TestClock> {
    SendTestEmailUseCase {
        outbox,
        clock: TestClock::new(),
    }
}

#[tokio::test]
async fn should_queue_test_email_with_default_subject() {
    let outbox = MockOutboxRepo::default();
    let uc = make_usecase(outbox.clone());

    let id = uc
        .execute(SendTestEmailInput {
            to: "Ops@CMS.example".to_owned(),
            subject: None,
        })
        .await
        .unwrap();

    let events = outbox.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.id, id);
    assert_eq!(event.kind, OUTBOX_KIND_TEST_EMAIL);
    assert_eq!(event.recipient, "ops@cms.example");
    assert_eq!(event.payload["subject"], DEFAULT_TEST_SUBJECT);
    assert_eq!(event.idempotency_key, format!("test_email:{id}"));
    assert_eq!(event.created_at, uc.clock.now());
}

#[tokio::test]
async fn should_use_custom_subject() {
    let outbox = MockOutboxRepo::default();
    let uc = make_usecase(outbox.clone());

    uc.execute(SendTestEmailInput {
        to: "ops@cms.example".to_owned(),
        subject: Some("SMTP check".to_owned()),
    })
    .await
    .unwrap();

    assert_eq!(outbox.events.lock().unwrap()[0].payload["subject"], "SMTP check");
}

#[tokio::test]
async fn should_reject_malformed_recipient() {
    let outbox = MockOutboxRepo::default();
    let uc = make_usecase(outbox.clone());

    let result = uc
        .execute(SendTestEmailInput {
            to: "not-an-address".to_owned(),
            subject: None,
        })
        .await;

    assert!(matches!(result, Err(PasswordResetError::InvalidEmail)));
    assert!(outbox.events.lock().unwrap().is_empty());
}
