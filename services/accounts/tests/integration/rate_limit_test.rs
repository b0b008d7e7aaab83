use cms_accounts::domain::repository::RateLimitStore;
use cms_accounts::domain::types::password_reset_bucket;
use cms_accounts::usecase::rate_limit::ClearRateLimitsUseCase;

use crate::helpers::MockRateLimitStore;

async fn seeded() -> MockRateLimitStore {
    let limiter = MockRateLimitStore::default();
    for email in ["grower@example.com", "dispensary@example.com"] {
        limiter.hit(&password_reset_bucket(email), 3600).await.unwrap();
    }
    limiter.hit("login:grower@example.com", 60).await.unwrap();
    limiter
}

#[tokio::test]
async fn should_clear_single_email_bucket() {
    let limiter = seeded().await;
    let uc = ClearRateLimitsUseCase {
        limiter: limiter.clone(),
    };

    let cleared = uc.execute(Some(" Grower@Example.com")).await.unwrap();

    assert_eq!(cleared, 1);
    assert_eq!(
        limiter
            .count(&password_reset_bucket("grower@example.com"))
            .await
            .unwrap(),
        0
    );
    assert_eq!(
        limiter
            .count(&password_reset_bucket("dispensary@example.com"))
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn should_report_zero_when_email_has_no_bucket() {
    let uc = ClearRateLimitsUseCase {
        limiter: seeded().await,
    };

    let cleared = uc.execute(Some("nobody@example.com")).await.unwrap();

    assert_eq!(cleared, 0);
}

#[tokio::test]
async fn should_clear_all_password_reset_buckets_only() {
    let limiter = seeded().await;
    let uc = ClearRateLimitsUseCase {
        limiter: limiter.clone(),
    };

    let cleared = uc.execute(None).await.unwrap();

    assert_eq!(cleared, 2);
    assert_eq!(limiter.count("login:grower@example.com").await.unwrap(), 1);
}
