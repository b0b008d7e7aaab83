use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use cms_accounts::domain::repository::{
    Clock, CodeGenerator, OutboxRepository, RateLimitStore, ResetCodeRepository, UserRepository,
};
use cms_accounts::domain::types::{
    AccountUser, CleanupReport, OutboxEvent, PASSWORD_RESET_BUCKET_PREFIX, PasswordResetCode,
    ResetCodePolicy, superseded_expiry,
};
use cms_accounts::error::PasswordResetError;
use cms_accounts::usecase::cleanup::CleanupResetCodesUseCase;
use cms_accounts::usecase::reset_code::{
    ConsumeResetCodeUseCase, IssueResetCodeUseCase, RedeemResetCodeUseCase,
    ValidateResetCodeUseCase,
};

fn storage_down() -> PasswordResetError {
    PasswordResetError::Persistence(anyhow::anyhow!("storage unavailable"))
}

// ── TestClock ────────────────────────────────────────────────────────────────

/// Clock that only moves when told to. Clones share the same instant.
#[derive(Clone)]
pub struct TestClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(
                Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            )),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// ── SequenceGenerator ────────────────────────────────────────────────────────

/// Hands out scripted codes in order, then falls back to a counter.
#[derive(Clone)]
pub struct SequenceGenerator {
    scripted: Arc<Mutex<Vec<String>>>,
    counter: Arc<Mutex<u32>>,
}

impl SequenceGenerator {
    pub fn new() -> Self {
        Self::scripted(&[])
    }

    pub fn scripted(codes: &[&str]) -> Self {
        let mut scripted: Vec<String> = codes.iter().map(|c| (*c).to_owned()).collect();
        scripted.reverse();
        Self {
            scripted: Arc::new(Mutex::new(scripted)),
            counter: Arc::new(Mutex::new(100_000)),
        }
    }
}

impl CodeGenerator for SequenceGenerator {
    fn generate(&self, len: usize) -> String {
        if let Some(code) = self.scripted.lock().unwrap().pop() {
            return code;
        }
        let mut counter = self.counter.lock().unwrap();
        *counter += 1;
        format!("{:0>len$}", *counter % 1_000_000)
    }
}

// ── MockUserRepo ─────────────────────────────────────────────────────────────

pub struct MockUserRepo {
    pub users: Vec<AccountUser>,
}

impl MockUserRepo {
    pub fn new(users: Vec<AccountUser>) -> Self {
        Self { users }
    }

    pub fn empty() -> Self {
        Self { users: vec![] }
    }
}

impl UserRepository for MockUserRepo {
    async fn find_by_email(
        &self,
        email: &str,
    ) -> Result<Option<AccountUser>, PasswordResetError> {
        Ok(self.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AccountUser>, PasswordResetError> {
        Ok(self.users.iter().find(|u| u.id == id).cloned())
    }
}

// ── MockResetCodeRepo ────────────────────────────────────────────────────────

/// In-memory store with the same conditional-update semantics as the SQL
/// adapter. Clones share state, so tests can inspect rows after execution.
#[derive(Clone)]
pub struct MockResetCodeRepo {
    pub codes: Arc<Mutex<Vec<PasswordResetCode>>>,
    pub outbox: Arc<Mutex<Vec<OutboxEvent>>>,
    pub fail: Arc<Mutex<bool>>,
}

impl MockResetCodeRepo {
    pub fn new(codes: Vec<PasswordResetCode>) -> Self {
        Self {
            codes: Arc::new(Mutex::new(codes)),
            outbox: Arc::new(Mutex::new(vec![])),
            fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn empty() -> Self {
        Self::new(vec![])
    }

    /// Make every subsequent call fail with a persistence error.
    pub fn break_storage(&self) {
        *self.fail.lock().unwrap() = true;
    }

    pub fn get(&self, id: Uuid) -> Option<PasswordResetCode> {
        self.codes.lock().unwrap().iter().find(|c| c.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.codes.lock().unwrap().len()
    }

    fn check(&self) -> Result<(), PasswordResetError> {
        if *self.fail.lock().unwrap() {
            return Err(storage_down());
        }
        Ok(())
    }
}

fn is_cleanup_expired(c: &PasswordResetCode, now: DateTime<Utc>) -> bool {
    c.expires_at < now
}

fn is_cleanup_old_used(c: &PasswordResetCode, used_before: DateTime<Utc>) -> bool {
    c.is_used && c.used_at.is_some_and(|at| at < used_before)
}

impl ResetCodeRepository for MockResetCodeRepo {
    async fn create_superseding(
        &self,
        code: &PasswordResetCode,
        event: &OutboxEvent,
    ) -> Result<bool, PasswordResetError> {
        self.check()?;
        let mut codes = self.codes.lock().unwrap();
        let now = code.created_at;
        if codes
            .iter()
            .any(|c| c.code == code.code && !c.is_used && c.expires_at >= now)
        {
            return Ok(false);
        }
        for c in codes
            .iter_mut()
            .filter(|c| c.user_id == code.user_id && !c.is_used && c.expires_at >= now)
        {
            c.expires_at = superseded_expiry(now);
        }
        codes.push(code.clone());
        self.outbox.lock().unwrap().push(event.clone());
        Ok(true)
    }

    async fn find_by_user_and_code(
        &self,
        user_id: Uuid,
        code: &str,
    ) -> Result<Option<PasswordResetCode>, PasswordResetError> {
        self.check()?;
        Ok(self
            .codes
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.user_id == user_id && c.code == code)
            .max_by_key(|c| c.created_at)
            .cloned())
    }

    async fn find_latest(
        &self,
        user_id: Uuid,
    ) -> Result<Option<PasswordResetCode>, PasswordResetError> {
        self.check()?;
        Ok(self
            .codes
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.user_id == user_id)
            .max_by_key(|c| c.created_at)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PasswordResetCode>, PasswordResetError> {
        self.check()?;
        Ok(self.get(id))
    }

    async fn increment_attempts(&self, id: Uuid) -> Result<(), PasswordResetError> {
        self.check()?;
        if let Some(c) = self.codes.lock().unwrap().iter_mut().find(|c| c.id == id) {
            c.attempts += 1;
        }
        Ok(())
    }

    async fn mark_used_if_valid(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        max_attempts: i32,
    ) -> Result<bool, PasswordResetError> {
        self.check()?;
        let mut codes = self.codes.lock().unwrap();
        match codes.iter_mut().find(|c| c.id == id) {
            Some(c) if !c.is_used && c.expires_at >= now && c.attempts < max_attempts => {
                c.is_used = true;
                c.used_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn count_cleanup(
        &self,
        now: DateTime<Utc>,
        used_before: DateTime<Utc>,
    ) -> Result<CleanupReport, PasswordResetError> {
        self.check()?;
        let codes = self.codes.lock().unwrap();
        let expired = codes.iter().filter(|c| is_cleanup_expired(c, now)).count() as u64;
        let old_used = codes
            .iter()
            .filter(|c| !is_cleanup_expired(c, now) && is_cleanup_old_used(c, used_before))
            .count() as u64;
        Ok(CleanupReport { expired, old_used })
    }

    async fn delete_cleanup(
        &self,
        now: DateTime<Utc>,
        used_before: DateTime<Utc>,
    ) -> Result<CleanupReport, PasswordResetError> {
        self.check()?;
        let mut codes = self.codes.lock().unwrap();
        let before = codes.len();
        codes.retain(|c| !is_cleanup_expired(c, now));
        let expired = (before - codes.len()) as u64;
        let before = codes.len();
        codes.retain(|c| !is_cleanup_old_used(c, used_before));
        let old_used = (before - codes.len()) as u64;
        Ok(CleanupReport { expired, old_used })
    }
}

// ── MockOutboxRepo ───────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockOutboxRepo {
    pub events: Arc<Mutex<Vec<OutboxEvent>>>,
}

impl OutboxRepository for MockOutboxRepo {
    async fn enqueue(&self, event: &OutboxEvent) -> Result<(), PasswordResetError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

// ── MockRateLimitStore ───────────────────────────────────────────────────────

/// Buckets keyed by name; windows never lapse on their own in tests.
#[derive(Clone, Default)]
pub struct MockRateLimitStore {
    pub buckets: Arc<Mutex<HashMap<String, u64>>>,
}

impl RateLimitStore for MockRateLimitStore {
    async fn hit(&self, key: &str, _window_secs: u64) -> Result<u64, PasswordResetError> {
        let mut buckets = self.buckets.lock().unwrap();
        let count = buckets.entry(key.to_owned()).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn count(&self, key: &str) -> Result<u64, PasswordResetError> {
        Ok(self.buckets.lock().unwrap().get(key).copied().unwrap_or(0))
    }

    async fn reset(&self, key: &str) -> Result<bool, PasswordResetError> {
        Ok(self.buckets.lock().unwrap().remove(key).is_some())
    }

    async fn reset_all(&self) -> Result<u64, PasswordResetError> {
        let mut buckets = self.buckets.lock().unwrap();
        let before = buckets.len();
        buckets.retain(|k, _| !k.starts_with(PASSWORD_RESET_BUCKET_PREFIX));
        Ok((before - buckets.len()) as u64)
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

pub fn test_user() -> AccountUser {
    AccountUser {
        id: Uuid::parse_str("00000000-0000-0000-0000-000000000001").unwrap(),
        email: "grower@example.com".to_owned(),
        name: "Test Grower".to_owned(),
    }
}

pub fn other_user() -> AccountUser {
    AccountUser {
        id: Uuid::parse_str("00000000-0000-0000-0000-000000000002").unwrap(),
        email: "dispensary@example.com".to_owned(),
        name: "Other User".to_owned(),
    }
}

/// Fresh, unused code created at `now` with the default TTL.
pub fn test_reset_code(user_id: Uuid, code: &str, now: DateTime<Utc>) -> PasswordResetCode {
    PasswordResetCode {
        id: Uuid::new_v4(),
        user_id,
        code: code.to_owned(),
        created_at: now,
        expires_at: now + ResetCodePolicy::default().ttl,
        is_used: false,
        used_at: None,
        attempts: 0,
    }
}

/// Manager use cases wired to one shared repo and clock.
pub struct Manager {
    pub repo: MockResetCodeRepo,
    pub clock: TestClock,
    pub issue: IssueResetCodeUseCase<MockResetCodeRepo, TestClock, SequenceGenerator>,
    pub validate: ValidateResetCodeUseCase<MockResetCodeRepo, TestClock>,
    pub consume: ConsumeResetCodeUseCase<MockResetCodeRepo, TestClock>,
    pub redeem: RedeemResetCodeUseCase<MockResetCodeRepo, TestClock>,
    pub cleanup: CleanupResetCodesUseCase<MockResetCodeRepo, TestClock>,
}

impl Manager {
    pub fn new(repo: MockResetCodeRepo, generator: SequenceGenerator) -> Self {
        Self::with_clock(repo, generator, TestClock::new())
    }

    pub fn with_clock(
        repo: MockResetCodeRepo,
        generator: SequenceGenerator,
        clock: TestClock,
    ) -> Self {
        let policy = ResetCodePolicy::default();
        Self {
            issue: IssueResetCodeUseCase {
                codes: repo.clone(),
                clock: clock.clone(),
                generator,
                policy,
            },
            validate: ValidateResetCodeUseCase {
                codes: repo.clone(),
                clock: clock.clone(),
                policy,
            },
            consume: ConsumeResetCodeUseCase {
                codes: repo.clone(),
                clock: clock.clone(),
                policy,
            },
            redeem: RedeemResetCodeUseCase {
                codes: repo.clone(),
                clock: clock.clone(),
                policy,
            },
            cleanup: CleanupResetCodesUseCase {
                codes: repo.clone(),
                clock: clock.clone(),
                policy,
            },
            repo,
            clock,
        }
    }
}
