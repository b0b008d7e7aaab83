/// Password-reset domain error variants.
///
/// The first four are expected outcomes of user input; callers show a
/// distinct message per `kind()`. `Persistence` is fatal to the current
/// operation and is never retried, since a retried write could consume a
/// code twice.
#[derive(Debug, thiserror::Error)]
pub enum PasswordResetError {
    #[error("invalid reset code")]
    NotFound,
    #[error("reset code already used")]
    AlreadyUsed,
    #[error("reset code expired")]
    Expired,
    #[error("too many attempts")]
    TooManyAttempts,
    #[error("user not found")]
    UserNotFound,
    #[error("too many reset requests")]
    RateLimited,
    #[error("invalid email address")]
    InvalidEmail,
    #[error("persistence error")]
    Persistence(#[from] anyhow::Error),
}

impl PasswordResetError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyUsed => "ALREADY_USED",
            Self::Expired => "EXPIRED",
            Self::TooManyAttempts => "TOO_MANY_ATTEMPTS",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::RateLimited => "RATE_LIMITED",
            Self::InvalidEmail => "INVALID_EMAIL",
            Self::Persistence(_) => "PERSISTENCE",
        }
    }

    /// True for outcomes of submitting a code, as opposed to infrastructure
    /// or request-level failures.
    pub fn is_validation_failure(&self) -> bool {
        matches!(
            self,
            Self::NotFound | Self::AlreadyUsed | Self::Expired | Self::TooManyAttempts
        )
    }
}
