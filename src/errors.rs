use thiserror::Error;

/// Provider-reported authentication failure reasons, plus the local
/// "nobody is signed in" condition that mutations hit before any
/// provider call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid email format")]
    InvalidEmail,
    #[error("no account found with this email")]
    UserNotFound,
    #[error("incorrect credentials")]
    WrongCredential,
    #[error("password must be at least 6 characters")]
    WeakPassword,
    #[error("an account already exists for this email")]
    EmailInUse,
    #[error("no user is signed in")]
    NotSignedIn,
    #[error("{0}")]
    Provider(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("VALIDATION: {0}")]
    Validation(String),
    #[error("AUTH_FAILED: {0}")]
    Auth(AuthError),
    #[error("REMOTE_FAILED: {0}")]
    Remote(String),
}

impl From<AuthError> for AppError {
    fn from(value: AuthError) -> Self {
        Self::Auth(value)
    }
}

pub type AppResult<T> = Result<T, AppError>;
