use thiserror::Error;

use crate::access::{AccessError, GuardError};
use crate::auth::password::PasswordError;
use crate::auth::JwtError;
use crate::database::manager::DatabaseError;
use crate::orders::TransitionError;
use crate::storage::StorageError;

/// Errors shared by the service layer.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database manager error: {0}")]
    DatabaseManager(#[from] DatabaseError),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("Too many {0} attempts, try again later")]
    RateLimited(&'static str),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Guard(GuardError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Jwt(#[from] JwtError),
}

impl From<GuardError> for ServiceError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::Store(e) => ServiceError::Database(e),
            other => ServiceError::Guard(other),
        }
    }
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
