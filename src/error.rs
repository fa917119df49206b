//! Error taxonomy shared by the account, course and session services.

use crate::storage::StoreError;
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} does not exist")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("incorrect password for user {0}")]
    InvalidCredential(String),

    #[error("course {0} is already launched")]
    AlreadyLaunched(String),

    #[error("course {0} is not launched")]
    NotLaunched(String),

    #[error("course {0} is full")]
    Full(String),

    #[error("user {0} has already selected a course")]
    AlreadyEnrolled(String),

    #[error("user {0} has not selected any course")]
    NotEnrolled(String),

    #[error("invalid token")]
    InvalidToken,

    /// A cross-store invariant was found broken outside startup reconciliation.
    #[error("inconsistent state: {0}")]
    ConsistencyFault(String),

    #[error(transparent)]
    Io(#[from] StoreError),
}

impl ServiceError {
    /// Builds a `ConsistencyFault` and reports it at error level.
    pub(crate) fn fault(message: String) -> Self {
        tracing::error!("Inconsistent state: {}", message);
        ServiceError::ConsistencyFault(message)
    }
}
