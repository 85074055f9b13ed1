use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Action not found: {0}")]
    ActionNotFound(String),

    #[error("Invalid zone {0}: {1}")]
    InvalidZone(String, String),

    #[error("Invalid check-in parameter {0}: {1}")]
    InvalidCheckinParameter(String, String),

    #[error("Remote call failed: {0}")]
    RemoteCallError(String),

    #[error("Handler panicked: {0}")]
    HandlerPanic(String),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}

impl DomainError {
    /// True when the referenced remote resource no longer exists
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DomainError::DeviceNotFound(_) | DomainError::ActionNotFound(_)
        )
    }
}
