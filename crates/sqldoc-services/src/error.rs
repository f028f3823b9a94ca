use sqldoc_catalog::ExtractError;
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service-level errors with user-friendly messages
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("A documentation run is already in progress")]
    RunInProgress,

    #[error("No output formats were requested")]
    NoFormats,

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("Documentation run aborted: {0}")]
    TaskFailed(String),
}

impl ServiceError {
    /// Whether the database could not be reached at all
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, ServiceError::Extraction(ExtractError::Connection(_)))
    }
}
