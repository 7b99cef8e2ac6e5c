use super::payments::GatewayError;
use super::repository::RepositoryError;

/// Failure taxonomy shared by every marketplace operation. All variants are
/// per-request; none is fatal to the process.
#[derive(Debug, thiserror::Error)]
pub enum MarketplaceError {
    #[error("unauthorized: caller identity missing or unknown")]
    Unauthorized,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Repository(RepositoryError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl MarketplaceError {
    pub(crate) fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }
}

impl From<RepositoryError> for MarketplaceError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict(detail) => Self::Conflict(detail),
            RepositoryError::NotFound(what) => Self::NotFound(what),
            other @ RepositoryError::Unavailable(_) => Self::Repository(other),
        }
    }
}
