use crate::db::StorageError;

/// Errors raised by the storefront client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("local storage failed: {0}")]
    Storage(#[from] StorageError),
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
}

impl From<sqlx::Error> for ClientError {
    fn from(err: sqlx::Error) -> Self {
        ClientError::Storage(StorageError::Database(err))
    }
}

impl From<crate::models::ValidationError> for ClientError {
    fn from(err: crate::models::ValidationError) -> Self {
        ClientError::Validation(err.0)
    }
}

impl ClientError {
    /// Whether the failure happened on the way to or at the server.
    ///
    /// Remote failures become retry state; local ones propagate to the caller.
    pub fn is_remote(&self) -> bool {
        matches!(self, ClientError::Network(_) | ClientError::Server { .. })
    }
}
