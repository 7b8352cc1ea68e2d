use std::error::Error;
use thiserror::Error;

/// Result alias for document store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by document stores regardless of the underlying backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not serve the request.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// What was being attempted.
        message: String,
        /// Backend failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A record could not be encoded into document fields.
    #[error("failed to encode document `{path}`")]
    Encode {
        /// Path of the document being written.
        path: String,
        /// Serialization failure.
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
