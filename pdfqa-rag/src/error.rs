//! Error types for the `pdfqa-rag` crate.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur in retrieval and answering operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid parameters. Raised before any external call is made.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The backend rejected the supplied credentials. Never retried.
    #[error("Authentication error ({backend}): {message}")]
    Authentication {
        /// The backend that rejected the request.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A network failure that may succeed when retried.
    #[error("Transient network error ({backend}): {message}")]
    TransientNetwork {
        /// The backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// An existing collection is incompatible with the requested schema or vector.
    #[error("Schema conflict in collection '{collection}': {message}")]
    SchemaConflict {
        /// The conflicting collection.
        collection: String,
        /// A description of the conflict.
        message: String,
    },

    /// A storage failure in a vector index backend.
    #[error("Storage error ({backend}){}: {message}", BatchOffset(*batch_offset))]
    Storage {
        /// The backend that produced the error.
        backend: String,
        /// Offset of the first record of the failed upsert batch, if any.
        batch_offset: Option<usize>,
        /// A description of the failure.
        message: String,
    },

    /// The embedding provider failed.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingService {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The language model failed to produce an answer.
    #[error("Generation error ({provider}): {message}")]
    Generation {
        /// The model provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The named collection does not exist.
    #[error("Collection '{collection}' not found ({backend})")]
    NotFound {
        /// The backend that was asked.
        backend: String,
        /// The missing collection.
        collection: String,
    },

    /// The source document could not be read or parsed.
    #[error("Failed to load document '{path}': {message}")]
    DocumentLoad {
        /// Path of the document.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// The operation is not valid in the backend's current lifecycle state.
    #[error("Invalid state ({backend}): {message}")]
    InvalidState {
        /// The backend whose state rejected the operation.
        backend: String,
        /// A description of the violation.
        message: String,
    },
}

struct BatchOffset(Option<usize>);

impl fmt::Display for BatchOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(offset) => write!(f, " at batch offset {offset}"),
            None => Ok(()),
        }
    }
}

/// The category of a [`RagError`], used for reporting and retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Authentication,
    TransientNetwork,
    SchemaConflict,
    Storage,
    EmbeddingService,
    Generation,
    NotFound,
    DocumentLoad,
    InvalidState,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Configuration => "ConfigurationError",
            ErrorKind::Authentication => "AuthenticationError",
            ErrorKind::TransientNetwork => "TransientNetworkError",
            ErrorKind::SchemaConflict => "SchemaConflictError",
            ErrorKind::Storage => "StorageError",
            ErrorKind::EmbeddingService => "EmbeddingServiceError",
            ErrorKind::Generation => "GenerationError",
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::DocumentLoad => "DocumentLoadError",
            ErrorKind::InvalidState => "InvalidStateError",
        };
        f.write_str(name)
    }
}

impl RagError {
    /// Return the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RagError::Configuration(_) => ErrorKind::Configuration,
            RagError::Authentication { .. } => ErrorKind::Authentication,
            RagError::TransientNetwork { .. } => ErrorKind::TransientNetwork,
            RagError::SchemaConflict { .. } => ErrorKind::SchemaConflict,
            RagError::Storage { .. } => ErrorKind::Storage,
            RagError::EmbeddingService { .. } => ErrorKind::EmbeddingService,
            RagError::Generation { .. } => ErrorKind::Generation,
            RagError::NotFound { .. } => ErrorKind::NotFound,
            RagError::DocumentLoad { .. } => ErrorKind::DocumentLoad,
            RagError::InvalidState { .. } => ErrorKind::InvalidState,
        }
    }

    /// Whether a retry of the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RagError::TransientNetwork { .. })
    }

    /// Offset of the first record of a failed upsert batch. Records before it
    /// were written.
    pub fn batch_offset(&self) -> Option<usize> {
        match self {
            RagError::Storage { batch_offset, .. } => *batch_offset,
            _ => None,
        }
    }

    pub(crate) fn storage(backend: impl Into<String>, message: impl Into<String>) -> Self {
        RagError::Storage { backend: backend.into(), batch_offset: None, message: message.into() }
    }

    pub(crate) fn not_found(backend: impl Into<String>, collection: impl Into<String>) -> Self {
        RagError::NotFound { backend: backend.into(), collection: collection.into() }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
