/*!
 * Error types for the yadtwai application.
 *
 * Library errors are thiserror enums. Retry policy never matches on error
 * variants directly: every failure is first classified into an [`ErrorKind`],
 * and the batch orchestrator decides what to do from the kind alone.
 */

use thiserror::Error;

/// Classification of a failed translation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Backend asked us to slow down
    RateLimited,
    /// Request did not complete in time
    Timeout,
    /// Backend or network temporarily unavailable
    Unavailable,
    /// Credentials rejected; retrying cannot help
    Authentication,
    /// Response could not be parsed or salvaged
    MalformedResponse,
    /// Too many ids of the batch were missing from the response
    IncompleteBatch,
    /// Request rejected for a reason that will not change on retry
    Rejected,
}

impl ErrorKind {
    /// Whether another attempt of the same batch may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited
                | Self::Timeout
                | Self::Unavailable
                | Self::MalformedResponse
                | Self::IncompleteBatch
        )
    }

    /// Whether the whole run must stop
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Authentication)
    }
}

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The request exceeded its deadline
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

impl ProviderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RateLimitExceeded(_) => ErrorKind::RateLimited,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::ConnectionError(_) | Self::RequestFailed(_) => ErrorKind::Unavailable,
            Self::AuthenticationError(_) => ErrorKind::Authentication,
            Self::ParseError(_) => ErrorKind::MalformedResponse,
            Self::ApiError { status_code, .. } => match status_code {
                401 | 403 => ErrorKind::Authentication,
                429 => ErrorKind::RateLimited,
                408 => ErrorKind::Timeout,
                500..=599 => ErrorKind::Unavailable,
                _ => ErrorKind::Rejected,
            },
        }
    }

    /// Build the error matching an HTTP status returned by a backend
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status_code {
            401 | 403 => Self::AuthenticationError(message),
            429 => Self::RateLimitExceeded(message),
            _ => Self::ApiError { status_code, message },
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error.to_string())
        } else if error.is_connect() {
            Self::ConnectionError(error.to_string())
        } else if error.is_decode() {
            Self::ParseError(error.to_string())
        } else if let Some(status) = error.status() {
            Self::from_status(status.as_u16(), error.to_string())
        } else {
            Self::RequestFailed(error.to_string())
        }
    }
}

/// Errors raised while building or validating the segment structure
#[derive(Error, Debug)]
pub enum DocumentError {
    /// A segment violates the image/text invariant
    #[error("Segment {segment_id} is invalid: {reason}")]
    InvalidSegment {
        /// Id of the offending segment
        segment_id: u64,
        /// What is wrong with it
        reason: String,
    },

    /// An outline or unit file could not be understood
    #[error("Malformed input at {location}: {message}")]
    MalformedInput {
        /// File and line (or item index) of the problem
        location: String,
        /// Description of the problem
        message: String,
    },
}

/// Errors raised by the checkpoint and structure stores
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// Reading or writing the backing file failed
    #[error("Checkpoint I/O error on {path}: {source}")]
    Io {
        /// File being accessed
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The stored snapshot could not be encoded or decoded
    #[error("Checkpoint serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The background writer task panicked or was cancelled
    #[error("Checkpoint writer failed: {0}")]
    Writer(#[from] tokio::task::JoinError),
}

/// Errors that can occur during translation
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Error from the provider API
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Nothing usable could be recovered from the response
    #[error("Malformed response: {message}")]
    MalformedResponse {
        /// What went wrong
        message: String,
        /// Raw response text kept for diagnostics
        raw: String,
    },

    /// Too many ids were missing from an otherwise parseable response
    #[error("Incomplete batch: {missing} of {total} translations missing")]
    IncompleteBatch {
        /// Number of unrecovered ids
        missing: usize,
        /// Batch size
        total: usize,
        /// Raw response text kept for diagnostics
        raw: String,
    },

    /// Local file access failed (e.g. reading an image)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TranslationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Provider(e) => e.kind(),
            Self::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            Self::IncompleteBatch { .. } => ErrorKind::IncompleteBatch,
            Self::Io(_) => ErrorKind::Rejected,
        }
    }

    /// Raw backend text attached to the error, if any
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Self::MalformedResponse { raw, .. } | Self::IncompleteBatch { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from document segmentation
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    /// Error from the checkpoint store
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// Error from translation
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// The run was interrupted before finishing
    #[error("Interrupted: {0}")]
    Interrupted(String),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
