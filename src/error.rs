use thiserror::Error;

use crate::types::BatchItemStatus;

/// Stable marker callers can match on for credential failures.
pub const PERMISSION_DENIED: &str = "PERMISSION_DENIED";

/// Message surfaced when the model refuses requests from the caller's region.
pub const UNSUPPORTED_REGION_GUIDANCE: &str =
    "User location is not supported. Please check your VPN/Region settings.";

/// Normalized classification of a failed model call.
///
/// Retry decisions are made on this value, never on raw error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Server-side overload or internal error; worth retrying.
    Transient,
    /// The credential was rejected. Halts the whole batch.
    PermissionDenied,
    UnsupportedRegion,
    /// Malformed request, quota or other client-side rejection.
    InvalidRequest,
    /// The model answered but without a usable image.
    ContentFailure,
    /// Connection failure or request timeout.
    Network,
}

impl ErrorKind {
    pub fn is_transient(self) -> bool {
        matches!(self, ErrorKind::Transient)
    }
}

/// Errors returned by the remote translation client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    #[error("{message}")]
    Transient { status: Option<u16>, message: String },

    #[error("{}", PERMISSION_DENIED)]
    PermissionDenied { message: String },

    #[error("{}", UNSUPPORTED_REGION_GUIDANCE)]
    UnsupportedRegion,

    #[error("{message}")]
    InvalidRequest { status: u16, message: String },

    #[error("The model returned a text description instead of the edited image. Please try again or use a clearer image.")]
    ModelReturnedText(String),

    #[error("The model did not return a valid image.")]
    NoImage,

    #[error("No response candidates received from the model.")]
    EmptyResponse,

    #[error("Invalid response from model: {0}")]
    MalformedResponse(String),

    #[error("Request to {endpoint} failed: {message}")]
    Network { endpoint: String, message: String },
}

impl TranslateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TranslateError::Transient { .. } => ErrorKind::Transient,
            TranslateError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            TranslateError::UnsupportedRegion => ErrorKind::UnsupportedRegion,
            TranslateError::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            TranslateError::ModelReturnedText(_)
            | TranslateError::NoImage
            | TranslateError::EmptyResponse
            | TranslateError::MalformedResponse(_) => ErrorKind::ContentFailure,
            TranslateError::Network { .. } => ErrorKind::Network,
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        self.kind() == ErrorKind::PermissionDenied
    }
}

pub type Result<T> = std::result::Result<T, TranslateError>;

/// Errors from the batch queue store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Batch item not found: {0}")]
    NotFound(String),

    #[error("Invalid status transition for item {id}: {from:?} -> {to:?}")]
    InvalidTransition {
        id: String,
        from: BatchItemStatus,
        to: BatchItemStatus,
    },

    #[error("Completed item {0} requires a result image")]
    MissingResult(String),

    #[error("Queue lock poisoned: {0}")]
    Lock(String),
}

/// Errors raised while building the client configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("API key is missing. Set API_KEY or GEMINI_API_KEY in the environment.")]
    MissingCredential,

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: String, value: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Errors that prevent a batch run from starting.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("A batch is already running")]
    AlreadyRunning,

    #[error("API key permission denied. Please reconnect.")]
    CredentialUnavailable,

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Errors from writing translated images to disk.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Queue(#[from] QueueError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unsupported target language: {0}")]
pub struct UnknownLanguage(pub String);
