//! Error types for picker-sync
//!
//! This module provides the error taxonomy for the library:
//! - Transport failures (network errors, non-2xx HTTP responses)
//! - Protocol failures (malformed or incomplete Picker API responses)
//! - Session lifecycle failures (expired, timed out, cancelled)
//! - Classification into an [`ErrorKind`] and a single user-facing message

use thiserror::Error;

/// Result type alias for picker-sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Hint appended to the user message for HTTP 403 responses.
const FORBIDDEN_HINT: &str = "This usually means:\n\
1. The Google Photos Picker API is not enabled in your Google Cloud Console\n\
   (APIs & Services > Library > Enable 'Google Photos Picker API')\n\
2. The OAuth scope was not granted during authentication\n\
   (re-authenticate and grant all requested permissions)\n\
3. The scope is not added to your OAuth consent screen\n\
   (add 'https://www.googleapis.com/auth/photospicker.mediaitems.readonly')";

/// Main error type for picker-sync
///
/// Every component resolves the errors it detects into one of these variants,
/// and the boundary that surfaces them (the task executor or the session poller)
/// turns them into a single human-readable message via [`Error::user_message`].
#[derive(Debug, Error)]
pub enum Error {
    /// Network-level failure (connection refused, timeout, TLS, body decoding)
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with a non-2xx status
    #[error("HTTP {status}: {body}")]
    Http {
        /// HTTP status code returned by the server
        status: u16,
        /// Response body (truncated)
        body: String,
    },

    /// Malformed or incomplete API response (missing id/pickerUri, embedded error)
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Credentials are invalid and cannot be refreshed
    #[error("credential error: {0}")]
    Credentials(String),

    /// The picker session reached EXPIRED before the user finished
    #[error("the picker session expired")]
    Expired,

    /// The poll budget was exhausted while the session was still active
    #[error("picker session timed out after {polls} polls")]
    Timeout {
        /// Number of polls performed before giving up
        polls: u32,
    },

    /// The operation was cancelled by the user
    #[error("operation cancelled")]
    Cancelled,

    /// A picker session is already being created, polled or fetched
    #[error("a picker session is already active")]
    SessionActive,

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "polling.poll_interval_secs")
        key: Option<String>,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Coarse classification of an [`Error`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network failure or non-2xx HTTP status; never retried automatically
    Transport,
    /// Malformed/incomplete response; the session is considered never created
    Protocol,
    /// Invalid, unrefreshable credentials
    Credentials,
    /// Session expired before completion
    Expired,
    /// Poll budget exhausted
    Timeout,
    /// User-initiated cancellation; not a failure
    Cancelled,
    /// Everything else (config, serialization, I/O, state)
    Internal,
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport(_) | Error::Http { .. } => ErrorKind::Transport,
            Error::Protocol(_) => ErrorKind::Protocol,
            Error::Credentials(_) => ErrorKind::Credentials,
            Error::Expired => ErrorKind::Expired,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Cancelled => ErrorKind::Cancelled,
            // JSON decoding of an API body is a malformed response
            Error::Serialization(_) => ErrorKind::Protocol,
            Error::SessionActive | Error::Config { .. } | Error::Io(_) | Error::Other(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Machine-readable error code, stable across releases
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Transport(_) => "transport_error",
            Error::Http { .. } => "http_error",
            Error::Protocol(_) => "protocol_error",
            Error::Credentials(_) => "credentials_error",
            Error::Expired => "session_expired",
            Error::Timeout { .. } => "session_timeout",
            Error::Cancelled => "cancelled",
            Error::SessionActive => "session_active",
            Error::Config { .. } => "config_error",
            Error::Serialization(_) => "serialization_error",
            Error::Io(_) => "io_error",
            Error::Other(_) => "internal_error",
        }
    }

    /// Returns true if this error represents a user cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Single human-readable message suitable for a modal notification
    pub fn user_message(&self) -> String {
        match self {
            Error::Http { status: 403, .. } => {
                format!("403 Forbidden Error:\n{self}\n\n{FORBIDDEN_HINT}")
            }
            Error::Expired => "The picker session expired. Please try again.".to_string(),
            Error::Timeout { .. } => "Picker session timed out. Please try again.".to_string(),
            Error::SessionActive => "A picker session is already active. Please wait.".to_string(),
            other => other.to_string(),
        }
    }
}
