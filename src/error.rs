//! Error handling for spotistat.
//!
//! All fallible operations return [`Result`], whose error carries an
//! [`ErrorKind`] modelled after gRPC status codes plus the underlying error.
//!
//! # Error Categories
//!
//! * Authentication failures: missing or invalid token, CSRF mismatch,
//!   upstream denial (`Unauthenticated`, `PermissionDenied`)
//! * Expired session (`Unauthenticated`)
//! * Transient network or API failures (`Unavailable`, `DeadlineExceeded`,
//!   `ResourceExhausted`)
//! * Everything else: bad input, malformed responses, local I/O
//!
//! Only transient failures are retried, see [`Error::is_transient`].
//!
//! # Example
//!
//! ```rust
//! use spotistat::error::{Error, ErrorKind, Result};
//!
//! fn state_matches(expected: &str, returned: &str) -> Result<()> {
//!     if expected != returned {
//!         return Err(Error::permission_denied("state mismatch"));
//!     }
//!     Ok(())
//! }
//! ```

#![allow(clippy::enum_glob_use)]

use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

/// Main error type combining error kind and details.
#[derive(Debug)]
pub struct Error {
    /// Classification of the error
    pub kind: ErrorKind,

    /// Details of the underlying error
    pub error: Box<dyn std::error::Error + Send + Sync>,
}

/// Standard result type for spotistat operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories based on gRPC status codes.
///
/// The discriminants are the gRPC codes; the HTTP mapping of each variant is
/// noted on the variant.
#[expect(clippy::module_name_repetitions)]
#[derive(Clone, Copy, Debug, Eq, Error, Hash, Ord, PartialEq, PartialOrd)]
#[repr(u32)]
pub enum ErrorKind {
    /// HTTP Mapping: 499 Client Closed Request
    #[error("operation was cancelled")]
    Cancelled = 1,

    /// HTTP Mapping: 500 Internal Server Error
    #[error("unknown error")]
    Unknown = 2,

    /// HTTP Mapping: 400 Bad Request
    #[error("invalid argument specified")]
    InvalidArgument = 3,

    /// HTTP Mapping: 504 Gateway Timeout
    #[error("operation timed out")]
    DeadlineExceeded = 4,

    /// HTTP Mapping: 404 Not Found
    #[error("not found")]
    NotFound = 5,

    /// HTTP Mapping: 403 Forbidden
    #[error("permission denied")]
    PermissionDenied = 7,

    /// HTTP Mapping: 429 Too Many Requests
    #[error("resource has been exhausted")]
    ResourceExhausted = 8,

    /// HTTP Mapping: 400 Bad Request
    #[error("invalid state")]
    FailedPrecondition = 9,

    /// HTTP Mapping: 500 Internal Server Error
    #[error("internal error")]
    Internal = 13,

    /// HTTP Mapping: 503 Service Unavailable
    #[error("service unavailable")]
    Unavailable = 14,

    /// HTTP Mapping: 500 Internal Server Error
    #[error("unrecoverable data loss or corruption")]
    DataLoss = 15,

    /// HTTP Mapping: 401 Unauthorized
    #[error("no valid authentication credentials")]
    Unauthenticated = 16,
}

impl Error {
    /// Creates a new error with specified kind and details.
    pub fn new<E>(kind: ErrorKind, error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self {
            kind,
            error: error.into(),
        }
    }

    /// Attempts to downcast the underlying error to a concrete type.
    #[must_use]
    pub fn downcast<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        self.error.downcast_ref::<E>()
    }

    /// Whether retrying the same request may succeed.
    ///
    /// True for connection failures, timeouts, rate limiting and upstream
    /// server errors. Authentication and client errors are final.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Unavailable | ErrorKind::DeadlineExceeded | ErrorKind::ResourceExhausted
        )
    }

    /// Maps an unsuccessful HTTP status and its message to an error.
    ///
    /// | Status          | Kind                 |
    /// |-----------------|----------------------|
    /// | 401             | `Unauthenticated`    |
    /// | 403             | `PermissionDenied`   |
    /// | 404             | `NotFound`           |
    /// | 429             | `ResourceExhausted`  |
    /// | 5xx             | `Unavailable`        |
    /// | other 4xx       | `InvalidArgument`    |
    pub fn from_status(status: StatusCode, message: impl Into<String>) -> Self {
        let message = format!("{status}: {}", message.into());
        match status {
            StatusCode::UNAUTHORIZED => Self::unauthenticated(message),
            StatusCode::FORBIDDEN => Self::permission_denied(message),
            StatusCode::NOT_FOUND => Self::not_found(message),
            StatusCode::TOO_MANY_REQUESTS => Self::resource_exhausted(message),
            status if status.is_server_error() => Self::unavailable(message),
            status if status.is_client_error() => Self::invalid_argument(message),
            _ => Self::unknown(message),
        }
    }

    pub fn cancelled<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::Cancelled, error)
    }

    /// Creates an error for data that was lost or could not be read back,
    /// such as a truncated response body.
    pub fn data_loss<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::DataLoss, error)
    }

    pub fn deadline_exceeded<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::DeadlineExceeded, error)
    }

    /// Creates an error for operations attempted in the wrong state, for
    /// example completing a login that was never started.
    pub fn failed_precondition<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::FailedPrecondition, error)
    }

    pub fn internal<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::Internal, error)
    }

    pub fn invalid_argument<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::InvalidArgument, error)
    }

    pub fn not_found<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::NotFound, error)
    }

    /// Creates an error for requests that were refused. Also used for a
    /// callback whose `state` does not match, which is treated as forgery.
    pub fn permission_denied<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::PermissionDenied, error)
    }

    /// Creates an error for rate limiting or exhausted quotas.
    ///
    /// Retried as a transient failure.
    pub fn resource_exhausted<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::ResourceExhausted, error)
    }

    /// Creates an error for missing, invalid or expired credentials.
    ///
    /// Callers holding a session should treat this as the end of it.
    pub fn unauthenticated<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::Unauthenticated, error)
    }

    pub fn unavailable<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::Unavailable, error)
    }

    pub fn unknown<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::Unknown, error)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.error.source()
    }
}

/// Format: "{kind}: {details}"
impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}: ", self.kind)?;
        self.error.fmt(fmt)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind::*;
        match err.kind() {
            NotFound => Self::not_found(err),
            PermissionDenied => Self::permission_denied(err),
            AddrNotAvailable | ConnectionRefused | NotConnected | BrokenPipe
            | ConnectionReset | ConnectionAborted => Self::unavailable(err),
            Interrupted => Self::cancelled(err),
            UnexpectedEof => Self::data_loss(err),
            TimedOut => Self::deadline_exceeded(err),
            InvalidInput | InvalidData => Self::invalid_argument(err),
            _ => Self::unknown(err),
        }
    }
}

/// Maps transport errors so that connection problems and timeouts end up
/// retryable while decode and builder errors do not.
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::deadline_exceeded(err);
        }

        if err.is_connect() || err.is_request() {
            return Self::unavailable(err);
        }

        if err.is_status() {
            if let Some(status) = err.status() {
                return Self::from_status(status, err.to_string());
            }
        }

        if err.is_body() {
            return Self::data_loss(err);
        }

        if err.is_decode() {
            return Self::invalid_argument(err);
        }

        if err.is_builder() || err.is_redirect() {
            return Self::internal(err);
        }

        Self::unknown(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        std::io::Error::from(err).into()
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::invalid_argument(err)
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Self::internal(err)
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(e: http::header::InvalidHeaderValue) -> Self {
        Self::internal(e.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Self::invalid_argument(e.to_string())
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(e: std::num::ParseIntError) -> Self {
        Self::invalid_argument(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<std::sync::MutexGuard<'_, T>>> for Error {
    fn from(e: std::sync::PoisonError<std::sync::MutexGuard<'_, T>>) -> Self {
        Self::internal(e.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        if e.is_cancelled() {
            Self::cancelled(e)
        } else {
            Self::internal(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let cases = [
            (StatusCode::UNAUTHORIZED, ErrorKind::Unauthenticated),
            (StatusCode::FORBIDDEN, ErrorKind::PermissionDenied),
            (StatusCode::NOT_FOUND, ErrorKind::NotFound),
            (StatusCode::TOO_MANY_REQUESTS, ErrorKind::ResourceExhausted),
            (StatusCode::BAD_GATEWAY, ErrorKind::Unavailable),
            (StatusCode::INTERNAL_SERVER_ERROR, ErrorKind::Unavailable),
            (StatusCode::BAD_REQUEST, ErrorKind::InvalidArgument),
        ];
        for (status, kind) in cases {
            assert_eq!(Error::from_status(status, "x").kind, kind, "{status}");
        }
    }

    #[test]
    fn only_network_failures_are_transient() {
        assert!(Error::unavailable("down").is_transient());
        assert!(Error::deadline_exceeded("slow").is_transient());
        assert!(Error::resource_exhausted("429").is_transient());
        assert!(!Error::unauthenticated("expired").is_transient());
        assert!(!Error::permission_denied("csrf").is_transient());
        assert!(!Error::invalid_argument("bad").is_transient());
    }

    #[test]
    fn display_includes_kind() {
        let err = Error::not_found("no such playlist");
        assert_eq!(err.to_string(), "not found: no such playlist");
    }
}
