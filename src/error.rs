//! Error types for unified file access.

use std::io;
use std::path::{Path, PathBuf};

/// Filesystem error type shared by every facade.
///
/// Backend failures are wrapped with the failing path and operation name.
/// Uses `#[non_exhaustive]` for forward compatibility.
///
/// # Examples
///
/// ```rust
/// use unifile::FsError;
/// use std::path::PathBuf;
///
/// let err = FsError::NotFound { path: PathBuf::from("/missing") };
/// assert!(err.to_string().contains("/missing"));
/// ```
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    /// Path does not exist and the operation requires it.
    #[error("not found: {path}")]
    NotFound {
        /// The path that was not found.
        path: PathBuf,
    },

    /// Permission denied for operation.
    #[error("{operation}: permission denied: {path}")]
    PermissionDenied {
        /// The path where permission was denied.
        path: PathBuf,
        /// The operation that was denied.
        operation: &'static str,
    },

    /// Connection establishment or an in-flight backend call failed for
    /// transport or reachability reasons.
    #[error("{operation}: backend unavailable at {path}: {source}")]
    BackendUnavailable {
        /// The operation that failed.
        operation: &'static str,
        /// The path (or endpoint address) involved.
        path: PathBuf,
        /// The underlying transport error.
        #[source]
        source: io::Error,
    },

    /// Malformed argument, such as an empty path or bad configuration.
    #[error("{operation}: invalid argument: {details}")]
    InvalidArgument {
        /// The operation that rejected the argument.
        operation: &'static str,
        /// What was wrong.
        details: String,
    },

    /// The backend contradicted itself, e.g. a path proven to exist could not
    /// be opened. Never retried.
    #[error("inconsistent backend state: {path} ({details})")]
    InconsistentState {
        /// The path involved.
        path: PathBuf,
        /// Details about the inconsistency.
        details: String,
    },

    /// Content could not be decoded.
    #[error("invalid data: {path} ({details})")]
    InvalidData {
        /// The path with invalid data.
        path: PathBuf,
        /// Details about the invalid data.
        details: String,
    },

    /// Glob pattern could not be compiled.
    #[error("invalid pattern {pattern:?}: {details}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Parser message.
        details: String,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// I/O error with context.
    #[error("{operation} failed for {path}: {source}")]
    Io {
        /// The operation that failed.
        operation: &'static str,
        /// The path involved in the operation.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl FsError {
    /// Wrap a backend error with the failing operation and path.
    ///
    /// `NotFound` and `PermissionDenied` kinds keep their meaning; transport
    /// failures become [`FsError::BackendUnavailable`].
    pub fn io(operation: &'static str, path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => FsError::NotFound {
                path: path.to_path_buf(),
            },
            io::ErrorKind::PermissionDenied => FsError::PermissionDenied {
                path: path.to_path_buf(),
                operation,
            },
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::TimedOut
            | io::ErrorKind::AddrNotAvailable => FsError::BackendUnavailable {
                operation,
                path: path.to_path_buf(),
                source,
            },
            _ => FsError::Io {
                operation,
                path: path.to_path_buf(),
                source,
            },
        }
    }

    /// Returns `true` for [`FsError::NotFound`].
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound { .. })
    }
}

/// Reject an empty path before any backend call.
pub(crate) fn require_path(operation: &'static str, path: &Path) -> Result<(), FsError> {
    if path.as_os_str().is_empty() {
        return Err(FsError::InvalidArgument {
            operation,
            details: "empty path".into(),
        });
    }
    Ok(())
}

impl From<io::Error> for FsError {
    fn from(error: io::Error) -> Self {
        FsError::io("io", Path::new(""), error)
    }
}
