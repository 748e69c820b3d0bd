//! Read operations shared by every facade.

use std::path::{Path, PathBuf};

use crate::{FsError, Metadata};

/// Read operations for a filesystem facade.
///
/// All methods use `&self`. Facades serialize backend access themselves
/// (the remote facade through its client pool).
///
/// # Object Safety
///
/// This trait is object-safe and can be used as `dyn FsRead`.
pub trait FsRead: Send + Sync {
    /// Metadata for a path, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Any backend failure other than not-found.
    fn stat(&self, path: &Path) -> Result<Option<Metadata>, FsError>;

    /// Read entire file contents as raw bytes, without decompression.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if the path does not exist
    /// - [`FsError::PermissionDenied`] if read access is denied
    fn read_file(&self, path: &Path) -> Result<Vec<u8>, FsError>;

    /// Check if a path exists.
    ///
    /// Returns `Ok(false)` for a missing path. Only returns an error for
    /// unexpected failures.
    fn exists(&self, path: &Path) -> Result<bool, FsError> {
        Ok(self.stat(path)?.is_some())
    }

    /// Paths matching a shell pattern, sorted.
    ///
    /// `*`, `?` and `[...]` never match `/`; a `**` component matches any
    /// number of directories.
    ///
    /// # Errors
    ///
    /// - [`FsError::InvalidPattern`] if the pattern does not compile
    fn glob(&self, pattern: &str) -> Result<Vec<PathBuf>, FsError>;
}
