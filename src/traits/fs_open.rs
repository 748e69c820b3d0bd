//! Handle-producing open.

use std::path::Path;

use crate::{CompressionMode, File, FsError, OpenFlags};

/// Open files as [`File`] handles.
///
/// # Object Safety
///
/// This trait is object-safe and can be used as `dyn FsOpen`.
pub trait FsOpen: Send + Sync {
    /// Open `path` with POSIX-style `flags`.
    ///
    /// Compression is resolved from `mode` before the handle is returned. On
    /// failure nothing stays open and no pooled client stays leased.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if the path is missing and `CREATE` is not set
    /// - [`FsError::PermissionDenied`] if access is denied
    /// - [`FsError::InvalidArgument`] for an empty path or unusable flags
    /// - [`FsError::InconsistentState`] if the backend contradicts itself
    fn open(&self, path: &Path, flags: OpenFlags, mode: CompressionMode) -> Result<File, FsError>;
}
