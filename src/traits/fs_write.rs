//! Write operations shared by every facade.

use std::path::Path;

use crate::{FsError, Permissions};

/// Write operations for a filesystem facade.
///
/// # Object Safety
///
/// This trait is object-safe and can be used as `dyn FsWrite`.
pub trait FsWrite: Send + Sync {
    /// Replace a file's contents with `data`, creating it if needed.
    ///
    /// The bytes are written as-is. `permissions` applies to a newly created
    /// local file; the remote backend treats it as advisory.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if the parent directory does not exist
    /// - [`FsError::PermissionDenied`] if write access is denied
    fn write_file(&self, path: &Path, data: &[u8], permissions: Permissions)
    -> Result<(), FsError>;

    /// Remove a file or an empty directory.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if the path does not exist
    fn remove(&self, path: &Path) -> Result<(), FsError>;

    /// Remove a path and everything below it. A missing path is not an error.
    fn remove_all(&self, path: &Path) -> Result<(), FsError>;

    /// Create a directory and all missing parents. Existing directories are
    /// left alone.
    fn makedirs(&self, path: &Path) -> Result<(), FsError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_write_is_object_safe() {
        fn _check(_: &dyn FsWrite) {}
    }
}
