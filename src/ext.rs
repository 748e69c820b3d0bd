//! # Extension Traits
//!
//! Convenience methods for every [`FileSystem`].
//!
//! ## Available Methods
//!
//! | Method | Description |
//! |--------|-------------|
//! | [`is_file`](FsExt::is_file) | Check if path is a regular file |
//! | [`is_dir`](FsExt::is_dir) | Check if path is a directory |
//! | [`read_to_string`](FsExt::read_to_string) | Decoded content as UTF-8 |
//! | [`open_read`](FsExt::open_read) | Open read-only, compression detected |
//! | [`create`](FsExt::create) | Create or truncate for writing |
//! | [`append_to`](FsExt::append_to) | Create if needed, write at the end |
//!
//! ## JSON Support (Feature-Gated)
//!
//! With the `serde` feature enabled, `read_json` and `write_json` are
//! available through `FsExtJson`.
//!
//! ```toml
//! [dependencies]
//! unifile = { version = "0.1", features = ["serde"] }
//! ```

use std::io::Read;
use std::path::Path;

use crate::{CompressionMode, File, FileSystem, FsError, OpenFlags};

/// Extension methods for any filesystem facade.
///
/// # Example
///
/// ```rust
/// use unifile::{FileSystem, FsExt, FsError};
/// use std::io::Write;
/// use std::path::Path;
///
/// // Writes gzip because of the suffix, reads it back decoded.
/// fn roundtrip<F: FileSystem>(fs: &F, dir: &Path) -> Result<String, FsError> {
///     let path = dir.join("greeting.txt.gz");
///     let mut file = fs.create(&path)?;
///     let mut writer = file.writer(0)?;
///     writer.write_all(b"hello").map_err(FsError::from)?;
///     writer.finish().map_err(FsError::from)?;
///     file.close()?;
///     fs.read_to_string(&path)
/// }
/// ```
pub trait FsExt: FileSystem {
    /// Check if the path points to a regular file.
    ///
    /// Returns `Ok(false)` if the path doesn't exist.
    fn is_file(&self, path: &Path) -> Result<bool, FsError> {
        Ok(self.stat(path)?.is_some_and(|m| m.is_file()))
    }

    /// Check if the path points to a directory.
    ///
    /// Returns `Ok(false)` if the path doesn't exist.
    fn is_dir(&self, path: &Path) -> Result<bool, FsError> {
        Ok(self.stat(path)?.is_some_and(|m| m.is_dir()))
    }

    /// Whole decoded content as UTF-8, gzip detected automatically.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if the path does not exist
    /// - [`FsError::InvalidData`] if the content is not valid UTF-8
    fn read_to_string(&self, path: &Path) -> Result<String, FsError> {
        let mut file = self.open_read(path)?;
        let mut text = String::new();
        let mut reader = file.reader(0)?;
        let read = Read::read_to_string(&mut reader, &mut text)
            .map(drop)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::InvalidData => FsError::InvalidData {
                    path: path.to_path_buf(),
                    details: e.to_string(),
                },
                _ => FsError::io("read", path, e),
            });
        drop(reader);
        let closed = file.close();
        read.and(closed)?;
        Ok(text)
    }

    /// Open read-only with [`CompressionMode::AutoDetect`].
    fn open_read(&self, path: &Path) -> Result<File, FsError> {
        self.open(path, OpenFlags::READ_ONLY, CompressionMode::AutoDetect)
    }

    /// Open write-only, creating or truncating, with
    /// [`CompressionMode::AutoDetect`] (gzip for `.gz` paths).
    fn create(&self, path: &Path) -> Result<File, FsError> {
        self.open(
            path,
            OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE_ONLY,
            CompressionMode::AutoDetect,
        )
    }

    /// Open write-only at the end, creating if missing, with
    /// [`CompressionMode::AutoDetect`]. Each finished writer on a `.gz` path
    /// adds one gzip member.
    fn append_to(&self, path: &Path) -> Result<File, FsError> {
        self.open(
            path,
            OpenFlags::CREATE | OpenFlags::APPEND | OpenFlags::WRITE_ONLY,
            CompressionMode::AutoDetect,
        )
    }
}

impl<F: FileSystem + ?Sized> FsExt for F {}

#[cfg(feature = "serde")]
mod json {
    use super::*;
    use crate::Permissions;
    use serde::{Serialize, de::DeserializeOwned};

    /// JSON serialization extension methods.
    ///
    /// Available when the `serde` feature is enabled. Files are read and
    /// written as raw bytes, without compression.
    pub trait FsExtJson: FileSystem {
        /// Read a file and deserialize it as JSON.
        ///
        /// # Errors
        ///
        /// - `FsError::NotFound` if the file doesn't exist
        /// - `FsError::Deserialization` if JSON parsing failed
        fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T, FsError> {
            let data = self.read_file(path)?;
            serde_json::from_slice(&data).map_err(|e| FsError::Deserialization(e.to_string()))
        }

        /// Serialize a value and write it as pretty-printed JSON.
        ///
        /// # Errors
        ///
        /// - `FsError::Serialization` if serialization failed
        /// - other `FsError` variants from `write_file`
        fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), FsError> {
            let json = serde_json::to_vec_pretty(value)
                .map_err(|e| FsError::Serialization(e.to_string()))?;
            self.write_file(path, &json, Permissions::default_file())
        }
    }

    impl<F: FileSystem + ?Sized> FsExtJson for F {}
}

#[cfg(feature = "serde")]
pub use json::FsExtJson;
