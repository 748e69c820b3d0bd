//! # Filesystem Traits
//!
//! The capability set every facade implements.
//!
//! ```text
//! FsOpen + FsRead + FsWrite = FileSystem
//! ```
//!
//! | Trait | Methods |
//! |-------|---------|
//! | [`FsOpen`] | `open` |
//! | [`FsRead`] | `stat`, `read_file`, `exists`, `glob` |
//! | [`FsWrite`] | `write_file`, `remove`, `remove_all`, `makedirs` |
//!
//! ## Blanket Implementation
//!
//! Implement the three component traits and [`FileSystem`] comes for free.
//!
//! ## Object Safety
//!
//! All traits are object-safe, so callers can pick a facade at runtime:
//!
//! ```rust
//! use unifile::{FileSystem, LocalFs};
//!
//! let fs: Box<dyn FileSystem> = Box::new(LocalFs::new());
//! assert!(fs.exists(std::path::Path::new("/")).unwrap());
//! ```

mod fs_open;
mod fs_read;
mod fs_write;

pub use fs_open::FsOpen;
pub use fs_read::FsRead;
pub use fs_write::FsWrite;

/// A complete filesystem facade.
///
/// # Example
///
/// ```rust
/// use unifile::{CompressionMode, FileSystem, FsError, OpenFlags};
/// use std::io::BufRead;
/// use std::path::Path;
///
/// // Count lines of a plain or gzip file on any backend.
/// fn count_lines<F: FileSystem + ?Sized>(fs: &F, path: &Path) -> Result<usize, FsError> {
///     let mut file = fs.open(path, OpenFlags::READ_ONLY, CompressionMode::AutoDetect)?;
///     let lines = file.reader(0)?.lines().count();
///     file.close()?;
///     Ok(lines)
/// }
/// ```
pub trait FileSystem: FsOpen + FsRead + FsWrite {}

impl<T: FsOpen + FsRead + FsWrite> FileSystem for T {}
