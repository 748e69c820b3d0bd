//! Black-box client for an append-only remote filesystem.
//!
//! A remote backend (an HDFS-style namenode client, a test double) plugs in by
//! implementing [`RemoteClient`]. Calls return plain [`io::Result`]s; the
//! facade classifies them with [`FsError::io`](crate::FsError::io).

use std::io::{self, Read, Seek, Write};
use std::path::Path;

use crate::{Metadata, Permissions};

/// Read side of an open remote file.
pub trait RemoteReader: Read + Seek + Send {
    /// Release the reader. The default drops it.
    fn close(self: Box<Self>) -> io::Result<()> {
        Ok(())
    }
}

/// Append-only write side of an open remote file.
pub trait RemoteWriter: Write + Send {
    /// Flush and release the writer.
    fn close(self: Box<Self>) -> io::Result<()>;
}

/// One connection to the remote filesystem.
///
/// A client is leased to a single handle at a time, so methods take
/// `&mut self` and implementations need no internal locking.
///
/// # Object Safety
///
/// This trait is object-safe and can be used as `dyn RemoteClient`.
pub trait RemoteClient: Send {
    /// Metadata for `path`. A missing path is an [`io::ErrorKind::NotFound`]
    /// error.
    fn stat(&mut self, path: &Path) -> io::Result<Metadata>;

    /// Open an existing file for reading from offset zero.
    fn open(&mut self, path: &Path) -> io::Result<Box<dyn RemoteReader>>;

    /// Open an existing file for appending.
    fn append(&mut self, path: &Path) -> io::Result<Box<dyn RemoteWriter>>;

    /// Create an empty file. The parent directory must exist.
    fn create_empty_file(&mut self, path: &Path) -> io::Result<()>;

    /// Remove a file or an empty directory.
    fn remove(&mut self, path: &Path) -> io::Result<()>;

    /// Remove a path and everything below it. Missing paths are not an error.
    fn remove_all(&mut self, path: &Path) -> io::Result<()>;

    /// Create a directory and any missing parents.
    fn mkdir_all(&mut self, path: &Path, permissions: Permissions) -> io::Result<()>;

    /// Entries directly inside a directory.
    fn read_dir(&mut self, path: &Path) -> io::Result<Vec<Metadata>>;

    /// Read a whole file.
    fn read_file(&mut self, path: &Path) -> io::Result<Vec<u8>> {
        let mut reader = self.open(path)?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        reader.close()?;
        Ok(buf)
    }
}

impl<C: RemoteClient + ?Sized> RemoteClient for Box<C> {
    fn stat(&mut self, path: &Path) -> io::Result<Metadata> {
        (**self).stat(path)
    }

    fn open(&mut self, path: &Path) -> io::Result<Box<dyn RemoteReader>> {
        (**self).open(path)
    }

    fn append(&mut self, path: &Path) -> io::Result<Box<dyn RemoteWriter>> {
        (**self).append(path)
    }

    fn create_empty_file(&mut self, path: &Path) -> io::Result<()> {
        (**self).create_empty_file(path)
    }

    fn remove(&mut self, path: &Path) -> io::Result<()> {
        (**self).remove(path)
    }

    fn remove_all(&mut self, path: &Path) -> io::Result<()> {
        (**self).remove_all(path)
    }

    fn mkdir_all(&mut self, path: &Path, permissions: Permissions) -> io::Result<()> {
        (**self).mkdir_all(path, permissions)
    }

    fn read_dir(&mut self, path: &Path) -> io::Result<Vec<Metadata>> {
        (**self).read_dir(path)
    }

    fn read_file(&mut self, path: &Path) -> io::Result<Vec<u8>> {
        (**self).read_file(path)
    }
}
