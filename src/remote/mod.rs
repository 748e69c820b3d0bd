//! # Remote Facade
//!
//! [`RemoteFs`] serves the filesystem traits from an append-only remote
//! backend through a bounded pool of [`RemoteClient`]s.
//!
//! Path operations lease a client for the duration of one call. An open
//! handle keeps its client leased until it is closed, so at most
//! `pool_size` handles are open at once and further opens block.
//!
//! ```rust
//! use unifile::{CompressionMode, FsOpen, FsWrite, OpenFlags, RemoteConfig, RemoteFs};
//! use unifile::remote::MemoryBackend;
//! use std::path::Path;
//!
//! let backend = MemoryBackend::new();
//! let fs = RemoteFs::connect(RemoteConfig::new("mem:8020"), |addr| backend.connect(addr))?;
//!
//! fs.makedirs(Path::new("/logs"))?;
//! let mut file = fs.open(
//!     Path::new("/logs/app.log"),
//!     OpenFlags::CREATE | OpenFlags::APPEND | OpenFlags::READ_WRITE,
//!     CompressionMode::Plain,
//! )?;
//! let mut writer = file.writer(0)?;
//! std::io::Write::write_all(&mut writer, b"started\n")?;
//! writer.finish()?;
//! file.close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod client;
mod memory;

pub use client::{RemoteClient, RemoteReader, RemoteWriter};
pub use memory::{MemoryBackend, MemoryClient};

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};

use glob::{MatchOptions, Pattern};
use tracing::{debug, error, warn};

use crate::error::require_path;
use crate::handle::RawStream;
use crate::mode::{self, OpenedStreams};
use crate::pool::{ClientPool, Lease};
use crate::{
    CompressionMode, File, FsError, FsOpen, FsRead, FsWrite, Metadata, OpenFlags, Permissions,
    RemoteConfig,
};

/// Facade over an append-only remote filesystem.
///
/// Writes always append: a read-write open without `TRUNCATE` writes after
/// the existing content, and seeking moves only the read position.
pub struct RemoteFs<C: RemoteClient + 'static> {
    config: RemoteConfig,
    pool: ClientPool<C>,
}

impl<C: RemoteClient + 'static> RemoteFs<C> {
    /// Connect `config.effective_pool_size()` clients with `connector`.
    ///
    /// # Errors
    ///
    /// - [`FsError::InvalidArgument`] if the address is empty
    /// - [`FsError::BackendUnavailable`] if any connection fails; clients
    ///   already connected are dropped
    pub fn connect<F>(config: RemoteConfig, mut connector: F) -> Result<Self, FsError>
    where
        F: FnMut(&str) -> io::Result<C>,
    {
        config.validate()?;
        let pool = ClientPool::connect(config.effective_pool_size(), |_| {
            connector(&config.address)
        })
        .map_err(|source| {
            error!(address = %config.address, error = %source, "remote connection failed");
            FsError::BackendUnavailable {
                operation: "connect",
                path: PathBuf::from(&config.address),
                source,
            }
        })?;
        Ok(Self { config, pool })
    }

    /// Use an existing pool.
    pub fn with_pool(config: RemoteConfig, pool: ClientPool<C>) -> Self {
        Self { config, pool }
    }

    /// Configuration this facade was built with.
    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// The client pool.
    pub fn pool(&self) -> &ClientPool<C> {
        &self.pool
    }

    fn walk_glob(
        client: &mut C,
        base: PathBuf,
        depth: Option<usize>,
        pattern: &Pattern,
    ) -> io::Result<Vec<PathBuf>> {
        let options = MatchOptions {
            require_literal_separator: true,
            ..MatchOptions::new()
        };
        let mut matches = Vec::new();
        let mut pending = vec![(base, 0usize)];
        while let Some((dir, level)) = pending.pop() {
            for entry in client.read_dir(&dir)? {
                if pattern.matches_path_with(&entry.path, options) {
                    matches.push(entry.path.clone());
                }
                if entry.is_dir() && depth.is_none_or(|max| level + 1 < max) {
                    pending.push((entry.path, level + 1));
                }
            }
        }
        matches.sort();
        Ok(matches)
    }
}

/// Longest wildcard-free prefix of `pattern`, and how many components below
/// it can match (`None` when a `**` component allows any depth).
fn split_glob(pattern: &Path) -> (PathBuf, Option<usize>) {
    let mut base = PathBuf::new();
    let mut rest = pattern.components().peekable();
    while let Some(component) = rest.peek() {
        let literal = match component {
            Component::Normal(part) => !part
                .to_str()
                .is_some_and(|s| s.contains(['*', '?', '['])),
            _ => true,
        };
        if !literal {
            break;
        }
        base.push(component);
        rest.next();
    }
    let remaining: Vec<_> = rest.collect();
    let depth = if remaining.iter().any(|c| c.as_os_str() == "**") {
        None
    } else {
        Some(remaining.len())
    };
    (base, depth)
}

impl<C: RemoteClient + 'static> FsOpen for RemoteFs<C> {
    fn open(
        &self,
        path: &Path,
        flags: OpenFlags,
        compression: CompressionMode,
    ) -> Result<File, FsError> {
        require_path("open", path)?;
        let mut lease = self.pool.acquire();
        let OpenedStreams { reader, writer } = mode::perform_open(&mut *lease, path, flags)?;
        let stream = RemoteStream {
            path: path.to_path_buf(),
            lease: Some(lease),
            reader: Some(reader),
            writer,
        };
        File::from_stream(
            path.to_path_buf(),
            Box::new(stream),
            flags,
            compression,
            flags.readable(),
        )
    }
}

impl<C: RemoteClient + 'static> FsRead for RemoteFs<C> {
    fn stat(&self, path: &Path) -> Result<Option<Metadata>, FsError> {
        require_path("stat", path)?;
        match self.pool.acquire().stat(path) {
            Ok(metadata) => Ok(Some(metadata)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FsError::io("stat", path, e)),
        }
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>, FsError> {
        require_path("read_file", path)?;
        self.pool
            .acquire()
            .read_file(path)
            .map_err(|e| FsError::io("read_file", path, e))
    }

    fn glob(&self, pattern: &str) -> Result<Vec<PathBuf>, FsError> {
        let compiled = Pattern::new(pattern).map_err(|e| FsError::InvalidPattern {
            pattern: pattern.to_string(),
            details: e.to_string(),
        })?;
        if !pattern.starts_with('/') {
            return Err(FsError::InvalidPattern {
                pattern: pattern.to_string(),
                details: "remote patterns must be absolute".into(),
            });
        }

        let (base, depth) = split_glob(Path::new(pattern));
        let mut client = self.pool.acquire();
        if depth == Some(0) {
            return match client.stat(&base) {
                Ok(_) => Ok(vec![base]),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
                Err(e) => Err(FsError::io("glob", &base, e)),
            };
        }
        match Self::walk_glob(&mut *client, base.clone(), depth, &compiled) {
            Ok(matches) => {
                debug!(pattern, found = matches.len(), "remote glob");
                Ok(matches)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(FsError::io("glob", &base, e)),
        }
    }
}

impl<C: RemoteClient + 'static> FsWrite for RemoteFs<C> {
    fn write_file(
        &self,
        path: &Path,
        data: &[u8],
        permissions: Permissions,
    ) -> Result<(), FsError> {
        debug!(
            path = %path.display(),
            size = data.len(),
            mode = permissions.mode(),
            "remote write_file, mode is advisory"
        );
        let mut file = self.open(
            path,
            OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE_ONLY,
            CompressionMode::Plain,
        )?;
        let written = file.write_encoded(data);
        let closed = file.close();
        written.and(closed)
    }

    fn remove(&self, path: &Path) -> Result<(), FsError> {
        require_path("remove", path)?;
        self.pool
            .acquire()
            .remove(path)
            .map_err(|e| FsError::io("remove", path, e))
    }

    fn remove_all(&self, path: &Path) -> Result<(), FsError> {
        require_path("remove_all", path)?;
        self.pool
            .acquire()
            .remove_all(path)
            .map_err(|e| FsError::io("remove_all", path, e))
    }

    fn makedirs(&self, path: &Path) -> Result<(), FsError> {
        require_path("makedirs", path)?;
        self.pool
            .acquire()
            .mkdir_all(path, Permissions::default_dir())
            .map_err(|e| FsError::io("makedirs", path, e))
    }
}

impl<C: RemoteClient + 'static> fmt::Debug for RemoteFs<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteFs")
            .field("config", &self.config)
            .field("pool", &self.pool)
            .finish()
    }
}

/// Reader/writer pair of one open remote file, plus the client it holds.
struct RemoteStream<C> {
    path: PathBuf,
    lease: Option<Lease<C>>,
    reader: Option<Box<dyn RemoteReader>>,
    writer: Option<Box<dyn RemoteWriter>>,
}

fn closed_stream() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "stream is closed")
}

impl<C> Read for RemoteStream<C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.as_mut().ok_or_else(closed_stream)?.read(buf)
    }
}

impl<C> Seek for RemoteStream<C> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.reader.as_mut().ok_or_else(closed_stream)?.seek(pos)
    }
}

impl<C> Write for RemoteStream<C> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.writer.as_mut() {
            Some(writer) => writer.write(buf),
            None if self.lease.is_none() => Err(closed_stream()),
            None => Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "not opened for writing",
            )),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl<C: RemoteClient> RawStream for RemoteStream<C> {
    fn close(&mut self) -> io::Result<()> {
        let mut first: Option<io::Error> = None;
        let mut record = |step: &str, result: io::Result<()>| {
            if let Err(e) = result {
                match first {
                    None => first = Some(e),
                    Some(_) => {
                        warn!(path = %self.path.display(), step, error = %e, "close error after an earlier one")
                    }
                }
            }
        };

        if let Some(writer) = self.writer.take() {
            record("writer", writer.close());
        }
        if let Some(reader) = self.reader.take() {
            record("reader", reader.close());
        }
        if let Some(lease) = self.lease.take() {
            debug!(path = %self.path.display(), slot = lease.id(), "returning client");
            lease.release();
        }
        first.map_or(Ok(()), Err)
    }
}
