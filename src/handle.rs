//! # Unified File Handle
//!
//! [`File`] is what every facade's `open` returns: a raw byte stream (a local
//! file descriptor, or a remote reader/writer pair holding a pooled client)
//! plus the compression resolved at open time.
//!
//! ```text
//! open ──▶ raw stream ──▶ resolve compression (probe + rewind) ──▶ File
//!                                                                 │
//!            reader(n) ──▶ decoded BufRead        writer(n) ◀────┤
//!                                                                 ▼
//!                                  close ──▶ writer, reader, lease (once)
//! ```
//!
//! `File` also implements [`Read`], [`Write`] and [`Seek`] directly on the raw
//! bytes, bypassing compression.

use std::fmt;
use std::io::{self, BufRead, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::compression::{self, EncodedWriter};
use crate::{Compression, CompressionMode, FsError, OpenFlags};

/// Byte stream underneath a [`File`].
///
/// Implemented for [`std::fs::File`] and for the remote backend's
/// reader/writer pair.
pub trait RawStream: Read + Write + Seek + Send {
    /// Release everything the stream holds. Called at most once.
    fn close(&mut self) -> io::Result<()>;
}

impl RawStream for std::fs::File {
    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }
}

/// An open file on any backend.
///
/// Compression is resolved before the handle is returned and never changes.
/// Closing releases the stream and is idempotent; dropping an unclosed handle
/// closes it best-effort.
pub struct File {
    path: PathBuf,
    stream: Option<Box<dyn RawStream>>,
    flags: OpenFlags,
    compression: Compression,
}

impl File {
    /// Wrap an opened stream, resolving `mode` against it.
    ///
    /// `readable` tells whether the stream may be probed. On failure the
    /// stream is closed before the error is returned.
    pub fn from_stream(
        path: PathBuf,
        mut stream: Box<dyn RawStream>,
        flags: OpenFlags,
        mode: CompressionMode,
        readable: bool,
    ) -> Result<Self, FsError> {
        match compression::resolve(&mut *stream, mode, &path, readable) {
            Ok(compression) => Ok(Self {
                path,
                stream: Some(stream),
                flags,
                compression,
            }),
            Err(e) => {
                if let Err(close_err) = stream.close() {
                    warn!(path = %path.display(), error = %close_err, "close after failed open");
                }
                Err(FsError::io("open", &path, e))
            }
        }
    }

    /// Logical path this handle was opened with.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flags this handle was opened with.
    pub fn flags(&self) -> OpenFlags {
        self.flags
    }

    /// Compression resolved at open time.
    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Whether [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    /// Buffered reader over the decoded content, starting at the current
    /// position. A `buffer_size` of `0` selects the default.
    ///
    /// Scan lines with [`BufRead::lines`].
    ///
    /// # Errors
    ///
    /// - [`FsError::InvalidArgument`] if the handle is closed
    /// - [`FsError::InvalidData`] if the handle is compressed but the content
    ///   does not start with a gzip header
    pub fn reader(&mut self, buffer_size: usize) -> Result<Box<dyn BufRead + Send + '_>, FsError> {
        let path = &self.path;
        let stream = open_stream(&mut self.stream, path, "read")?;
        compression::decoded_reader(stream, self.compression, buffer_size).map_err(|e| {
            if e.kind() == io::ErrorKind::InvalidData {
                FsError::InvalidData {
                    path: path.clone(),
                    details: e.to_string(),
                }
            } else {
                FsError::io("read", path, e)
            }
        })
    }

    /// Buffered writer that encodes with the resolved compression. Call
    /// [`EncodedWriter::finish`] before [`close`](Self::close) to write the
    /// gzip trailer.
    ///
    /// # Errors
    ///
    /// - [`FsError::InvalidArgument`] if the handle is closed
    /// - [`FsError::PermissionDenied`] if the handle was not opened for writing
    pub fn writer(&mut self, buffer_size: usize) -> Result<EncodedWriter<&mut dyn RawStream>, FsError> {
        let stream = open_stream(&mut self.stream, &self.path, "write")?;
        if !self.flags.wants_writer() {
            return Err(FsError::PermissionDenied {
                path: self.path.clone(),
                operation: "write",
            });
        }
        Ok(EncodedWriter::new(stream, self.compression, buffer_size))
    }

    /// Encode `data` through a fresh writer and finish it.
    pub(crate) fn write_encoded(&mut self, data: &[u8]) -> Result<(), FsError> {
        let path = self.path.clone();
        let mut writer = self.writer(0)?;
        writer
            .write_all(data)
            .map_err(|e| FsError::io("write", &path, e))?;
        writer
            .finish()
            .map_err(|e| FsError::io("write", &path, e))?;
        Ok(())
    }

    /// Close the write side, then the read side, then give back any pooled
    /// client. The stream is dropped, so a local descriptor is released here.
    /// Later calls are no-ops.
    ///
    /// # Errors
    ///
    /// The first error raised while closing; resources are released anyway.
    pub fn close(&mut self) -> Result<(), FsError> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        stream
            .close()
            .map_err(|e| FsError::io("close", &self.path, e))
    }

    fn raw(&mut self) -> io::Result<&mut dyn RawStream> {
        match self.stream.as_mut() {
            Some(stream) => {
                let stream: &mut dyn RawStream = &mut **stream;
                Ok(stream)
            }
            None => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "handle is closed",
            )),
        }
    }
}

fn open_stream<'a>(
    stream: &'a mut Option<Box<dyn RawStream>>,
    path: &Path,
    operation: &'static str,
) -> Result<&'a mut dyn RawStream, FsError> {
    match stream.as_mut() {
        Some(stream) => {
            let stream: &mut dyn RawStream = &mut **stream;
            Ok(stream)
        }
        None => Err(FsError::InvalidArgument {
            operation,
            details: format!("handle for {} is closed", path.display()),
        }),
    }
}

impl Read for File {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.raw()?.read(buf)
    }
}

impl Write for File {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.raw()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.raw()?.flush()
    }
}

impl Seek for File {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.raw()?.seek(pos)
    }
}

impl Drop for File {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(path = %self.path.display(), error = %e, "implicit close failed");
        }
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("File")
            .field("path", &self.path)
            .field("flags", &self.flags)
            .field("compression", &self.compression)
            .field("closed", &self.is_closed())
            .finish()
    }
}
