//! # Compression Multiplexing
//!
//! Decides whether a byte stream is gzip and wraps it accordingly.
//!
//! ## Resolution
//!
//! ```text
//! Compressed / Plain ──────────────────────────▶ trusted, no I/O
//! AutoDetect + "*.gz" ─────────────────────────▶ Compressed, no I/O
//! AutoDetect + readable ──▶ probe header ──▶ rewind ──▶ Compressed | Plain
//! AutoDetect + write-only ─────────────────────▶ Plain, no I/O
//! ```
//!
//! Resolution runs once, at open time. The result is stored on the handle and
//! never changes afterwards.
//!
//! ## Wrapping
//!
//! Writers buffer above the encoder, so `flush` drains the buffer into the
//! encoder before the encoder emits a sync-flushed block. [`EncodedWriter::finish`]
//! writes the gzip trailer and hands the raw stream back; closing the raw
//! stream stays with the caller.

use std::io::{self, BufRead, BufReader, BufWriter, IntoInnerError, Read, Seek, SeekFrom, Write};
use std::path::Path;

use flate2::read::{GzDecoder, MultiGzDecoder};
use flate2::write::GzEncoder;
use tracing::debug;

use crate::{COMPRESSED_SUFFIX, Compression, CompressionMode, DEFAULT_BUFFER_SIZE};

/// Buffer size actually used for a request; `0` means [`DEFAULT_BUFFER_SIZE`].
#[inline]
pub fn buffer_capacity(requested: usize) -> usize {
    if requested == 0 {
        DEFAULT_BUFFER_SIZE
    } else {
        requested
    }
}

/// Whether `path` carries the compressed-file suffix.
///
/// Matches on the file name, so a dotfile named `.gz` counts.
pub fn has_compressed_suffix(path: &Path) -> bool {
    path.file_name().is_some_and(|name| {
        name.as_encoded_bytes()
            .strip_suffix(COMPRESSED_SUFFIX.as_bytes())
            .is_some_and(|stem| stem.ends_with(b"."))
    })
}

/// Resolve the compression of `stream`.
///
/// Explicit modes are trusted unconditionally. For
/// [`CompressionMode::AutoDetect`] the path suffix is consulted first; only
/// then, and only if `readable`, the stream is probed for a gzip header and
/// rewound to its start.
///
/// # Errors
///
/// Only the rewind after a probe can fail.
pub fn resolve<S>(
    stream: &mut S,
    mode: CompressionMode,
    path: &Path,
    readable: bool,
) -> io::Result<Compression>
where
    S: Read + Seek + ?Sized,
{
    match mode {
        CompressionMode::Compressed => return Ok(Compression::Compressed),
        CompressionMode::Plain => return Ok(Compression::Plain),
        CompressionMode::AutoDetect => {}
    }

    if has_compressed_suffix(path) {
        return Ok(Compression::Compressed);
    }
    if !readable {
        return Ok(Compression::Plain);
    }

    let compression = if probe_gzip(&mut *stream) {
        Compression::Compressed
    } else {
        Compression::Plain
    };
    stream.seek(SeekFrom::Start(0))?;
    debug!(path = %path.display(), ?compression, "probed compression");
    Ok(compression)
}

/// Try to open a gzip frame on `reader`. Consumes an unspecified amount of
/// input.
fn probe_gzip<R: Read + ?Sized>(reader: &mut R) -> bool {
    GzDecoder::new(reader).header().is_some()
}

/// Wrap `inner` in a buffered reader that yields decoded content.
///
/// # Errors
///
/// `InvalidData` if `compression` is [`Compression::Compressed`] and no gzip
/// frame can be opened at the current position.
pub fn decoded_reader<'a, R>(
    inner: R,
    compression: Compression,
    buffer_size: usize,
) -> io::Result<Box<dyn BufRead + Send + 'a>>
where
    R: Read + Send + 'a,
{
    let capacity = buffer_capacity(buffer_size);
    match compression {
        Compression::Compressed => {
            let decoder = MultiGzDecoder::new(inner);
            if decoder.header().is_none() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "stream does not start with a gzip header",
                ));
            }
            Ok(Box::new(BufReader::with_capacity(capacity, decoder)))
        }
        Compression::Plain => Ok(Box::new(BufReader::with_capacity(capacity, inner))),
    }
}

/// Buffered writer that encodes according to a resolved [`Compression`].
pub enum EncodedWriter<W: Write> {
    /// Buffer, then gzip, then `W`.
    Gzip(BufWriter<GzEncoder<W>>),
    /// Buffer, then `W`.
    Plain(BufWriter<W>),
}

impl<W: Write> EncodedWriter<W> {
    /// Wrap `inner`. A `buffer_size` of `0` selects [`DEFAULT_BUFFER_SIZE`].
    pub fn new(inner: W, compression: Compression, buffer_size: usize) -> Self {
        let capacity = buffer_capacity(buffer_size);
        match compression {
            Compression::Compressed => EncodedWriter::Gzip(BufWriter::with_capacity(
                capacity,
                GzEncoder::new(inner, flate2::Compression::default()),
            )),
            Compression::Plain => EncodedWriter::Plain(BufWriter::with_capacity(capacity, inner)),
        }
    }

    /// Compression this writer encodes with.
    pub fn compression(&self) -> Compression {
        match self {
            EncodedWriter::Gzip(_) => Compression::Compressed,
            EncodedWriter::Plain(_) => Compression::Plain,
        }
    }

    /// Flush everything, write the gzip trailer if any, and return the raw
    /// stream. The raw stream is flushed but not closed.
    pub fn finish(self) -> io::Result<W> {
        let mut inner = match self {
            EncodedWriter::Gzip(buffered) => buffered
                .into_inner()
                .map_err(IntoInnerError::into_error)?
                .finish()?,
            EncodedWriter::Plain(buffered) => {
                buffered.into_inner().map_err(IntoInnerError::into_error)?
            }
        };
        inner.flush()?;
        Ok(inner)
    }
}

impl<W: Write> Write for EncodedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            EncodedWriter::Gzip(w) => w.write(buf),
            EncodedWriter::Plain(w) => w.write(buf),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            EncodedWriter::Gzip(w) => w.write_all(buf),
            EncodedWriter::Plain(w) => w.write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            EncodedWriter::Gzip(w) => w.flush(),
            EncodedWriter::Plain(w) => w.flush(),
        }
    }
}
