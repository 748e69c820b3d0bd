//! # Open-Mode Emulation
//!
//! The remote backend can stat, remove, create an empty file, open a reader
//! and open an append-only writer. Nothing else. This module turns POSIX-style
//! [`OpenFlags`] into a sequence of those calls with the same observable
//! result:
//!
//! ```text
//! stat ──▶ remove (truncate) ──▶ create empty ──▶ open reader ──▶ open appender
//!  │            │                      │               │               │
//!  └ NotFound   └ only when existing   └ when missing  └ always        └ when writing
//!    = missing    and truncating         or truncated
//! ```
//!
//! Truncation is a delete followed by an empty create. Every writer appends,
//! so a read-write open without truncation writes after the existing content.

use std::io;
use std::path::Path;

use tracing::{debug, warn};

use crate::remote::{RemoteClient, RemoteReader, RemoteWriter};
use crate::{FsError, OpenFlags};

/// Backend actions required by one open call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenPlan {
    /// The path existed when it was stat'ed.
    pub existed: bool,
    /// Remove the existing file first.
    pub must_truncate: bool,
    /// Create an empty file before opening.
    pub must_create: bool,
    /// Open an append writer after the reader.
    pub open_writer: bool,
}

impl OpenPlan {
    /// Evaluate `flags` against whether the path exists.
    pub fn new(existed: bool, flags: OpenFlags) -> Self {
        let must_truncate =
            existed && (flags.truncate || (flags.is_write_only() && !flags.append));
        let must_create = must_truncate || (!existed && flags.create);
        Self {
            existed,
            must_truncate,
            must_create,
            open_writer: flags.wants_writer(),
        }
    }

    /// No file will exist to open: missing and not created.
    pub fn is_missing(&self) -> bool {
        !self.existed && !self.must_create
    }
}

/// Streams produced by [`perform_open`].
pub struct OpenedStreams {
    /// Read side, positioned at offset zero.
    pub reader: Box<dyn RemoteReader>,
    /// Append-only write side, when writing was requested.
    pub writer: Option<Box<dyn RemoteWriter>>,
}

/// Stat `path` and plan the open.
///
/// # Errors
///
/// Any stat failure other than not-found.
pub fn reconcile<C>(client: &mut C, path: &Path, flags: OpenFlags) -> Result<OpenPlan, FsError>
where
    C: RemoteClient + ?Sized,
{
    let existed = match client.stat(path) {
        Ok(_) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => return Err(FsError::io("stat", path, e)),
    };
    let plan = OpenPlan::new(existed, flags);
    debug!(path = %path.display(), existed, ?plan, "reconciled open flags");
    Ok(plan)
}

/// Run the backend calls that open `path` with `flags`.
///
/// Nothing is retried. A failure after the reader was opened closes the
/// reader before returning. A file that appears between the stat and the
/// create is opened as found, unless the open truncates.
///
/// # Errors
///
/// - [`FsError::NotFound`] if the path is missing and `CREATE` is not set
/// - [`FsError::InconsistentState`] if the reader cannot be opened on a path
///   that exists or was just created
/// - the classified backend error of any other failing step
pub fn perform_open<C>(
    client: &mut C,
    path: &Path,
    flags: OpenFlags,
) -> Result<OpenedStreams, FsError>
where
    C: RemoteClient + ?Sized,
{
    let plan = reconcile(client, path, flags)?;
    if plan.is_missing() {
        return Err(FsError::NotFound {
            path: path.to_path_buf(),
        });
    }

    if plan.must_truncate {
        debug!(path = %path.display(), "truncating by remove");
        client
            .remove(path)
            .map_err(|e| FsError::io("truncate", path, e))?;
    }

    if plan.must_create {
        debug!(path = %path.display(), "creating empty file");
        match client.create_empty_file(path) {
            Ok(()) => {}
            // Another writer created it after our stat; open what is there.
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && !plan.must_truncate => {
                debug!(path = %path.display(), "created concurrently, opening existing file");
            }
            Err(e) => return Err(FsError::io("create", path, e)),
        }
    }

    debug!(path = %path.display(), "opening reader");
    let reader = client
        .open(path)
        .map_err(|e| open_after_exists_error(path, e))?;

    let writer = if plan.open_writer {
        debug!(path = %path.display(), "opening appender");
        match client.append(path) {
            Ok(writer) => Some(writer),
            Err(e) => {
                if let Err(close_err) = reader.close() {
                    warn!(path = %path.display(), error = %close_err, "closing reader after failed append");
                }
                return Err(FsError::io("append", path, e));
            }
        }
    } else {
        None
    };

    Ok(OpenedStreams { reader, writer })
}

/// Classify a reader failure on a path that is known to exist.
fn open_after_exists_error(path: &Path, e: io::Error) -> FsError {
    match FsError::io("open", path, e) {
        err @ (FsError::BackendUnavailable { .. } | FsError::PermissionDenied { .. }) => err,
        other => FsError::InconsistentState {
            path: path.to_path_buf(),
            details: format!("reader open failed after existence was established: {other}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MemoryBackend, MemoryClient};
    use crate::{FileType, Metadata, Permissions};
    use std::io::{Cursor, Write};
    use std::path::PathBuf;

    impl RemoteReader for Cursor<Vec<u8>> {}

    struct Sink;

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl RemoteWriter for Sink {
        fn close(self: Box<Self>) -> io::Result<()> {
            Ok(())
        }
    }

    /// Records every backend call and fails on demand.
    #[derive(Default)]
    struct Scripted {
        exists: bool,
        stat_error: Option<io::ErrorKind>,
        open_error: Option<io::ErrorKind>,
        append_error: Option<io::ErrorKind>,
        create_error: Option<io::ErrorKind>,
        calls: Vec<&'static str>,
    }

    impl RemoteClient for Scripted {
        fn stat(&mut self, path: &Path) -> io::Result<Metadata> {
            self.calls.push("stat");
            if let Some(kind) = self.stat_error {
                return Err(io::Error::new(kind, "stat"));
            }
            if !self.exists {
                return Err(io::ErrorKind::NotFound.into());
            }
            Ok(Metadata {
                path: path.to_path_buf(),
                file_type: FileType::File,
                ..Default::default()
            })
        }

        fn open(&mut self, _: &Path) -> io::Result<Box<dyn RemoteReader>> {
            self.calls.push("open");
            match self.open_error {
                Some(kind) => Err(io::Error::new(kind, "open")),
                None => Ok(Box::new(Cursor::new(Vec::new()))),
            }
        }

        fn append(&mut self, _: &Path) -> io::Result<Box<dyn RemoteWriter>> {
            self.calls.push("append");
            match self.append_error {
                Some(kind) => Err(io::Error::new(kind, "append")),
                None => Ok(Box::new(Sink)),
            }
        }

        fn create_empty_file(&mut self, _: &Path) -> io::Result<()> {
            self.calls.push("create");
            if let Some(kind) = self.create_error {
                return Err(io::Error::new(kind, "create"));
            }
            self.exists = true;
            Ok(())
        }

        fn remove(&mut self, _: &Path) -> io::Result<()> {
            self.calls.push("remove");
            self.exists = false;
            Ok(())
        }

        fn remove_all(&mut self, _: &Path) -> io::Result<()> {
            unreachable!()
        }

        fn mkdir_all(&mut self, _: &Path, _: Permissions) -> io::Result<()> {
            unreachable!()
        }

        fn read_dir(&mut self, _: &Path) -> io::Result<Vec<Metadata>> {
            unreachable!()
        }
    }

    fn path() -> PathBuf {
        PathBuf::from("/data/f")
    }

    #[test]
    fn plan_truth_table() {
        let cases = [
            // existed, flags, truncate, create
            (false, OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE_ONLY, false, true),
            (true, OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE_ONLY, true, true),
            (true, OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::READ_WRITE, true, true),
            (true, OpenFlags::WRITE_ONLY, true, true),
            (true, OpenFlags::APPEND | OpenFlags::WRITE_ONLY, false, false),
            (true, OpenFlags::APPEND | OpenFlags::READ_WRITE, false, false),
            (true, OpenFlags::READ_WRITE, false, false),
            (true, OpenFlags::READ_ONLY, false, false),
            (false, OpenFlags::CREATE | OpenFlags::APPEND | OpenFlags::READ_WRITE, false, true),
            (false, OpenFlags::READ_ONLY, false, false),
        ];
        for (existed, flags, truncate, create) in cases {
            let plan = OpenPlan::new(existed, flags);
            assert_eq!(plan.must_truncate, truncate, "truncate for {flags:?} existed={existed}");
            assert_eq!(plan.must_create, create, "create for {flags:?} existed={existed}");
            assert_eq!(plan.open_writer, flags.write);
        }
    }

    #[test]
    fn missing_without_create_is_not_found() {
        let mut client = Scripted::default();
        let err = perform_open(&mut client, &path(), OpenFlags::READ_ONLY)
            .err()
            .unwrap();
        assert!(err.is_not_found());
        assert_eq!(client.calls, vec!["stat"]);
    }

    #[test]
    fn create_truncate_on_missing_creates_then_opens_both_sides() {
        let mut client = Scripted::default();
        let streams = perform_open(
            &mut client,
            &path(),
            OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE_ONLY,
        )
        .unwrap();
        assert!(streams.writer.is_some());
        assert_eq!(client.calls, vec!["stat", "create", "open", "append"]);
    }

    #[test]
    fn truncate_on_existing_removes_then_recreates() {
        let mut client = Scripted {
            exists: true,
            ..Default::default()
        };
        perform_open(
            &mut client,
            &path(),
            OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::READ_WRITE,
        )
        .unwrap();
        assert_eq!(client.calls, vec!["stat", "remove", "create", "open", "append"]);
    }

    #[test]
    fn append_on_existing_touches_nothing() {
        let mut client = Scripted {
            exists: true,
            ..Default::default()
        };
        perform_open(&mut client, &path(), OpenFlags::APPEND | OpenFlags::READ_WRITE).unwrap();
        assert_eq!(client.calls, vec!["stat", "open", "append"]);
    }

    #[test]
    fn read_only_opens_no_writer() {
        let mut client = Scripted {
            exists: true,
            ..Default::default()
        };
        let streams = perform_open(&mut client, &path(), OpenFlags::READ_ONLY).unwrap();
        assert!(streams.writer.is_none());
        assert_eq!(client.calls, vec!["stat", "open"]);
    }

    #[test]
    fn stat_errors_other_than_not_found_surface() {
        let mut client = Scripted {
            stat_error: Some(io::ErrorKind::ConnectionReset),
            ..Default::default()
        };
        let err = perform_open(&mut client, &path(), OpenFlags::READ_ONLY)
            .err()
            .unwrap();
        assert!(matches!(err, FsError::BackendUnavailable { operation: "stat", .. }));
    }

    #[test]
    fn reader_failure_after_create_is_inconsistent() {
        let mut client = Scripted {
            open_error: Some(io::ErrorKind::NotFound),
            ..Default::default()
        };
        let err = perform_open(&mut client, &path(), OpenFlags::CREATE | OpenFlags::WRITE_ONLY)
            .err()
            .unwrap();
        assert!(matches!(err, FsError::InconsistentState { .. }));
        assert_eq!(client.calls, vec!["stat", "create", "open"]);
    }

    #[test]
    fn reader_permission_failure_stays_permission_denied() {
        let mut client = Scripted {
            exists: true,
            open_error: Some(io::ErrorKind::PermissionDenied),
            ..Default::default()
        };
        let err = perform_open(&mut client, &path(), OpenFlags::READ_ONLY)
            .err()
            .unwrap();
        assert!(matches!(err, FsError::PermissionDenied { .. }));
    }

    #[test]
    fn append_failure_is_reported() {
        let mut client = Scripted {
            exists: true,
            append_error: Some(io::ErrorKind::PermissionDenied),
            ..Default::default()
        };
        let err = perform_open(&mut client, &path(), OpenFlags::APPEND | OpenFlags::WRITE_ONLY)
            .err()
            .unwrap();
        assert!(matches!(err, FsError::PermissionDenied { operation: "append", .. }));
    }

    #[test]
    fn create_racing_another_writer_opens_existing() {
        let mut client = Scripted {
            create_error: Some(io::ErrorKind::AlreadyExists),
            ..Default::default()
        };
        let streams = perform_open(
            &mut client,
            &path(),
            OpenFlags::CREATE | OpenFlags::APPEND | OpenFlags::WRITE_ONLY,
        )
        .unwrap();
        assert!(streams.writer.is_some());
        assert_eq!(client.calls, vec!["stat", "create", "open", "append"]);
    }

    #[test]
    fn create_conflict_while_truncating_is_an_error() {
        let mut client = Scripted {
            exists: true,
            create_error: Some(io::ErrorKind::AlreadyExists),
            ..Default::default()
        };
        let err = perform_open(&mut client, &path(), OpenFlags::WRITE_ONLY)
            .err()
            .unwrap();
        assert!(matches!(err, FsError::Io { operation: "create", .. }));
        assert_eq!(client.calls, vec!["stat", "remove", "create"]);
    }

    /// Memory client whose stat lets a second client create the path first.
    struct Racing {
        inner: MemoryClient,
        rival: MemoryClient,
    }

    impl RemoteClient for Racing {
        fn stat(&mut self, path: &Path) -> io::Result<Metadata> {
            let result = self.inner.stat(path);
            self.rival.create_empty_file(path)?;
            self.rival.append(path)?.write_all(b"rival ")?;
            result
        }

        fn open(&mut self, path: &Path) -> io::Result<Box<dyn RemoteReader>> {
            self.inner.open(path)
        }

        fn append(&mut self, path: &Path) -> io::Result<Box<dyn RemoteWriter>> {
            self.inner.append(path)
        }

        fn create_empty_file(&mut self, path: &Path) -> io::Result<()> {
            self.inner.create_empty_file(path)
        }

        fn remove(&mut self, path: &Path) -> io::Result<()> {
            self.inner.remove(path)
        }

        fn remove_all(&mut self, path: &Path) -> io::Result<()> {
            self.inner.remove_all(path)
        }

        fn mkdir_all(&mut self, path: &Path, permissions: Permissions) -> io::Result<()> {
            self.inner.mkdir_all(path, permissions)
        }

        fn read_dir(&mut self, path: &Path) -> io::Result<Vec<Metadata>> {
            self.inner.read_dir(path)
        }
    }

    #[test]
    fn concurrent_create_appends_after_rival_content() {
        let backend = MemoryBackend::new();
        let mut client = Racing {
            inner: backend.connect("mem").unwrap(),
            rival: backend.connect("mem").unwrap(),
        };
        let streams = perform_open(
            &mut client,
            Path::new("/log"),
            OpenFlags::CREATE | OpenFlags::APPEND | OpenFlags::WRITE_ONLY,
        )
        .unwrap();
        let mut writer = streams.writer.unwrap();
        writer.write_all(b"mine").unwrap();
        writer.close().unwrap();
        streams.reader.close().unwrap();
        assert_eq!(backend.contents("/log").unwrap(), b"rival mine");
    }
}
