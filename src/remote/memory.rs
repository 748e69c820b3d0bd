//! In-process append-only backend.
//!
//! [`MemoryBackend`] is a shared store; each [`MemoryClient`] is one
//! "connection" to it. It follows the remote filesystem's rules rather than
//! POSIX ones: files grow only by appending, creating a file requires its
//! parent directory, and directories exist only once `mkdir_all` made them.
//!
//! Test hooks: paths can be marked read-only, live connections are counted
//! and connection attempts can be made to fail.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;

use super::{RemoteClient, RemoteReader, RemoteWriter};
use crate::{FileType, Metadata, Permissions};

/// Shared in-memory store. Cloning shares it.
#[derive(Clone)]
pub struct MemoryBackend {
    store: Arc<Mutex<Store>>,
}

struct Store {
    files: BTreeMap<PathBuf, Entry>,
    dirs: BTreeMap<PathBuf, Permissions>,
    readonly: BTreeSet<PathBuf>,
    live_connections: usize,
    connect_budget: Option<usize>,
}

struct Entry {
    data: Vec<u8>,
    modified: SystemTime,
}

impl Store {
    fn is_readonly(&self, path: &Path) -> bool {
        self.readonly.iter().any(|ro| path.starts_with(ro))
    }

    fn check_writable(&self, path: &Path) -> io::Result<()> {
        if self.is_readonly(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} is read-only", path.display()),
            ));
        }
        Ok(())
    }

    fn file(&self, path: &Path) -> io::Result<&Entry> {
        self.files.get(path).ok_or_else(|| not_found(path))
    }

    fn file_mut(&mut self, path: &Path) -> io::Result<&mut Entry> {
        self.files.get_mut(path).ok_or_else(|| not_found(path))
    }

    fn has_children(&self, dir: &Path) -> bool {
        self.files.keys().any(|p| p.parent() == Some(dir))
            || self.dirs.keys().any(|p| p.parent() == Some(dir))
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{}: no such file or directory", path.display()),
    )
}

impl MemoryBackend {
    /// An empty store holding only the root directory `/`.
    pub fn new() -> Self {
        let mut dirs = BTreeMap::new();
        dirs.insert(PathBuf::from("/"), Permissions::default_dir());
        Self {
            store: Arc::new(Mutex::new(Store {
                files: BTreeMap::new(),
                dirs,
                readonly: BTreeSet::new(),
                live_connections: 0,
                connect_budget: None,
            })),
        }
    }

    /// Open a connection.
    ///
    /// # Errors
    ///
    /// [`io::ErrorKind::ConnectionRefused`] once the budget set by
    /// [`fail_connections_after`](Self::fail_connections_after) is spent.
    pub fn connect(&self, address: &str) -> io::Result<MemoryClient> {
        let mut store = self.store.lock();
        if let Some(budget) = store.connect_budget.as_mut() {
            if *budget == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    format!("{address}: connection refused"),
                ));
            }
            *budget -= 1;
        }
        store.live_connections += 1;
        Ok(MemoryClient {
            store: Arc::clone(&self.store),
        })
    }

    /// Allow `n` more successful connections, then refuse.
    pub fn fail_connections_after(&self, n: usize) {
        self.store.lock().connect_budget = Some(n);
    }

    /// Number of clients currently alive.
    pub fn live_connections(&self) -> usize {
        self.store.lock().live_connections
    }

    /// Deny every mutation of `path` and anything below it.
    pub fn set_readonly(&self, path: impl Into<PathBuf>) {
        self.store.lock().readonly.insert(path.into());
    }

    /// Current bytes of a file, if it exists.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.store
            .lock()
            .files
            .get(path.as_ref())
            .map(|entry| entry.data.clone())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// One connection to a [`MemoryBackend`].
pub struct MemoryClient {
    store: Arc<Mutex<Store>>,
}

impl Drop for MemoryClient {
    fn drop(&mut self) {
        self.store.lock().live_connections -= 1;
    }
}

impl RemoteClient for MemoryClient {
    fn stat(&mut self, path: &Path) -> io::Result<Metadata> {
        let store = self.store.lock();
        if let Some(entry) = store.files.get(path) {
            return Ok(Metadata {
                path: path.to_path_buf(),
                file_type: FileType::File,
                size: entry.data.len() as u64,
                permissions: Permissions::default_file(),
                modified: entry.modified,
            });
        }
        if let Some(permissions) = store.dirs.get(path) {
            return Ok(Metadata {
                path: path.to_path_buf(),
                file_type: FileType::Directory,
                size: 0,
                permissions: *permissions,
                modified: SystemTime::UNIX_EPOCH,
            });
        }
        Err(not_found(path))
    }

    fn open(&mut self, path: &Path) -> io::Result<Box<dyn RemoteReader>> {
        let store = self.store.lock();
        if store.dirs.contains_key(path) {
            return Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("{} is a directory", path.display()),
            ));
        }
        store.file(path)?;
        Ok(Box::new(MemoryReader {
            store: Arc::clone(&self.store),
            path: path.to_path_buf(),
            pos: 0,
        }))
    }

    fn append(&mut self, path: &Path) -> io::Result<Box<dyn RemoteWriter>> {
        let store = self.store.lock();
        store.check_writable(path)?;
        store.file(path)?;
        Ok(Box::new(MemoryWriter {
            store: Arc::clone(&self.store),
            path: path.to_path_buf(),
        }))
    }

    fn create_empty_file(&mut self, path: &Path) -> io::Result<()> {
        let mut store = self.store.lock();
        store.check_writable(path)?;
        if store.files.contains_key(path) || store.dirs.contains_key(path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", path.display()),
            ));
        }
        match path.parent() {
            Some(parent) if store.dirs.contains_key(parent) => {}
            _ => return Err(not_found(path)),
        }
        store.files.insert(
            path.to_path_buf(),
            Entry {
                data: Vec::new(),
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn remove(&mut self, path: &Path) -> io::Result<()> {
        let mut store = self.store.lock();
        store.check_writable(path)?;
        if store.files.remove(path).is_some() {
            return Ok(());
        }
        if !store.dirs.contains_key(path) {
            return Err(not_found(path));
        }
        if store.has_children(path) {
            return Err(io::Error::new(
                io::ErrorKind::DirectoryNotEmpty,
                format!("{} is not empty", path.display()),
            ));
        }
        store.dirs.remove(path);
        Ok(())
    }

    fn remove_all(&mut self, path: &Path) -> io::Result<()> {
        let mut store = self.store.lock();
        store.check_writable(path)?;
        store.files.retain(|p, _| !p.starts_with(path));
        store.dirs.retain(|p, _| !p.starts_with(path) || p == Path::new("/"));
        Ok(())
    }

    fn mkdir_all(&mut self, path: &Path, permissions: Permissions) -> io::Result<()> {
        let mut store = self.store.lock();
        let missing: Vec<PathBuf> = path
            .ancestors()
            .filter(|dir| !dir.as_os_str().is_empty())
            .take_while(|dir| !store.dirs.contains_key(*dir))
            .map(Path::to_path_buf)
            .collect();
        for dir in &missing {
            if store.files.contains_key(dir) {
                return Err(io::Error::new(
                    io::ErrorKind::NotADirectory,
                    format!("{} is a file", dir.display()),
                ));
            }
            store.check_writable(dir)?;
        }
        for dir in missing {
            store.dirs.insert(dir, permissions);
        }
        Ok(())
    }

    fn read_dir(&mut self, path: &Path) -> io::Result<Vec<Metadata>> {
        let store = self.store.lock();
        if store.files.contains_key(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("{} is a file", path.display()),
            ));
        }
        if !store.dirs.contains_key(path) {
            return Err(not_found(path));
        }
        let files = store
            .files
            .iter()
            .filter(|(p, _)| p.parent() == Some(path))
            .map(|(p, entry)| Metadata {
                path: p.clone(),
                file_type: FileType::File,
                size: entry.data.len() as u64,
                permissions: Permissions::default_file(),
                modified: entry.modified,
            });
        let dirs = store
            .dirs
            .iter()
            .filter(|(p, _)| p.parent() == Some(path))
            .map(|(p, permissions)| Metadata {
                path: p.clone(),
                file_type: FileType::Directory,
                permissions: *permissions,
                ..Default::default()
            });
        Ok(dirs.chain(files).collect())
    }
}

/// Live view of a file: reads see bytes appended after the open.
struct MemoryReader {
    store: Arc<Mutex<Store>>,
    path: PathBuf,
    pos: u64,
}

impl Read for MemoryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let store = self.store.lock();
        let data = &store.file(&self.path)?.data;
        let start = usize::try_from(self.pos).unwrap_or(usize::MAX).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for MemoryReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = self.store.lock().file(&self.path)?.data.len() as u64;
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        match target {
            Some(offset) => {
                self.pos = offset;
                Ok(offset)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of file",
            )),
        }
    }
}

impl RemoteReader for MemoryReader {}

/// Appends each write to the file as it arrives.
struct MemoryWriter {
    store: Arc<Mutex<Store>>,
    path: PathBuf,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut store = self.store.lock();
        let entry = store.file_mut(&self.path)?;
        entry.data.extend_from_slice(buf);
        entry.modified = SystemTime::now();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl RemoteWriter for MemoryWriter {
    fn close(self: Box<Self>) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> (MemoryBackend, MemoryClient) {
        let backend = MemoryBackend::new();
        let client = backend.connect("mem:0").unwrap();
        (backend, client)
    }

    #[test]
    fn create_requires_parent_directory() {
        let (_, mut client) = client();
        let err = client.create_empty_file(Path::new("/a/b")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);

        client.mkdir_all(Path::new("/a"), Permissions::default_dir()).unwrap();
        client.create_empty_file(Path::new("/a/b")).unwrap();
        assert_eq!(client.stat(Path::new("/a/b")).unwrap().size, 0);
    }

    #[test]
    fn create_on_existing_is_already_exists() {
        let (_, mut client) = client();
        client.create_empty_file(Path::new("/f")).unwrap();
        let err = client.create_empty_file(Path::new("/f")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
    }

    #[test]
    fn appends_are_visible_to_open_readers() {
        let (backend, mut client) = client();
        client.create_empty_file(Path::new("/f")).unwrap();
        let mut reader = client.open(Path::new("/f")).unwrap();
        let mut writer = client.append(Path::new("/f")).unwrap();
        writer.write_all(b"abc").unwrap();
        writer.write_all(b"def").unwrap();

        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "abcdef");
        assert_eq!(backend.contents("/f").unwrap(), b"abcdef");

        reader.seek(SeekFrom::Start(3)).unwrap();
        let mut tail = String::new();
        reader.read_to_string(&mut tail).unwrap();
        assert_eq!(tail, "def");
    }

    #[test]
    fn readonly_paths_refuse_mutation() {
        let (backend, mut client) = client();
        client.mkdir_all(Path::new("/locked"), Permissions::default_dir()).unwrap();
        backend.set_readonly("/locked");

        let err = client.create_empty_file(Path::new("/locked/f")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        let err = client.remove(Path::new("/locked")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn remove_refuses_non_empty_directory() {
        let (_, mut client) = client();
        client.mkdir_all(Path::new("/d"), Permissions::default_dir()).unwrap();
        client.create_empty_file(Path::new("/d/f")).unwrap();
        let err = client.remove(Path::new("/d")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::DirectoryNotEmpty);

        client.remove_all(Path::new("/d")).unwrap();
        assert_eq!(client.stat(Path::new("/d")).unwrap_err().kind(), io::ErrorKind::NotFound);
        client.remove_all(Path::new("/d")).unwrap();
    }

    #[test]
    fn mkdir_all_through_a_file_fails() {
        let (_, mut client) = client();
        client.create_empty_file(Path::new("/f")).unwrap();
        let err = client
            .mkdir_all(Path::new("/f/sub"), Permissions::default_dir())
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotADirectory);
    }

    #[test]
    fn read_dir_lists_direct_children() {
        let (_, mut client) = client();
        client.mkdir_all(Path::new("/d/inner"), Permissions::default_dir()).unwrap();
        client.create_empty_file(Path::new("/d/f")).unwrap();
        client.create_empty_file(Path::new("/d/inner/g")).unwrap();

        let mut names: Vec<_> = client
            .read_dir(Path::new("/d"))
            .unwrap()
            .into_iter()
            .map(|m| m.path)
            .collect();
        names.sort();
        assert_eq!(names, vec![PathBuf::from("/d/f"), PathBuf::from("/d/inner")]);
    }

    #[test]
    fn connections_are_counted_and_can_be_refused() {
        let backend = MemoryBackend::new();
        backend.fail_connections_after(1);
        let first = backend.connect("mem:0").unwrap();
        assert_eq!(backend.live_connections(), 1);
        let err = backend.connect("mem:0").err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionRefused);
        drop(first);
        assert_eq!(backend.live_connections(), 0);
    }
}
