//! # Local Facade
//!
//! [`LocalFs`] serves the filesystem traits from the host filesystem through
//! `std::fs`. Files are created with mode `0o664` and directories with
//! `0o775` on Unix.
//!
//! Unlike the remote facade, writes honor POSIX positioning: a write-only
//! open without `TRUNCATE` or `APPEND` overwrites from offset zero.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use glob::Pattern;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::require_path;
use crate::{
    CompressionMode, File, FileType, FsError, FsOpen, FsRead, FsWrite, Metadata, OpenFlags,
    Permissions,
};

/// Facade over the host filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl LocalFs {
    /// Create the facade.
    pub fn new() -> Self {
        Self
    }

    /// Files below `root` whose name matches any of `patterns`, sorted.
    ///
    /// Entries that cannot be read are logged and skipped.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if `root` does not exist
    /// - [`FsError::InvalidPattern`] if a pattern does not compile
    pub fn list_files(&self, root: &Path, patterns: &[&str]) -> Result<Vec<PathBuf>, FsError> {
        fs::metadata(root).map_err(|e| FsError::io("list_files", root, e))?;
        let patterns = compile_patterns(patterns)?;

        let mut matches = Vec::new();
        for entry in WalkDir::new(root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(root = %root.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if entry.file_type().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if patterns.iter().any(|p| p.matches(&name)) {
                matches.push(entry.into_path());
            }
        }
        matches.sort();
        Ok(matches)
    }

    /// Directories matching `root/<pattern>` for any of `patterns`, sorted.
    ///
    /// # Errors
    ///
    /// - [`FsError::InvalidPattern`] if a pattern does not compile
    pub fn list_dirs(&self, root: &Path, patterns: &[&str]) -> Result<Vec<PathBuf>, FsError> {
        let root = std::path::absolute(root).map_err(|e| FsError::io("list_dirs", root, e))?;
        let mut matches = Vec::new();
        let base = PathBuf::from(Pattern::escape(&root.to_string_lossy()));
        for pattern in patterns {
            let full = base.join(pattern);
            let found = self.glob(&full.to_string_lossy())?;
            matches.extend(found.into_iter().filter(|p| p.is_dir()));
        }
        matches.sort();
        Ok(matches)
    }
}

fn compile_patterns(patterns: &[&str]) -> Result<Vec<Pattern>, FsError> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| FsError::InvalidPattern {
                pattern: (*p).to_string(),
                details: e.to_string(),
            })
        })
        .collect()
}

fn convert_metadata(path: &Path, meta: &fs::Metadata) -> Metadata {
    let file_type = if meta.is_dir() {
        FileType::Directory
    } else if meta.file_type().is_symlink() {
        FileType::Symlink
    } else {
        FileType::File
    };
    Metadata {
        path: path.to_path_buf(),
        file_type,
        size: meta.len(),
        permissions: permissions_of(meta),
        modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
    }
}

#[cfg(unix)]
fn permissions_of(meta: &fs::Metadata) -> Permissions {
    use std::os::unix::fs::PermissionsExt;
    Permissions::from_mode(meta.permissions().mode())
}

#[cfg(not(unix))]
fn permissions_of(meta: &fs::Metadata) -> Permissions {
    if meta.permissions().readonly() {
        Permissions::from_mode(0o444)
    } else {
        Permissions::default_file()
    }
}

#[cfg(unix)]
fn set_create_mode(options: &mut fs::OpenOptions, permissions: Permissions) {
    use std::os::unix::fs::OpenOptionsExt;
    options.mode(permissions.mode());
}

#[cfg(not(unix))]
fn set_create_mode(_: &mut fs::OpenOptions, _: Permissions) {}

/// `OpenOptions` for `flags`. `None` when the flags carry no write access,
/// which `OpenOptions` cannot combine with create or truncate.
fn open_options(flags: OpenFlags) -> Option<fs::OpenOptions> {
    if !flags.write {
        return None;
    }
    let mut options = fs::OpenOptions::new();
    options.read(flags.read).create(flags.create);
    if flags.truncate {
        options.write(true).truncate(true);
    } else if flags.append {
        options.append(true);
    } else {
        options.write(true);
    }
    set_create_mode(&mut options, Permissions::default_file());
    Some(options)
}

impl FsOpen for LocalFs {
    fn open(
        &self,
        path: &Path,
        flags: OpenFlags,
        compression: CompressionMode,
    ) -> Result<File, FsError> {
        require_path("open", path)?;
        let file = match open_options(flags) {
            Some(options) => options.open(path),
            None => {
                if flags.create || flags.truncate {
                    // Read-only open that still creates or truncates.
                    let mut prepare = fs::OpenOptions::new();
                    prepare
                        .write(true)
                        .create(flags.create)
                        .truncate(flags.truncate);
                    set_create_mode(&mut prepare, Permissions::default_file());
                    prepare
                        .open(path)
                        .map_err(|e| FsError::io("open", path, e))?;
                }
                fs::File::open(path)
            }
        }
        .map_err(|e| FsError::io("open", path, e))?;

        debug!(path = %path.display(), ?flags, "opened local file");
        File::from_stream(
            path.to_path_buf(),
            Box::new(file),
            flags,
            compression,
            flags.readable(),
        )
    }
}

impl FsRead for LocalFs {
    fn stat(&self, path: &Path) -> Result<Option<Metadata>, FsError> {
        require_path("stat", path)?;
        match fs::metadata(path) {
            Ok(meta) => Ok(Some(convert_metadata(path, &meta))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FsError::io("stat", path, e)),
        }
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>, FsError> {
        require_path("read_file", path)?;
        fs::read(path).map_err(|e| FsError::io("read_file", path, e))
    }

    fn glob(&self, pattern: &str) -> Result<Vec<PathBuf>, FsError> {
        let paths = glob::glob(pattern).map_err(|e| FsError::InvalidPattern {
            pattern: pattern.to_string(),
            details: e.to_string(),
        })?;
        let mut matches: Vec<PathBuf> = paths
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!(pattern, error = %e, "skipping unreadable path");
                    None
                }
            })
            .collect();
        matches.sort();
        Ok(matches)
    }
}

impl FsWrite for LocalFs {
    fn write_file(
        &self,
        path: &Path,
        data: &[u8],
        permissions: Permissions,
    ) -> Result<(), FsError> {
        require_path("write_file", path)?;
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        set_create_mode(&mut options, permissions);
        let mut file = options
            .open(path)
            .map_err(|e| FsError::io("write_file", path, e))?;
        file.write_all(data)
            .and_then(|()| file.flush())
            .map_err(|e| FsError::io("write_file", path, e))
    }

    fn remove(&self, path: &Path) -> Result<(), FsError> {
        require_path("remove", path)?;
        let meta = fs::symlink_metadata(path).map_err(|e| FsError::io("remove", path, e))?;
        if meta.is_dir() {
            fs::remove_dir(path)
        } else {
            fs::remove_file(path)
        }
        .map_err(|e| FsError::io("remove", path, e))
    }

    fn remove_all(&self, path: &Path) -> Result<(), FsError> {
        require_path("remove_all", path)?;
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(FsError::io("remove_all", path, e)),
        };
        if meta.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        }
        .map_err(|e| FsError::io("remove_all", path, e))
    }

    fn makedirs(&self, path: &Path) -> Result<(), FsError> {
        require_path("makedirs", path)?;
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(Permissions::default_dir().mode());
        }
        builder
            .create(path)
            .map_err(|e| FsError::io("makedirs", path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Seek, SeekFrom};
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, name).unwrap();
        path
    }

    #[test]
    fn open_without_create_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = LocalFs
            .open(&tmp.path().join("nope"), OpenFlags::READ_ONLY, CompressionMode::Plain)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn read_only_create_makes_an_empty_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("empty");
        let mut file = LocalFs
            .open(&path, OpenFlags::READ_ONLY | OpenFlags::CREATE, CompressionMode::AutoDetect)
            .unwrap();
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).unwrap();
        assert!(buf.is_empty());
        assert_eq!(file.compression(), crate::Compression::Plain);
    }

    #[test]
    fn write_only_without_truncate_overwrites_in_place() {
        let tmp = TempDir::new().unwrap();
        let path = touch(tmp.path(), "f");
        fs::write(&path, b"abcdef").unwrap();
        let mut file = LocalFs
            .open(&path, OpenFlags::WRITE_ONLY, CompressionMode::Plain)
            .unwrap();
        file.write_all(b"XY").unwrap();
        file.close().unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"XYcdef");
    }

    #[test]
    fn truncate_wins_over_append() {
        let tmp = TempDir::new().unwrap();
        let path = touch(tmp.path(), "f");
        let mut file = LocalFs
            .open(
                &path,
                OpenFlags::TRUNCATE | OpenFlags::APPEND | OpenFlags::WRITE_ONLY,
                CompressionMode::Plain,
            )
            .unwrap();
        file.write_all(b"z").unwrap();
        file.close().unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"z");
    }

    #[cfg(unix)]
    #[test]
    fn created_files_get_default_mode() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("f");
        LocalFs
            .open(&path, OpenFlags::CREATE | OpenFlags::WRITE_ONLY, CompressionMode::Plain)
            .unwrap()
            .close()
            .unwrap();
        let mode = LocalFs.stat(&path).unwrap().unwrap().permissions.mode();
        // umask may clear bits but never adds any.
        assert_eq!(mode & !0o664, 0);
    }

    #[test]
    fn stat_missing_is_none() {
        let tmp = TempDir::new().unwrap();
        assert!(LocalFs.stat(&tmp.path().join("nope")).unwrap().is_none());
        let meta = LocalFs.stat(tmp.path()).unwrap().unwrap();
        assert!(meta.is_dir());
    }

    #[test]
    fn remove_handles_files_and_empty_dirs() {
        let tmp = TempDir::new().unwrap();
        let file = touch(tmp.path(), "f");
        let dir = tmp.path().join("d");
        fs::create_dir(&dir).unwrap();

        LocalFs.remove(&file).unwrap();
        LocalFs.remove(&dir).unwrap();
        assert!(LocalFs.remove(&file).unwrap_err().is_not_found());
    }

    #[test]
    fn remove_all_is_recursive_and_tolerates_missing() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "d/e/f");
        LocalFs.remove_all(&tmp.path().join("d")).unwrap();
        assert!(!tmp.path().join("d").exists());
        LocalFs.remove_all(&tmp.path().join("d")).unwrap();
    }

    #[test]
    fn makedirs_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("a/b/c");
        LocalFs.makedirs(&dir).unwrap();
        LocalFs.makedirs(&dir).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn glob_supports_recursive_components() {
        let tmp = TempDir::new().unwrap();
        let a = touch(tmp.path(), "a.gz");
        let c = touch(tmp.path(), "x/y/c.gz");
        touch(tmp.path(), "b.txt");

        let root = tmp.path().to_string_lossy();
        assert_eq!(LocalFs.glob(&format!("{root}/*.gz")).unwrap(), vec![a.clone()]);
        let mut expected = vec![a, c];
        expected.sort();
        assert_eq!(LocalFs.glob(&format!("{root}/**/*.gz")).unwrap(), expected);
        assert!(matches!(
            LocalFs.glob("[").unwrap_err(),
            FsError::InvalidPattern { .. }
        ));
    }

    #[test]
    fn list_files_matches_names_anywhere_below_root() {
        let tmp = TempDir::new().unwrap();
        let a = touch(tmp.path(), "2024/01/app.log");
        let b = touch(tmp.path(), "2024/app.log.gz");
        touch(tmp.path(), "2024/notes.txt");

        let found = LocalFs
            .list_files(tmp.path(), &["*.log", "*.log.gz"])
            .unwrap();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(found, expected);
        assert!(LocalFs.list_files(tmp.path(), &[]).unwrap().is_empty());
    }

    #[test]
    fn list_files_on_missing_root_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = LocalFs
            .list_files(&tmp.path().join("nope"), &["*"])
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn list_dirs_returns_only_directories() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("run-1")).unwrap();
        fs::create_dir_all(tmp.path().join("run-2")).unwrap();
        touch(tmp.path(), "run-3");

        let found = LocalFs.list_dirs(tmp.path(), &["run-*"]).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["run-1", "run-2"]);
    }

    #[test]
    fn raw_seek_passes_through() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("f");
        fs::write(&path, b"0123456789").unwrap();
        let mut file = LocalFs
            .open(&path, OpenFlags::READ_ONLY, CompressionMode::AutoDetect)
            .unwrap();
        file.seek(SeekFrom::Start(7)).unwrap();
        let mut tail = String::new();
        file.read_to_string(&mut tail).unwrap();
        assert_eq!(tail, "789");
    }

    #[test]
    fn list_dirs_treats_root_literally() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("batch[1]");
        fs::create_dir_all(root.join("run-1")).unwrap();
        fs::create_dir_all(tmp.path().join("batch1").join("run-2")).unwrap();

        let found = LocalFs.list_dirs(&root, &["run-*"]).unwrap();
        assert_eq!(found, vec![std::path::absolute(root.join("run-1")).unwrap()]);
    }

    #[test]
    fn close_releases_the_descriptor() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("f");
        fs::write(&path, b"abc").unwrap();
        let mut file = LocalFs
            .open(&path, OpenFlags::READ_ONLY, CompressionMode::Plain)
            .unwrap();
        file.close().unwrap();

        let mut buf = [0u8; 3];
        let err = file.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotConnected);
        assert_eq!(buf, [0u8; 3]);
    }
}
