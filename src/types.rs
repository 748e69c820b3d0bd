//! Core types shared by the local and remote facades.

use std::ops::{BitOr, BitOrAssign};
use std::path::PathBuf;
use std::time::SystemTime;

/// Buffer size used when a caller passes `0` to a reader or writer.
///
/// Sized for large sequential transfers.
pub const DEFAULT_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Number of remote clients a pool holds unless configured otherwise.
pub const DEFAULT_POOL_SIZE: usize = 16;

/// Path extension that marks a file as gzip-compressed under
/// [`CompressionMode::AutoDetect`].
pub const COMPRESSED_SUFFIX: &str = "gz";

/// Type of a filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link.
    Symlink,
}

/// Metadata returned by `stat`.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Metadata {
    /// Path the metadata was read for.
    pub path: PathBuf,
    /// Type of the entry.
    pub file_type: FileType,
    /// Size in bytes.
    pub size: u64,
    /// Permissions.
    pub permissions: Permissions,
    /// Last modification time.
    #[cfg_attr(feature = "serde", serde(with = "system_time_serde"))]
    pub modified: SystemTime,
}

impl Metadata {
    /// Returns `true` if this is a regular file.
    #[inline]
    pub fn is_file(&self) -> bool {
        self.file_type == FileType::File
    }

    /// Returns `true` if this is a directory.
    #[inline]
    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }

    /// File name component, if any.
    pub fn name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            file_type: FileType::File,
            size: 0,
            permissions: Permissions::default_file(),
            modified: SystemTime::UNIX_EPOCH,
        }
    }
}

/// Unix-style permissions stored as a mode bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Permissions(u32);

impl Permissions {
    /// Create permissions from a Unix mode (e.g., 0o755).
    #[inline]
    pub const fn from_mode(mode: u32) -> Self {
        Self(mode & 0o7777)
    }

    /// Get the raw mode value.
    #[inline]
    pub const fn mode(&self) -> u32 {
        self.0
    }

    /// Returns `true` if these permissions deny writing.
    #[inline]
    pub const fn readonly(&self) -> bool {
        (self.0 & 0o222) == 0
    }

    /// Mode used for files created by `open` (0o664 = rw-rw-r--).
    #[inline]
    pub const fn default_file() -> Self {
        Self(0o664)
    }

    /// Mode used for directories created by `makedirs` (0o775 = rwxrwxr-x).
    #[inline]
    pub const fn default_dir() -> Self {
        Self(0o775)
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::default_file()
    }
}

/// POSIX-style open flags.
///
/// Flags are interpreted jointly; combine the constants with `|`:
///
/// ```rust
/// use unifile::OpenFlags;
///
/// let flags = OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE_ONLY;
/// assert!(flags.create && flags.truncate && flags.write);
/// assert!(flags.is_write_only());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OpenFlags {
    /// Open for reading.
    pub read: bool,
    /// Open for writing.
    pub write: bool,
    /// Create file if it doesn't exist.
    pub create: bool,
    /// Truncate file to zero length.
    pub truncate: bool,
    /// Append to end of file.
    pub append: bool,
}

impl OpenFlags {
    /// No flags set.
    pub const NONE: Self = Self {
        read: false,
        write: false,
        create: false,
        truncate: false,
        append: false,
    };

    /// Read-only access.
    pub const READ_ONLY: Self = Self {
        read: true,
        ..Self::NONE
    };

    /// Write-only access.
    pub const WRITE_ONLY: Self = Self {
        write: true,
        ..Self::NONE
    };

    /// Read and write access.
    pub const READ_WRITE: Self = Self {
        read: true,
        write: true,
        ..Self::NONE
    };

    /// Create the file if it does not exist.
    pub const CREATE: Self = Self {
        create: true,
        ..Self::NONE
    };

    /// Truncate an existing file.
    pub const TRUNCATE: Self = Self {
        truncate: true,
        ..Self::NONE
    };

    /// Writes go to the end of the file.
    pub const APPEND: Self = Self {
        append: true,
        ..Self::NONE
    };

    /// Returns `true` if every flag set in `other` is also set in `self`.
    pub const fn contains(&self, other: Self) -> bool {
        (!other.read || self.read)
            && (!other.write || self.write)
            && (!other.create || self.create)
            && (!other.truncate || self.truncate)
            && (!other.append || self.append)
    }

    /// Write access without read access.
    #[inline]
    pub const fn is_write_only(&self) -> bool {
        self.write && !self.read
    }

    /// Read access, explicit or implied. As with `O_RDONLY == 0`, flags that
    /// request neither read nor write mean read-only.
    #[inline]
    pub const fn readable(&self) -> bool {
        self.read || !self.write
    }

    /// Whether the open must produce a write stream.
    #[inline]
    pub const fn wants_writer(&self) -> bool {
        self.write
    }
}

impl BitOr for OpenFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self {
            read: self.read || rhs.read,
            write: self.write || rhs.write,
            create: self.create || rhs.create,
            truncate: self.truncate || rhs.truncate,
            append: self.append || rhs.append,
        }
    }
}

impl BitOrAssign for OpenFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}

/// Compression declared by the caller at open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CompressionMode {
    /// Treat the bytes as gzip, no probing.
    Compressed,
    /// Treat the bytes as plain, no probing.
    Plain,
    /// Infer from the path suffix, then from the content.
    #[default]
    AutoDetect,
}

/// Compression of an open handle, resolved once at open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Compression {
    /// gzip framed.
    Compressed,
    /// Passed through untouched.
    Plain,
}

impl Compression {
    /// Returns `true` for [`Compression::Compressed`].
    #[inline]
    pub const fn is_compressed(&self) -> bool {
        matches!(self, Compression::Compressed)
    }
}

/// Serde support for SystemTime (when serde feature is enabled).
#[cfg(feature = "serde")]
mod system_time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let duration = time.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
        (duration.as_secs(), duration.subsec_nanos()).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (secs, nanos): (u64, u32) = Deserialize::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + Duration::new(secs, nanos))
    }
}
