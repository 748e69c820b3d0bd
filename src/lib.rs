//! # unifile
//!
//! Uniform file handles over a **local filesystem** and an **append-only
//! remote filesystem**, with transparent gzip.
//!
//! Callers open files with familiar POSIX-style flags and a compression mode;
//! every facade returns the same [`File`] handle, which streams correctly
//! whether the bytes underneath are gzip or not.
//!
//! ---
//!
//! ## Quick Start
//!
//! ```rust
//! use unifile::{CompressionMode, FsExt, FsOpen, LocalFs, OpenFlags};
//! use std::io::{BufRead, Write};
//!
//! let dir = std::env::temp_dir().join(format!("unifile-doc-{}", std::process::id()));
//! std::fs::create_dir_all(&dir)?;
//! let path = dir.join("events.log.gz");
//!
//! // `.gz` suffix: gzip is chosen without looking at the content.
//! let mut file = LocalFs.create(&path)?;
//! let mut writer = file.writer(0)?;
//! writer.write_all(b"first\nsecond\n")?;
//! writer.finish()?;
//! file.close()?;
//!
//! let mut file = LocalFs.open(&path, OpenFlags::READ_ONLY, CompressionMode::AutoDetect)?;
//! let lines: Vec<String> = file.reader(0)?.lines().collect::<Result<_, _>>()?;
//! assert_eq!(lines, ["first", "second"]);
//! file.close()?;
//! # std::fs::remove_dir_all(&dir)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ---
//!
//! ## Core Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`FileSystem`] | Capability set: [`FsOpen`] + [`FsRead`] + [`FsWrite`] |
//! | [`LocalFs`] | Facade over `std::fs` |
//! | [`RemoteFs`] | Facade over a pooled, append-only [`RemoteClient`](remote::RemoteClient) |
//! | [`File`] | Open handle: raw stream + resolved [`Compression`] |
//! | [`ClientPool`] | Bounded pool of exclusively leased clients |
//! | [`FsError`] | Error type with path and operation context |
//!
//! ---
//!
//! ## Open Flags on the Remote Backend
//!
//! The remote backend can only create, remove, read and append. Flags are
//! emulated:
//!
//! | Flags | Existing file | Missing file |
//! |-------|---------------|--------------|
//! | `READ_ONLY` | read | `NotFound` |
//! | `CREATE \| TRUNCATE \| WRITE_ONLY` | remove, create empty | create empty |
//! | `WRITE_ONLY` | remove, create empty | `NotFound` |
//! | `APPEND \| READ_WRITE` | append after content | `NotFound` |
//! | `CREATE \| APPEND \| READ_WRITE` | append after content | create empty |
//!
//! Every remote write handle appends. Overwriting bytes in the middle of a
//! remote file is not supported.
//!
//! ---
//!
//! ## Error Handling
//!
//! All operations return `Result<T, FsError>`. Errors include context:
//!
//! ```rust
//! use unifile::FsError;
//! use std::path::PathBuf;
//!
//! let err = FsError::NotFound { path: PathBuf::from("/missing.txt") };
//! assert_eq!(err.to_string(), "not found: /missing.txt");
//!
//! let err = FsError::PermissionDenied {
//!     path: PathBuf::from("/secret"),
//!     operation: "open",
//! };
//! assert_eq!(err.to_string(), "open: permission denied: /secret");
//! ```
//!
//! ---
//!
//! ## Thread Safety
//!
//! Facades are `Send + Sync` and take `&self`. Share one behind an `Arc`; the
//! remote facade's pool is the only point where callers block.
//!
//! ---
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `serde` | Serialization for [`Metadata`], [`RemoteConfig`], [`OpenFlags`], etc., plus `FsExtJson` |

pub mod compression;
pub mod remote;

mod config;
mod error;
mod ext;
mod handle;
mod local;
mod mode;
mod pool;
mod traits;
mod types;

// Public re-exports - error types
pub use error::FsError;

// Public re-exports - core types
pub use types::{
    COMPRESSED_SUFFIX, Compression, CompressionMode, DEFAULT_BUFFER_SIZE, DEFAULT_POOL_SIZE,
    FileType, Metadata, OpenFlags, Permissions,
};

// Public re-exports - traits
pub use traits::{FileSystem, FsOpen, FsRead, FsWrite};

// Public re-exports - handles and facades
pub use compression::EncodedWriter;
pub use config::RemoteConfig;
pub use handle::{File, RawStream};
pub use local::LocalFs;
pub use mode::{OpenPlan, OpenedStreams, perform_open, reconcile};
pub use pool::{ClientPool, Lease};
pub use remote::RemoteFs;

// Public re-exports - infrastructure
pub use ext::FsExt;

// Conditional re-exports
#[cfg(feature = "serde")]
pub use ext::FsExtJson;
