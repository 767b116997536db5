//! The error taxonomy this crate surfaces, by semantic kind rather than by
//! underlying OS error code.
//!
//! Every durable operation fails with one of these variants. Callers are
//! expected to match on `kind`-level semantics (already exists, not found,
//! ...), not on formatted messages.

use std::io;
use std::path::PathBuf;

/// The crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while performing a durable filesystem
/// operation.
///
/// Variants correspond 1:1 to the error taxonomy described in the
/// specification this crate implements: argument errors, not-found,
/// already-exists, not-empty, is-directory, not-supported, scope-closed, and
/// a catch-all I/O error for everything else.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A path had no parent or no file name where one was required, or was
    /// otherwise malformed for the operation attempted.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// An entry that the operation expected to exist was missing.
    #[error("not found: {0}")]
    NotFound(PathBuf),

    /// `mkdir` raced with another creator of a non-directory entry of the
    /// same name.
    #[error("already exists: {0}")]
    AlreadyExists(PathBuf),

    /// `unlink` was attempted on a non-empty directory.
    #[error("not empty: {0}")]
    NotEmpty(PathBuf),

    /// A move's target is a directory (empty or not) and cannot be
    /// overwritten by the source.
    #[error("is a directory: {0}")]
    IsDirectory(PathBuf),

    /// The requested operation is not supported by the platform or would
    /// cross a filesystem boundary (e.g. an atomic rename between two
    /// different mounted filesystems).
    #[error("not supported: {0}")]
    NotSupported(String),

    /// `commit` was called on a `DirectoryModificationScope` that was
    /// already closed.
    #[error("directory modification scope is already closed")]
    ScopeClosed,

    /// Any other I/O failure from the underlying filesystem.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn argument(msg: impl Into<String>) -> Self {
        Error::Argument(msg.into())
    }

    pub(crate) fn not_supported(msg: impl Into<String>) -> Self {
        Error::NotSupported(msg.into())
    }

    /// Classifies a raw I/O error coming back from a single-entry operation
    /// (`unlink`, `mkdir`, ...) against the taxonomy above, given the path it
    /// was attempted against.
    pub(crate) fn from_io_for(err: io::Error, path: &std::path::Path) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
            io::ErrorKind::AlreadyExists => Error::AlreadyExists(path.to_path_buf()),
            io::ErrorKind::DirectoryNotEmpty => Error::NotEmpty(path.to_path_buf()),
            _ => Error::Io(err),
        }
    }
}
