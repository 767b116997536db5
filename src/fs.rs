//! The abstract filesystem capability the rest of this crate is built on.
//!
//! [`Filesystem`] is the seam the crash-safety algorithms in [`crate::ops`]
//! are written against. It is intentionally narrow: every method maps to a
//! single syscall-ish primitive (open, mkdir, unlink, rename, the two kinds
//! of sync), and no method provides any durability on its own — durability
//! is composed by the layer above out of these primitives.
//!
//! Two implementations ship with this crate: [`physical::PhysicalFilesystem`]
//! for production use, and (behind the `testing` feature)
//! [`crate::testing::model::ModelFilesystem`], which simulates independent
//! durable/volatile state per inode so crash outcomes can be exhaustively
//! explored without an actual power failure.

pub mod physical;

use std::collections::BTreeSet;
use std::ffi::OsStr;

use crate::error::Result;
use crate::path::AbsPathBuf;

/// A capability set implementations must provide for the durable-operations
/// layer to build on.
///
/// No operation here is required to be durable by itself; `sync_dir` and
/// `sync_file` are the only operations that make prior changes durable, and
/// only for changes that happened through a handle opened before those
/// changes were made (see the "handle-before-modify" discipline documented
/// on [`crate::ops::DurableOps`]).
pub trait Filesystem {
    /// An open reference to a directory, bound to the inode it was opened
    /// against (not to the path used to open it).
    type Dir;
    /// An open reference to a regular file, opened for writing.
    type File;

    /// Allocates a fresh, empty directory in the system's default temporary
    /// area and returns its absolute path.
    fn create_temp_dir(&self) -> Result<AbsPathBuf>;

    /// Allocates a fresh, empty regular file in the system's default
    /// temporary area and returns its absolute path.
    fn create_temp_file(&self) -> Result<AbsPathBuf>;

    /// Opens `path` as a directory handle.
    fn open_directory(&self, path: &AbsPathBuf) -> Result<Self::Dir>;

    /// Opens `path` as a file handle for writing, truncating any existing
    /// contents.
    fn open_file(&self, path: &AbsPathBuf) -> Result<Self::File>;

    /// Lists the names of the entries directly inside the directory at
    /// `path`.
    fn list(&self, path: &AbsPathBuf) -> Result<BTreeSet<std::ffi::OsString>>;

    /// Reports whether `name` is an entry of `dir` that is itself a
    /// directory that can be opened for reading.
    fn is_readable_directory(&self, dir: &Self::Dir, name: &OsStr) -> Result<bool>;

    /// Creates a new, empty directory named `name` inside `dir`.
    ///
    /// Fails with [`crate::error::Error::AlreadyExists`] if `name` is
    /// already taken by a non-directory entry.
    fn mkdir(&self, dir: &Self::Dir, name: &OsStr) -> Result<()>;

    /// Removes the entry named `name` from `dir`.
    ///
    /// Fails with [`crate::error::Error::NotEmpty`] if `name` refers to a
    /// non-empty directory.
    fn unlink(&self, dir: &Self::Dir, name: &OsStr) -> Result<()>;

    /// Atomically renames `src_name` inside `src_dir` to `tgt_name` inside
    /// `tgt_dir`.
    ///
    /// Fails with [`crate::error::Error::NotSupported`] if `src_dir` and
    /// `tgt_dir` are on different filesystems, and with
    /// [`crate::error::Error::IsDirectory`] if the target names a directory
    /// (empty or not). Otherwise a pre-existing target file is replaced
    /// atomically.
    fn rename(
        &self,
        src_dir: &Self::Dir,
        src_name: &OsStr,
        tgt_dir: &Self::Dir,
        tgt_name: &OsStr,
    ) -> Result<()>;

    /// Makes durable every change made to `dir`'s contents since the handle
    /// was opened.
    fn sync_dir(&self, dir: &Self::Dir) -> Result<()>;

    /// Appends `bytes` to the file referenced by `file`.
    fn write_file(&self, file: &mut Self::File, bytes: &[u8]) -> Result<()>;

    /// Makes durable every byte written through `file` since it was opened.
    fn sync_file(&self, file: &Self::File) -> Result<()>;

    /// Removes `path` if it exists, as a single file or an empty directory;
    /// does nothing if it does not exist.
    ///
    /// The default implementation opens the parent directory and calls
    /// [`Self::unlink`]. Test implementations may override this to simulate
    /// partial failures during best-effort cleanup.
    fn delete_if_exists(&self, path: &AbsPathBuf) -> Result<()> {
        let (parent, name) = path.parent_and_name()?;
        let dir = self.open_directory(&parent)?;
        match self.unlink(&dir, name) {
            Ok(()) => Ok(()),
            Err(crate::error::Error::NotFound(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Atomically renames `src` to `tgt`, opening both parent directories
    /// first.
    ///
    /// The default implementation is the one-shot building block
    /// [`crate::ops::DurableOps::move_without_promising_source_deletion`]
    /// is built from; it provides no durability guarantee of its own (no
    /// sync is issued), only atomicity.
    fn move_atomically(&self, src: &AbsPathBuf, tgt: &AbsPathBuf) -> Result<()> {
        let (src_parent, src_name) = src.parent_and_name()?;
        let (tgt_parent, tgt_name) = tgt.parent_and_name()?;
        let src_dir = self.open_directory(&src_parent)?;
        let tgt_dir = self.open_directory(&tgt_parent)?;
        self.rename(&src_dir, src_name, &tgt_dir, tgt_name)
    }
}
