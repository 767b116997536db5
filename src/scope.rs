//! A scoped directory handle whose commit makes durable everything written
//! to that directory since the scope was opened.

use crate::error::{Error, Result};
use crate::fs::Filesystem;
use crate::path::AbsPathBuf;

/// A directory handle opened up front, so that a later `commit()` is known
/// to cover every modification made to the directory after construction —
/// the "handle-before-modify" discipline the rest of this crate also
/// depends on internally.
///
/// Useful for callers who perform several ad hoc writes into a directory
/// (outside of [`crate::ops::DurableOps`]'s own operations) and want a
/// single durability checkpoint at the end, rather than fsyncing after each
/// one.
pub struct DirectoryModificationScope<'a, F: Filesystem> {
    fs: &'a F,
    handle: Option<F::Dir>,
}

impl<'a, F: Filesystem> DirectoryModificationScope<'a, F> {
    pub(crate) fn new(fs: &'a F, dir: &AbsPathBuf) -> Result<Self> {
        let handle = fs.open_directory(dir)?;
        Ok(Self {
            fs,
            handle: Some(handle),
        })
    }

    /// Makes durable every change made to this scope's directory since it
    /// was opened.
    ///
    /// Fails with [`Error::ScopeClosed`] if [`Self::close`] has already been
    /// called.
    pub fn commit(&self) -> Result<()> {
        let handle = self.handle.as_ref().ok_or(Error::ScopeClosed)?;
        self.fs.sync_dir(handle)
    }

    /// Releases the retained directory handle. Idempotent; further calls to
    /// [`Self::commit`] after this fail with [`Error::ScopeClosed`].
    pub fn close(&mut self) {
        self.handle = None;
    }
}
