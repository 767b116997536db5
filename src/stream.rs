//! A buffered write target whose target file only ever appears, fully
//! formed, on an explicit [`AtomicDurableOutputStream::commit`].

use crate::error::{Error, Result};
use crate::fs::Filesystem;
use crate::ops::DurableOps;
use crate::path::AbsPathBuf;

enum State<F: Filesystem> {
    Open {
        file: F::File,
        temp_path: AbsPathBuf,
    },
    Finished,
}

/// Stages writes in a temporary file on the same filesystem as the target,
/// and only makes the target observable on [`Self::commit`].
///
/// While open, the target path is never touched. If the stream is dropped
/// (or explicitly [`Self::abort`]ed) without a commit, the target path is
/// left absent and the temporary file is best-effort deleted.
pub struct AtomicDurableOutputStream<'a, F: Filesystem> {
    ops: &'a DurableOps<F>,
    target: AbsPathBuf,
    state: State<F>,
}

impl<'a, F: Filesystem> AtomicDurableOutputStream<'a, F> {
    pub(crate) fn new(ops: &'a DurableOps<F>, target: AbsPathBuf) -> Result<Self> {
        let temp_path = ops.filesystem().create_temp_file()?;
        let file = match ops.filesystem().open_file(&temp_path) {
            Ok(file) => file,
            Err(err) => {
                // Release the temp file we just allocated before propagating;
                // nothing acquired it yet, so best-effort delete is enough.
                let _ = ops.filesystem().delete_if_exists(&temp_path);
                return Err(err);
            }
        };
        log::trace!("opened atomic output stream for {target} via temp file {temp_path}");
        Ok(Self {
            ops,
            target,
            state: State::Open { file, temp_path },
        })
    }

    /// Buffers `bytes` into the temporary staging file. Has no visible
    /// effect on the target path.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        match &mut self.state {
            State::Open { file, .. } => self.ops.filesystem().write_file(file, bytes),
            State::Finished => Err(Error::argument(
                "cannot write to an already-committed or aborted output stream",
            )),
        }
    }

    /// Flushes and fsyncs the staged bytes, then atomically renames the
    /// staging file into place at the target path.
    ///
    /// May be called at most once. After this returns successfully, the
    /// target path durably contains exactly the bytes written before the
    /// call.
    pub fn commit(mut self) -> Result<()> {
        let (file, temp_path) = match std::mem::replace(&mut self.state, State::Finished) {
            State::Open { file, temp_path } => (file, temp_path),
            State::Finished => {
                return Err(Error::argument("output stream has already been finished"));
            }
        };
        self.ops.filesystem().sync_file(&file)?;
        drop(file);
        self.ops
            .move_without_promising_source_deletion(&temp_path, &self.target)?;
        log::debug!("committed atomic output stream to {}", self.target);
        Ok(())
    }

    /// Explicitly aborts the stream, releasing the staging file handle and
    /// best-effort deleting the staging file. Equivalent to dropping the
    /// stream, except that cleanup failures are returned instead of only
    /// being logged.
    pub fn abort(mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, State::Finished) {
            State::Open { file, temp_path } => {
                drop(file);
                self.ops.filesystem().delete_if_exists(&temp_path)
            }
            State::Finished => Ok(()),
        }
    }
}

impl<'a, F: Filesystem> Drop for AtomicDurableOutputStream<'a, F> {
    fn drop(&mut self) {
        if let State::Open { file, temp_path } = std::mem::replace(&mut self.state, State::Finished) {
            drop(file);
            if let Err(err) = self.ops.filesystem().delete_if_exists(&temp_path) {
                log::warn!("failed to clean up abandoned temp file {temp_path}: {err}");
            }
        }
    }
}
