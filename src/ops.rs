//! Durable filesystem algorithms built out of [`crate::fs::Filesystem`]
//! primitives.
//!
//! Every algorithm here follows the same "handle-before-modify" discipline:
//! open the directory handle(s) involved, perform the modification(s), sync
//! the handle(s), then let them drop. A `sync_dir` call only makes durable
//! the changes made to a directory after the handle being synced was opened,
//! so getting this ordering right is the whole game.

use std::ffi::OsString;
use std::io::Read;

use crate::error::{Error, Result};
use crate::fs::Filesystem;
use crate::options::Options;
use crate::path::AbsPathBuf;
use crate::scope::DirectoryModificationScope;
use crate::stream::AtomicDurableOutputStream;

/// The crash-safe operations facade, generic over a [`Filesystem`]
/// implementation.
///
/// This is the main entry point of the crate. Construct one with
/// [`DurableOps::new`] over [`crate::fs::physical::PhysicalFilesystem`] for
/// production use, or over
/// [`crate::testing::model::ModelFilesystem`] (behind the `testing`
/// feature) to exercise these algorithms against simulated crashes.
pub struct DurableOps<F: Filesystem> {
    fs: F,
    options: Options,
}

impl<F: Filesystem> DurableOps<F> {
    /// Builds a facade over `fs` using [`Options::default`].
    pub fn new(fs: F) -> Self {
        Self::with_options(fs, Options::default())
    }

    /// Builds a facade over `fs` using the given `options`.
    pub fn with_options(fs: F, options: Options) -> Self {
        Self { fs, options }
    }

    /// Borrows the underlying filesystem capability.
    pub fn filesystem(&self) -> &F {
        &self.fs
    }

    /// Durably creates `path` and every missing ancestor directory.
    ///
    /// Each missing directory is created and synced before moving on to its
    /// child, so a crash partway through this call leaves a durable prefix
    /// of the path created, never a gap.
    pub fn create_directories(&self, path: &AbsPathBuf) -> Result<()> {
        let mut current = path.root();
        for name in path.name_components() {
            let parent_dir = self.fs.open_directory(&current)?;
            if !self.fs.is_readable_directory(&parent_dir, name)? {
                match self.fs.mkdir(&parent_dir, name) {
                    Ok(()) => {}
                    // Another racing creator already made it a directory.
                    Err(Error::AlreadyExists(_))
                        if self.fs.is_readable_directory(&parent_dir, name)? => {}
                    Err(err) => return Err(err),
                }
            }
            // Sync unconditionally, whether or not this component already
            // existed: a pre-existing ancestor may itself carry unsynced
            // changes from elsewhere, and this is the only opportunity this
            // call has to make them durable before depending on them.
            self.fs.sync_dir(&parent_dir)?;
            current = current.resolve(name);
        }
        log::debug!("durably created directory path {path}");
        Ok(())
    }

    /// Atomically and durably moves `src` to `tgt`.
    ///
    /// After this returns, a crash can never reveal a state other than
    /// "unmoved" or "moved": `tgt` durably holds the old contents of `src`,
    /// and `src` is durably gone.
    pub fn move_(&self, src: &AbsPathBuf, tgt: &AbsPathBuf) -> Result<()> {
        self.move_impl(src, tgt, true)
    }

    /// Atomically and durably moves `src` to `tgt`, without promising that a
    /// crash cannot later reveal `src` reappearing alongside `tgt`.
    ///
    /// Used internally by [`AtomicDurableOutputStream::commit`], where the
    /// source is a temporary staging file nobody else references, so its
    /// durable disappearance is not load-bearing — only `tgt`'s durable
    /// appearance is. Also exposed to callers who have the same shape of
    /// problem with a source they don't need to durably vanish.
    pub fn move_without_promising_source_deletion(
        &self,
        src: &AbsPathBuf,
        tgt: &AbsPathBuf,
    ) -> Result<()> {
        self.move_impl(src, tgt, false)
    }

    fn move_impl(&self, src: &AbsPathBuf, tgt: &AbsPathBuf, sync_source: bool) -> Result<()> {
        let (src_parent, src_name) = src.parent_and_name()?;
        let (tgt_parent, tgt_name) = tgt.parent_and_name()?;
        let src_dir = self.fs.open_directory(&src_parent)?;
        let same_dir = src_parent == tgt_parent;
        let tgt_dir = if same_dir {
            None
        } else {
            Some(self.fs.open_directory(&tgt_parent)?)
        };

        self.fs
            .rename(&src_dir, src_name, tgt_dir.as_ref().unwrap_or(&src_dir), tgt_name)?;

        self.fs.sync_dir(tgt_dir.as_ref().unwrap_or(&src_dir))?;
        if sync_source && !same_dir {
            self.fs.sync_dir(&src_dir)?;
        }
        log::debug!("durably moved {src} to {tgt}");
        Ok(())
    }

    /// Atomically and durably removes the file or directory subtree at
    /// `path`.
    ///
    /// A plain file or already-empty directory is unlinked directly. A
    /// non-empty directory is instead renamed out of the way to a hidden
    /// sibling name, and that rename is made durable before any recursive
    /// cleanup begins, so the deletion is observable and durable from the
    /// caller's point of view the instant this call returns — even though
    /// reclaiming the disk space of a large subtree may still be in
    /// progress.
    pub fn atomically_delete(&self, path: &AbsPathBuf) -> Result<()> {
        let (parent, name) = path.parent_and_name()?;
        let parent_dir = match self.fs.open_directory(&parent) {
            Ok(dir) => dir,
            Err(Error::NotFound(_)) => return Ok(()),
            Err(err) => return Err(err),
        };

        match self.fs.unlink(&parent_dir, name) {
            Ok(()) => {
                self.fs.sync_dir(&parent_dir)?;
                log::debug!("durably removed {path}");
                return Ok(());
            }
            Err(Error::NotFound(_)) => return Ok(()),
            Err(Error::NotEmpty(_)) => {}
            Err(err) => return Err(err),
        }

        let temp_name = self.temp_entry_name();
        match self.fs.rename(&parent_dir, name, &parent_dir, &temp_name) {
            Ok(()) => {}
            Err(Error::NotFound(_)) => return Ok(()),
            Err(err) => return Err(err),
        }
        self.fs.sync_dir(&parent_dir)?;
        log::debug!("durably removed {path}; reclaiming staged copy");

        let temp_path = parent.resolve(&temp_name);
        self.delete_subtree_best_effort(&temp_path);
        if let Err(err) = self.fs.unlink(&parent_dir, &temp_name) {
            log::warn!("failed to reclaim emptied staging directory {temp_path}: {err}");
        }
        Ok(())
    }

    fn delete_subtree_best_effort(&self, path: &AbsPathBuf) {
        let entries = match self.fs.list(path) {
            Ok(entries) => entries,
            Err(err) => {
                log::warn!("failed to list {path} while reclaiming a deleted subtree: {err}");
                return;
            }
        };
        let dir = match self.fs.open_directory(path) {
            Ok(dir) => dir,
            Err(err) => {
                log::warn!("failed to open {path} while reclaiming a deleted subtree: {err}");
                return;
            }
        };
        for name in entries {
            let child = path.resolve(&name);
            if matches!(self.fs.is_readable_directory(&dir, &name), Ok(true)) {
                self.delete_subtree_best_effort(&child);
            }
            if let Err(err) = self.fs.unlink(&dir, &name) {
                log::warn!("failed to reclaim {child} while reclaiming a deleted subtree: {err}");
            }
        }
    }

    fn temp_entry_name(&self) -> OsString {
        use rand::distr::SampleString as _;
        let suffix = rand::distr::Alphanumeric.sample_string(&mut rand::rng(), 12);
        OsString::from(format!("{}{suffix}.deleted", self.options.temp_name_prefix))
    }

    /// Atomically and durably writes `bytes` to `path`, replacing any
    /// existing contents and creating any missing intermediate directories.
    ///
    /// After this returns, `path` durably holds exactly `bytes`; a crash
    /// either before or after this call can never leave it partially
    /// written. Intermediate directories are created via
    /// [`Self::create_directories`] — each is individually durable, but they
    /// are not created as a single atomic group.
    pub fn write(&self, path: &AbsPathBuf, bytes: &[u8]) -> Result<()> {
        let mut stream = self.open_output(path)?;
        stream.write(bytes)?;
        self.create_directories(&parent_of(path)?)?;
        stream.commit()?;
        log::debug!("durably wrote {} bytes to {path}", bytes.len());
        Ok(())
    }

    /// Like [`Self::write`], but copies from `reader` in
    /// [`Options::chunk_size`]-sized chunks instead of requiring the whole
    /// payload up front.
    pub fn write_stream(&self, path: &AbsPathBuf, reader: &mut dyn Read) -> Result<()> {
        let mut stream = self.open_output(path)?;
        let mut buf = vec![0u8; self.options.chunk_size];
        loop {
            let n = reader.read(&mut buf).map_err(Error::Io)?;
            if n == 0 {
                break;
            }
            stream.write(&buf[..n])?;
        }
        self.create_directories(&parent_of(path)?)?;
        stream.commit()
    }

    /// Opens an [`AtomicDurableOutputStream`] targeting `path`.
    ///
    /// Nothing is written to `path` until the returned stream is committed;
    /// dropping or aborting it without committing leaves `path` untouched.
    pub fn open_output(&self, path: &AbsPathBuf) -> Result<AtomicDurableOutputStream<'_, F>> {
        AtomicDurableOutputStream::new(self, path.clone())
    }

    /// Opens a [`DirectoryModificationScope`] over `dir`, for callers that
    /// want to batch several ad hoc modifications under one durability
    /// checkpoint.
    pub fn open_scope(&self, dir: &AbsPathBuf) -> Result<DirectoryModificationScope<'_, F>> {
        DirectoryModificationScope::new(&self.fs, dir)
    }
}

/// `path`'s parent, or an argument error if `path` is a filesystem root.
fn parent_of(path: &AbsPathBuf) -> Result<AbsPathBuf> {
    path.parent()
        .ok_or_else(|| Error::argument(format!("path has no parent: {path}")))
}
