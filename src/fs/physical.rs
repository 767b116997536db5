//! The production [`Filesystem`] implementation, backed by `cap-std`
//! capability handles.

use std::collections::BTreeSet;
use std::ffi::{OsStr, OsString};
use std::io;
use std::path::Path;

use cap_std::fs::{Dir, File, OpenOptions};
use rand::distr::SampleString as _;

use crate::error::{Error, Result};
use crate::fs::Filesystem;
use crate::options::Options;
use crate::path::AbsPathBuf;

/// Durable, atomic filesystem primitives backed by the real, local
/// filesystem.
///
/// Directory handles are `cap_std::fs::Dir` and file handles are
/// `cap_std::fs::File`; both release their underlying OS resource on
/// `Drop`, which is how this crate discharges the "handle released on every
/// exit path" requirement without an explicit `close()` method.
#[derive(Debug, Clone)]
pub struct PhysicalFilesystem {
    options: Options,
}

impl PhysicalFilesystem {
    /// Creates a new physical filesystem view using the given options.
    #[must_use]
    pub fn new(options: Options) -> Self {
        Self { options }
    }

    fn temp_name(&self, suffix: &str) -> String {
        format!(
            "{}{}.{suffix}",
            self.options.temp_name_prefix,
            rand::distr::Alphanumeric.sample_string(&mut rand::rng(), 12)
        )
    }

    fn open_temp_root(&self) -> io::Result<Dir> {
        Dir::open_ambient_dir(std::env::temp_dir(), cap_std::ambient_authority())
    }
}

impl Default for PhysicalFilesystem {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

/// Returns whether `err` represents an attempted rename across two
/// different mounted filesystems.
#[cfg(unix)]
fn is_cross_device(err: &io::Error) -> bool {
    err.raw_os_error() == Some(rustix::io::Errno::XDEV.raw_os_error())
}

#[cfg(not(unix))]
fn is_cross_device(_err: &io::Error) -> bool {
    false
}

impl Filesystem for PhysicalFilesystem {
    type Dir = Dir;
    type File = File;

    fn create_temp_dir(&self) -> Result<AbsPathBuf> {
        let root = std::env::temp_dir();
        let root_dir = self.open_temp_root().map_err(Error::Io)?;
        let name = self.temp_name("dir");
        root_dir.create_dir(&name).map_err(Error::Io)?;
        log::trace!("created temp dir {name}");
        AbsPathBuf::promote(root.join(name))
    }

    fn create_temp_file(&self) -> Result<AbsPathBuf> {
        let root = std::env::temp_dir();
        let root_dir = self.open_temp_root().map_err(Error::Io)?;
        let name = self.temp_name("file");
        let file = root_dir
            .open_with(&name, OpenOptions::new().write(true).create_new(true))
            .map_err(Error::Io)?;
        drop(file);
        log::trace!("created temp file {name}");
        AbsPathBuf::promote(root.join(name))
    }

    fn open_directory(&self, path: &AbsPathBuf) -> Result<Dir> {
        Dir::open_ambient_dir(path.as_path(), cap_std::ambient_authority())
            .map_err(|e| Error::from_io_for(e, path.as_path()))
    }

    fn open_file(&self, path: &AbsPathBuf) -> Result<File> {
        let (parent, name) = path.parent_and_name()?;
        let dir = self.open_directory(&parent)?;
        if let Ok(meta) = dir.symlink_metadata(name) {
            if meta.is_dir() {
                return Err(Error::IsDirectory(path.as_path().to_path_buf()));
            }
        }
        dir.open_with(
            name,
            OpenOptions::new().write(true).truncate(true).create(true),
        )
        .map_err(|e| Error::from_io_for(e, path.as_path()))
    }

    fn list(&self, path: &AbsPathBuf) -> Result<BTreeSet<OsString>> {
        let dir = self.open_directory(path)?;
        let mut names = BTreeSet::new();
        for entry in dir.entries().map_err(|e| Error::from_io_for(e, path.as_path()))? {
            let entry = entry.map_err(Error::Io)?;
            names.insert(entry.file_name());
        }
        Ok(names)
    }

    fn is_readable_directory(&self, dir: &Dir, name: &OsStr) -> Result<bool> {
        match dir.open_dir(name) {
            Ok(_child) => Ok(true),
            // Missing, not a directory, or unreadable: none of these qualify.
            Err(_) => Ok(false),
        }
    }

    fn mkdir(&self, dir: &Dir, name: &OsStr) -> Result<()> {
        dir.create_dir(name)
            .map_err(|e| Error::from_io_for(e, Path::new(name)))
    }

    fn unlink(&self, dir: &Dir, name: &OsStr) -> Result<()> {
        let meta = dir
            .symlink_metadata(name)
            .map_err(|e| Error::from_io_for(e, Path::new(name)))?;
        if meta.is_dir() {
            dir.remove_dir(name)
                .map_err(|e| Error::from_io_for(e, Path::new(name)))
        } else {
            dir.remove_file(name)
                .map_err(|e| Error::from_io_for(e, Path::new(name)))
        }
    }

    fn rename(&self, src_dir: &Dir, src_name: &OsStr, tgt_dir: &Dir, tgt_name: &OsStr) -> Result<()> {
        if let Ok(meta) = tgt_dir.symlink_metadata(tgt_name) {
            if meta.is_dir() {
                return Err(Error::IsDirectory(Path::new(tgt_name).to_path_buf()));
            }
        }
        match src_dir.rename(src_name, tgt_dir, tgt_name) {
            Ok(()) => Ok(()),
            Err(e) if is_cross_device(&e) => Err(Error::not_supported(format!(
                "cannot atomically rename across filesystems: {e}"
            ))),
            Err(e) => Err(Error::from_io_for(e, Path::new(tgt_name))),
        }
    }

    fn sync_dir(&self, dir: &Dir) -> Result<()> {
        match rustix::fs::fsync(dir) {
            Ok(()) => {
                log::debug!("synced directory");
                Ok(())
            }
            // Directory fsync is not supported on this platform/filesystem;
            // degrade to best-effort durability rather than failing callers.
            Err(rustix::io::Errno::NOSYS | rustix::io::Errno::INVAL | rustix::io::Errno::NOTSUP) => {
                log::warn!("directory fsync unsupported here, degrading to best-effort durability");
                Ok(())
            }
            Err(e) => Err(Error::Io(e.into())),
        }
    }

    fn write_file(&self, file: &mut File, bytes: &[u8]) -> Result<()> {
        use std::io::Write as _;
        file.write_all(bytes).map_err(Error::Io)
    }

    fn sync_file(&self, file: &File) -> Result<()> {
        file.sync_all().map_err(Error::Io)
    }
}
