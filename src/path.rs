//! An absolute, lexically-normalized path type.
//!
//! Callers of this crate may pass relative paths anywhere a `Path` is
//! accepted; every public entry point promotes its input to an
//! [`AbsPathBuf`] before doing anything else. Promotion resolves relative
//! paths against the process's current directory and strips `.`/`..`
//! components lexically (no filesystem access, no symlink resolution — this
//! is not `canonicalize`).

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// An absolute path, guaranteed to contain no `.` or `..` components.
///
/// Mirrors the borrowed/owned split of `Path`/`PathBuf`: most call sites hold
/// an [`AbsPathBuf`] and borrow `&AbsPath` (via `Deref`) when passing it
/// around.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AbsPathBuf(PathBuf);

impl AbsPathBuf {
    /// Promotes `path` to absolute, normalized form.
    ///
    /// Relative paths are resolved against [`std::env::current_dir`].
    /// Fails only if `path` is empty or the current directory cannot be
    /// read.
    pub fn promote(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(Error::argument("path must not be empty"));
        }
        let base = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(Error::Io)?
                .join(path)
        };
        Ok(Self(normalize(&base)))
    }

    /// The topmost absolute prefix of this path (e.g. `/` on Unix).
    #[must_use]
    pub fn root(&self) -> Self {
        let mut root = PathBuf::new();
        for component in self.0.components() {
            match component {
                Component::Prefix(_) | Component::RootDir => root.push(component.as_os_str()),
                _ => break,
            }
        }
        Self(root)
    }

    /// The ordered sequence of normal (non-root) path components, from the
    /// root to the leaf.
    #[must_use]
    pub fn name_components(&self) -> Vec<&OsStr> {
        self.0
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    /// The parent of this path, or `None` if this path is already a root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.0.parent().map(|p| Self(p.to_path_buf()))
    }

    /// The final component of this path, or `None` if this path is a root.
    #[must_use]
    pub fn file_name(&self) -> Option<&OsStr> {
        self.0.file_name()
    }

    /// Both [`Self::parent`] and [`Self::file_name`], or an argument error if
    /// either is absent (i.e. this path is a filesystem root).
    pub fn parent_and_name(&self) -> Result<(Self, &OsStr)> {
        let parent = self
            .parent()
            .ok_or_else(|| Error::argument(format!("path has no parent: {}", self.display())))?;
        let name = self
            .file_name()
            .ok_or_else(|| Error::argument(format!("path has no file name: {}", self.display())))?;
        Ok((parent, name))
    }

    /// Appends a single path component, returning a new absolute path.
    #[must_use]
    pub fn resolve(&self, name: impl AsRef<OsStr>) -> Self {
        Self(self.0.join(name.as_ref()))
    }

    /// The underlying path, for interop with `std::path` and `cap_std`.
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl std::ops::Deref for AbsPathBuf {
    type Target = Path;

    fn deref(&self) -> &Path {
        &self.0
    }
}

impl std::fmt::Display for AbsPathBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl AsRef<Path> for AbsPathBuf {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// Lexically removes `.` and `..` components, failing (by leaving the `..`
/// in the impossible position of popping nothing) only if the caller already
/// handed us a malformed absolute path — we defensively just stop ascending
/// past the root rather than erroring, since an absolute path can never
/// legitimately need to go above its own root.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
