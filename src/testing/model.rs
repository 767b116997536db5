//! A simulated filesystem for exhaustively exploring crash outcomes without
//! an actual power failure.
//!
//! Every directory and file inode carries two copies of its state: a
//! `durable` copy (what survives a crash) and a `volatile` copy (what the
//! running process currently observes). Every [`Filesystem`] method that
//! mutates anything only touches the `volatile` copy; [`Filesystem::sync_dir`]
//! and [`Filesystem::sync_file`] are the only ways to copy one inode's
//! `volatile` state into its `durable` counterpart. [`ModelFilesystem::crash`]
//! discards every `volatile` copy in favor of its `durable` counterpart,
//! exactly simulating a power loss: anything not yet synced is gone,
//! anything synced survives.
//!
//! Temp-entry naming uses a seeded RNG rather than `rand::rng()` so that a
//! failing property test can be replayed byte-for-byte from its seed alone.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ffi::{OsStr, OsString};
use std::path::Path;

use rand::distr::{Alphanumeric, SampleString as _};
use rand::rngs::StdRng;
use rand::SeedableRng as _;

use crate::error::{Error, Result};
use crate::fs::Filesystem;
use crate::options::Options;
use crate::path::AbsPathBuf;

type InodeId = u64;

const ROOT: InodeId = 0;
const TMP: InodeId = 1;

#[derive(Clone)]
enum Node {
    Dir(BTreeMap<OsString, InodeId>),
    File(Vec<u8>),
}

#[derive(Clone)]
struct Storage {
    nodes: HashMap<InodeId, Node>,
    next_id: InodeId,
}

impl Storage {
    fn fresh() -> Self {
        let mut nodes = HashMap::new();
        let mut root_entries = BTreeMap::new();
        root_entries.insert(OsString::from("tmp"), TMP);
        nodes.insert(ROOT, Node::Dir(root_entries));
        nodes.insert(TMP, Node::Dir(BTreeMap::new()));
        Self { nodes, next_id: TMP + 1 }
    }

    fn alloc(&mut self, node: Node) -> InodeId {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(id, node);
        id
    }

    fn dir_entries(&self, id: InodeId) -> Result<&BTreeMap<OsString, InodeId>> {
        match self.nodes.get(&id) {
            Some(Node::Dir(entries)) => Ok(entries),
            _ => Err(Error::NotFound(inode_placeholder_path(id))),
        }
    }

    fn dir_entries_mut(&mut self, id: InodeId) -> Result<&mut BTreeMap<OsString, InodeId>> {
        match self.nodes.get_mut(&id) {
            Some(Node::Dir(entries)) => Ok(entries),
            _ => Err(Error::NotFound(inode_placeholder_path(id))),
        }
    }

    fn resolve(&self, path: &AbsPathBuf) -> Result<InodeId> {
        let mut current = ROOT;
        for name in path.name_components() {
            let entries = self.dir_entries(current)?;
            current = *entries
                .get(name)
                .ok_or_else(|| Error::NotFound(path.as_path().to_path_buf()))?;
        }
        Ok(current)
    }
}

/// A placeholder path for error variants that expect one, used where the
/// model only has an inode id (not the original lookup path) on hand.
fn inode_placeholder_path(id: InodeId) -> std::path::PathBuf {
    std::path::PathBuf::from(format!("<inode {id}>"))
}

/// A directory handle into a [`ModelFilesystem`]. Bound to an inode id, like
/// a real directory file descriptor.
#[derive(Debug, Clone, Copy)]
pub struct DirHandle(InodeId);

/// A file handle into a [`ModelFilesystem`].
#[derive(Debug, Clone, Copy)]
pub struct FileHandle(InodeId);

/// An in-memory filesystem that separately tracks durable and volatile
/// state per inode, for use as a [`Filesystem`] implementation in tests.
pub struct ModelFilesystem {
    durable: RefCell<Storage>,
    volatile: RefCell<Storage>,
    rng: RefCell<StdRng>,
    options: Options,
}

impl ModelFilesystem {
    /// Builds an empty model filesystem whose temp-name generation is
    /// seeded by `seed`, for reproducible test failures.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_options(seed, Options::default())
    }

    /// Like [`Self::new`], with explicit [`Options`].
    #[must_use]
    pub fn with_options(seed: u64, options: Options) -> Self {
        let storage = Storage::fresh();
        Self {
            durable: RefCell::new(storage.clone()),
            volatile: RefCell::new(storage),
            rng: RefCell::new(StdRng::seed_from_u64(seed)),
            options,
        }
    }

    /// Simulates a power loss: every inode's volatile state reverts to its
    /// last-synced durable state. Anything written but never synced is gone
    /// after this call; anything synced is unaffected.
    pub fn crash(&self) {
        let durable = self.durable.borrow().clone();
        *self.volatile.borrow_mut() = durable;
    }

    /// Reads `path`'s bytes as they currently stand in durable storage, or
    /// `None` if `path` does not durably name a file. Intended for test
    /// assertions that want to observe exactly what a restarted process
    /// would see, bypassing the `Filesystem` trait (which has no read
    /// primitive — this crate only ever writes or moves whole files).
    #[must_use]
    pub fn read_durable(&self, path: &AbsPathBuf) -> Option<Vec<u8>> {
        let durable = self.durable.borrow();
        let id = durable.resolve(path).ok()?;
        match durable.nodes.get(&id)? {
            Node::File(data) => Some(data.clone()),
            Node::Dir(_) => None,
        }
    }

    fn temp_name(&self, suffix: &str) -> OsString {
        let random = Alphanumeric.sample_string(&mut *self.rng.borrow_mut(), 12);
        OsString::from(format!("{}{random}.{suffix}", self.options.temp_name_prefix))
    }
}

impl Default for ModelFilesystem {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Filesystem for ModelFilesystem {
    type Dir = DirHandle;
    type File = FileHandle;

    fn create_temp_dir(&self) -> Result<AbsPathBuf> {
        let name = self.temp_name("dir");
        let mut volatile = self.volatile.borrow_mut();
        let id = volatile.alloc(Node::Dir(BTreeMap::new()));
        volatile.dir_entries_mut(TMP)?.insert(name.clone(), id);
        drop(volatile);
        AbsPathBuf::promote(Path::new("/tmp")).map(|p| p.resolve(&name))
    }

    fn create_temp_file(&self) -> Result<AbsPathBuf> {
        let name = self.temp_name("file");
        let mut volatile = self.volatile.borrow_mut();
        let id = volatile.alloc(Node::File(Vec::new()));
        volatile.dir_entries_mut(TMP)?.insert(name.clone(), id);
        drop(volatile);
        AbsPathBuf::promote(Path::new("/tmp")).map(|p| p.resolve(&name))
    }

    fn open_directory(&self, path: &AbsPathBuf) -> Result<DirHandle> {
        let volatile = self.volatile.borrow();
        let id = volatile.resolve(path)?;
        match volatile.nodes.get(&id) {
            Some(Node::Dir(_)) => Ok(DirHandle(id)),
            _ => Err(Error::NotFound(path.as_path().to_path_buf())),
        }
    }

    fn open_file(&self, path: &AbsPathBuf) -> Result<FileHandle> {
        let (parent, name) = path.parent_and_name()?;
        let mut volatile = self.volatile.borrow_mut();
        let parent_id = volatile.resolve(&parent)?;
        let existing = volatile.dir_entries(parent_id)?.get(name).copied();
        let id = match existing {
            None => {
                let new_id = volatile.alloc(Node::File(Vec::new()));
                volatile
                    .dir_entries_mut(parent_id)?
                    .insert(name.to_os_string(), new_id);
                new_id
            }
            Some(id) => match volatile.nodes.get(&id) {
                Some(Node::File(_)) => {
                    volatile.nodes.insert(id, Node::File(Vec::new()));
                    id
                }
                _ => return Err(Error::IsDirectory(path.as_path().to_path_buf())),
            },
        };
        Ok(FileHandle(id))
    }

    fn list(&self, path: &AbsPathBuf) -> Result<BTreeSet<OsString>> {
        let volatile = self.volatile.borrow();
        let id = volatile.resolve(path)?;
        Ok(volatile.dir_entries(id)?.keys().cloned().collect())
    }

    fn is_readable_directory(&self, dir: &DirHandle, name: &OsStr) -> Result<bool> {
        let volatile = self.volatile.borrow();
        let entries = volatile.dir_entries(dir.0)?;
        Ok(match entries.get(name) {
            Some(id) => matches!(volatile.nodes.get(id), Some(Node::Dir(_))),
            None => false,
        })
    }

    fn mkdir(&self, dir: &DirHandle, name: &OsStr) -> Result<()> {
        let mut volatile = self.volatile.borrow_mut();
        if volatile.dir_entries(dir.0)?.contains_key(name) {
            return Err(Error::AlreadyExists(Path::new(name).to_path_buf()));
        }
        let id = volatile.alloc(Node::Dir(BTreeMap::new()));
        volatile.dir_entries_mut(dir.0)?.insert(name.to_os_string(), id);
        Ok(())
    }

    fn unlink(&self, dir: &DirHandle, name: &OsStr) -> Result<()> {
        let mut volatile = self.volatile.borrow_mut();
        let id = *volatile
            .dir_entries(dir.0)?
            .get(name)
            .ok_or_else(|| Error::NotFound(Path::new(name).to_path_buf()))?;
        if let Some(Node::Dir(entries)) = volatile.nodes.get(&id) {
            if !entries.is_empty() {
                return Err(Error::NotEmpty(Path::new(name).to_path_buf()));
            }
        }
        volatile.dir_entries_mut(dir.0)?.remove(name);
        volatile.nodes.remove(&id);
        Ok(())
    }

    fn rename(
        &self,
        src_dir: &DirHandle,
        src_name: &OsStr,
        tgt_dir: &DirHandle,
        tgt_name: &OsStr,
    ) -> Result<()> {
        let mut volatile = self.volatile.borrow_mut();
        let id = *volatile
            .dir_entries(src_dir.0)?
            .get(src_name)
            .ok_or_else(|| Error::NotFound(Path::new(src_name).to_path_buf()))?;

        if let Some(existing) = volatile.dir_entries(tgt_dir.0)?.get(tgt_name).copied() {
            if matches!(volatile.nodes.get(&existing), Some(Node::Dir(_))) {
                return Err(Error::IsDirectory(Path::new(tgt_name).to_path_buf()));
            }
        }

        volatile.dir_entries_mut(src_dir.0)?.remove(src_name);
        let previous = volatile
            .dir_entries_mut(tgt_dir.0)?
            .insert(tgt_name.to_os_string(), id);
        if let Some(previous_id) = previous {
            volatile.nodes.remove(&previous_id);
        }
        Ok(())
    }

    fn sync_dir(&self, dir: &DirHandle) -> Result<()> {
        let volatile = self.volatile.borrow();
        let snapshot = match volatile.nodes.get(&dir.0) {
            Some(Node::Dir(entries)) => entries.clone(),
            _ => return Ok(()),
        };
        // An entry becoming durable pins its child inode's existence (and,
        // for a directory, its emptiness) durably too, even though the
        // child's own contents still need their own `sync_dir`/`sync_file`
        // to become durable. Mirrors a real filesystem: linking a freshly
        // allocated inode into a directory and fsyncing that directory is
        // enough to survive a crash, independent of whether the inode's own
        // data has been flushed.
        let placeholders: Vec<(InodeId, Node)> = snapshot
            .values()
            .copied()
            .filter(|id| !self.durable.borrow().nodes.contains_key(id))
            .filter_map(|id| {
                volatile.nodes.get(&id).map(|node| {
                    let empty = match node {
                        Node::Dir(_) => Node::Dir(BTreeMap::new()),
                        Node::File(_) => Node::File(Vec::new()),
                    };
                    (id, empty)
                })
            })
            .collect();
        drop(volatile);

        let mut durable = self.durable.borrow_mut();
        for (id, node) in placeholders {
            durable.nodes.entry(id).or_insert(node);
        }
        durable.nodes.insert(dir.0, Node::Dir(snapshot));
        log::debug!("(model) synced directory inode {}", dir.0);
        Ok(())
    }

    fn write_file(&self, file: &mut FileHandle, bytes: &[u8]) -> Result<()> {
        let mut volatile = self.volatile.borrow_mut();
        match volatile.nodes.get_mut(&file.0) {
            Some(Node::File(data)) => {
                data.extend_from_slice(bytes);
                Ok(())
            }
            _ => Err(Error::NotFound(inode_placeholder_path(file.0))),
        }
    }

    fn sync_file(&self, file: &FileHandle) -> Result<()> {
        let snapshot = match self.volatile.borrow().nodes.get(&file.0) {
            Some(Node::File(data)) => data.clone(),
            _ => return Ok(()),
        };
        self.durable
            .borrow_mut()
            .nodes
            .insert(file.0, Node::File(snapshot));
        log::debug!("(model) synced file inode {}", file.0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crash_discards_unsynced_directory_creation() {
        let fs = ModelFilesystem::new(1);
        let root = AbsPathBuf::promote("/").unwrap();
        let root_dir = fs.open_directory(&root).unwrap();
        fs.mkdir(&root_dir, OsStr::new("a")).unwrap();
        assert!(fs.is_readable_directory(&root_dir, OsStr::new("a")).unwrap());

        fs.crash();

        assert!(!fs.is_readable_directory(&root_dir, OsStr::new("a")).unwrap());
    }

    #[test]
    fn crash_preserves_synced_directory_creation() {
        let fs = ModelFilesystem::new(2);
        let root = AbsPathBuf::promote("/").unwrap();
        let root_dir = fs.open_directory(&root).unwrap();
        fs.mkdir(&root_dir, OsStr::new("a")).unwrap();
        fs.sync_dir(&root_dir).unwrap();

        fs.crash();

        assert!(fs.is_readable_directory(&root_dir, OsStr::new("a")).unwrap());
    }

    #[test]
    fn crash_preserves_synced_directory_reopened_by_path() {
        // Regression test: syncing a directory must pin the *existence* of
        // any newly linked child inode durably too, not just the parent's
        // entry-name mapping, or re-resolving the child's path after a crash
        // would spuriously fail even though the link was synced.
        let fs = ModelFilesystem::new(4);
        let root = AbsPathBuf::promote("/").unwrap();
        let root_dir = fs.open_directory(&root).unwrap();
        fs.mkdir(&root_dir, OsStr::new("a")).unwrap();
        fs.sync_dir(&root_dir).unwrap();

        fs.crash();

        let a = root.resolve("a");
        let a_dir = fs.open_directory(&a).unwrap();
        fs.mkdir(&a_dir, OsStr::new("b")).unwrap();
        assert!(fs.is_readable_directory(&a_dir, OsStr::new("b")).unwrap());
    }

    #[test]
    fn crash_discards_unsynced_file_writes() {
        let fs = ModelFilesystem::new(3);
        let path = AbsPathBuf::promote("/a").unwrap();
        let mut file = fs.open_file(&path).unwrap();
        fs.write_file(&mut file, b"hello").unwrap();

        fs.crash();

        // The file handle's backing inode was allocated but never synced
        // into a durable directory entry, so re-opening the path creates a
        // brand new, empty file.
        let reopened = fs.open_file(&path).unwrap();
        let FileHandle(id) = reopened;
        match fs.volatile.borrow().nodes.get(&id) {
            Some(Node::File(data)) => assert!(data.is_empty()),
            _ => panic!("expected a file node"),
        }
    }
}
