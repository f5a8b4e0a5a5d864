//! Working directory
//!
//! Two directions between the filesystem and the object store:
//!
//! - [`Workspace::build_tree`] snapshots a directory into blob and tree objects, post-order
//! - [`Workspace::checkout`] materializes a stored tree back onto disk
//!
//! Both walk with explicit work lists, so deeply nested input never grows the call stack.

use crate::areas::database::ObjectStore;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::entry_mode::{EntryMode, FileMode};
use crate::artifacts::objects::object::{ObjectBox, Packable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::{Tree, TreeEntry};
use crate::errors::{BitError, IoResultExt, Result};
use is_executable::IsExecutable;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

const GIT_DIR_NAME: &str = ".git";

#[derive(Debug)]
pub struct Workspace {
    path: Box<Path>,
}

impl Workspace {
    pub fn new(path: Box<Path>) -> Self {
        Workspace { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Store every file under `dir` and return the id of the tree describing it
    ///
    /// `.git` directories are skipped at any depth, as are directories with
    /// nothing recordable inside (git cannot represent an empty tree entry).
    pub fn build_tree<S>(&self, dir: &Path, store: &S) -> Result<ObjectId>
    where
        S: ObjectStore + ?Sized,
    {
        // entries collected per directory, consumed when the directory itself is visited
        let mut pending: HashMap<PathBuf, Vec<TreeEntry>> = HashMap::new();

        let walker = WalkDir::new(dir)
            .follow_links(false)
            .contents_first(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !Self::is_ignored(entry));

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                BitError::Io {
                    path,
                    source: e.into(),
                }
            })?;
            if entry.depth() == 0 {
                continue;
            }

            let Some(tree_entry) = self.record_entry(&entry, &mut pending, store)? else {
                continue;
            };
            if let Some(parent) = entry.path().parent() {
                pending
                    .entry(parent.to_path_buf())
                    .or_default()
                    .push(tree_entry);
            }
        }

        let root = Tree::try_new(pending.remove(dir).unwrap_or_default())?;
        let root_oid = store.write(&root.serialize()?)?;
        tracing::debug!(path = %dir.display(), oid = %root_oid, "built tree");

        Ok(root_oid)
    }

    fn record_entry<S>(
        &self,
        entry: &DirEntry,
        pending: &mut HashMap<PathBuf, Vec<TreeEntry>>,
        store: &S,
    ) -> Result<Option<TreeEntry>>
    where
        S: ObjectStore + ?Sized,
    {
        let path = entry.path();
        let name = entry.file_name().to_str().ok_or_else(|| {
            BitError::MalformedTree(format!("{} is not a UTF-8 name", path.display()))
        })?;
        let file_type = entry.file_type();

        let (mode, oid) = if file_type.is_dir() {
            let children = pending.remove(path).unwrap_or_default();
            if children.is_empty() {
                return Ok(None);
            }
            let tree = Tree::try_new(children)?;
            (EntryMode::Directory, store.write(&tree.serialize()?)?)
        } else if file_type.is_symlink() {
            let target = std::fs::read_link(path).with_path(path)?;
            let blob = Blob::new(target.as_os_str().as_bytes().to_vec());
            (EntryMode::Symlink, store.write(&blob.serialize()?)?)
        } else if file_type.is_file() {
            let content = std::fs::read(path).with_path(path)?;
            let mode = match path.is_executable() {
                true => FileMode::Executable,
                false => FileMode::Regular,
            };
            let blob = Blob::new(content);
            (EntryMode::File(mode), store.write(&blob.serialize()?)?)
        } else {
            // sockets, fifos and devices have no object representation
            return Ok(None);
        };

        Ok(Some(TreeEntry::new(name, mode, oid)))
    }

    fn is_ignored(entry: &DirEntry) -> bool {
        entry.depth() > 0 && entry.file_name() == GIT_DIR_NAME
    }

    /// Write the contents of `tree_oid` into the workspace root
    ///
    /// Returns the number of files and links written. Existing files at the
    /// same paths are overwritten; nothing is removed.
    pub fn checkout<S>(&self, store: &S, tree_oid: ObjectId) -> Result<usize>
    where
        S: ObjectStore + ?Sized,
    {
        let mut written = 0;
        let mut stack = vec![(tree_oid, self.path.to_path_buf())];

        while let Some((oid, dir)) = stack.pop() {
            std::fs::create_dir_all(&dir).with_path(&dir)?;

            for entry in Self::read_tree(store, &oid)?.into_entries() {
                if entry.name == GIT_DIR_NAME {
                    return Err(BitError::MalformedTree(format!(
                        "tree {oid} contains a {GIT_DIR_NAME} entry"
                    )));
                }

                let target = dir.join(&entry.name);
                match entry.mode {
                    EntryMode::Directory => stack.push((entry.oid, target)),
                    EntryMode::Gitlink => {
                        // submodule contents are not part of this repository
                        std::fs::create_dir_all(&target).with_path(&target)?;
                    }
                    EntryMode::Symlink => {
                        let link = Self::read_blob(store, &entry.oid)?;
                        std::os::unix::fs::symlink(OsStr::from_bytes(link.content()), &target)
                            .with_path(&target)?;
                        written += 1;
                    }
                    EntryMode::File(_) => {
                        let blob = Self::read_blob(store, &entry.oid)?;
                        self.write_file(&target, blob.content(), entry.mode)?;
                        written += 1;
                    }
                }
            }
        }

        tracing::debug!(root = %self.path.display(), files = written, "checked out tree");
        Ok(written)
    }

    fn write_file(&self, path: &Path, data: &[u8], mode: EntryMode) -> Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .with_path(path)?;
        file.write_all(data).with_path(path)?;

        let permissions = std::fs::Permissions::from_mode(mode.permissions());
        std::fs::set_permissions(path, permissions).with_path(path)?;

        Ok(())
    }

    fn read_tree<S>(store: &S, oid: &ObjectId) -> Result<Tree>
    where
        S: ObjectStore + ?Sized,
    {
        match ObjectBox::parse(&store.read(oid)?)? {
            ObjectBox::Tree(tree) => Ok(*tree),
            other => Err(BitError::CorruptObject {
                oid: *oid,
                reason: format!("expected a tree, found a {}", other.object_type()),
            }),
        }
    }

    fn read_blob<S>(store: &S, oid: &ObjectId) -> Result<Blob>
    where
        S: ObjectStore + ?Sized,
    {
        match ObjectBox::parse(&store.read(oid)?)? {
            ObjectBox::Blob(blob) => Ok(*blob),
            other => Err(BitError::CorruptObject {
                oid: *oid,
                reason: format!("expected a blob, found a {}", other.object_type()),
            }),
        }
    }
}
