use crate::areas::database::{Database, ObjectStore};
use crate::areas::refs::Refs;
use crate::areas::remote::{CloneClient, CloneOutcome};
use crate::areas::workspace::Workspace;
use crate::artifacts::objects::commit::{Author, Commit};
use crate::artifacts::objects::object::{Packable, Unpackable, decode_frame, encode_frame};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::{Tree, TreeEntry};
use crate::artifacts::protocol::http::RemoteConfig;
use crate::errors::{BitError, IoResultExt, Result};
use bytes::Bytes;
use std::cell::{RefCell, RefMut};
use std::io::Cursor;
use std::path::Path;

pub const GIT_DIR: &str = ".git";

/// A working directory together with its `.git` metadata
///
/// The object and ref operations here form the surface the command shell
/// builds on; they report outcomes only through [`BitError`].
pub struct Repository {
    path: Box<Path>,
    writer: RefCell<Box<dyn std::io::Write>>,
    database: Database,
    workspace: Workspace,
    refs: Refs,
}

impl Repository {
    /// Open the repository rooted at `path`, creating the directory if needed
    pub fn new(path: &Path, writer: Box<dyn std::io::Write>) -> Result<Self> {
        if !path.exists() {
            std::fs::create_dir_all(path).with_path(path)?;
        }
        let path = path.canonicalize().with_path(path)?;

        let git_path = path.join(GIT_DIR);
        let database = Database::new(git_path.join("objects").into_boxed_path());
        let workspace = Workspace::new(path.clone().into_boxed_path());
        let refs = Refs::new(git_path.into_boxed_path());

        Ok(Repository {
            path: path.into_boxed_path(),
            writer: RefCell::new(writer),
            database,
            workspace,
            refs,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn git_path(&self) -> std::path::PathBuf {
        self.path.join(GIT_DIR)
    }

    pub fn writer(&'_ self) -> RefMut<'_, Box<dyn std::io::Write>> {
        self.writer.borrow_mut()
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn refs(&self) -> &Refs {
        &self.refs
    }

    /// Frame stored under `oid`
    pub fn read_object(&self, oid: &ObjectId) -> Result<Bytes> {
        self.database.read(oid)
    }

    /// Frame `payload` as `kind`, store it and return its id
    pub fn write_object(&self, payload: &[u8], kind: ObjectType) -> Result<ObjectId> {
        self.database.write(&encode_frame(kind, payload))
    }

    /// Entries of a tree frame, in canonical order
    pub fn parse_tree(&self, frame: &Bytes) -> Result<Vec<TreeEntry>> {
        let (object_type, payload) = decode_frame(frame)?;
        if object_type != ObjectType::Tree {
            return Err(BitError::MalformedTree(format!(
                "expected a tree frame, found a {object_type}"
            )));
        }

        Ok(Tree::deserialize(Cursor::new(payload))?.into_entries().collect())
    }

    /// Snapshot `path` into the store and return the root tree id
    pub fn build_tree_from_directory(&self, path: &Path) -> Result<ObjectId> {
        self.workspace.build_tree(path, &self.database)
    }

    /// Write a commit of `tree` with the identity found in the environment
    pub fn write_commit(
        &self,
        tree: ObjectId,
        parent: Option<ObjectId>,
        message: &str,
    ) -> Result<ObjectId> {
        let author = Author::load_from_env();
        let committer = Author::committer_from_env(&author);
        let commit = Commit::new(parent, tree, author, committer, message.to_string());

        self.database.write(&commit.serialize()?)
    }

    /// Fetch `url` into this (freshly initialized) repository and check it out
    pub async fn clone_remote(&self, url: &str, config: &RemoteConfig) -> Result<CloneOutcome> {
        let mut client = CloneClient::new(&self.database, &self.workspace, &self.refs);
        client.run(url, config).await
    }
}
