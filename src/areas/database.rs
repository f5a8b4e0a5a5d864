//! Object database
//!
//! Content-addressed, append-only storage of compressed frames under
//! `.git/objects/<2 hex>/<38 hex>`. Entries are never updated or removed,
//! so concurrent writers of the same content are harmless.

use crate::artifacts::core::{compress, decompress, digest};
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object::{Object, ObjectBox};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::Tree;
use crate::errors::{BitError, IoResultExt, Result};
use bytes::Bytes;
use fake::rand;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Read and write access to frames keyed by their digest
pub trait ObjectStore {
    /// Store `frame` and return its digest; writing existing content is a no-op
    fn write(&self, frame: &[u8]) -> Result<ObjectId>;

    /// Load the frame stored under `oid`
    fn read(&self, oid: &ObjectId) -> Result<Bytes>;

    fn contains(&self, oid: &ObjectId) -> bool;
}

#[derive(Debug)]
pub struct Database {
    path: Box<Path>,
}

impl Database {
    pub fn new(path: Box<Path>) -> Self {
        Database { path }
    }

    pub fn objects_path(&self) -> &Path {
        &self.path
    }

    /// Serialize and store a typed object
    pub fn store(&self, object: &impl Object) -> Result<ObjectId> {
        self.write(&object.serialize()?)
    }

    pub fn parse_object(&self, object_id: &ObjectId) -> Result<ObjectBox> {
        ObjectBox::parse(&self.read(object_id)?)
    }

    pub fn parse_object_as_blob(&self, object_id: &ObjectId) -> Result<Option<Blob>> {
        match self.parse_object(object_id)? {
            ObjectBox::Blob(blob) => Ok(Some(*blob)),
            _ => Ok(None),
        }
    }

    pub fn parse_object_as_tree(&self, object_id: &ObjectId) -> Result<Option<Tree>> {
        match self.parse_object(object_id)? {
            ObjectBox::Tree(tree) => Ok(Some(*tree)),
            _ => Ok(None),
        }
    }

    pub fn parse_object_as_commit(&self, object_id: &ObjectId) -> Result<Option<Commit>> {
        match self.parse_object(object_id)? {
            ObjectBox::Commit(commit) => Ok(Some(*commit)),
            _ => Ok(None),
        }
    }

    pub fn object_type(&self, object_id: &ObjectId) -> Result<ObjectType> {
        Ok(self.parse_object(object_id)?.object_type())
    }

    fn object_path(&self, object_id: &ObjectId) -> PathBuf {
        self.path.join(object_id.to_path())
    }

    fn write_object(&self, object_path: &Path, object_content: &[u8]) -> Result<()> {
        let object_dir = object_path.parent().ok_or_else(|| BitError::Io {
            path: object_path.to_path_buf(),
            source: std::io::Error::other("object path has no parent"),
        })?;
        std::fs::create_dir_all(object_dir).with_path(object_dir)?;

        let temp_object_path = object_dir.join(Self::generate_temp_name());
        let object_content = compress(object_content)?;

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_object_path)
            .with_path(&temp_object_path)?;

        let persisted = file
            .write_all(&object_content)
            .with_path(&temp_object_path)
            // rename the temp file to the object file to make it atomic
            .and_then(|_| std::fs::rename(&temp_object_path, object_path).with_path(object_path));

        if persisted.is_err()
            && let Err(e) = std::fs::remove_file(&temp_object_path)
        {
            tracing::warn!(path = %temp_object_path.display(), error = %e, "unable to remove temp object");
        }

        persisted
    }

    fn generate_temp_name() -> String {
        format!("tmp-obj-{}", rand::random::<u32>())
    }
}

impl ObjectStore for Database {
    fn write(&self, frame: &[u8]) -> Result<ObjectId> {
        let object_id = digest(frame);
        let object_path = self.object_path(&object_id);

        // identical content is already there under the same key
        if !object_path.is_file() {
            self.write_object(&object_path, frame)?;
            tracing::trace!(oid = %object_id, "stored object");
        }

        Ok(object_id)
    }

    fn read(&self, oid: &ObjectId) -> Result<Bytes> {
        let object_path = self.object_path(oid);

        let object_content = match std::fs::read(&object_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BitError::ObjectNotFound(*oid));
            }
            Err(e) => return Err(e).with_path(&object_path),
        };

        let frame = decompress(&object_content).map_err(|e| BitError::CorruptObject {
            oid: *oid,
            reason: e.to_string(),
        })?;

        if digest(&frame) != *oid {
            return Err(BitError::CorruptObject {
                oid: *oid,
                reason: "content does not hash to its key".to_string(),
            });
        }

        Ok(frame)
    }

    fn contains(&self, oid: &ObjectId) -> bool {
        self.object_path(oid).is_file()
    }
}
