//! Git references (HEAD and branches)
//!
//! References are text files under `.git` holding either a 40-character
//! object id (direct) or `ref: <path>` (symbolic). A fresh clone writes:
//!
//! - `refs/heads/<branch>` and `refs/remotes/origin/<branch>` pointing at the fetched commit
//! - `HEAD` as `ref: refs/heads/<branch>`
//!
//! or, when the remote HEAD is on no branch, only `HEAD` holding the commit id.

use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{BitError, IoResultExt, Result};
use derive_new::new;
use file_guard::Lock;
use std::io::Write;
use std::ops::DerefMut;
use std::path::{Path, PathBuf};

/// Regex pattern for parsing symbolic references
const SYMREF_REGEX: &str = r"^ref: (.+)$";

/// Names git refuses to store under `refs/`
const INVALID_BRANCH_NAME_REGEX: &str =
    r"^\.|/\.|\.\.|^/|/$|\.lock$|@\{|[\x00-\x20\*:\?\[\\~\^\x7f]";

pub const HEAD_REF_NAME: &str = "HEAD";
pub const HEADS_PREFIX: &str = "refs/heads/";
pub const DEFAULT_REMOTE: &str = "origin";

/// Symbolic depth git itself gives up at
const MAX_SYMREF_DEPTH: usize = 5;

/// A validated branch name (the part after `refs/heads/`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BranchName(String);

impl BranchName {
    pub fn try_parse(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(BitError::InvalidRef("branch name cannot be empty".to_string()));
        }

        let re = regex::Regex::new(INVALID_BRANCH_NAME_REGEX)
            .map_err(|e| BitError::InvalidRef(e.to_string()))?;
        if re.is_match(&name) {
            return Err(BitError::InvalidRef(format!("invalid branch name: {name}")));
        }

        Ok(Self(name))
    }

    /// Parse the branch out of a full `refs/heads/<name>` ref
    pub fn try_from_ref(full_ref: &str) -> Result<Self> {
        let name = full_ref.strip_prefix(HEADS_PREFIX).ok_or_else(|| {
            BitError::InvalidRef(format!("{full_ref} is not under {HEADS_PREFIX}"))
        })?;
        Self::try_parse(name)
    }

    pub fn to_ref(&self) -> String {
        format!("{HEADS_PREFIX}{}", self.0)
    }

    pub fn to_remote_ref(&self, remote: &str) -> String {
        format!("refs/remotes/{remote}/{}", self.0)
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content of a single ref file
#[derive(Debug, Clone, PartialEq, Eq)]
enum SymRefOrOid {
    SymRef(String),
    Oid(ObjectId),
}

impl SymRefOrOid {
    fn read_symref_or_oid(path: &Path) -> Result<Option<SymRefOrOid>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).with_path(path)?;
        let content = content.trim();

        if content.is_empty() {
            return Ok(None);
        }

        let symref_match = regex::Regex::new(SYMREF_REGEX)
            .map_err(|e| BitError::InvalidRef(e.to_string()))?
            .captures(content);
        if let Some(symref_match) = symref_match {
            Ok(Some(SymRefOrOid::SymRef(symref_match[1].to_string())))
        } else {
            let oid = ObjectId::try_parse(content).map_err(|_| {
                BitError::InvalidRef(format!("{} holds neither an id nor a ref", path.display()))
            })?;
            Ok(Some(SymRefOrOid::Oid(oid)))
        }
    }
}

/// Git references manager
#[derive(Debug, new)]
pub struct Refs {
    /// Path to the git directory (typically `.git`)
    path: Box<Path>,
}

impl Refs {
    /// Point `refs/heads/<branch>` at `oid`
    pub fn update_branch(&self, branch: &BranchName, oid: &ObjectId) -> Result<()> {
        self.update_ref(&branch.to_ref(), oid)
    }

    /// Point the remote-tracking ref for `branch` at `oid`
    pub fn update_remote_branch(
        &self,
        remote: &str,
        branch: &BranchName,
        oid: &ObjectId,
    ) -> Result<()> {
        self.update_ref(&branch.to_remote_ref(remote), oid)
    }

    /// Make HEAD a symbolic ref to `refs/heads/<branch>`
    pub fn set_head(&self, branch: &BranchName) -> Result<()> {
        self.update_ref_file(&self.head_path(), &format!("ref: {}\n", branch.to_ref()))
    }

    /// Point HEAD straight at `oid`, on no branch
    pub fn set_detached_head(&self, oid: &ObjectId) -> Result<()> {
        self.update_ref(HEAD_REF_NAME, oid)
    }

    /// Resolve HEAD to an object id, following symbolic refs
    ///
    /// Returns `None` while HEAD points at a branch with no commits yet.
    pub fn read_head(&self) -> Result<Option<ObjectId>> {
        self.read_ref(HEAD_REF_NAME)
    }

    /// Resolve any ref path relative to the git directory
    pub fn read_ref(&self, name: &str) -> Result<Option<ObjectId>> {
        let mut path = self.path.join(name);

        for _ in 0..MAX_SYMREF_DEPTH {
            match SymRefOrOid::read_symref_or_oid(&path)? {
                Some(SymRefOrOid::SymRef(target)) => path = self.path.join(target),
                Some(SymRefOrOid::Oid(oid)) => return Ok(Some(oid)),
                None => return Ok(None),
            }
        }

        Err(BitError::InvalidRef(format!(
            "too many levels of symbolic refs starting at {name}"
        )))
    }

    fn update_ref(&self, name: &str, oid: &ObjectId) -> Result<()> {
        let path = self.path.join(name);
        self.update_ref_file(&path, &format!("{oid}\n"))?;
        tracing::debug!(%name, %oid, "updated ref");

        Ok(())
    }

    fn update_ref_file(&self, path: &Path, raw_ref: &str) -> Result<()> {
        // create all the parent directories if they don't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_path(parent)?;
        }

        let mut ref_file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .with_path(path)?;
        let mut lock = file_guard::lock(&mut ref_file, Lock::Exclusive, 0, 1).with_path(path)?;
        lock.deref_mut()
            .write_all(raw_ref.as_bytes())
            .with_path(path)?;

        Ok(())
    }

    pub fn head_path(&self) -> PathBuf {
        self.path.join(HEAD_REF_NAME)
    }

    pub fn refs_path(&self) -> PathBuf {
        self.path.join("refs")
    }

    pub fn heads_path(&self) -> PathBuf {
        self.refs_path().join("heads")
    }
}
