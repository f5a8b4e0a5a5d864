//! Git tree object
//!
//! Trees represent directory snapshots in Git. They contain entries for files (blobs),
//! symlinks, and subdirectories (other trees), along with their names and modes.
//!
//! ## Format
//!
//! On disk: `tree <size>\0<entries>`
//! Each entry: `<mode> <name>\0<20-byte-sha1>`
//!
//! ## Ordering
//!
//! Entries are always held in canonical order: byte-wise by name, where a
//! directory's name compares as if it ended with `/`. This is the order git
//! writes, so digests of trees built here match digests computed by git.
//! Parsing re-sorts, so a frame stored out of order still lists canonically.

use crate::artifacts::objects::entry_mode::EntryMode;
use crate::artifacts::objects::object::{Object, Packable, Unpackable, encode_frame};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::{BitError, Result};
use bytes::Bytes;
use derive_new::new;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::io::BufRead;

/// One named entry of a tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, new)]
pub struct TreeEntry {
    #[new(into)]
    pub name: String,
    pub mode: EntryMode,
    pub oid: ObjectId,
}

impl TreeEntry {
    pub fn is_tree(&self) -> bool {
        self.mode.is_tree()
    }

    fn sort_key(&self) -> impl Iterator<Item = u8> + '_ {
        let suffix = self.is_tree().then_some(b'/');
        self.name.as_bytes().iter().copied().chain(suffix)
    }

    fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(other.sort_key())
    }

    fn validate_name(name: &str) -> Result<()> {
        if name.is_empty() || name == "." || name == ".." {
            return Err(BitError::MalformedTree(format!(
                "invalid entry name {name:?}"
            )));
        }
        if name.contains(['/', '\0']) {
            return Err(BitError::MalformedTree(format!(
                "entry name {name:?} contains a separator"
            )));
        }

        Ok(())
    }
}

/// Git tree object representing a directory snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    /// Build a tree from entries in any order
    ///
    /// Fails with `MalformedTree` on duplicate or invalid names.
    pub fn try_new(mut entries: Vec<TreeEntry>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(entries.len());
        for entry in &entries {
            TreeEntry::validate_name(&entry.name)?;
            if !seen.insert(entry.name.as_str()) {
                return Err(BitError::MalformedTree(format!(
                    "duplicate entry name {:?}",
                    entry.name
                )));
            }
        }

        entries.sort_by(TreeEntry::canonical_cmp);
        Ok(Tree { entries })
    }

    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> impl Iterator<Item = TreeEntry> {
        self.entries.into_iter()
    }
}

impl Packable for Tree {
    fn serialize(&self) -> Result<Bytes> {
        let mut content_bytes = Vec::new();

        for entry in &self.entries {
            content_bytes.extend_from_slice(entry.mode.as_str().as_bytes());
            content_bytes.push(b' ');
            content_bytes.extend_from_slice(entry.name.as_bytes());
            content_bytes.push(0);
            content_bytes.extend_from_slice(entry.oid.as_bytes());
        }

        Ok(encode_frame(self.object_type(), &content_bytes))
    }
}

impl Unpackable for Tree {
    fn deserialize(mut reader: impl BufRead) -> Result<Self> {
        let mut entries = Vec::new();

        // Reuse scratch buffers to reduce allocs
        let mut mode_bytes = Vec::new();
        let mut name_bytes = Vec::new();

        let truncated = |what: &str| BitError::MalformedTree(format!("unexpected EOF in {what}"));

        loop {
            mode_bytes.clear();
            // Read "mode " (space-delimited)
            let n = reader
                .read_until(b' ', &mut mode_bytes)
                .map_err(|_| truncated("mode"))?;
            if n == 0 {
                break; // clean EOF: no more entries
            }
            if mode_bytes.pop() != Some(b' ') {
                return Err(truncated("mode"));
            }

            let mode_str = std::str::from_utf8(&mode_bytes)
                .map_err(|_| BitError::MalformedTree("mode is not ASCII".to_string()))?;
            let mode = EntryMode::from_octal_str(mode_str)?;

            // Read "name\0"
            name_bytes.clear();
            reader
                .read_until(b'\0', &mut name_bytes)
                .map_err(|_| truncated("name"))?;
            if name_bytes.pop() != Some(b'\0') {
                return Err(truncated("name"));
            }
            let name = String::from_utf8(name_bytes.clone())
                .map_err(|_| BitError::MalformedTree("entry name is not UTF-8".to_string()))?;

            let oid = ObjectId::read_raw_from(&mut reader).map_err(|_| truncated("object id"))?;

            entries.push(TreeEntry::new(name, mode, oid));
        }

        Tree::try_new(entries)
    }
}

impl Object for Tree {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tree
    }

    fn display(&self) -> String {
        self.entries
            .iter()
            .map(|entry| {
                format!(
                    "{:06o} {} {}\t{}",
                    entry.mode.as_u32(),
                    entry.mode.object_type(),
                    entry.oid,
                    entry.name
                )
            })
            .collect::<Vec<String>>()
            .join("\n")
    }
}
