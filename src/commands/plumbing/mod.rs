//! Plumbing commands (low-level Git operations)
//!
//! Plumbing commands give direct access to the object store. They are mostly
//! used from scripts and as building blocks for porcelain commands.
//!
//! ## Commands
//!
//! - `cat-file`: Print an object's payload
//! - `hash-object`: Compute a blob ID and optionally store it
//! - `ls-tree`: List the entries of a tree
//! - `write-tree`: Snapshot the working directory as a tree
//! - `commit-tree`: Create a commit from a tree

pub mod cat_file;
pub mod commit_tree;
pub mod hash_object;
pub mod ls_tree;
pub mod write_tree;
