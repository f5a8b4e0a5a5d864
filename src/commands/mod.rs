//! Command implementations
//!
//! Commands are `impl Repository` blocks, split like git's own commands:
//!
//! - `plumbing`: object-level commands (cat-file, hash-object, ls-tree, write-tree, commit-tree)
//! - `porcelain`: user-facing commands (init, clone)
//!
//! They print to the repository's writer and report failures as `anyhow`
//! errors with context; the engine underneath only returns typed errors.

pub mod plumbing;
pub mod porcelain;
