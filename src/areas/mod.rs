//! Stateful repository areas
//!
//! - `database`: content-addressed object store under `.git/objects`
//! - `refs`: HEAD and branch references
//! - `remote`: clone client driving discovery, fetch, unpack and checkout
//! - `repository`: facade wiring the areas together
//! - `workspace`: working directory snapshots and checkout

pub mod database;
pub mod refs;
pub mod remote;
pub mod repository;
pub mod workspace;
