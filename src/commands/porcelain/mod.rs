//! Porcelain commands (user-facing Git operations)
//!
//! ## Commands
//!
//! - `init`: Initialize a new repository
//! - `clone`: Fetch a remote repository over smart HTTP and check it out

pub mod clone;
pub mod init;
