//! Object codec
//!
//! Every object is stored as a *frame*, `<type> <len>\0<payload>`, and named by
//! the SHA-1 of that frame.
//!
//! - `blob`: arbitrary bytes
//! - `tree`: `mode name\0<raw id>` entries in canonical order
//! - `commit`: header lines, a blank line, then the message
//! - `entry_mode`, `object_id`, `object_type`: the values those formats carry
//! - `object`: frame encoding and the traits shared by all object kinds

pub mod blob;
pub mod commit;
pub mod entry_mode;
pub mod object;
pub mod object_id;
pub mod object_type;
pub mod tree;

/// Length of a SHA-1 hash in hexadecimal format
pub const OBJECT_ID_LENGTH: usize = 40;

/// Length of a SHA-1 hash in raw bytes
pub const OBJECT_ID_RAW_LENGTH: usize = 20;
