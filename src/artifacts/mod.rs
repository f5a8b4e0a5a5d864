//! Git data structures and codecs
//!
//! - `core`: hashing and zlib primitives
//! - `objects`: object ids, types, modes and the blob/tree/commit codecs
//! - `pack`: pack parsing and delta resolution
//! - `protocol`: pkt-lines, ref advertisement and the smart HTTP transport

pub mod core;
pub mod objects;
pub mod pack;
pub mod protocol;
