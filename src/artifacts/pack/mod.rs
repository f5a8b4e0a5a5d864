//! Pack file reading
//!
//! A pack bundles many objects into one stream:
//!
//! ```text
//! "PACK" | version (u32 BE) | count (u32 BE) | record * count | SHA-1 of everything before
//! ```
//!
//! Each record is a type/size varint header followed by a zlib stream. Delta
//! records carry either a backwards offset to their base (OFS_DELTA) or the
//! base's id (REF_DELTA). The stream is only ever read here; packs are never
//! written.
//!
//! - `delta`: applying copy/insert instruction streams
//! - `record`: header and per-record parsing
//! - `reader`: trailer check, resolution and storage

pub mod delta;
pub mod reader;
pub mod record;

use crate::errors::BitError;
use byteorder::ReadBytesExt;
use std::io::Cursor;

pub const PACK_SIGNATURE: &[u8; 4] = b"PACK";

/// Length of the fixed header: signature, version and object count
pub const PACK_HEADER_LENGTH: usize = 12;

/// Length of the SHA-1 trailer
pub const PACK_TRAILER_LENGTH: usize = 20;

/// Versions 2 and 3 share the same record layout
pub const SUPPORTED_VERSIONS: [u32; 2] = [2, 3];

/// Read one byte, treating the end of input as corruption
pub(crate) fn next_byte(cursor: &mut Cursor<&[u8]>, what: &str) -> Result<u8, BitError> {
    cursor
        .read_u8()
        .map_err(|_| BitError::CorruptPack(format!("unexpected end of data in {what}")))
}

/// Little-endian base-128 varint as used by delta size headers
pub(crate) fn read_size_varint(cursor: &mut Cursor<&[u8]>, what: &str) -> Result<usize, BitError> {
    let mut value = 0usize;
    let mut shift = 0u32;

    loop {
        let byte = next_byte(cursor, what)?;
        let chunk = usize::from(byte & 0x7f)
            .checked_shl(shift)
            .filter(|chunk| chunk >> shift == usize::from(byte & 0x7f))
            .ok_or_else(|| BitError::CorruptPack(format!("{what} overflows")))?;
        value |= chunk;
        shift += 7;

        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
}
