//! Delta instruction streams
//!
//! ```text
//! source size (varint) | target size (varint) | instruction*
//!
//! copy:   1oooossss [offset bytes 0..4] [size bytes 0..3]   (size 0 means 0x10000)
//! insert: 0nnnnnnn  <n literal bytes>                       (n in 1..=127)
//! ```
//!
//! Instruction `0x00` is reserved and rejected.

use crate::artifacts::pack::{next_byte, read_size_varint};
use crate::errors::{BitError, Result};
use bytes::Bytes;
use std::io::{Cursor, Read};

const COPY_FLAG: u8 = 0x80;
const DEFAULT_COPY_SIZE: usize = 0x10000;

/// Rebuild a target payload from its base and a delta over that base
pub fn apply_delta(base: &[u8], delta: &[u8]) -> Result<Bytes> {
    let mut cursor = Cursor::new(delta);

    let source_size = read_size_varint(&mut cursor, "delta source size")?;
    if source_size != base.len() {
        return Err(BitError::CorruptPack(format!(
            "delta expects a {source_size} byte base, got {}",
            base.len()
        )));
    }
    let target_size = read_size_varint(&mut cursor, "delta target size")?;

    // the declared size is untrusted, so cap the up-front reservation
    let mut target = Vec::with_capacity(target_size.min(delta.len().saturating_mul(64)));

    while (cursor.position() as usize) < delta.len() {
        let instruction = next_byte(&mut cursor, "delta instruction")?;

        if instruction & COPY_FLAG != 0 {
            let (offset, size) = read_copy_args(&mut cursor, instruction)?;
            let chunk = offset
                .checked_add(size)
                .and_then(|end| base.get(offset..end))
                .ok_or_else(|| {
                    BitError::CorruptPack(format!(
                        "copy of {size} bytes at {offset} exceeds a {} byte base",
                        base.len()
                    ))
                })?;
            target.extend_from_slice(chunk);
        } else if instruction != 0 {
            let mut literal = vec![0u8; usize::from(instruction)];
            cursor
                .read_exact(&mut literal)
                .map_err(|_| BitError::CorruptPack("truncated delta insert".to_string()))?;
            target.extend_from_slice(&literal);
        } else {
            return Err(BitError::CorruptPack(
                "reserved delta instruction 0x00".to_string(),
            ));
        }

        if target.len() > target_size {
            return Err(BitError::CorruptPack(format!(
                "delta output exceeds its declared {target_size} bytes"
            )));
        }
    }

    if target.len() != target_size {
        return Err(BitError::CorruptPack(format!(
            "delta produced {} bytes, declared {target_size}",
            target.len()
        )));
    }

    Ok(Bytes::from(target))
}

fn read_copy_args(cursor: &mut Cursor<&[u8]>, instruction: u8) -> Result<(usize, usize)> {
    let mut offset = 0usize;
    for i in 0..4 {
        if instruction & (1 << i) != 0 {
            offset |= usize::from(next_byte(cursor, "copy offset")?) << (8 * i);
        }
    }

    let mut size = 0usize;
    for i in 0..3 {
        if instruction & (1 << (4 + i)) != 0 {
            size |= usize::from(next_byte(cursor, "copy size")?) << (8 * i);
        }
    }
    if size == 0 {
        size = DEFAULT_COPY_SIZE;
    }

    Ok((offset, size))
}
