//! Pack header and record parsing

use crate::artifacts::core::decompress_prefix;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::pack::{PACK_HEADER_LENGTH, PACK_SIGNATURE, SUPPORTED_VERSIONS, next_byte};
use crate::errors::{BitError, Result};
use byteorder::ByteOrder;
use bytes::Bytes;
use std::io::Cursor;

const OBJ_COMMIT: u8 = 1;
const OBJ_TREE: u8 = 2;
const OBJ_BLOB: u8 = 3;
const OBJ_TAG: u8 = 4;
const OBJ_OFS_DELTA: u8 = 6;
const OBJ_REF_DELTA: u8 = 7;

/// Fixed 12-byte pack header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackHeader {
    pub version: u32,
    pub object_count: u32,
}

impl PackHeader {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = data
            .get(..PACK_HEADER_LENGTH)
            .ok_or_else(|| BitError::CorruptPack("pack shorter than its header".to_string()))?;

        if &header[..4] != PACK_SIGNATURE {
            return Err(BitError::CorruptPack("missing PACK signature".to_string()));
        }

        let version = byteorder::NetworkEndian::read_u32(&header[4..8]);
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(BitError::CorruptPack(format!(
                "unsupported pack version {version}"
            )));
        }
        let object_count = byteorder::NetworkEndian::read_u32(&header[8..12]);

        Ok(PackHeader {
            version,
            object_count,
        })
    }
}

/// How a record's payload relates to its final object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKind {
    /// Payload is the full object content
    Base(ObjectType),
    /// Payload is a delta over the record starting at `base_offset`
    OfsDelta { base_offset: usize },
    /// Payload is a delta over the object with id `base`
    RefDelta { base: ObjectId },
}

impl RecordKind {
    pub fn is_delta(&self) -> bool {
        !matches!(self, RecordKind::Base(_))
    }
}

/// One decompressed record of a pack
#[derive(Debug, Clone)]
pub struct PackRecord {
    /// Byte offset of the record header within the pack
    pub offset: usize,
    pub kind: RecordKind,
    /// Decompressed payload: object content or delta instructions
    pub data: Bytes,
}

impl PackRecord {
    /// Parse the record starting at `offset`; `end` bounds the records area
    ///
    /// Returns the record and the offset of the next one.
    pub fn parse(pack: &[u8], offset: usize, end: usize) -> Result<(Self, usize)> {
        let area = pack.get(..end).ok_or_else(|| {
            BitError::CorruptPack(format!("record area end {end} is past the pack"))
        })?;
        let mut cursor = Cursor::new(area);
        cursor.set_position(offset as u64);

        let (type_tag, declared_size) = Self::read_type_and_size(&mut cursor)?;
        let kind = match type_tag {
            OBJ_COMMIT => RecordKind::Base(ObjectType::Commit),
            OBJ_TREE => RecordKind::Base(ObjectType::Tree),
            OBJ_BLOB => RecordKind::Base(ObjectType::Blob),
            OBJ_TAG => RecordKind::Base(ObjectType::Tag),
            OBJ_OFS_DELTA => {
                let distance = Self::read_base_distance(&mut cursor)?;
                let base_offset = offset
                    .checked_sub(distance)
                    .filter(|_| distance > 0)
                    .ok_or_else(|| {
                        BitError::CorruptPack(format!(
                            "record at {offset} points {distance} bytes back to no record"
                        ))
                    })?;
                RecordKind::OfsDelta { base_offset }
            }
            OBJ_REF_DELTA => {
                let base = ObjectId::read_raw_from(&mut cursor).map_err(|_| {
                    BitError::CorruptPack(format!("truncated base id in record at {offset}"))
                })?;
                RecordKind::RefDelta { base }
            }
            other => {
                return Err(BitError::CorruptPack(format!(
                    "invalid object type {other} in record at {offset}"
                )));
            }
        };

        let data_start = cursor.position() as usize;
        let (data, consumed) = decompress_prefix(&area[data_start..], declared_size).map_err(|e| {
            BitError::CorruptPack(format!("record at {offset}: {e}"))
        })?;

        if data.len() != declared_size {
            return Err(BitError::CorruptPack(format!(
                "record at {offset} declares {declared_size} bytes but inflates to {}",
                data.len()
            )));
        }

        Ok((PackRecord { offset, kind, data }, data_start + consumed))
    }

    /// Type in bits 4..7 of the first byte; size in its low nibble, then 7 bits per byte
    fn read_type_and_size(cursor: &mut Cursor<&[u8]>) -> Result<(u8, usize)> {
        let first = next_byte(cursor, "record header")?;
        let type_tag = (first >> 4) & 0b111;
        let mut size = usize::from(first & 0x0f);
        let mut shift = 4u32;
        let mut byte = first;

        while byte & 0x80 != 0 {
            byte = next_byte(cursor, "record header")?;
            let chunk = usize::from(byte & 0x7f);
            size |= chunk
                .checked_shl(shift)
                .filter(|shifted| shifted >> shift == chunk)
                .ok_or_else(|| BitError::CorruptPack("record size overflows".to_string()))?;
            shift += 7;
        }

        Ok((type_tag, size))
    }

    /// Big-endian base-128 with an implicit +1 per continuation byte
    fn read_base_distance(cursor: &mut Cursor<&[u8]>) -> Result<usize> {
        let overflow = || BitError::CorruptPack("base offset overflows".to_string());

        let mut byte = next_byte(cursor, "base offset")?;
        let mut distance = usize::from(byte & 0x7f);

        while byte & 0x80 != 0 {
            byte = next_byte(cursor, "base offset")?;
            distance = distance
                .checked_add(1)
                .and_then(|d| d.checked_mul(128))
                .map(|d| d | usize::from(byte & 0x7f))
                .ok_or_else(overflow)?;
        }

        Ok(distance)
    }
}
