//! Hash and compression primitives
//!
//! Every other component goes through these three functions: SHA-1 over a
//! byte buffer, and zlib (de)compression of whole buffers.

use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{BitError, Result};
use bytes::Bytes;
use sha1::{Digest, Sha1};
use std::io::Write;

/// Upper bound on the buffer reserved up front for an inflated stream
const MAX_PREALLOCATION: usize = 1 << 20;

/// SHA-1 of `data`, as an object id
pub fn digest(data: &[u8]) -> ObjectId {
    let mut hasher = Sha1::new();
    hasher.update(data);

    ObjectId::from_bytes(hasher.finalize().into())
}

pub fn compress(data: &[u8]) -> Result<Bytes> {
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| BitError::CorruptStream(format!("unable to compress content: {e}")))?;

    encoder
        .finish()
        .map(Bytes::from)
        .map_err(|e| BitError::CorruptStream(format!("unable to finish compression: {e}")))
}

/// Inflate a complete zlib stream
///
/// Fails with [`BitError::CorruptStream`] on garbage or truncated input;
/// trailing bytes after the end of the stream are rejected as well.
pub fn decompress(data: &[u8]) -> Result<Bytes> {
    let (content, consumed) = decompress_prefix(data, data.len().saturating_mul(2))?;

    if consumed != data.len() {
        return Err(BitError::CorruptStream(format!(
            "{} trailing bytes after end of stream",
            data.len() - consumed
        )));
    }

    Ok(content)
}

/// Inflate one zlib stream from the front of `data`
///
/// Returns the inflated bytes and how many input bytes the stream occupied,
/// so callers can walk several concatenated streams. The stream must reach
/// its end marker; running out of input first is a `CorruptStream`.
///
/// `size_hint` is the expected inflated length. The returned buffer holds
/// exactly the inflated bytes whatever the hint or the input length.
pub fn decompress_prefix(data: &[u8], size_hint: usize) -> Result<(Bytes, usize)> {
    let (content, consumed) = inflate_prefix(data, size_hint)?;
    Ok((content.into(), consumed))
}

fn inflate_prefix(data: &[u8], size_hint: usize) -> Result<(Vec<u8>, usize)> {
    let mut inflater = flate2::Decompress::new(true);
    let capacity = size_hint.saturating_add(1).clamp(64, MAX_PREALLOCATION);
    let mut decompressed_content = Vec::with_capacity(capacity);

    loop {
        let (before_in, before_out) = (inflater.total_in(), inflater.total_out());
        let consumed = before_in as usize;

        let status = inflater
            .decompress_vec(
                &data[consumed..],
                &mut decompressed_content,
                flate2::FlushDecompress::Finish,
            )
            .map_err(|e| BitError::CorruptStream(e.to_string()))?;

        if status == flate2::Status::StreamEnd {
            break;
        }

        if decompressed_content.len() == decompressed_content.capacity() {
            decompressed_content.reserve(decompressed_content.capacity());
            continue;
        }

        let progressed = inflater.total_in() > before_in || inflater.total_out() > before_out;
        if !progressed || inflater.total_in() as usize == data.len() {
            return Err(BitError::CorruptStream(
                "unexpected end of compressed stream".to_string(),
            ));
        }
    }

    decompressed_content.shrink_to_fit();
    Ok((decompressed_content, inflater.total_in() as usize))
}
