//! pkt-line framing
//!
//! Every line is prefixed with its total length (prefix included) as four hex
//! digits. `0000` is a flush marker separating sections; `0001`..`0003` are
//! never valid in protocol v0.

use crate::errors::{BitError, Result};
use bytes::Bytes;

pub const FLUSH_PKT: &[u8; 4] = b"0000";

const LENGTH_PREFIX: usize = 4;

/// Largest payload a single pkt-line can carry
pub const MAX_PAYLOAD_LENGTH: usize = 65516;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PktLine {
    Flush,
    Data(Bytes),
}

impl PktLine {
    /// Payload as text, without the conventional trailing newline
    pub fn text(&self) -> Option<&str> {
        match self {
            PktLine::Flush => None,
            PktLine::Data(data) => {
                let data = data.strip_suffix(b"\n").unwrap_or(&data[..]);
                std::str::from_utf8(data).ok()
            }
        }
    }
}

/// Frame `payload` as one pkt-line
pub fn encode(payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD_LENGTH {
        return Err(BitError::ProtocolError(format!(
            "pkt-line payload of {} bytes exceeds {MAX_PAYLOAD_LENGTH}",
            payload.len()
        )));
    }

    let mut line = format!("{:04x}", payload.len() + LENGTH_PREFIX).into_bytes();
    line.extend_from_slice(payload);
    Ok(line)
}

/// Sequential reader over a buffer of pkt-lines
///
/// Non-pkt-line data (such as a raw pack after the last line) can be taken
/// with [`PktLineReader::remaining`].
#[derive(Debug)]
pub struct PktLineReader {
    data: Bytes,
    position: usize,
}

impl PktLineReader {
    pub fn new(data: Bytes) -> Self {
        PktLineReader { data, position: 0 }
    }

    /// Next line, or `None` once the buffer is exhausted
    pub fn next_line(&mut self) -> Result<Option<PktLine>> {
        let rest = &self.data[self.position..];
        if rest.is_empty() {
            return Ok(None);
        }

        let prefix = rest.get(..LENGTH_PREFIX).ok_or_else(|| {
            BitError::ProtocolError(format!("truncated pkt-line length {rest:?}"))
        })?;
        let length = std::str::from_utf8(prefix)
            .ok()
            .and_then(|hex| usize::from_str_radix(hex, 16).ok())
            .ok_or_else(|| {
                BitError::ProtocolError(format!(
                    "invalid pkt-line length {:?}",
                    String::from_utf8_lossy(prefix)
                ))
            })?;

        match length {
            0 => {
                self.position += LENGTH_PREFIX;
                Ok(Some(PktLine::Flush))
            }
            1..LENGTH_PREFIX => Err(BitError::ProtocolError(format!(
                "unsupported special pkt-line {length:04x}"
            ))),
            _ if length > rest.len() => Err(BitError::ProtocolError(format!(
                "pkt-line declares {length} bytes but only {} remain",
                rest.len()
            ))),
            _ => {
                let start = self.position + LENGTH_PREFIX;
                let end = self.position + length;
                self.position = end;
                Ok(Some(PktLine::Data(self.data.slice(start..end))))
            }
        }
    }

    /// Unread bytes, not interpreted as pkt-lines
    pub fn remaining(&self) -> Bytes {
        self.data.slice(self.position..)
    }
}
