//! `git-upload-pack` request and response
//!
//! A fresh clone wants one commit and has nothing, so negotiation is a single
//! round: `want` + flush + `done`, answered by `NAK` and the pack.

use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::protocol::capabilities::Capabilities;
use crate::artifacts::protocol::pkt_line::{FLUSH_PKT, PktLine, PktLineReader, encode};
use crate::artifacts::pack::PACK_SIGNATURE;
use crate::errors::{BitError, Result};
use bytes::Bytes;

const BAND_DATA: u8 = 1;
const BAND_PROGRESS: u8 = 2;
const BAND_ERROR: u8 = 3;

/// Body of the upload-pack POST
///
/// `agent` is only announced back to servers that advertised one themselves.
pub fn build_request(
    want: &ObjectId,
    capabilities: Capabilities,
    agent: Option<&str>,
) -> Result<Vec<u8>> {
    let mut want_line = format!("want {want}");
    for name in capabilities.to_names() {
        want_line.push(' ');
        want_line.push_str(name);
    }
    if let Some(agent) = agent.filter(|agent| !agent.is_empty()) {
        want_line.push_str(&format!(" agent={agent}"));
    }
    want_line.push('\n');

    let mut body = encode(want_line.as_bytes())?;
    body.extend_from_slice(FLUSH_PKT);
    body.extend(encode(b"done\n")?);

    Ok(body)
}

/// Extract the pack from an upload-pack response
///
/// Acknowledgement lines come first. Without side-band the pack follows them
/// raw; with side-band it arrives in band 1 pkt-lines, interleaved with
/// progress on band 2, and a band 3 message aborts the transfer.
pub fn read_response(body: Bytes, side_band: bool) -> Result<Bytes> {
    let mut reader = PktLineReader::new(body);

    loop {
        if !side_band && reader.remaining().starts_with(PACK_SIGNATURE) {
            return Ok(reader.remaining());
        }

        match reader.next_line()? {
            Some(line) => match line.text() {
                Some(text) if text == "NAK" || text.starts_with("ACK ") => {
                    tracing::trace!(line = text, "negotiation reply");
                    if side_band {
                        return demultiplex(&mut reader);
                    }
                }
                Some(text) if text.starts_with("ERR ") => {
                    return Err(BitError::ProtocolError(format!(
                        "remote error: {}",
                        &text[4..]
                    )));
                }
                _ if line == PktLine::Flush => continue,
                _ => {
                    return Err(BitError::ProtocolError(format!(
                        "unexpected line before pack data: {line:?}"
                    )));
                }
            },
            None => {
                return Err(BitError::ProtocolError(
                    "response carries no pack data".to_string(),
                ));
            }
        }
    }
}

fn demultiplex(reader: &mut PktLineReader) -> Result<Bytes> {
    let mut pack = Vec::new();

    loop {
        let data = match reader.next_line()? {
            Some(PktLine::Data(data)) => data,
            Some(PktLine::Flush) => break,
            None => {
                return Err(BitError::ProtocolError(
                    "side-band stream ends without a flush".to_string(),
                ));
            }
        };

        let Some((&band, payload)) = data.split_first() else {
            return Err(BitError::ProtocolError("empty side-band line".to_string()));
        };
        match band {
            BAND_DATA => pack.extend_from_slice(payload),
            BAND_PROGRESS => {
                tracing::debug!(
                    progress = %String::from_utf8_lossy(payload).trim_end(),
                    "remote"
                );
            }
            BAND_ERROR => {
                return Err(BitError::ProtocolError(format!(
                    "remote error: {}",
                    String::from_utf8_lossy(payload).trim_end()
                )));
            }
            other => {
                return Err(BitError::ProtocolError(format!(
                    "unknown side-band channel {other}"
                )));
            }
        }
    }

    Ok(Bytes::from(pack))
}
