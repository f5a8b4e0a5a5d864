use crate::artifacts::core::digest;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::Tree;
use crate::errors::{BitError, Result};
use bytes::Bytes;
use std::io::{BufRead, Cursor};

/// Serialize into a complete frame (`<type> <len>\0<payload>`)
pub trait Packable {
    fn serialize(&self) -> Result<Bytes>;
}

/// Parse from a reader positioned just past the frame header
pub trait Unpackable {
    fn deserialize(reader: impl BufRead) -> Result<Self>
    where
        Self: Sized;
}

pub trait Object: Packable {
    fn object_type(&self) -> ObjectType;

    fn display(&self) -> String;

    fn object_id(&self) -> Result<ObjectId> {
        Ok(digest(&self.serialize()?))
    }
}

/// Prefix `payload` with its frame header
pub fn encode_frame(object_type: ObjectType, payload: &[u8]) -> Bytes {
    let header = format!("{} {}\0", object_type.as_str(), payload.len());

    let mut frame = Vec::with_capacity(header.len() + payload.len());
    frame.extend_from_slice(header.as_bytes());
    frame.extend_from_slice(payload);

    Bytes::from(frame)
}

/// Split a frame into its type and payload
///
/// The declared length must equal the payload's byte length exactly.
pub fn decode_frame(frame: &Bytes) -> Result<(ObjectType, Bytes)> {
    let header_end = frame
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| BitError::MalformedFrame("missing header terminator".to_string()))?;

    let header = std::str::from_utf8(&frame[..header_end])
        .map_err(|_| BitError::MalformedFrame("header is not valid UTF-8".to_string()))?;
    let (object_type, size) = header
        .split_once(' ')
        .ok_or_else(|| BitError::MalformedFrame(format!("invalid header {header:?}")))?;

    let object_type = ObjectType::try_from(object_type)?;
    let size = size
        .parse::<usize>()
        .map_err(|_| BitError::MalformedFrame(format!("invalid size in header {header:?}")))?;

    let payload = frame.slice(header_end + 1..);
    if payload.len() != size {
        return Err(BitError::MalformedFrame(format!(
            "header declares {size} bytes but payload has {}",
            payload.len()
        )));
    }

    Ok((object_type, payload))
}

pub enum ObjectBox {
    Blob(Box<Blob>),
    Tree(Box<Tree>),
    Commit(Box<Commit>),
    /// Tag payloads are kept opaque
    Tag(Bytes),
}

impl ObjectBox {
    pub fn parse(frame: &Bytes) -> Result<Self> {
        let (object_type, payload) = decode_frame(frame)?;
        let payload_reader = Cursor::new(payload.clone());

        match object_type {
            ObjectType::Blob => Ok(ObjectBox::Blob(Box::new(Blob::deserialize(
                payload_reader,
            )?))),
            ObjectType::Tree => Ok(ObjectBox::Tree(Box::new(Tree::deserialize(
                payload_reader,
            )?))),
            ObjectType::Commit => Ok(ObjectBox::Commit(Box::new(Commit::deserialize(
                payload_reader,
            )?))),
            ObjectType::Tag => Ok(ObjectBox::Tag(payload)),
        }
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            ObjectBox::Blob(_) => ObjectType::Blob,
            ObjectBox::Tree(_) => ObjectType::Tree,
            ObjectBox::Commit(_) => ObjectType::Commit,
            ObjectBox::Tag(_) => ObjectType::Tag,
        }
    }
}
