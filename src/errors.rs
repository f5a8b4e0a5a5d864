//! Error taxonomy of the object/pack engine
//!
//! Every core operation returns [`Result`]. The command layer wraps these in
//! `anyhow` with human-readable context; the engine itself never retries and
//! never recovers partially.

use crate::artifacts::objects::object_id::ObjectId;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum BitError {
    /// Digest absent from the object store
    #[error("object {0} not found")]
    ObjectNotFound(ObjectId),

    /// Stored entry failed to decompress, or its digest does not match its key
    #[error("corrupt object {oid}: {reason}")]
    CorruptObject { oid: ObjectId, reason: String },

    /// Input to the decompressor is not a complete zlib stream
    #[error("corrupt compressed stream: {0}")]
    CorruptStream(String),

    #[error("corrupt pack: {0}")]
    CorruptPack(String),

    #[error("malformed tree: {0}")]
    MalformedTree(String),

    #[error("malformed commit: {0}")]
    MalformedCommit(String),

    #[error("malformed object frame: {0}")]
    MalformedFrame(String),

    #[error("invalid object id: {0}")]
    InvalidObjectId(String),

    /// Unreadable ref file or a branch name that cannot be stored under refs/
    #[error("invalid reference: {0}")]
    InvalidRef(String),

    #[error("network failure: {0}")]
    NetworkFailure(String),

    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, BitError>;

impl From<reqwest::Error> for BitError {
    fn from(error: reqwest::Error) -> Self {
        BitError::NetworkFailure(error.to_string())
    }
}

/// Attach the offending path to an io error
pub trait IoResultExt<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| BitError::Io {
            path: path.into(),
            source,
        })
    }
}
