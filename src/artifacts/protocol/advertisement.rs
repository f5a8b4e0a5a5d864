//! Ref advertisement of `info/refs?service=git-upload-pack`
//!
//! ```text
//! 001e# service=git-upload-pack\n
//! 0000
//! 00xx<oid> HEAD\0<capabilities>\n
//! 00xx<oid> refs/heads/main\n
//! 0000
//! ```

use crate::areas::refs::{BranchName, HEAD_REF_NAME, HEADS_PREFIX};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::protocol::capabilities::ServerCapabilities;
use crate::artifacts::protocol::pkt_line::{PktLine, PktLineReader};
use crate::errors::{BitError, Result};
use bytes::Bytes;

const SERVICE_PREFIX: &str = "# service=";
const PEELED_SUFFIX: &str = "^{}";

/// Branches tried, in order, when the server does not name HEAD's target
const PREFERRED_BRANCHES: [&str; 2] = ["main", "master"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisedRef {
    pub name: String,
    pub oid: ObjectId,
}

/// Commit a clone should check out, and the branch it is on
///
/// `branch` is `None` when the remote HEAD is detached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteHead {
    pub branch: Option<BranchName>,
    pub oid: ObjectId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefAdvertisement {
    refs: Vec<AdvertisedRef>,
    capabilities: ServerCapabilities,
}

impl RefAdvertisement {
    pub fn parse(body: Bytes) -> Result<Self> {
        let mut reader = PktLineReader::new(body);
        let mut advertisement = RefAdvertisement::default();
        let mut first_ref = true;

        let mut line = reader.next_line()?;
        // smart HTTP prefixes the listing with a service banner and a flush
        if let Some(text) = line.as_ref().and_then(PktLine::text)
            && let Some(service) = text.strip_prefix(SERVICE_PREFIX)
        {
            if service != "git-upload-pack" {
                return Err(BitError::ProtocolError(format!(
                    "unexpected service {service:?} in ref advertisement"
                )));
            }
            if reader.next_line()? != Some(PktLine::Flush) {
                return Err(BitError::ProtocolError(
                    "missing flush after service banner".to_string(),
                ));
            }
            line = reader.next_line()?;
        }

        loop {
            let text = match &line {
                Some(PktLine::Flush) => break,
                None => {
                    return Err(BitError::ProtocolError(
                        "ref advertisement ends without a flush".to_string(),
                    ));
                }
                Some(PktLine::Data(data)) => {
                    let data = data.strip_suffix(b"\n").unwrap_or(&data[..]);
                    String::from_utf8_lossy(data).into_owned()
                }
            };

            let (reference, capabilities) = match text.split_once('\0') {
                Some((reference, capabilities)) if first_ref => (reference, Some(capabilities)),
                Some(_) => {
                    return Err(BitError::ProtocolError(
                        "capabilities announced after the first ref".to_string(),
                    ));
                }
                None => (text.as_str(), None),
            };
            if let Some(capabilities) = capabilities {
                advertisement.capabilities = ServerCapabilities::parse(capabilities);
            }
            first_ref = false;

            let (oid, name) = reference.split_once(' ').ok_or_else(|| {
                BitError::ProtocolError(format!("malformed ref line {reference:?}"))
            })?;
            let oid = ObjectId::try_parse(oid)
                .map_err(|_| BitError::ProtocolError(format!("malformed ref id {oid:?}")))?;

            // empty repositories advertise a null id named "capabilities^{}"
            if !oid.is_null() && !name.ends_with(PEELED_SUFFIX) {
                advertisement.refs.push(AdvertisedRef {
                    name: name.to_string(),
                    oid,
                });
            }

            line = reader.next_line()?;
        }

        Ok(advertisement)
    }

    pub fn refs(&self) -> &[AdvertisedRef] {
        &self.refs
    }

    pub fn capabilities(&self) -> &ServerCapabilities {
        &self.capabilities
    }

    pub fn find(&self, name: &str) -> Option<&AdvertisedRef> {
        self.refs.iter().find(|r| r.name == name)
    }

    /// Choose the branch to clone
    ///
    /// The `symref=HEAD:` capability wins; otherwise a branch whose id equals
    /// HEAD's, preferring `main` then `master`; otherwise the first of those
    /// that exists at all. A HEAD that matches no branch is cloned detached.
    pub fn remote_head(&self) -> Result<RemoteHead> {
        if self.refs.is_empty() {
            return Err(BitError::ProtocolError(
                "remote repository is empty".to_string(),
            ));
        }

        if let Some(target) = self.capabilities.head_target()
            && let Some(advertised) = self.find(target)
        {
            return Ok(RemoteHead {
                branch: Some(BranchName::try_from_ref(target)?),
                oid: advertised.oid,
            });
        }

        let head_oid = self.find(HEAD_REF_NAME).map(|r| r.oid);
        let branches = self
            .refs
            .iter()
            .filter(|r| r.name.starts_with(HEADS_PREFIX))
            .collect::<Vec<_>>();

        let preferred = |candidates: &[&AdvertisedRef]| -> Option<AdvertisedRef> {
            PREFERRED_BRANCHES
                .iter()
                .find_map(|name| {
                    candidates
                        .iter()
                        .find(|r| r.name.strip_prefix(HEADS_PREFIX) == Some(*name))
                })
                .or_else(|| candidates.first())
                .map(|r| (*r).clone())
        };

        let chosen = match head_oid {
            Some(head_oid) => {
                let matching = branches
                    .iter()
                    .copied()
                    .filter(|r| r.oid == head_oid)
                    .collect::<Vec<_>>();
                match preferred(&matching) {
                    Some(chosen) => chosen,
                    None => {
                        return Ok(RemoteHead {
                            branch: None,
                            oid: head_oid,
                        });
                    }
                }
            }
            None => preferred(&branches).ok_or_else(|| {
                BitError::ProtocolError("remote advertises no branch to check out".to_string())
            })?,
        };

        Ok(RemoteHead {
            branch: Some(BranchName::try_from_ref(&chosen.name)?),
            oid: chosen.oid,
        })
    }
}
