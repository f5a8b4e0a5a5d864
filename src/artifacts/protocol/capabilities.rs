//! Capability negotiation
//!
//! The server lists its capabilities after a NUL on the first advertised ref.
//! Flags without a value map onto [`Capabilities`]; `symref=` and `agent=`
//! carry values and are kept separately.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u32 {
        const MULTI_ACK = 1 << 0;
        const MULTI_ACK_DETAILED = 1 << 1;
        const THIN_PACK = 1 << 2;
        const SIDE_BAND = 1 << 3;
        const SIDE_BAND_64K = 1 << 4;
        const OFS_DELTA = 1 << 5;
        const SHALLOW = 1 << 6;
        const NO_PROGRESS = 1 << 7;
        const INCLUDE_TAG = 1 << 8;
        const NO_DONE = 1 << 9;
        const ALLOW_TIP_SHA1_IN_WANT = 1 << 10;
        const ALLOW_REACHABLE_SHA1_IN_WANT = 1 << 11;
        const FILTER = 1 << 12;
    }
}

const CAPABILITY_NAMES: phf::Map<&'static str, Capabilities> = phf::phf_map! {
    "multi_ack" => Capabilities::MULTI_ACK,
    "multi_ack_detailed" => Capabilities::MULTI_ACK_DETAILED,
    "thin-pack" => Capabilities::THIN_PACK,
    "side-band" => Capabilities::SIDE_BAND,
    "side-band-64k" => Capabilities::SIDE_BAND_64K,
    "ofs-delta" => Capabilities::OFS_DELTA,
    "shallow" => Capabilities::SHALLOW,
    "no-progress" => Capabilities::NO_PROGRESS,
    "include-tag" => Capabilities::INCLUDE_TAG,
    "no-done" => Capabilities::NO_DONE,
    "allow-tip-sha1-in-want" => Capabilities::ALLOW_TIP_SHA1_IN_WANT,
    "allow-reachable-sha1-in-want" => Capabilities::ALLOW_REACHABLE_SHA1_IN_WANT,
    "filter" => Capabilities::FILTER,
};

/// Capabilities this client knows how to use for a fresh clone
const WANTED: Capabilities = Capabilities::OFS_DELTA
    .union(Capabilities::SIDE_BAND_64K)
    .union(Capabilities::NO_PROGRESS);

/// Everything a server announced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerCapabilities {
    pub flags: Capabilities,
    /// `(source, target)` pairs such as `("HEAD", "refs/heads/main")`
    pub symrefs: Vec<(String, String)>,
    pub agent: Option<String>,
}

impl ServerCapabilities {
    pub fn parse(list: &str) -> Self {
        let mut capabilities = ServerCapabilities::default();

        for token in list.split_whitespace() {
            if let Some(symref) = token.strip_prefix("symref=") {
                if let Some((source, target)) = symref.split_once(':') {
                    capabilities
                        .symrefs
                        .push((source.to_string(), target.to_string()));
                }
            } else if let Some(agent) = token.strip_prefix("agent=") {
                capabilities.agent = Some(agent.to_string());
            } else if let Some(flag) = CAPABILITY_NAMES.get(token) {
                capabilities.flags |= *flag;
            } else {
                tracing::trace!(capability = token, "ignoring unknown capability");
            }
        }

        capabilities
    }

    /// Target of the `HEAD` symref, when the server shares it
    pub fn head_target(&self) -> Option<&str> {
        self.symrefs
            .iter()
            .find(|(source, _)| source == "HEAD")
            .map(|(_, target)| target.as_str())
    }

    /// Pick what to request: only what both sides support
    pub fn negotiate(&self) -> Capabilities {
        let mut chosen = self.flags & WANTED;
        // side-band-64k supersedes side-band
        if !chosen.contains(Capabilities::SIDE_BAND_64K) && self.flags.contains(Capabilities::SIDE_BAND)
        {
            chosen |= Capabilities::SIDE_BAND;
        }
        chosen
    }
}

impl Capabilities {
    pub fn uses_side_band(&self) -> bool {
        self.intersects(Capabilities::SIDE_BAND | Capabilities::SIDE_BAND_64K)
    }

    /// Wire names of the set flags, in a stable order
    pub fn to_names(self) -> Vec<&'static str> {
        let mut names = CAPABILITY_NAMES
            .entries()
            .filter(|(_, flag)| self.contains(**flag))
            .map(|(name, flag)| (flag.bits(), *name))
            .collect::<Vec<_>>();
        names.sort();
        names.into_iter().map(|(_, name)| name).collect()
    }
}
