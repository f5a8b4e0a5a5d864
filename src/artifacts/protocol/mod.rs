//! Smart HTTP protocol, version 0
//!
//! - `pkt_line`: length-prefixed line framing
//! - `capabilities`: capability list parsing and negotiation
//! - `advertisement`: `info/refs` listing and choice of the branch to clone
//! - `upload_pack`: want/done request and pack extraction from the response
//! - `http`: the per-clone HTTP session

pub mod advertisement;
pub mod capabilities;
pub mod http;
pub mod pkt_line;
pub mod upload_pack;
