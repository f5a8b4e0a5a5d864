//! Smart HTTP transport
//!
//! One [`HttpSession`] owns the HTTP client for a single clone. It is created
//! when the clone starts and dropped with it, so connection pools and TLS
//! state never outlive the operation.

use crate::artifacts::protocol::advertisement::RefAdvertisement;
use crate::errors::{BitError, Result};
use bytes::Bytes;
use std::time::Duration;

const UPLOAD_PACK_SERVICE: &str = "git-upload-pack";
const ADVERTISEMENT_CONTENT_TYPE: &str = "application/x-git-upload-pack-advertisement";
const REQUEST_CONTENT_TYPE: &str = "application/x-git-upload-pack-request";
const RESULT_CONTENT_TYPE: &str = "application/x-git-upload-pack-result";

/// Transport settings of a clone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Sent as the HTTP user agent and as the `agent` capability
    pub user_agent: String,
    /// Per-request timeout; `None` waits as long as the remote does
    pub timeout: Option<Duration>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            user_agent: format!("bitclone/{}", env!("CARGO_PKG_VERSION")),
            timeout: None,
        }
    }
}

#[derive(Debug)]
pub struct HttpSession {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSession {
    pub fn open(url: &str, config: &RemoteConfig) -> Result<Self> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| BitError::ProtocolError(format!("invalid remote URL {url:?}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(BitError::ProtocolError(format!(
                "unsupported scheme {:?} in {url:?}",
                parsed.scheme()
            )));
        }

        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.as_str());
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(HttpSession {
            client: builder.build()?,
            base_url: url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET <url>/info/refs?service=git-upload-pack`
    pub async fn discover_refs(&self) -> Result<RefAdvertisement> {
        let url = format!("{}/info/refs?service={UPLOAD_PACK_SERVICE}", self.base_url);
        tracing::debug!(%url, "discovering refs");

        let response = self.client.get(&url).send().await?.error_for_status()?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        if !content_type.starts_with(ADVERTISEMENT_CONTENT_TYPE) {
            return Err(BitError::ProtocolError(format!(
                "{url} answered with {content_type:?}; the remote does not speak the smart protocol"
            )));
        }

        RefAdvertisement::parse(response.bytes().await?)
    }

    /// `POST <url>/git-upload-pack`, returning the raw response body
    pub async fn upload_pack(&self, request: Vec<u8>) -> Result<Bytes> {
        let url = format!("{}/{UPLOAD_PACK_SERVICE}", self.base_url);
        tracing::debug!(%url, bytes = request.len(), "requesting pack");

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, REQUEST_CONTENT_TYPE)
            .header(reqwest::header::ACCEPT, RESULT_CONTENT_TYPE)
            .body(request)
            .send()
            .await?
            .error_for_status()?;

        let body = response.bytes().await?;
        tracing::debug!(bytes = body.len(), "received upload-pack response");

        Ok(body)
    }
}
