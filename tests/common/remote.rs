use axum::Router;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const REPOSITORY_PATH: &str = "/fixture.git";

/// A smart HTTP remote serving one fixed advertisement and one fixed pack response
#[derive(Debug, Default)]
pub struct FixtureRemote {
    advertisement: Vec<u8>,
    response: Vec<u8>,
    requests: Mutex<Vec<Vec<u8>>>,
}

impl FixtureRemote {
    pub fn new(advertisement: Vec<u8>, response: Vec<u8>) -> Self {
        FixtureRemote {
            advertisement,
            response,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Bodies of the upload-pack requests received so far
    pub fn requests(&self) -> Vec<Vec<u8>> {
        self.requests.lock().expect("requests lock").clone()
    }
}

/// Start serving on a free local port and return the repository URL
pub async fn serve(remote: FixtureRemote) -> (String, Arc<FixtureRemote>) {
    let remote = Arc::new(remote);
    let app = Router::new()
        .route(&format!("{REPOSITORY_PATH}/info/refs"), get(info_refs))
        .route(&format!("{REPOSITORY_PATH}/git-upload-pack"), post(upload_pack))
        .with_state(remote.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fixture server");
    let address = listener.local_addr().expect("fixture server address");
    tokio::spawn(async move { axum::serve(listener, app).await });

    (format!("http://{address}{REPOSITORY_PATH}"), remote)
}

async fn info_refs(
    State(remote): State<Arc<FixtureRemote>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if query.get("service").map(String::as_str) != Some("git-upload-pack") {
        return (StatusCode::FORBIDDEN, "dumb protocol not supported").into_response();
    }

    (
        [(
            header::CONTENT_TYPE,
            "application/x-git-upload-pack-advertisement",
        )],
        remote.advertisement.clone(),
    )
        .into_response()
}

async fn upload_pack(
    State(remote): State<Arc<FixtureRemote>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());
    if content_type != Some("application/x-git-upload-pack-request") {
        return StatusCode::UNSUPPORTED_MEDIA_TYPE.into_response();
    }

    remote
        .requests
        .lock()
        .expect("requests lock")
        .push(body.to_vec());

    (
        [(header::CONTENT_TYPE, "application/x-git-upload-pack-result")],
        remote.response.clone(),
    )
        .into_response()
}

pub fn pkt_line(payload: &[u8]) -> Vec<u8> {
    let mut line = format!("{:04x}", payload.len() + 4).into_bytes();
    line.extend_from_slice(payload);
    line
}

/// `info/refs` body advertising one branch as HEAD
pub fn advertisement(oid: &str, branch: &str, capabilities: &str) -> Vec<u8> {
    let mut body = pkt_line(b"# service=git-upload-pack\n");
    body.extend_from_slice(b"0000");
    body.extend(pkt_line(
        format!("{oid} HEAD\0{capabilities} symref=HEAD:refs/heads/{branch} agent=git/2.43.0\n")
            .as_bytes(),
    ));
    body.extend(pkt_line(format!("{oid} refs/heads/{branch}\n").as_bytes()));
    body.extend_from_slice(b"0000");
    body
}

/// `info/refs` body whose HEAD is on no branch, from a server naming no agent
pub fn detached_advertisement(oid: &str, capabilities: &str) -> Vec<u8> {
    let mut body = pkt_line(b"# service=git-upload-pack\n");
    body.extend_from_slice(b"0000");
    body.extend(pkt_line(format!("{oid} HEAD\0{capabilities}\n").as_bytes()));
    body.extend(pkt_line(format!("{oid} refs/tags/v1\n").as_bytes()));
    body.extend_from_slice(b"0000");
    body
}

/// `NAK` followed by the raw pack
pub fn raw_response(pack: &[u8]) -> Vec<u8> {
    let mut body = pkt_line(b"NAK\n");
    body.extend_from_slice(pack);
    body
}

/// `NAK` followed by the pack split across band 1 lines, with progress on band 2
pub fn side_band_response(pack: &[u8]) -> Vec<u8> {
    let mut body = pkt_line(b"NAK\n");
    body.extend(pkt_line(b"\x02Enumerating objects: done.\n"));
    for chunk in pack.chunks(100) {
        let mut line = vec![1u8];
        line.extend_from_slice(chunk);
        body.extend(pkt_line(&line));
    }
    body.extend(pkt_line(b"\x02Total: done.\n"));
    body.extend_from_slice(b"0000");
    body
}
