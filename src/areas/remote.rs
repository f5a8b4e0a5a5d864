//! Clone client
//!
//! A clone walks `Discovering → Negotiating → Receiving → Unpacking →
//! CheckingOut → Done`. Every stage runs to completion before the next starts;
//! the first failure aborts the clone and leaves already written objects and
//! files where they are.

use crate::areas::database::Database;
use crate::areas::refs::{DEFAULT_REMOTE, Refs};
use crate::areas::workspace::Workspace;
use crate::artifacts::pack::reader::{PackReader, PackSummary};
use crate::artifacts::protocol::advertisement::RemoteHead;
use crate::artifacts::protocol::http::{HttpSession, RemoteConfig};
use crate::artifacts::protocol::upload_pack::{build_request, read_response};
use crate::errors::{BitError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneState {
    Discovering,
    Negotiating,
    Receiving,
    Unpacking,
    CheckingOut,
    Done,
}

/// What a finished clone fetched and wrote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneOutcome {
    pub head: RemoteHead,
    pub summary: PackSummary,
    pub files_written: usize,
}

pub struct CloneClient<'r> {
    database: &'r Database,
    workspace: &'r Workspace,
    refs: &'r Refs,
    state: CloneState,
}

impl<'r> CloneClient<'r> {
    pub fn new(database: &'r Database, workspace: &'r Workspace, refs: &'r Refs) -> Self {
        CloneClient {
            database,
            workspace,
            refs,
            state: CloneState::Discovering,
        }
    }

    /// Stage reached so far; after a failure, the stage that failed
    pub fn state(&self) -> CloneState {
        self.state
    }

    pub async fn run(&mut self, url: &str, config: &RemoteConfig) -> Result<CloneOutcome> {
        // the session lives exactly as long as this call
        let session = HttpSession::open(url, config)?;

        self.enter(CloneState::Discovering);
        let advertisement = session.discover_refs().await?;
        let head = advertisement.remote_head()?;
        tracing::info!(
            refs = advertisement.refs().len(),
            branch = ?head.branch,
            oid = %head.oid,
            "discovered remote head"
        );

        self.enter(CloneState::Negotiating);
        let capabilities = advertisement.capabilities().negotiate();
        tracing::debug!(capabilities = ?capabilities.to_names(), "negotiated capabilities");
        let agent = advertisement
            .capabilities()
            .agent
            .as_ref()
            .map(|_| config.user_agent.as_str());
        let request = build_request(&head.oid, capabilities, agent)?;

        self.enter(CloneState::Receiving);
        let body = session.upload_pack(request).await?;
        let pack = read_response(body, capabilities.uses_side_band())?;
        drop(session);

        self.enter(CloneState::Unpacking);
        let summary = PackReader::new(self.database).unpack(&pack)?;
        tracing::info!(
            objects = summary.object_count,
            deltas = summary.delta_count,
            "unpacked objects"
        );

        self.enter(CloneState::CheckingOut);
        let commit = self
            .database
            .parse_object_as_commit(&head.oid)?
            .ok_or_else(|| BitError::CorruptPack(format!("{} is not a commit", head.oid)))?;
        let files_written = self.workspace.checkout(self.database, *commit.tree_oid())?;
        tracing::info!(files = files_written, "checked out working tree");

        match &head.branch {
            Some(branch) => {
                self.refs.update_branch(branch, &head.oid)?;
                self.refs
                    .update_remote_branch(DEFAULT_REMOTE, branch, &head.oid)?;
                self.refs.set_head(branch)?;
            }
            None => self.refs.set_detached_head(&head.oid)?,
        }

        self.enter(CloneState::Done);
        Ok(CloneOutcome {
            head,
            summary,
            files_written,
        })
    }

    fn enter(&mut self, state: CloneState) {
        tracing::debug!(from = ?self.state, to = ?state, "clone stage");
        self.state = state;
    }
}
