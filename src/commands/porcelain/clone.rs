use crate::areas::repository::Repository;
use crate::artifacts::protocol::http::RemoteConfig;
use anyhow::Context;

impl Repository {
    pub async fn clone(&self, url: &str) -> anyhow::Result<()> {
        if self.git_path().exists() {
            anyhow::bail!(
                "destination path '{}' already contains a git repository",
                self.path().display()
            );
        }

        eprintln!("Cloning into '{}'...", self.path().display());

        self.create_skeleton()?;
        let outcome = self
            .clone_remote(url, &RemoteConfig::default())
            .await
            .with_context(|| format!("Failed to clone {url}"))?;

        let position = match &outcome.head.branch {
            Some(branch) => format!("on branch '{branch}'"),
            None => format!("at detached HEAD {}", outcome.head.oid),
        };
        writeln!(
            self.writer(),
            "Received {} objects ({} deltas), checked out {} files {position}",
            outcome.summary.object_count,
            outcome.summary.delta_count,
            outcome.files_written,
        )?;

        Ok(())
    }
}
