use crate::areas::refs::BranchName;
use crate::areas::repository::Repository;
use anyhow::Context;
use std::fs;

pub const DEFAULT_BRANCH: &str = "main";

impl Repository {
    pub fn init(&self) -> anyhow::Result<()> {
        self.create_skeleton()?;

        writeln!(
            self.writer(),
            "Initialized git directory at {}",
            self.git_path().display()
        )?;

        Ok(())
    }

    /// `.git/objects`, `.git/refs/heads` and a HEAD on the default branch
    pub(crate) fn create_skeleton(&self) -> anyhow::Result<()> {
        fs::create_dir_all(self.database().objects_path())
            .context("Failed to create .git/objects directory")?;

        fs::create_dir_all(self.refs().heads_path())
            .context("Failed to create .git/refs/heads directory")?;

        self.refs()
            .set_head(&BranchName::try_parse(DEFAULT_BRANCH)?)
            .context("Failed to create initial HEAD reference")?;

        Ok(())
    }
}
