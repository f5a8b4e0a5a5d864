use crate::areas::repository::Repository;
use anyhow::Context;

impl Repository {
    pub fn write_tree(&self) -> anyhow::Result<()> {
        let tree_oid = self
            .build_tree_from_directory(self.path())
            .context("Failed to write the working directory as a tree")?;

        writeln!(self.writer(), "{tree_oid}")?;

        Ok(())
    }
}
