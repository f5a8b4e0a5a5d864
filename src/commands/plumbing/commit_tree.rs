use crate::areas::repository::Repository;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;

impl Repository {
    pub fn commit_tree(
        &self,
        tree_sha: &str,
        parent_sha: Option<&str>,
        message: &str,
    ) -> anyhow::Result<()> {
        let tree_oid = ObjectId::try_parse(tree_sha)?;
        let object_type = self
            .database()
            .object_type(&tree_oid)
            .with_context(|| format!("Failed to read tree {tree_sha}"))?;
        if object_type != ObjectType::Tree {
            anyhow::bail!("{tree_sha} is a {object_type}, not a tree");
        }

        let parent = match parent_sha {
            Some(parent_sha) => {
                let parent = ObjectId::try_parse(parent_sha)?;
                if self.database().parse_object_as_commit(&parent)?.is_none() {
                    anyhow::bail!("{parent_sha} is not a commit");
                }
                Some(parent)
            }
            None => None,
        };

        let mut message = message.to_string();
        if !message.ends_with('\n') {
            message.push('\n');
        }

        let commit_oid = self
            .write_commit(tree_oid, parent, &message)
            .context("Failed to write commit object")?;

        writeln!(self.writer(), "{commit_oid}")?;

        Ok(())
    }
}
