use crate::areas::refs::HEAD_REF_NAME;
use crate::areas::repository::Repository;
use crate::artifacts::objects::object::ObjectBox;
use crate::artifacts::objects::object_id::ObjectId;
use anyhow::Context;

impl Repository {
    /// List a tree, or the root tree of a commit
    pub fn ls_tree(&self, object_sha: &str, name_only: bool) -> anyhow::Result<()> {
        let oid = if object_sha == HEAD_REF_NAME {
            self.refs()
                .read_head()?
                .ok_or_else(|| anyhow::anyhow!("HEAD does not point to a commit yet"))?
        } else {
            ObjectId::try_parse(object_sha)?
        };

        let tree = match self.database().parse_object(&oid)? {
            ObjectBox::Tree(tree) => *tree,
            ObjectBox::Commit(commit) => self
                .database()
                .parse_object_as_tree(commit.tree_oid())?
                .with_context(|| format!("Commit {oid} does not point to a tree"))?,
            other => anyhow::bail!("{oid} is a {}, not a tree", other.object_type()),
        };

        let mut writer = self.writer();
        for entry in tree.entries() {
            if name_only {
                writeln!(writer, "{}", entry.name)?;
            } else {
                writeln!(
                    writer,
                    "{:06o} {} {}\t{}",
                    entry.mode.as_u32(),
                    entry.mode.object_type(),
                    entry.oid,
                    entry.name
                )?;
            }
        }

        Ok(())
    }
}
