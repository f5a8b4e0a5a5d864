use crate::areas::repository::Repository;
use crate::artifacts::objects::object::{Object, ObjectBox};
use crate::artifacts::objects::object_id::ObjectId;
use anyhow::Context;
use std::io::Write;

impl Repository {
    pub fn cat_file(&self, object_sha: &str) -> anyhow::Result<()> {
        let oid = ObjectId::try_parse(object_sha)?;
        let object = self
            .database()
            .parse_object(&oid)
            .with_context(|| format!("Failed to read object {object_sha}"))?;

        let mut writer = self.writer();
        match object {
            // blobs may be binary, so they are copied untouched
            ObjectBox::Blob(blob) => writer.write_all(blob.content())?,
            ObjectBox::Tree(tree) => writeln!(writer, "{}", tree.display())?,
            ObjectBox::Commit(commit) => write!(writer, "{}", commit.display())?,
            ObjectBox::Tag(payload) => writer.write_all(&payload)?,
        }

        Ok(())
    }
}
