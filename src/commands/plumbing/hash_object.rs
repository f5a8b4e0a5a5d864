use crate::areas::repository::Repository;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::object::Object;
use anyhow::Context;

impl Repository {
    pub fn hash_object(&self, object_path: &str, write: bool) -> anyhow::Result<()> {
        let path = self.path().join(object_path);
        let content =
            std::fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;

        let blob = Blob::new(content);
        let object_id = if write {
            self.database()
                .store(&blob)
                .context("Failed to write blob to the object database")?
        } else {
            blob.object_id()?
        };

        writeln!(self.writer(), "{object_id}")?;

        Ok(())
    }
}
