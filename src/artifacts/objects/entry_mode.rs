use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::{BitError, Result};

#[derive(Debug, Clone, Copy, Eq, Ord, Default, PartialEq, PartialOrd, Hash)]
pub enum FileMode {
    #[default]
    Regular,
    Executable,
}

/// Mode recorded for a tree entry
#[derive(Debug, Clone, Copy, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub enum EntryMode {
    File(FileMode),
    Symlink,
    Directory,
    /// Commit of a submodule
    Gitlink,
}

impl Default for EntryMode {
    fn default() -> Self {
        EntryMode::File(FileMode::Regular)
    }
}

impl EntryMode {
    /// Mode as written in tree objects (no leading zero for directories)
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryMode::File(FileMode::Regular) => "100644",
            EntryMode::File(FileMode::Executable) => "100755",
            EntryMode::Symlink => "120000",
            EntryMode::Directory => "40000",
            EntryMode::Gitlink => "160000",
        }
    }

    pub fn as_u32(&self) -> u32 {
        match self {
            EntryMode::File(FileMode::Regular) => 0o100644,
            EntryMode::File(FileMode::Executable) => 0o100755,
            EntryMode::Symlink => 0o120000,
            EntryMode::Directory => 0o40000,
            EntryMode::Gitlink => 0o160000,
        }
    }

    /// Permission bits to restore on checkout
    pub fn permissions(&self) -> u32 {
        self.as_u32() & 0o777
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, EntryMode::Directory)
    }

    /// Object type the entry's target id refers to
    pub fn object_type(&self) -> ObjectType {
        match self {
            EntryMode::Directory => ObjectType::Tree,
            EntryMode::Gitlink => ObjectType::Commit,
            EntryMode::File(_) | EntryMode::Symlink => ObjectType::Blob,
        }
    }

    /// Parse the octal text found in tree objects
    ///
    /// `040000` is accepted as an alias of `40000`, as older writers emitted it.
    pub fn from_octal_str(value: &str) -> Result<Self> {
        match value {
            "100644" => Ok(EntryMode::File(FileMode::Regular)),
            "100755" => Ok(EntryMode::File(FileMode::Executable)),
            "120000" => Ok(EntryMode::Symlink),
            "40000" | "040000" => Ok(EntryMode::Directory),
            "160000" => Ok(EntryMode::Gitlink),
            _ => Err(BitError::MalformedTree(format!(
                "unrecognized entry mode {value:?}"
            ))),
        }
    }
}

impl std::fmt::Display for EntryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("100644", EntryMode::File(FileMode::Regular))]
    #[case("100755", EntryMode::File(FileMode::Executable))]
    #[case("120000", EntryMode::Symlink)]
    #[case("40000", EntryMode::Directory)]
    #[case("160000", EntryMode::Gitlink)]
    fn mode_text_is_canonical(#[case] text: &str, #[case] mode: EntryMode) -> anyhow::Result<()> {
        assert_eq!(EntryMode::from_octal_str(text)?, mode);
        assert_eq!(mode.as_str(), text);
        assert_eq!(format!("{:o}", mode.as_u32()), text);
        Ok(())
    }

    #[rstest]
    #[case("100664")]
    #[case("644")]
    #[case("")]
    fn unknown_modes_are_malformed(#[case] text: &str) {
        assert!(matches!(
            EntryMode::from_octal_str(text),
            Err(BitError::MalformedTree(_))
        ));
    }
}
