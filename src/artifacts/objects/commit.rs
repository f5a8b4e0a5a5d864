//! Git commit object
//!
//! Commits represent snapshots of the repository at specific points in time.
//! They contain:
//! - A tree object ID (directory snapshot)
//! - Parent commit ID(s) (for history)
//! - Author and committer information
//! - Commit message
//!
//! ## Format
//!
//! On disk:
//! ```text
//! commit <size>\0
//! tree <tree-sha>
//! parent <parent-sha>
//! author <name> <email> <timestamp> <timezone>
//! committer <name> <email> <timestamp> <timezone>
//!
//! <commit message>
//! ```
//!
//! The bytes are hashed, so field order and spacing are part of the contract.
//! Headers this crate does not interpret (`gpgsig`, `encoding`, ...) are kept
//! in order so a received commit re-serializes to the identical frame.

use crate::artifacts::objects::object::{Object, Packable, Unpackable, encode_frame};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::{BitError, Result};
use bytes::Bytes;
use chrono::{DateTime, FixedOffset};
use std::io::BufRead;

const DEFAULT_NAME: &str = "bitclone";
const DEFAULT_EMAIL: &str = "bitclone@localhost";

/// Author or committer information
///
/// Contains name, email, and timestamp with timezone information.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Author {
    name: String,
    email: String,
    timestamp: DateTime<FixedOffset>,
}

impl Author {
    /// Create a new author with the current timestamp
    pub fn new(name: String, email: String) -> Self {
        Author {
            name,
            email,
            timestamp: chrono::Local::now().fixed_offset(),
        }
    }

    pub fn new_with_timestamp(name: String, email: String, timestamp: DateTime<FixedOffset>) -> Self {
        Author {
            name,
            email,
            timestamp,
        }
    }

    /// "Name <email> timestamp timezone", as written in commit headers
    pub fn display(&self) -> String {
        format!(
            "{} <{}> {} {}",
            self.name,
            self.email,
            self.timestamp.timestamp(),
            self.timestamp.format("%z")
        )
    }

    /// Author identity from `GIT_AUTHOR_NAME`, `GIT_AUTHOR_EMAIL` and `GIT_AUTHOR_DATE`
    ///
    /// Unset name or email fall back to a fixed local identity; an unset or
    /// unparsable date means now.
    pub fn load_from_env() -> Self {
        Self::load_with_prefix("GIT_AUTHOR")
    }

    /// Committer identity from the `GIT_COMMITTER_*` variables, defaulting to `author`
    pub fn committer_from_env(author: &Author) -> Self {
        let has_committer = ["GIT_COMMITTER_NAME", "GIT_COMMITTER_EMAIL"]
            .iter()
            .any(|key| std::env::var(key).is_ok());

        if has_committer {
            Self::load_with_prefix("GIT_COMMITTER")
        } else {
            author.clone()
        }
    }

    fn load_with_prefix(prefix: &str) -> Self {
        let name = std::env::var(format!("{prefix}_NAME")).unwrap_or_else(|_| DEFAULT_NAME.to_string());
        let email =
            std::env::var(format!("{prefix}_EMAIL")).unwrap_or_else(|_| DEFAULT_EMAIL.to_string());
        let timestamp = std::env::var(format!("{prefix}_DATE"))
            .ok()
            .and_then(|date_str| {
                DateTime::parse_from_rfc2822(&date_str)
                    .or_else(|_| DateTime::parse_from_str(&date_str, "%Y-%m-%d %H:%M:%S %z"))
                    .ok()
            });

        match timestamp {
            Some(ts) => Author::new_with_timestamp(name, email, ts),
            None => Author::new(name, email),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    fn parse_timezone(value: &str) -> Option<FixedOffset> {
        let (sign, digits) = match value.as_bytes().first()? {
            b'+' => (1, &value[1..]),
            b'-' => (-1, &value[1..]),
            _ => return None,
        };
        if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }

        let hours = digits[..2].parse::<i32>().ok()?;
        let minutes = digits[2..].parse::<i32>().ok()?;
        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
    }
}

impl TryFrom<&str> for Author {
    type Error = BitError;

    fn try_from(value: &str) -> Result<Self> {
        let invalid = |what: &str| BitError::MalformedCommit(format!("{what} in {value:?}"));

        // Format: "name <email> timestamp timezone"
        let email_start = value.find('<').ok_or_else(|| invalid("missing '<'"))?;
        let email_end = value.rfind('>').ok_or_else(|| invalid("missing '>'"))?;
        if email_end < email_start {
            return Err(invalid("misplaced '>'"));
        }

        let name = value[..email_start].trim_end().to_string();
        let email = value[email_start + 1..email_end].to_string();

        let mut when = value[email_end + 1..].split_whitespace();
        let timestamp = when
            .next()
            .and_then(|ts| ts.parse::<i64>().ok())
            .ok_or_else(|| invalid("invalid timestamp"))?;
        let timezone = when
            .next()
            .and_then(Self::parse_timezone)
            .ok_or_else(|| invalid("invalid timezone"))?;

        let timestamp = DateTime::from_timestamp(timestamp, 0)
            .ok_or_else(|| invalid("timestamp out of range"))?
            .with_timezone(&timezone);

        Ok(Author {
            name,
            email,
            timestamp,
        })
    }
}

/// Git commit object
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Commit {
    /// Empty for a root commit
    parents: Vec<ObjectId>,
    tree_oid: ObjectId,
    author: Author,
    committer: Author,
    /// Uninterpreted headers after `committer`, in stored order
    extra_headers: Vec<(String, String)>,
    message: String,
}

impl Commit {
    pub fn new(
        parent: Option<ObjectId>,
        tree_oid: ObjectId,
        author: Author,
        committer: Author,
        message: String,
    ) -> Self {
        Commit {
            parents: parent.into_iter().collect(),
            tree_oid,
            author,
            committer,
            extra_headers: Vec::new(),
            message,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn tree_oid(&self) -> &ObjectId {
        &self.tree_oid
    }

    pub fn parent(&self) -> Option<&ObjectId> {
        self.parents.first()
    }

    pub fn author(&self) -> &Author {
        &self.author
    }

    pub fn committer(&self) -> &Author {
        &self.committer
    }

    fn header_block(&self) -> String {
        let mut lines = vec![];

        lines.push(format!("tree {}", self.tree_oid));
        for parent in &self.parents {
            lines.push(format!("parent {}", parent));
        }
        lines.push(format!("author {}", self.author.display()));
        lines.push(format!("committer {}", self.committer.display()));
        for (key, value) in &self.extra_headers {
            // continuation lines of multi-line values start with a space
            lines.push(format!("{} {}", key, value.replace('\n', "\n ")));
        }

        lines.join("\n")
    }

    fn parse_oid(line: &str, value: &str) -> Result<ObjectId> {
        ObjectId::try_parse(value)
            .map_err(|_| BitError::MalformedCommit(format!("invalid object id in {line:?}")))
    }
}

impl Packable for Commit {
    fn serialize(&self) -> Result<Bytes> {
        let content = format!("{}\n\n{}", self.header_block(), self.message);

        Ok(encode_frame(self.object_type(), content.as_bytes()))
    }
}

impl Unpackable for Commit {
    fn deserialize(mut reader: impl BufRead) -> Result<Self> {
        let mut content = String::new();
        reader
            .read_to_string(&mut content)
            .map_err(|_| BitError::MalformedCommit("commit is not valid UTF-8".to_string()))?;

        let (headers, message) = content
            .split_once("\n\n")
            .ok_or_else(|| BitError::MalformedCommit("missing blank line before message".to_string()))?;

        // fold continuation lines into the header they belong to
        let mut fields: Vec<(&str, String)> = Vec::new();
        for line in headers.split('\n') {
            if let Some(continuation) = line.strip_prefix(' ') {
                let (_, value) = fields.last_mut().ok_or_else(|| {
                    BitError::MalformedCommit("continuation line without header".to_string())
                })?;
                value.push('\n');
                value.push_str(continuation);
            } else {
                let (key, value) = line
                    .split_once(' ')
                    .ok_or_else(|| BitError::MalformedCommit(format!("invalid header line {line:?}")))?;
                fields.push((key, value.to_string()));
            }
        }

        let mut fields = fields.into_iter().peekable();

        let tree_oid = match fields.next() {
            Some(("tree", value)) => Self::parse_oid("tree", &value)?,
            _ => return Err(BitError::MalformedCommit("missing tree line".to_string())),
        };

        let mut parents = Vec::new();
        while let Some((_, value)) = fields.next_if(|(key, _)| *key == "parent") {
            parents.push(Self::parse_oid("parent", &value)?);
        }

        let author = match fields.next() {
            Some(("author", value)) => Author::try_from(value.as_str())?,
            _ => return Err(BitError::MalformedCommit("missing author line".to_string())),
        };
        let committer = match fields.next() {
            Some(("committer", value)) => Author::try_from(value.as_str())?,
            _ => return Err(BitError::MalformedCommit("missing committer line".to_string())),
        };

        let extra_headers = fields
            .map(|(key, value)| (key.to_string(), value))
            .collect::<Vec<_>>();

        Ok(Commit {
            parents,
            tree_oid,
            author,
            committer,
            extra_headers,
            message: message.to_string(),
        })
    }
}

impl Object for Commit {
    fn object_type(&self) -> ObjectType {
        ObjectType::Commit
    }

    fn display(&self) -> String {
        format!("{}\n\n{}", self.header_block(), self.message)
    }
}
