use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Metadata describing a commit to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitArgument {
    /// Commit author name
    pub author: String,
    /// Commit author email
    pub author_email: String,
    /// Commit message
    pub message: String,
    /// Optional explicit commit reference the caller wants recorded
    /// alongside the new commit (e.g. the upstream commit being mirrored)
    pub reference: Option<String>,
    /// Branch the commit lands on; the current head branch when omitted.
    /// An unborn head is repointed, so the first commit in an empty
    /// working copy creates this branch.
    pub branch: Option<String>,
}

impl CommitArgument {
    pub fn new(
        author: impl Into<String>,
        author_email: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            author: author.into(),
            author_email: author_email.into(),
            message: message.into(),
            reference: None,
            branch: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }
}

/// File mode of a committed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileMode {
    /// Regular non-executable file
    Regular,
    /// Executable file
    Executable,
}

impl Default for FileMode {
    fn default() -> Self {
        Self::Regular
    }
}

impl FileMode {
    pub fn is_executable(&self) -> bool {
        matches!(self, Self::Executable)
    }
}

/// In-memory content to be committed without requiring it to already exist
/// in the local working copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Path relative to the working copy root
    pub relative_path: PathBuf,
    /// File contents
    pub contents: Vec<u8>,
    /// File mode
    pub mode: FileMode,
}

impl FileDescriptor {
    pub fn new(relative_path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            relative_path: relative_path.into(),
            contents: contents.into(),
            mode: FileMode::Regular,
        }
    }

    pub fn with_mode(mut self, mode: FileMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Metadata for a new tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagArgument {
    /// Commit the tag points at; the current head when omitted
    pub commit_id: Option<String>,
    /// Tagger name
    pub author: String,
    /// Tagger email
    pub author_email: String,
    /// Tag message
    pub message: String,
}

impl TagArgument {
    pub fn new(
        author: impl Into<String>,
        author_email: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            commit_id: None,
            author: author.into(),
            author_email: author_email.into(),
            message: message.into(),
        }
    }

    pub fn with_commit_id(mut self, commit_id: impl Into<String>) -> Self {
        self.commit_id = Some(commit_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_commit_argument_builder() {
        let arg = CommitArgument::new("Alice", "alice@example.com", "Import upstream")
            .with_reference("deadbeef");

        assert_eq!(arg.author, "Alice");
        assert_eq!(arg.reference.as_deref(), Some("deadbeef"));
        assert_eq!(arg.branch, None);
    }

    #[test]
    fn test_commit_argument_with_branch() {
        let arg = CommitArgument::new("Alice", "alice@example.com", "Import")
            .with_branch("main");
        assert_eq!(arg.branch.as_deref(), Some("main"));
    }

    #[test]
    fn test_file_descriptor_defaults_to_regular() {
        let file = FileDescriptor::new("src/lib.rs", b"fn main() {}".to_vec());
        assert_eq!(file.relative_path, Path::new("src/lib.rs"));
        assert_eq!(file.mode, FileMode::Regular);
        assert!(!file.mode.is_executable());
    }

    #[test]
    fn test_file_descriptor_executable() {
        let file = FileDescriptor::new("build.sh", b"#!/bin/sh\n".to_vec())
            .with_mode(FileMode::Executable);
        assert!(file.mode.is_executable());
    }

    #[test]
    fn test_tag_argument_builder() {
        let arg = TagArgument::new("Bob", "bob@example.com", "v1 release").with_commit_id("abc123");
        assert_eq!(arg.commit_id.as_deref(), Some("abc123"));
        assert_eq!(arg.message, "v1 release");
    }
}
