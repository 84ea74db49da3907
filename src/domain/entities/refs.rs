use serde::{Deserialize, Serialize};

/// Author metadata carried by an annotated tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagAnnotation {
    /// Tagger name
    pub author: String,
    /// Tagger email
    pub author_email: String,
    /// Tag message
    pub message: String,
}

impl TagAnnotation {
    pub fn new(
        author: impl Into<String>,
        author_email: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            author: author.into(),
            author_email: author_email.into(),
            message: message.into(),
        }
    }
}

/// A branch as observed in a repository namespace.
///
/// `is_remote` distinguishes remote-tracking branches from local ones;
/// names are unique within each namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    /// Branch name without the ref prefix
    pub name: String,
    /// Commit id the branch head points at
    pub head_commit_id: String,
    /// Whether this is a remote-tracking branch
    pub is_remote: bool,
}

impl Branch {
    pub fn new(
        name: impl Into<String>,
        head_commit_id: impl Into<String>,
        is_remote: bool,
    ) -> Self {
        Self {
            name: name.into(),
            head_commit_id: head_commit_id.into(),
            is_remote,
        }
    }
}

/// A tag as observed in a repository.
///
/// Lightweight tags carry no annotation; annotated tags record who created
/// them and why. `commit_id` is always the commit the tag resolves to, not
/// the tag object itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Tag name without the ref prefix
    pub name: String,
    /// Commit id the tag resolves to
    pub commit_id: String,
    /// Annotation metadata, if the tag is annotated
    pub annotation: Option<TagAnnotation>,
}

impl Tag {
    pub fn new(name: impl Into<String>, commit_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commit_id: commit_id.into(),
            annotation: None,
        }
    }

    pub fn with_annotation(mut self, annotation: TagAnnotation) -> Self {
        self.annotation = Some(annotation);
        self
    }
}
