use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Version-control backend discriminator.
///
/// Selected from the remote URL scheme at handle-acquisition time. Only a
/// git backend ships today; the enum keeps the seam where further backends
/// plug in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScmKind {
    /// Git version control system
    Git,
}

impl Default for ScmKind {
    fn default() -> Self {
        Self::Git
    }
}

impl fmt::Display for ScmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScmKind::Git => write!(f, "git"),
        }
    }
}

impl FromStr for ScmKind {
    type Err = ScmKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "git" => Ok(ScmKind::Git),
            _ => Err(ScmKindError::UnsupportedKind(s.to_string())),
        }
    }
}

impl ScmKind {
    /// Classify a URL scheme into a backend kind, if any backend claims it.
    pub fn for_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_lowercase().as_str() {
            "http" | "https" | "ssh" | "git" | "file" => Some(ScmKind::Git),
            _ => None,
        }
    }
}

/// ScmKind parsing errors
#[derive(Debug, Error, PartialEq)]
pub enum ScmKindError {
    #[error("Unsupported SCM kind: {0}")]
    UnsupportedKind(String),
}
