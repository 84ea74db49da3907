use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Prefix marking a branch version string.
const BRANCH_PREFIX: &str = "b:";
/// Prefix marking a tag version string.
const TAG_PREFIX: &str = "t:";

/// SourceVersion parsing errors
#[derive(Debug, Error, PartialEq)]
pub enum SourceVersionError {
    #[error("Version string has no type prefix: {0}")]
    MissingPrefix(String),

    #[error("Unknown version type prefix: {0}")]
    UnknownPrefix(String),

    #[error("Version name is empty")]
    EmptyName,
}

/// A symbolic, type-prefixed version identifier spanning branches and tags.
///
/// The wire form is `"b:<name>"` for branches and `"t:<name>"` for tags;
/// the prefix is the sole discriminator. `Display` and `FromStr` are exact
/// inverses, so every emitted string round-trips to the identical value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceVersion {
    /// A branch identified by name
    Branch(String),
    /// A tag identified by name
    Tag(String),
}

impl SourceVersion {
    /// Create a branch version.
    pub fn branch(name: impl Into<String>) -> Self {
        Self::Branch(name.into())
    }

    /// Create a tag version.
    pub fn tag(name: impl Into<String>) -> Self {
        Self::Tag(name.into())
    }

    /// The version name without its type prefix.
    pub fn name(&self) -> &str {
        match self {
            Self::Branch(name) | Self::Tag(name) => name,
        }
    }

    /// Whether this version names a branch.
    pub fn is_branch(&self) -> bool {
        matches!(self, Self::Branch(_))
    }

    /// Whether this version names a tag.
    pub fn is_tag(&self) -> bool {
        matches!(self, Self::Tag(_))
    }

    /// The fully qualified ref name of this version.
    pub fn ref_name(&self) -> String {
        match self {
            Self::Branch(name) => format!("refs/heads/{name}"),
            Self::Tag(name) => format!("refs/tags/{name}"),
        }
    }
}

impl fmt::Display for SourceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Branch(name) => write!(f, "{BRANCH_PREFIX}{name}"),
            Self::Tag(name) => write!(f, "{TAG_PREFIX}{name}"),
        }
    }
}

impl FromStr for SourceVersion {
    type Err = SourceVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, name) = match s.split_once(':') {
            Some((prefix, name)) => (prefix, name),
            None => return Err(SourceVersionError::MissingPrefix(s.to_string())),
        };

        if name.is_empty() {
            return Err(SourceVersionError::EmptyName);
        }

        match prefix {
            "b" => Ok(Self::Branch(name.to_string())),
            "t" => Ok(Self::Tag(name.to_string())),
            other => Err(SourceVersionError::UnknownPrefix(other.to_string())),
        }
    }
}

impl Serialize for SourceVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SourceVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// Filter selecting which versions an operation targets when no single
/// version is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionSelector {
    /// The current head reference only
    Head,
    /// Every branch
    AllBranches,
    /// Every tag
    AllTags,
    /// Every branch and every tag
    All,
}

/// A resolved, concrete reference pinning an exact point in history, as
/// opposed to the symbolic [`SourceVersion`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceControlVersion {
    version: SourceVersion,
    commit_id: String,
}

impl SourceControlVersion {
    pub fn new(version: SourceVersion, commit_id: impl Into<String>) -> Self {
        Self {
            version,
            commit_id: commit_id.into(),
        }
    }

    pub fn version(&self) -> &SourceVersion {
        &self.version
    }

    pub fn commit_id(&self) -> &str {
        &self.commit_id
    }
}

/// What a fetch or push operation synchronizes.
///
/// Collapses the everything / one-version / type-filter operation variants
/// into a single argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncTarget {
    /// All branches and tags
    Everything,
    /// One pinned version
    Version(SourceControlVersion),
    /// All versions matching a type filter
    Matching(VersionSelector),
}
