use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use url::Url;

use crate::domain::value_objects::scm_kind::ScmKind;

/// Remote URL related errors
#[derive(Debug, Error, PartialEq)]
pub enum RemoteUrlError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(String),

    #[error("Invalid characters in URL: {0}")]
    InvalidCharacters(String),
}

/// Remote repository location value object.
///
/// Accepts standard URLs (`https://`, `http://`, `ssh://`, `git://`,
/// `file://`), scp-like syntax (`git@host:org/repo.git`) and plain local
/// paths. The scheme is kept for backend selection; the original string is
/// preserved verbatim for the backend transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteUrl {
    url: String,
    scheme: String,
}

impl RemoteUrl {
    /// Create a new RemoteUrl, validating and classifying the input.
    pub fn new(url: &str) -> Result<Self, RemoteUrlError> {
        let trimmed = url.trim();

        if trimmed.is_empty() {
            return Err(RemoteUrlError::InvalidFormat("Empty URL".to_string()));
        }
        if trimmed.chars().any(|c| c.is_control()) {
            return Err(RemoteUrlError::InvalidCharacters(trimmed.to_string()));
        }

        let scheme = Self::classify_scheme(trimmed)?;

        Ok(Self {
            url: trimmed.to_string(),
            scheme,
        })
    }

    fn classify_scheme(url: &str) -> Result<String, RemoteUrlError> {
        if url.contains("://") {
            let parsed =
                Url::parse(url).map_err(|_| RemoteUrlError::InvalidFormat(url.to_string()))?;
            return Ok(parsed.scheme().to_string());
        }

        // scp-like syntax: user@host:path
        if let Some(at) = url.find('@') {
            let rest = &url[at + 1..];
            if let Some(colon) = rest.find(':') {
                let host = &rest[..colon];
                if !host.is_empty() && !host.contains('/') {
                    return Ok("ssh".to_string());
                }
            }
        }

        // Anything else is treated as a local filesystem path.
        Ok("file".to_string())
    }

    /// The URL string as supplied by the caller.
    pub fn as_str(&self) -> &str {
        &self.url
    }

    /// The URL scheme used for backend selection.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The backend kind claiming this URL scheme, if any.
    pub fn scm_kind(&self) -> Option<ScmKind> {
        ScmKind::for_scheme(&self.scheme)
    }
}

impl fmt::Display for RemoteUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_https_url() {
        let url = RemoteUrl::new("https://github.com/example/repo.git").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.scm_kind(), Some(ScmKind::Git));
    }

    #[test]
    fn test_scp_like_url() {
        let url = RemoteUrl::new("git@github.com:example/repo.git").unwrap();
        assert_eq!(url.scheme(), "ssh");
        assert_eq!(url.as_str(), "git@github.com:example/repo.git");
        assert_eq!(url.scm_kind(), Some(ScmKind::Git));
    }

    #[test]
    fn test_local_path() {
        let url = RemoteUrl::new("/srv/git/upstream.git").unwrap();
        assert_eq!(url.scheme(), "file");
        assert_eq!(url.scm_kind(), Some(ScmKind::Git));
    }

    #[test]
    fn test_file_url() {
        let url = RemoteUrl::new("file:///srv/git/upstream.git").unwrap();
        assert_eq!(url.scheme(), "file");
    }

    #[test]
    fn test_empty_url_is_rejected() {
        assert_eq!(
            RemoteUrl::new("   "),
            Err(RemoteUrlError::InvalidFormat("Empty URL".to_string()))
        );
    }

    #[test]
    fn test_control_characters_are_rejected() {
        let result = RemoteUrl::new("https://example.com/\0repo.git");
        assert!(matches!(result, Err(RemoteUrlError::InvalidCharacters(_))));
    }

    #[test]
    fn test_unknown_scheme_has_no_backend() {
        let url = RemoteUrl::new("p4://depot.example.com/stream").unwrap();
        assert_eq!(url.scheme(), "p4");
        assert_eq!(url.scm_kind(), None);
    }
}
