use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::domain::value_objects::remote_url::RemoteUrl;

/// A repository binding: one remote location paired with one local working
/// copy, plus the caller's retry preference for network-facing operations.
///
/// Bindings are immutable; a different remote/local pair is a different
/// `Repository`. Identity is the (remote URL, local directory) pair — the
/// retry flag only selects how the handle is composed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Repository {
    remote_url: RemoteUrl,
    local_directory: PathBuf,
    retry_enabled: bool,
}

impl Repository {
    /// Create a new repository binding with retries disabled.
    pub fn new(remote_url: RemoteUrl, local_directory: impl Into<PathBuf>) -> Self {
        Self {
            remote_url,
            local_directory: local_directory.into(),
            retry_enabled: false,
        }
    }

    /// Enable or disable retry wrapping for fetch/push.
    pub fn with_retry(mut self, retry_enabled: bool) -> Self {
        self.retry_enabled = retry_enabled;
        self
    }

    /// The remote location this binding points at.
    pub fn remote_url(&self) -> &RemoteUrl {
        &self.remote_url
    }

    /// The local working copy directory.
    pub fn local_directory(&self) -> &Path {
        &self.local_directory
    }

    /// Whether fetch/push should be wrapped by the retry orchestrator.
    pub fn retry_enabled(&self) -> bool {
        self.retry_enabled
    }

    /// The identity key of this binding.
    pub fn key(&self) -> (String, PathBuf) {
        (
            self.remote_url.as_str().to_string(),
            self.local_directory.clone(),
        )
    }
}
