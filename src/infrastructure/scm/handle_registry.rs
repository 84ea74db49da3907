use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::retry::{RetryPolicy, RetryingScm};
use super::scm_factory::ScmFactory;
use super::scm_interface::{ScmError, ScmResult, SourceControlActions};
use crate::domain::entities::repository::Repository;

/// Registry binding each (remote URL, local directory) pair to exactly one
/// live action handle.
///
/// The single-handle-per-pair guarantee, together with the backend's
/// internal working copy lock, gives single-writer access to each local
/// directory while independent repositories proceed in parallel.
/// Construction of a handle performs no network I/O.
pub struct RepositoryHandleRegistry {
    handles: Mutex<HashMap<(String, PathBuf), Arc<dyn SourceControlActions>>>,
    retry_policy: RetryPolicy,
}

impl RepositoryHandleRegistry {
    pub fn new() -> Self {
        Self::with_retry_policy(RetryPolicy::default())
    }

    /// A registry whose retry-enabled handles use the given policy.
    pub fn with_retry_policy(retry_policy: RetryPolicy) -> Self {
        Self {
            handles: Mutex::new(HashMap::new()),
            retry_policy,
        }
    }

    /// Return the handle for the binding, constructing and caching it on
    /// first acquisition. Identical pairs always yield the same handle.
    pub async fn acquire(
        &self,
        repository: &Repository,
    ) -> ScmResult<Arc<dyn SourceControlActions>> {
        let mut handles = self.handles.lock().await;

        if let Some(handle) = handles.get(&repository.key()) {
            debug!(remote = %repository.remote_url(), "reusing cached handle");
            return Ok(Arc::clone(handle));
        }

        validate_local_directory(repository.local_directory())?;

        let backend = ScmFactory::create(repository)?;
        let handle: Arc<dyn SourceControlActions> = if repository.retry_enabled() {
            Arc::new(RetryingScm::new(backend, self.retry_policy.clone()))
        } else {
            backend
        };

        handles.insert(repository.key(), Arc::clone(&handle));
        debug!(
            remote = %repository.remote_url(),
            local = %repository.local_directory().display(),
            retry = repository.retry_enabled(),
            "constructed handle"
        );
        Ok(handle)
    }

    /// Drop the cached handle for a binding. A correctness no-op: the next
    /// acquisition constructs a fresh handle for the same pair.
    pub async fn release(&self, repository: &Repository) {
        self.handles.lock().await.remove(&repository.key());
    }
}

impl Default for RepositoryHandleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The local directory must be creatable and writable before a handle is
/// handed out; the probe file is removed so a later clone still sees an
/// empty directory.
fn validate_local_directory(path: &Path) -> ScmResult<()> {
    if path.as_os_str().is_empty() {
        return Err(ScmError::configuration("local directory is empty"));
    }

    std::fs::create_dir_all(path).map_err(|e| {
        ScmError::configuration(format!(
            "local directory {} is not creatable: {e}",
            path.display()
        ))
    })?;

    let probe = path.join(".write-probe");
    std::fs::write(&probe, b"probe").map_err(|e| {
        ScmError::configuration(format!(
            "local directory {} is not writable: {e}",
            path.display()
        ))
    })?;
    std::fs::remove_file(&probe).map_err(|e| {
        ScmError::configuration(format!(
            "local directory {} is not writable: {e}",
            path.display()
        ))
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::remote_url::RemoteUrl;

    fn binding(remote: &str, local: &Path) -> Repository {
        Repository::new(RemoteUrl::new(remote).unwrap(), local)
    }

    #[tokio::test]
    async fn test_identical_pair_yields_identical_handle() {
        let temp = tempfile::tempdir().unwrap();
        let registry = RepositoryHandleRegistry::new();
        let repository = binding("https://example.com/r.git", &temp.path().join("work"));

        let first = registry.acquire(&repository).await.unwrap();
        let second = registry.acquire(&repository).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_distinct_pairs_yield_distinct_handles() {
        let temp = tempfile::tempdir().unwrap();
        let registry = RepositoryHandleRegistry::new();

        let first = registry
            .acquire(&binding("https://example.com/r.git", &temp.path().join("a")))
            .await
            .unwrap();
        let second = registry
            .acquire(&binding("https://example.com/r.git", &temp.path().join("b")))
            .await
            .unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_release_allows_fresh_handle() {
        let temp = tempfile::tempdir().unwrap();
        let registry = RepositoryHandleRegistry::new();
        let repository = binding("https://example.com/r.git", &temp.path().join("work"));

        let first = registry.acquire(&repository).await.unwrap();
        registry.release(&repository).await;
        let second = registry.acquire(&repository).await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_unusable_local_directory_is_configuration_error() {
        let temp = tempfile::tempdir().unwrap();
        // A file where the directory should be.
        let blocker = temp.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let registry = RepositoryHandleRegistry::new();
        let repository = binding("https://example.com/r.git", &blocker.join("work"));

        let result = registry.acquire(&repository).await;
        assert!(matches!(result, Err(ScmError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_probe_leaves_directory_empty() {
        let temp = tempfile::tempdir().unwrap();
        let work = temp.path().join("work");
        let registry = RepositoryHandleRegistry::new();

        registry
            .acquire(&binding("https://example.com/r.git", &work))
            .await
            .unwrap();

        let entries: Vec<_> = std::fs::read_dir(&work).unwrap().collect();
        assert!(entries.is_empty(), "validation must not leave artifacts");
    }
}
