use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

use crate::domain::entities::refs::{Branch, Tag};
use crate::domain::value_objects::commit::{CommitArgument, FileDescriptor, TagArgument};
use crate::domain::value_objects::source_version::{SourceVersion, SyncTarget};

/// Errors that can occur during source control operations
#[derive(Debug, Error)]
pub enum ScmError {
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("{kind} not found: {name}")]
    NotFound { kind: String, name: String },

    #[error("{kind} already exists: {name}")]
    AlreadyExists { kind: String, name: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Transient network failure: {message}")]
    TransientNetwork {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ScmError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn already_exists(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::TransientNetwork {
            message: message.into(),
            source: None,
        }
    }

    pub fn transient_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::TransientNetwork {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether the retry orchestrator may re-attempt the failed operation.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientNetwork { .. })
    }
}

impl From<git2::Error> for ScmError {
    fn from(error: git2::Error) -> Self {
        use git2::{ErrorClass, ErrorCode};

        match error.code() {
            ErrorCode::Auth | ErrorCode::Certificate => {
                return Self::auth(error.message().to_string());
            }
            ErrorCode::NotFastForward => {
                return Self::conflict(error.message().to_string());
            }
            ErrorCode::Exists => {
                return Self::already_exists("reference", error.message().to_string());
            }
            ErrorCode::NotFound => {
                return Self::not_found("reference", error.message().to_string());
            }
            _ => {}
        }

        match error.class() {
            ErrorClass::Net | ErrorClass::Http | ErrorClass::Ssh => {
                Self::transient_with_source(error.message().to_string(), error)
            }
            _ => Self::internal_with_source(error.message().to_string(), error),
        }
    }
}

/// Result type for source control operations
pub type ScmResult<T> = Result<T, ScmError>;

/// Cancellation handle handed to the caller that may abort long-running
/// operations.
pub struct CancelSource {
    tx: watch::Sender<bool>,
}

impl CancelSource {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// A context observing this source.
    pub fn context(&self) -> OperationContext {
        OperationContext {
            cancel_rx: self.tx.subscribe(),
            _cancel_owner: None,
        }
    }

    /// Signal cancellation to every derived context.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-operation context threaded through every action.
///
/// Carries the caller's cancellation signal; a cancelled context makes the
/// operation abort with [`ScmError::Cancelled`] and leave the working copy
/// in its pre-operation state.
#[derive(Debug, Clone)]
pub struct OperationContext {
    cancel_rx: watch::Receiver<bool>,
    // Keeps the channel alive for detached contexts that have no CancelSource.
    _cancel_owner: Option<Arc<watch::Sender<bool>>>,
}

impl OperationContext {
    /// A context that can never be cancelled.
    pub fn detached() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            cancel_rx: rx,
            _cancel_owner: Some(Arc::new(tx)),
        }
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.cancel_rx.borrow()
    }

    /// Fail fast if cancellation has been requested.
    pub fn ensure_active(&self) -> ScmResult<()> {
        if self.is_cancelled() {
            Err(ScmError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves once cancellation is requested; pends forever otherwise.
    pub async fn cancelled(&self) {
        let mut rx = self.cancel_rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                // Source dropped without cancelling: cancellation can no
                // longer arrive.
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::detached()
    }
}

/// Uniform operation surface executed against one bound repository.
///
/// Implementations own exclusive access to the local working copy of their
/// binding: concurrent calls on one handle serialize, and the handle
/// registry guarantees at most one handle per (remote, local) pair.
/// Backend connections are established lazily on the first operation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceControlActions: Send + Sync {
    /// Commit already-present working copy files.
    ///
    /// Fails with a validation error when a path escapes the working copy
    /// or does not exist. All-or-nothing across the file set.
    async fn commit_paths(
        &self,
        ctx: &OperationContext,
        argument: &CommitArgument,
        paths: &[PathBuf],
    ) -> ScmResult<String>;

    /// Materialize in-memory descriptors into the working copy and commit
    /// them as the complete content of the new commit: tracked files
    /// absent from the set are removed. When `tag_name` is given,
    /// atomically create that tag on the new commit. Commit and tag
    /// either both succeed or neither is observably created.
    async fn commit_files<'a>(
        &self,
        ctx: &OperationContext,
        argument: &CommitArgument,
        files: &[FileDescriptor],
        tag_name: Option<&'a str>,
    ) -> ScmResult<String>;

    /// Synchronize local state from the remote.
    ///
    /// Idempotent: re-fetching an unchanged target is a no-op success.
    async fn fetch(&self, ctx: &OperationContext, target: &SyncTarget) -> ScmResult<()>;

    /// Synchronize remote state from the local repository.
    ///
    /// Fails with a conflict when the remote has diverged rather than
    /// silently discarding remote commits.
    async fn push(&self, ctx: &OperationContext, target: &SyncTarget) -> ScmResult<()>;

    /// Create a branch at the given commit, or at the current head when
    /// `commit_id` is omitted.
    async fn create_branch<'a>(
        &self,
        ctx: &OperationContext,
        name: &str,
        commit_id: Option<&'a str>,
    ) -> ScmResult<Branch>;

    /// Atomically rename a branch. When `new_name` already exists the
    /// rename fails and `old_name` is left untouched.
    async fn rename_branch(
        &self,
        ctx: &OperationContext,
        old_name: &str,
        new_name: &str,
    ) -> ScmResult<()>;

    async fn delete_branch(&self, ctx: &OperationContext, name: &str) -> ScmResult<()>;

    /// List branches from the local cache or the authoritative remote.
    async fn branches(&self, ctx: &OperationContext, from_remote: bool) -> ScmResult<Vec<Branch>>;

    /// List tags from the local cache or the authoritative remote.
    async fn tags(&self, ctx: &OperationContext, from_remote: bool) -> ScmResult<Vec<Tag>>;

    /// List every branch and tag as type-prefixed versions.
    async fn versions(
        &self,
        ctx: &OperationContext,
        from_remote: bool,
    ) -> ScmResult<Vec<SourceVersion>>;

    /// Create an annotated tag.
    async fn create_tag(
        &self,
        ctx: &OperationContext,
        name: &str,
        argument: &TagArgument,
    ) -> ScmResult<Tag>;

    async fn delete_tag(&self, ctx: &OperationContext, name: &str) -> ScmResult<()>;

    /// The commit id the current head resolves to.
    async fn head_commit(&self, ctx: &OperationContext) -> ScmResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_helpers() {
        let error = ScmError::not_found("branch", "feature-x");
        assert_eq!(error.to_string(), "branch not found: feature-x");

        let error = ScmError::already_exists("tag", "v1.0");
        assert_eq!(error.to_string(), "tag already exists: v1.0");

        let error = ScmError::validation("path", "escapes working copy");
        assert_eq!(
            error.to_string(),
            "Validation error: path - escapes working copy"
        );
    }

    #[test]
    fn test_only_network_errors_are_transient() {
        assert!(ScmError::transient("connection reset").is_transient());

        assert!(!ScmError::auth("bad credentials").is_transient());
        assert!(!ScmError::conflict("non-fast-forward").is_transient());
        assert!(!ScmError::validation("name", "empty").is_transient());
        assert!(!ScmError::not_found("branch", "x").is_transient());
        assert!(!ScmError::already_exists("branch", "x").is_transient());
        assert!(!ScmError::Cancelled.is_transient());
    }

    #[test]
    fn test_git2_error_mapping() {
        use git2::{ErrorClass, ErrorCode};

        let net = git2::Error::new(ErrorCode::GenericError, ErrorClass::Net, "timed out");
        assert!(matches!(
            ScmError::from(net),
            ScmError::TransientNetwork { .. }
        ));

        let auth = git2::Error::new(ErrorCode::Auth, ErrorClass::Http, "denied");
        assert!(matches!(ScmError::from(auth), ScmError::Auth { .. }));

        let ff = git2::Error::new(
            ErrorCode::NotFastForward,
            ErrorClass::Reference,
            "rejected",
        );
        assert!(matches!(ScmError::from(ff), ScmError::Conflict { .. }));

        let missing = git2::Error::new(ErrorCode::NotFound, ErrorClass::Reference, "no such ref");
        assert!(matches!(ScmError::from(missing), ScmError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_cancel_source_propagates() {
        let source = CancelSource::new();
        let ctx = source.context();

        assert!(!ctx.is_cancelled());
        assert!(ctx.ensure_active().is_ok());

        source.cancel();

        assert!(ctx.is_cancelled());
        assert!(matches!(ctx.ensure_active(), Err(ScmError::Cancelled)));
        // Must resolve immediately once cancelled.
        ctx.cancelled().await;
    }

    #[tokio::test]
    async fn test_detached_context_never_cancels() {
        let ctx = OperationContext::detached();
        assert!(!ctx.is_cancelled());

        let result =
            tokio::time::timeout(std::time::Duration::from_millis(20), ctx.cancelled()).await;
        assert!(result.is_err(), "detached context should pend forever");
    }
}
