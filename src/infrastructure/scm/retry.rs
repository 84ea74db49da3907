use async_trait::async_trait;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::scm_interface::{
    OperationContext, ScmError, ScmResult, SourceControlActions,
};
use crate::domain::entities::refs::{Branch, Tag};
use crate::domain::value_objects::commit::{CommitArgument, FileDescriptor, TagArgument};
use crate::domain::value_objects::source_version::{SourceVersion, SyncTarget};

/// Bounded exponential backoff policy for network-facing operations.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Backoff multiplier applied per attempt
    pub multiplier: u32,
    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            multiplier: 2,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Backoff before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Retry decorator over a [`SourceControlActions`] handle.
///
/// Only fetch and push are retried, and only on transient network errors;
/// validation, not-found, already-exists, conflict and auth failures
/// propagate immediately. Backoff sleeps race against the operation
/// context's cancellation signal. Every other operation delegates straight
/// to the wrapped handle.
pub struct RetryingScm {
    inner: Arc<dyn SourceControlActions>,
    policy: RetryPolicy,
}

impl RetryingScm {
    pub fn new(inner: Arc<dyn SourceControlActions>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    async fn run_with_retry<F, Fut>(
        &self,
        ctx: &OperationContext,
        operation: &str,
        mut call: F,
    ) -> ScmResult<()>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = ScmResult<()>> + Send,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(()) => return Ok(()),
                Err(error) if error.is_transient() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "transient failure, backing off before retry"
                    );
                    tokio::select! {
                        _ = ctx.cancelled() => return Err(ScmError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[async_trait]
impl SourceControlActions for RetryingScm {
    async fn commit_paths(
        &self,
        ctx: &OperationContext,
        argument: &CommitArgument,
        paths: &[PathBuf],
    ) -> ScmResult<String> {
        self.inner.commit_paths(ctx, argument, paths).await
    }

    async fn commit_files<'a>(
        &self,
        ctx: &OperationContext,
        argument: &CommitArgument,
        files: &[FileDescriptor],
        tag_name: Option<&'a str>,
    ) -> ScmResult<String> {
        self.inner.commit_files(ctx, argument, files, tag_name).await
    }

    async fn fetch(&self, ctx: &OperationContext, target: &SyncTarget) -> ScmResult<()> {
        self.run_with_retry(ctx, "fetch", || self.inner.fetch(ctx, target))
            .await
    }

    async fn push(&self, ctx: &OperationContext, target: &SyncTarget) -> ScmResult<()> {
        self.run_with_retry(ctx, "push", || self.inner.push(ctx, target))
            .await
    }

    async fn create_branch<'a>(
        &self,
        ctx: &OperationContext,
        name: &str,
        commit_id: Option<&'a str>,
    ) -> ScmResult<Branch> {
        self.inner.create_branch(ctx, name, commit_id).await
    }

    async fn rename_branch(
        &self,
        ctx: &OperationContext,
        old_name: &str,
        new_name: &str,
    ) -> ScmResult<()> {
        self.inner.rename_branch(ctx, old_name, new_name).await
    }

    async fn delete_branch(&self, ctx: &OperationContext, name: &str) -> ScmResult<()> {
        self.inner.delete_branch(ctx, name).await
    }

    async fn branches(&self, ctx: &OperationContext, from_remote: bool) -> ScmResult<Vec<Branch>> {
        self.inner.branches(ctx, from_remote).await
    }

    async fn tags(&self, ctx: &OperationContext, from_remote: bool) -> ScmResult<Vec<Tag>> {
        self.inner.tags(ctx, from_remote).await
    }

    async fn versions(
        &self,
        ctx: &OperationContext,
        from_remote: bool,
    ) -> ScmResult<Vec<SourceVersion>> {
        self.inner.versions(ctx, from_remote).await
    }

    async fn create_tag(
        &self,
        ctx: &OperationContext,
        name: &str,
        argument: &TagArgument,
    ) -> ScmResult<Tag> {
        self.inner.create_tag(ctx, name, argument).await
    }

    async fn delete_tag(&self, ctx: &OperationContext, name: &str) -> ScmResult<()> {
        self.inner.delete_tag(ctx, name).await
    }

    async fn head_commit(&self, ctx: &OperationContext) -> ScmResult<String> {
        self.inner.head_commit(ctx).await
    }
}
