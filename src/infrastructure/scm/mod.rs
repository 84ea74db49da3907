/// SCM (Source Control Management) operations infrastructure
///
/// This module provides the uniform action surface over version control
/// backends: the capability trait, the git implementation, the retry
/// decorator and the handle registry.
pub mod git_scm;
pub mod handle_registry;
pub mod retry;
pub mod scm_factory;
pub mod scm_interface;

pub use git_scm::GitScm;
pub use handle_registry::RepositoryHandleRegistry;
pub use retry::{RetryPolicy, RetryingScm};
pub use scm_factory::ScmFactory;
pub use scm_interface::{
    CancelSource, OperationContext, ScmError, ScmResult, SourceControlActions,
};
