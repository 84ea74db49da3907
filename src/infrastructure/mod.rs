/// Infrastructure layer modules
///
/// Concrete implementations for external system interactions: version
/// control backends and the orchestration wrappers around them.
pub mod scm;

pub use scm::{
    CancelSource, OperationContext, RepositoryHandleRegistry, RetryPolicy, RetryingScm, ScmError,
    ScmFactory, ScmResult, SourceControlActions,
};
