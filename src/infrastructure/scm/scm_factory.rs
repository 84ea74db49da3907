use std::sync::Arc;

use super::git_scm::GitScm;
use super::scm_interface::{ScmError, ScmResult, SourceControlActions};
use crate::domain::entities::repository::Repository;
use crate::domain::value_objects::scm_kind::ScmKind;

/// Factory selecting the backend implementation for a repository binding.
///
/// The backend is chosen from the remote URL scheme at handle-acquisition
/// time; an unrecognized scheme is a configuration error.
pub struct ScmFactory;

impl ScmFactory {
    /// Construct the backend claiming the binding's remote URL scheme.
    pub fn create(repository: &Repository) -> ScmResult<Arc<dyn SourceControlActions>> {
        match repository.remote_url().scm_kind() {
            Some(ScmKind::Git) => Ok(Arc::new(GitScm::new(
                repository.remote_url().clone(),
                repository.local_directory(),
            ))),
            None => Err(ScmError::configuration(format!(
                "no backend claims URL scheme '{}' ({})",
                repository.remote_url().scheme(),
                repository.remote_url()
            ))),
        }
    }
}
