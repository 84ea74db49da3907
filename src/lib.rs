//! # srcmirror - Source Control Action Abstraction
//!
//! `srcmirror` provides a backend-agnostic action surface over version
//! control repositories: commit, fetch, push, branch and tag operations
//! expressed against a single capability trait, with git as the first
//! backend. On top of that surface it ships a resumable content mirroring
//! pipeline that copies one version of a source repository into a target
//! repository.
//!
//! ## Features
//!
//! - **Uniform action surface**: One async trait covering commits, ref
//!   management, synchronization and version listing
//! - **Typed versions**: Branches and tags as one prefixed version string
//!   (`b:main`, `t:v1.0`) that round-trips exactly
//! - **Handle registry**: Exactly one live handle per (remote URL, local
//!   directory) binding, giving single-writer working copies
//! - **Retry orchestration**: Bounded exponential backoff around
//!   network-facing operations, applied only to transient failures
//! - **Resumable mirroring**: Re-running an interrupted mirror converges
//!   without duplicating commits
//!
//! ## Architecture
//!
//! The crate is organized using clean architecture principles:
//!
//! - [`domain`]: Repository bindings, version identifiers and commit
//!   metadata value objects
//! - [`application`]: The content mirroring use case
//! - [`infrastructure`]: The action trait, the git backend, the retry
//!   decorator and the handle registry
//!
//! ## Example
//!
//! ```rust,no_run
//! use srcmirror::application::use_cases::mirror_content::{
//!     MirrorContentConfig, MirrorContentUseCase, SourceContentRepository,
//!     TargetContentRepository,
//! };
//! use srcmirror::domain::entities::repository::Repository;
//! use srcmirror::domain::value_objects::remote_url::RemoteUrl;
//! use srcmirror::domain::value_objects::source_version::SourceVersion;
//! use srcmirror::infrastructure::scm::handle_registry::RepositoryHandleRegistry;
//! use srcmirror::infrastructure::scm::scm_interface::OperationContext;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = RepositoryHandleRegistry::new();
//!
//! let source = Repository::new(
//!     RemoteUrl::new("https://example.com/upstream.git")?,
//!     "/var/mirror/upstream",
//! );
//! let target = Repository::new(
//!     RemoteUrl::new("https://example.com/mirror.git")?,
//!     "/var/mirror/target",
//! )
//! .with_retry(true);
//!
//! let source_handle = registry.acquire(&source).await?;
//! let target_handle = registry.acquire(&target).await?;
//!
//! let use_case = MirrorContentUseCase::new(
//!     SourceContentRepository::new(source_handle, source.local_directory()),
//!     TargetContentRepository::new(target_handle, target.local_directory()),
//!     MirrorContentConfig::new(SourceVersion::branch("main")).with_tag("import-1"),
//! );
//!
//! let ctx = OperationContext::detached();
//! let result = use_case.execute(&ctx).await?;
//! println!("mirrored {} files", result.file_count);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All backend operations return [`infrastructure::scm::scm_interface::ScmError`],
//! a taxonomy separating caller mistakes (validation, not-found, conflicts)
//! from environmental failures (transient network, authentication,
//! configuration). Only transient failures are eligible for retry.

#![deny(rustdoc::broken_intra_doc_links)]

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use crate::infrastructure::scm::scm_interface::{ScmError, ScmResult};
