use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::domain::value_objects::commit::{CommitArgument, FileDescriptor, FileMode, TagArgument};
use crate::domain::value_objects::source_version::{
    SourceControlVersion, SourceVersion, SyncTarget, VersionSelector,
};
use crate::infrastructure::scm::scm_interface::{
    OperationContext, ScmError, SourceControlActions,
};

/// Content mirroring errors
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Version '{version}' does not exist in the source repository")]
    SourceVersionNotFound { version: String },

    #[error("Snapshot of source content failed: {source}")]
    SnapshotFailed {
        #[source]
        source: ScmError,
    },

    #[error("Import into target repository failed: {source}")]
    ImportFailed {
        #[source]
        source: ScmError,
    },

    #[error("Tag '{tag}' already exists and points at {actual}, expected {expected}")]
    TagConflict {
        tag: String,
        expected: String,
        actual: String,
    },

    #[error("SCM operation failed: {0}")]
    Scm(#[from] ScmError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Content of one source version, pinned to the commit it was read from.
#[derive(Debug, Clone)]
pub struct ContentSnapshot {
    /// The resolved version the content was taken at
    pub version: SourceControlVersion,
    /// Working copy files, sorted by path
    pub files: Vec<FileDescriptor>,
}

/// How an import ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// A new commit was created
    Committed(String),
    /// Target content already matched; nothing was committed
    AlreadyCurrent(String),
}

impl ImportOutcome {
    /// The commit the target now points at.
    pub fn commit_id(&self) -> &str {
        match self {
            Self::Committed(id) | Self::AlreadyCurrent(id) => id,
        }
    }
}

/// Source side of the mirror: reads content out of a repository at a
/// requested version.
pub struct SourceContentRepository {
    handle: Arc<dyn SourceControlActions>,
    local_directory: PathBuf,
}

impl SourceContentRepository {
    pub fn new(handle: Arc<dyn SourceControlActions>, local_directory: impl Into<PathBuf>) -> Self {
        Self {
            handle,
            local_directory: local_directory.into(),
        }
    }

    /// Fetch the requested version, materialize it in the working copy and
    /// collect its files.
    pub async fn snapshot(
        &self,
        ctx: &OperationContext,
        version: &SourceVersion,
    ) -> Result<ContentSnapshot, MirrorError> {
        let selector = if version.is_branch() {
            VersionSelector::AllBranches
        } else {
            VersionSelector::AllTags
        };
        self.handle
            .fetch(ctx, &SyncTarget::Matching(selector))
            .await
            .map_err(|source| MirrorError::SnapshotFailed { source })?;

        let pinned = self.resolve(ctx, version).await?;

        self.handle
            .fetch(ctx, &SyncTarget::Version(pinned.clone()))
            .await
            .map_err(|source| MirrorError::SnapshotFailed { source })?;

        let files = collect_working_copy(&self.local_directory)?;
        debug!(version = %version, files = files.len(), "took content snapshot");

        Ok(ContentSnapshot {
            version: pinned,
            files,
        })
    }

    /// Pin the symbolic version to the commit it currently resolves to.
    async fn resolve(
        &self,
        ctx: &OperationContext,
        version: &SourceVersion,
    ) -> Result<SourceControlVersion, MirrorError> {
        let commit_id = match version {
            SourceVersion::Branch(name) => self
                .handle
                .branches(ctx, false)
                .await?
                .into_iter()
                .find(|branch| &branch.name == name)
                .map(|branch| branch.head_commit_id),
            SourceVersion::Tag(name) => self
                .handle
                .tags(ctx, false)
                .await?
                .into_iter()
                .find(|tag| &tag.name == name)
                .map(|tag| tag.commit_id),
        };

        match commit_id {
            Some(commit_id) => Ok(SourceControlVersion::new(version.clone(), commit_id)),
            None => Err(MirrorError::SourceVersionNotFound {
                version: version.to_string(),
            }),
        }
    }
}

/// Target side of the mirror: imports content as a resumable step.
pub struct TargetContentRepository {
    handle: Arc<dyn SourceControlActions>,
    local_directory: PathBuf,
}

impl TargetContentRepository {
    pub fn new(handle: Arc<dyn SourceControlActions>, local_directory: impl Into<PathBuf>) -> Self {
        Self {
            handle,
            local_directory: local_directory.into(),
        }
    }

    /// Commit the given content into the target and push it, converging on
    /// re-runs: an unchanged target skips the commit, and a tag that
    /// already points at the expected commit counts as success.
    pub async fn import(
        &self,
        ctx: &OperationContext,
        files: &[FileDescriptor],
        argument: &CommitArgument,
        tag_name: Option<&str>,
    ) -> Result<ImportOutcome, MirrorError> {
        self.handle
            .fetch(ctx, &SyncTarget::Everything)
            .await
            .map_err(|source| MirrorError::ImportFailed { source })?;

        let outcome = if self.is_current(ctx, files).await? {
            let head = self.handle.head_commit(ctx).await?;
            debug!(commit = %head, "target already current, skipping commit");
            if let Some(tag_name) = tag_name {
                self.ensure_tag(ctx, tag_name, &head, argument).await?;
            }
            ImportOutcome::AlreadyCurrent(head)
        } else {
            let commit_id = match self
                .handle
                .commit_files(ctx, argument, files, tag_name)
                .await
            {
                Ok(commit_id) => commit_id,
                Err(ScmError::AlreadyExists { name, .. }) => {
                    // The tag exists but the content changed, so it cannot
                    // point at the commit this import would create.
                    let actual = self.tag_target(ctx, &name).await?;
                    return Err(MirrorError::TagConflict {
                        tag: name,
                        expected: "a new import commit".to_string(),
                        actual,
                    });
                }
                Err(source) => return Err(MirrorError::ImportFailed { source }),
            };
            ImportOutcome::Committed(commit_id)
        };

        // Push runs even when nothing was committed so that a rerun after
        // a failed push converges.
        self.handle
            .push(ctx, &SyncTarget::Everything)
            .await
            .map_err(|source| MirrorError::ImportFailed { source })?;

        Ok(outcome)
    }

    /// Whether the working copy content equals the descriptor set exactly:
    /// a file on disk that the set no longer carries makes the target stale
    /// just like a missing or changed one.
    async fn is_current(
        &self,
        ctx: &OperationContext,
        files: &[FileDescriptor],
    ) -> Result<bool, MirrorError> {
        if self.handle.head_commit(ctx).await.is_err() {
            return Ok(false);
        }
        let on_disk = collect_working_copy(&self.local_directory)?;
        Ok(on_disk == files)
    }

    /// Create the tag at `commit_id`, treating an existing tag as success
    /// iff it points at that commit.
    async fn ensure_tag(
        &self,
        ctx: &OperationContext,
        tag_name: &str,
        commit_id: &str,
        argument: &CommitArgument,
    ) -> Result<(), MirrorError> {
        let tag_argument = TagArgument::new(
            &argument.author,
            &argument.author_email,
            &argument.message,
        )
        .with_commit_id(commit_id);

        match self.handle.create_tag(ctx, tag_name, &tag_argument).await {
            Ok(_) => Ok(()),
            Err(ScmError::AlreadyExists { .. }) => {
                let actual = self.tag_target(ctx, tag_name).await?;
                if actual == commit_id {
                    debug!(tag = %tag_name, "tag already points at expected commit");
                    Ok(())
                } else {
                    Err(MirrorError::TagConflict {
                        tag: tag_name.to_string(),
                        expected: commit_id.to_string(),
                        actual,
                    })
                }
            }
            Err(source) => Err(MirrorError::ImportFailed { source }),
        }
    }

    async fn tag_target(&self, ctx: &OperationContext, name: &str) -> Result<String, MirrorError> {
        let tags = self.handle.tags(ctx, false).await?;
        Ok(tags
            .into_iter()
            .find(|tag| tag.name == name)
            .map(|tag| tag.commit_id)
            .unwrap_or_default())
    }
}

/// Collect working copy files as descriptors, sorted by path.
fn collect_working_copy(root: &Path) -> Result<Vec<FileDescriptor>, MirrorError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".git")
    {
        let entry = entry.map_err(|e| {
            MirrorError::Io(e.into_io_error().unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::Other, "walk failed")
            }))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|_| {
                MirrorError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "path outside snapshot root",
                ))
            })?
            .to_path_buf();
        let contents = std::fs::read(entry.path())?;

        let mode = file_mode_of(entry.path())?;
        files.push(FileDescriptor::new(relative, contents).with_mode(mode));
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(files)
}

#[cfg(unix)]
fn file_mode_of(path: &Path) -> Result<FileMode, MirrorError> {
    use std::os::unix::fs::PermissionsExt;
    let mode = std::fs::metadata(path)?.permissions().mode();
    if mode & 0o111 != 0 {
        Ok(FileMode::Executable)
    } else {
        Ok(FileMode::Regular)
    }
}

#[cfg(not(unix))]
fn file_mode_of(_path: &Path) -> Result<FileMode, MirrorError> {
    Ok(FileMode::Regular)
}

/// Configuration of one mirror run.
#[derive(Debug, Clone)]
pub struct MirrorContentConfig {
    /// Source version to mirror
    pub version: SourceVersion,
    /// Tag to stamp the imported commit with
    pub tag_name: Option<String>,
    /// Commit author recorded in the target
    pub author: String,
    /// Commit author email recorded in the target
    pub author_email: String,
    /// Branch the import commits land on in the target
    pub target_branch: String,
}

impl MirrorContentConfig {
    pub fn new(version: SourceVersion) -> Self {
        Self {
            version,
            tag_name: None,
            author: "srcmirror".to_string(),
            author_email: "srcmirror@localhost".to_string(),
            target_branch: "main".to_string(),
        }
    }

    pub fn with_tag(mut self, tag_name: impl Into<String>) -> Self {
        self.tag_name = Some(tag_name.into());
        self
    }

    pub fn with_target_branch(mut self, branch: impl Into<String>) -> Self {
        self.target_branch = branch.into();
        self
    }

    pub fn with_author(
        mut self,
        author: impl Into<String>,
        author_email: impl Into<String>,
    ) -> Self {
        self.author = author.into();
        self.author_email = author_email.into();
        self
    }
}

/// Result of one mirror run.
#[derive(Debug, Clone)]
pub struct MirrorResult {
    /// The source version that was mirrored, pinned to its commit
    pub source_version: SourceControlVersion,
    /// Number of files carried over
    pub file_count: usize,
    /// What happened on the target side
    pub outcome: ImportOutcome,
}

/// Mirrors content from a source repository into a target repository as a
/// resumable pipeline step: re-running after a partial failure converges
/// to the same end state without duplicating commits.
pub struct MirrorContentUseCase {
    source: SourceContentRepository,
    target: TargetContentRepository,
    config: MirrorContentConfig,
}

impl MirrorContentUseCase {
    pub fn new(
        source: SourceContentRepository,
        target: TargetContentRepository,
        config: MirrorContentConfig,
    ) -> Self {
        Self {
            source,
            target,
            config,
        }
    }

    pub async fn execute(&self, ctx: &OperationContext) -> Result<MirrorResult, MirrorError> {
        let snapshot = self.source.snapshot(ctx, &self.config.version).await?;

        let argument = CommitArgument::new(
            &self.config.author,
            &self.config.author_email,
            format!("Mirror {}", snapshot.version.version()),
        )
        .with_reference(snapshot.version.commit_id())
        .with_branch(self.config.target_branch.clone());

        let outcome = self
            .target
            .import(
                ctx,
                &snapshot.files,
                &argument,
                self.config.tag_name.as_deref(),
            )
            .await?;

        info!(
            version = %snapshot.version.version(),
            commit = outcome.commit_id(),
            files = snapshot.files.len(),
            "mirror run finished"
        );

        Ok(MirrorResult {
            file_count: snapshot.files.len(),
            source_version: snapshot.version,
            outcome,
        })
    }
}
