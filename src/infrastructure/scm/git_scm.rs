use async_trait::async_trait;
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{AutotagOption, BranchType, ErrorCode, FetchOptions, PushOptions, RemoteCallbacks};
use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::scm_interface::{
    OperationContext, ScmError, ScmResult, SourceControlActions,
};
use crate::domain::entities::refs::{Branch, Tag, TagAnnotation};
use crate::domain::value_objects::commit::{CommitArgument, FileDescriptor, TagArgument};
use crate::domain::value_objects::remote_url::RemoteUrl;
use crate::domain::value_objects::source_version::{SourceVersion, SyncTarget, VersionSelector};

/// Git implementation of the source control actions.
///
/// Wraps libgit2. All blocking work runs on the tokio blocking pool; the
/// repository handle sits behind a per-directory mutex so operations on one
/// working copy serialize while independent repositories proceed in
/// parallel. The repository is opened lazily: the first operation opens the
/// working copy if present and clones from the remote otherwise.
pub struct GitScm {
    state: Arc<RepoState>,
}

struct RepoState {
    remote_url: RemoteUrl,
    local_directory: PathBuf,
    repo: Mutex<Option<git2::Repository>>,
}

impl GitScm {
    /// Bind a git backend to a remote/local pair. Performs no I/O.
    pub fn new(remote_url: RemoteUrl, local_directory: impl Into<PathBuf>) -> Self {
        Self {
            state: Arc::new(RepoState {
                remote_url,
                local_directory: local_directory.into(),
                repo: Mutex::new(None),
            }),
        }
    }

    /// Run `f` against the opened repository on the blocking pool, holding
    /// the working copy lock for the duration of the operation.
    async fn with_repo<T, F>(&self, ctx: &OperationContext, f: F) -> ScmResult<T>
    where
        F: FnOnce(&git2::Repository, &OperationContext) -> ScmResult<T> + Send + 'static,
        T: Send + 'static,
    {
        ctx.ensure_active()?;
        let state = Arc::clone(&self.state);
        let ctx = ctx.clone();

        tokio::task::spawn_blocking(move || {
            let mut slot = state.lock_repo()?;
            let repo = state.ensure_open(&mut slot, &ctx)?;
            ctx.ensure_active()?;
            f(repo, &ctx)
        })
        .await
        .map_err(|e| ScmError::internal_with_source("blocking git task failed", e))?
    }
}

impl RepoState {
    fn lock_repo(&self) -> ScmResult<MutexGuard<'_, Option<git2::Repository>>> {
        self.repo
            .lock()
            .map_err(|_| ScmError::internal("working copy mutex poisoned"))
    }

    fn ensure_open<'a>(
        &self,
        slot: &'a mut Option<git2::Repository>,
        ctx: &OperationContext,
    ) -> ScmResult<&'a git2::Repository> {
        if slot.is_none() {
            let repo = match git2::Repository::open(&self.local_directory) {
                Ok(repo) => repo,
                Err(open_error) if open_error.code() == ErrorCode::NotFound => {
                    self.clone_repository(ctx)?
                }
                Err(open_error) => {
                    return Err(ScmError::configuration(format!(
                        "cannot open working copy at {}: {}",
                        self.local_directory.display(),
                        open_error.message()
                    )))
                }
            };
            return Ok(slot.insert(repo));
        }

        match slot.as_ref() {
            Some(repo) => Ok(repo),
            None => Err(ScmError::internal("repository slot emptied concurrently")),
        }
    }

    fn clone_repository(&self, ctx: &OperationContext) -> ScmResult<git2::Repository> {
        info!(
            remote = %self.remote_url,
            local = %self.local_directory.display(),
            "cloning repository"
        );

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(remote_callbacks(ctx));
        fetch_options.download_tags(AutotagOption::All);

        let result = RepoBuilder::new()
            .fetch_options(fetch_options)
            .clone(self.remote_url.as_str(), &self.local_directory);

        match result {
            Ok(repo) => Ok(repo),
            Err(_) if ctx.is_cancelled() => Err(ScmError::Cancelled),
            Err(error) => Err(error.into()),
        }
    }
}

/// Callbacks shared by clone/fetch/push: credential lookup plus transfer
/// abort once the operation context is cancelled.
fn remote_callbacks(ctx: &OperationContext) -> RemoteCallbacks<'static> {
    let mut callbacks = RemoteCallbacks::new();

    callbacks.credentials(|_url, username, allowed| {
        if allowed.contains(git2::CredentialType::SSH_KEY) {
            git2::Cred::ssh_key_from_agent(username.unwrap_or("git"))
        } else {
            git2::Cred::default()
        }
    });

    let cancel = ctx.clone();
    callbacks.transfer_progress(move |_progress| !cancel.is_cancelled());

    callbacks
}

/// Reject paths that are absolute or escape the working copy root.
fn validate_relative_path(path: &Path) -> ScmResult<()> {
    if path.as_os_str().is_empty() {
        return Err(ScmError::validation("path", "empty path"));
    }
    if path.is_absolute() {
        return Err(ScmError::validation(
            "path",
            format!("absolute path not allowed: {}", path.display()),
        ));
    }
    for component in path.components() {
        match component {
            Component::ParentDir => {
                return Err(ScmError::validation(
                    "path",
                    format!("path escapes working copy: {}", path.display()),
                ))
            }
            Component::Prefix(_) | Component::RootDir => {
                return Err(ScmError::validation(
                    "path",
                    format!("invalid path component in {}", path.display()),
                ))
            }
            _ => {}
        }
    }
    Ok(())
}

fn build_commit_message(argument: &CommitArgument) -> String {
    match &argument.reference {
        Some(reference) => format!("{}\n\nReference: {}", argument.message, reference),
        None => argument.message.clone(),
    }
}

fn signature(name: &str, email: &str) -> ScmResult<git2::Signature<'static>> {
    git2::Signature::now(name, email)
        .map_err(|e| ScmError::validation("author", e.message().to_string()))
}

/// Stage exactly `paths` on top of the current head tree and return the
/// resulting tree id. Keeps unrelated staged entries out of the commit.
fn stage_paths(repo: &git2::Repository, paths: &[PathBuf]) -> ScmResult<git2::Oid> {
    let mut index = repo.index()?;

    match repo.head() {
        Ok(head) => {
            let tree = head.peel_to_tree()?;
            index.read_tree(&tree)?;
        }
        Err(_) => index.clear()?,
    }

    for path in paths {
        index.add_path(path)?;
    }

    let tree_id = index.write_tree()?;
    index.write()?;
    Ok(tree_id)
}

/// Stage exactly `paths` as the complete index content and return the
/// resulting tree id: the snapshot commit carries these files and nothing
/// else.
fn stage_snapshot(repo: &git2::Repository, paths: &[PathBuf]) -> ScmResult<git2::Oid> {
    let mut index = repo.index()?;
    index.clear()?;
    for path in paths {
        index.add_path(path)?;
    }
    let tree_id = index.write_tree()?;
    index.write()?;
    Ok(tree_id)
}

/// Remove tracked files of the prior head that are not part of the new
/// snapshot from the working copy.
fn remove_stale_files(
    repo: &git2::Repository,
    prior_tree: &git2::Tree<'_>,
    kept: &[PathBuf],
) -> ScmResult<()> {
    let workdir = match repo.workdir() {
        Some(workdir) => workdir.to_path_buf(),
        None => return Ok(()),
    };
    let kept: HashSet<PathBuf> = kept.iter().cloned().collect();

    prior_tree.walk(git2::TreeWalkMode::PreOrder, |dir, entry| {
        if entry.kind() == Some(git2::ObjectType::Blob) {
            if let Some(name) = entry.name() {
                let path = Path::new(dir).join(name);
                if !kept.contains(&path) {
                    let _ = std::fs::remove_file(workdir.join(&path));
                }
            }
        }
        git2::TreeWalkResult::Ok
    })?;

    Ok(())
}

/// Point the working copy at `branch` before committing: an unborn head
/// is repointed so the first commit creates the branch, an existing
/// branch is checked out, a missing one is created at the current head.
fn select_branch(repo: &git2::Repository, branch: &str) -> ScmResult<()> {
    if head_branch_name(repo)?.as_deref() == Some(branch) {
        return Ok(());
    }

    let refname = format!("refs/heads/{branch}");
    let head = match repo.head() {
        Ok(head) => head,
        Err(_) => {
            repo.set_head(&refname)?;
            return Ok(());
        }
    };

    if repo.find_reference(&refname).is_err() {
        let commit = head.peel_to_commit()?;
        repo.branch(branch, &commit, false)?;
    }
    repo.set_head(&refname)?;
    repo.checkout_head(Some(CheckoutBuilder::new().force()))?;
    Ok(())
}

fn create_commit(
    repo: &git2::Repository,
    argument: &CommitArgument,
    tree_id: git2::Oid,
) -> ScmResult<git2::Oid> {
    let author = signature(&argument.author, &argument.author_email)?;
    let tree = repo.find_tree(tree_id)?;
    let message = build_commit_message(argument);

    let parent = match repo.head() {
        Ok(head) => Some(head.peel_to_commit()?),
        Err(_) => None,
    };
    let parents: Vec<&git2::Commit> = parent.iter().collect();

    let commit_id = repo.commit(Some("HEAD"), &author, &author, &message, &tree, &parents)?;
    Ok(commit_id)
}

/// The branch name HEAD points at symbolically, even when unborn.
fn head_branch_name(repo: &git2::Repository) -> ScmResult<Option<String>> {
    let head_ref = repo.find_reference("HEAD")?;
    Ok(head_ref
        .symbolic_target()
        .and_then(|target| target.strip_prefix("refs/heads/"))
        .map(|name| name.to_string()))
}

/// Roll a failed commit+tag sequence back to the pre-operation state.
fn rollback_commit(
    repo: &git2::Repository,
    prior_head: Option<git2::Oid>,
    written: &[PathBuf],
) -> ScmResult<()> {
    // Materialized files go first; the reset below then restores any
    // tracked files they overwrote.
    if let Some(workdir) = repo.workdir() {
        for path in written {
            let on_disk = workdir.join(path);
            if on_disk.exists() {
                let _ = std::fs::remove_file(on_disk);
            }
        }
    }

    match prior_head {
        Some(oid) => {
            let object = repo.find_object(oid, None)?;
            repo.reset(&object, git2::ResetType::Hard, None)?;
        }
        None => {
            if let Some(branch_name) = head_branch_name(repo)? {
                if let Ok(mut reference) =
                    repo.find_reference(&format!("refs/heads/{branch_name}"))
                {
                    reference.delete()?;
                }
            }
            let mut index = repo.index()?;
            index.clear()?;
            index.write()?;
        }
    }

    Ok(())
}

/// Fast-forward the checked-out branch onto its remote-tracking ref when
/// possible; a diverged local branch is left untouched so fetch never
/// discards local work.
fn fast_forward_head(repo: &git2::Repository, ctx: &OperationContext) -> ScmResult<()> {
    ctx.ensure_active()?;

    let branch_name = match head_branch_name(repo)? {
        Some(name) => name,
        None => return Ok(()),
    };

    let remote_ref_name = format!("refs/remotes/origin/{branch_name}");
    let remote_oid = match repo.find_reference(&remote_ref_name) {
        Ok(reference) => match reference.target() {
            Some(oid) => oid,
            None => return Ok(()),
        },
        Err(_) => return Ok(()),
    };

    let local_ref_name = format!("refs/heads/{branch_name}");
    match repo.find_reference(&local_ref_name) {
        Ok(mut local_ref) => {
            let local_oid = match local_ref.target() {
                Some(oid) => oid,
                None => return Ok(()),
            };
            if local_oid == remote_oid {
                return Ok(());
            }
            if repo.graph_descendant_of(remote_oid, local_oid)? {
                local_ref.set_target(remote_oid, "fetch: fast-forward")?;
                repo.checkout_head(Some(CheckoutBuilder::new().force()))?;
                debug!(branch = %branch_name, "fast-forwarded to remote");
            } else {
                debug!(branch = %branch_name, "local branch diverged, leaving untouched");
            }
        }
        Err(_) => {
            // Unborn branch after cloning an empty remote that has since
            // gained history: materialize it from the tracking ref.
            repo.reference(&local_ref_name, remote_oid, false, "fetch: create branch")?;
            repo.set_head(&local_ref_name)?;
            repo.checkout_head(Some(CheckoutBuilder::new().force()))?;
        }
    }

    Ok(())
}

/// Materialize a fetched version in the working copy: branches become the
/// checked-out branch, tags a detached checkout of the tagged commit.
fn checkout_version(repo: &git2::Repository, version: &SourceVersion) -> ScmResult<()> {
    match version {
        SourceVersion::Branch(name) => {
            let local_ref_name = format!("refs/heads/{name}");
            if repo.find_reference(&local_ref_name).is_err() {
                let remote_ref = repo
                    .find_reference(&format!("refs/remotes/origin/{name}"))
                    .map_err(|_| ScmError::not_found("branch", name.clone()))?;
                let oid = remote_ref
                    .target()
                    .ok_or_else(|| ScmError::not_found("branch", name.clone()))?;
                repo.reference(&local_ref_name, oid, false, "fetch: create branch")?;
            }
            repo.set_head(&local_ref_name)?;
            repo.checkout_head(Some(CheckoutBuilder::new().force()))?;
            fast_forward_head(repo, &OperationContext::detached())?;
        }
        SourceVersion::Tag(name) => {
            let reference = repo
                .find_reference(&format!("refs/tags/{name}"))
                .map_err(|_| ScmError::not_found("tag", name.clone()))?;
            let commit = reference.peel_to_commit()?;
            repo.set_head_detached(commit.id())?;
            repo.checkout_head(Some(CheckoutBuilder::new().force()))?;
        }
    }
    debug!(version = %version, "checked out version");
    Ok(())
}

fn local_branch_names(repo: &git2::Repository) -> ScmResult<Vec<String>> {
    let mut names = Vec::new();
    for entry in repo.branches(Some(BranchType::Local))? {
        let (branch, _) = entry?;
        if let Some(name) = branch.name()? {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

fn local_tag_names(repo: &git2::Repository) -> ScmResult<Vec<String>> {
    let mut names: Vec<String> = repo
        .tag_names(None)?
        .iter()
        .flatten()
        .map(|name| name.to_string())
        .collect();
    names.sort();
    Ok(names)
}

/// Fetch refspecs for the requested sync target.
fn fetch_refspecs(repo: &git2::Repository, target: &SyncTarget) -> ScmResult<Vec<String>> {
    const ALL_HEADS: &str = "+refs/heads/*:refs/remotes/origin/*";
    const ALL_TAGS: &str = "+refs/tags/*:refs/tags/*";

    let specs = match target {
        SyncTarget::Everything | SyncTarget::Matching(VersionSelector::All) => {
            vec![ALL_HEADS.to_string(), ALL_TAGS.to_string()]
        }
        SyncTarget::Matching(VersionSelector::AllBranches) => vec![ALL_HEADS.to_string()],
        SyncTarget::Matching(VersionSelector::AllTags) => vec![ALL_TAGS.to_string()],
        SyncTarget::Matching(VersionSelector::Head) => match head_branch_name(repo)? {
            Some(name) => vec![format!("+refs/heads/{name}:refs/remotes/origin/{name}")],
            None => vec![ALL_HEADS.to_string()],
        },
        SyncTarget::Version(pinned) => match pinned.version() {
            SourceVersion::Branch(name) => {
                vec![format!("+refs/heads/{name}:refs/remotes/origin/{name}")]
            }
            SourceVersion::Tag(name) => vec![format!("+refs/tags/{name}:refs/tags/{name}")],
        },
    };
    Ok(specs)
}

/// Push refspecs for the requested sync target. Never forced: the remote
/// rejecting a non-fast-forward update is surfaced as a conflict.
fn push_refspecs(repo: &git2::Repository, target: &SyncTarget) -> ScmResult<Vec<String>> {
    let branch_spec = |name: &str| format!("refs/heads/{name}:refs/heads/{name}");
    let tag_spec = |name: &str| format!("refs/tags/{name}:refs/tags/{name}");

    let specs = match target {
        SyncTarget::Everything | SyncTarget::Matching(VersionSelector::All) => {
            let mut specs: Vec<String> = local_branch_names(repo)?
                .iter()
                .map(|name| branch_spec(name))
                .collect();
            specs.extend(local_tag_names(repo)?.iter().map(|name| tag_spec(name)));
            specs
        }
        SyncTarget::Matching(VersionSelector::AllBranches) => local_branch_names(repo)?
            .iter()
            .map(|name| branch_spec(name))
            .collect(),
        SyncTarget::Matching(VersionSelector::AllTags) => local_tag_names(repo)?
            .iter()
            .map(|name| tag_spec(name))
            .collect(),
        SyncTarget::Matching(VersionSelector::Head) => match head_branch_name(repo)? {
            Some(name) => vec![branch_spec(&name)],
            None => Vec::new(),
        },
        SyncTarget::Version(pinned) => match pinned.version() {
            SourceVersion::Branch(name) => vec![branch_spec(name)],
            SourceVersion::Tag(name) => vec![tag_spec(name)],
        },
    };
    Ok(specs)
}

fn find_origin<'r>(repo: &'r git2::Repository, url: &RemoteUrl) -> ScmResult<git2::Remote<'r>> {
    match repo.find_remote("origin") {
        Ok(remote) => Ok(remote),
        Err(_) => Ok(repo.remote_anonymous(url.as_str())?),
    }
}

fn resolve_commit<'r>(
    repo: &'r git2::Repository,
    commit_id: &str,
) -> ScmResult<git2::Commit<'r>> {
    let oid = git2::Oid::from_str(commit_id)
        .map_err(|_| ScmError::validation("commit_id", format!("malformed commit id: {commit_id}")))?;
    repo.find_commit(oid)
        .map_err(|_| ScmError::not_found("commit", commit_id))
}

fn head_commit_id(repo: &git2::Repository) -> ScmResult<String> {
    let head = repo
        .head()
        .map_err(|_| ScmError::not_found("head commit", "HEAD"))?;
    let commit = head.peel_to_commit()?;
    Ok(commit.id().to_string())
}

fn tag_entity(repo: &git2::Repository, name: &str) -> ScmResult<Tag> {
    let reference = repo
        .find_reference(&format!("refs/tags/{name}"))
        .map_err(|_| ScmError::not_found("tag", name))?;
    let commit = reference.peel_to_commit()?;
    let mut tag = Tag::new(name, commit.id().to_string());

    if let Ok(annotated) = reference.peel_to_tag() {
        let tagger = annotated.tagger();
        tag = tag.with_annotation(TagAnnotation::new(
            tagger
                .as_ref()
                .and_then(|sig| sig.name())
                .unwrap_or_default(),
            tagger
                .as_ref()
                .and_then(|sig| sig.email())
                .unwrap_or_default(),
            annotated.message().unwrap_or_default().trim_end(),
        ));
    }

    Ok(tag)
}

/// List refs on the authoritative remote, without mutating local state.
fn list_remote_refs(
    repo: &git2::Repository,
    url: &RemoteUrl,
    ctx: &OperationContext,
) -> ScmResult<Vec<(String, git2::Oid)>> {
    let mut remote = find_origin(repo, url)?;
    let mut connection =
        remote.connect_auth(git2::Direction::Fetch, Some(remote_callbacks(ctx)), None)?;

    let mut refs = Vec::new();
    for head in connection.list()? {
        refs.push((head.name().to_string(), head.oid()));
    }
    Ok(refs)
}

fn remote_branches(refs: &[(String, git2::Oid)]) -> Vec<Branch> {
    let mut branches: Vec<Branch> = refs
        .iter()
        .filter_map(|(name, oid)| {
            name.strip_prefix("refs/heads/")
                .map(|short| Branch::new(short, oid.to_string(), true))
        })
        .collect();
    branches.sort_by(|a, b| a.name.cmp(&b.name));
    branches
}

fn remote_tags(refs: &[(String, git2::Oid)]) -> Vec<Tag> {
    // `name^{}` entries carry the peeled commit id of annotated tags and
    // win over the tag-object id from the plain entry, in either arrival
    // order.
    let mut by_name: BTreeMap<String, (Option<git2::Oid>, Option<git2::Oid>)> = BTreeMap::new();
    for (name, oid) in refs {
        if let Some(short) = name.strip_prefix("refs/tags/") {
            if let Some(base) = short.strip_suffix("^{}") {
                by_name.entry(base.to_string()).or_default().1 = Some(*oid);
            } else {
                by_name.entry(short.to_string()).or_default().0 = Some(*oid);
            }
        }
    }
    by_name
        .into_iter()
        .filter_map(|(name, (plain, peeled))| {
            peeled.or(plain).map(|oid| Tag::new(name, oid.to_string()))
        })
        .collect()
}

#[async_trait]
impl SourceControlActions for GitScm {
    async fn commit_paths(
        &self,
        ctx: &OperationContext,
        argument: &CommitArgument,
        paths: &[PathBuf],
    ) -> ScmResult<String> {
        if paths.is_empty() {
            return Err(ScmError::validation("paths", "no files to commit"));
        }
        for path in paths {
            validate_relative_path(path)?;
        }

        let argument = argument.clone();
        let paths = paths.to_vec();
        let local_root = self.state.local_directory.clone();

        self.with_repo(ctx, move |repo, _ctx| {
            if let Some(branch) = &argument.branch {
                select_branch(repo, branch)?;
            }
            for path in &paths {
                if !local_root.join(path).is_file() {
                    return Err(ScmError::validation(
                        "path",
                        format!("file does not exist in working copy: {}", path.display()),
                    ));
                }
            }

            let tree_id = stage_paths(repo, &paths)?;
            let commit_id = create_commit(repo, &argument, tree_id)?;
            info!(commit = %commit_id, files = paths.len(), "created commit");
            Ok(commit_id.to_string())
        })
        .await
    }

    async fn commit_files<'a>(
        &self,
        ctx: &OperationContext,
        argument: &CommitArgument,
        files: &[FileDescriptor],
        tag_name: Option<&'a str>,
    ) -> ScmResult<String> {
        if files.is_empty() {
            return Err(ScmError::validation("files", "no files to commit"));
        }
        for file in files {
            validate_relative_path(&file.relative_path)?;
        }

        let argument = argument.clone();
        let files = files.to_vec();
        let tag_name = tag_name.map(|name| name.to_string());

        self.with_repo(ctx, move |repo, ctx| {
            if let Some(branch) = &argument.branch {
                select_branch(repo, branch)?;
            }

            let workdir = repo
                .workdir()
                .ok_or_else(|| ScmError::configuration("working copy is bare"))?
                .to_path_buf();

            let prior_head = repo.head().ok().and_then(|head| head.target());
            let prior_tree = prior_head
                .and_then(|oid| repo.find_commit(oid).ok())
                .and_then(|commit| commit.tree().ok());

            let mut written = Vec::with_capacity(files.len());
            for file in &files {
                let on_disk = workdir.join(&file.relative_path);
                if let Some(parent) = on_disk.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&on_disk, &file.contents)?;
                #[cfg(unix)]
                if file.mode.is_executable() {
                    use std::os::unix::fs::PermissionsExt;
                    std::fs::set_permissions(&on_disk, std::fs::Permissions::from_mode(0o755))?;
                }
                written.push(file.relative_path.clone());
            }

            ctx.ensure_active().map_err(|cancel| {
                let _ = rollback_commit(repo, prior_head, &written);
                cancel
            })?;

            let result = stage_snapshot(repo, &written)
                .and_then(|tree_id| create_commit(repo, &argument, tree_id));
            let commit_id = match result {
                Ok(commit_id) => commit_id,
                Err(error) => {
                    let _ = rollback_commit(repo, prior_head, &written);
                    return Err(error);
                }
            };

            if let Some(tag_name) = tag_name {
                let tagger = signature(&argument.author, &argument.author_email);
                let tag_result = tagger.and_then(|tagger| {
                    if repo
                        .find_reference(&format!("refs/tags/{tag_name}"))
                        .is_ok()
                    {
                        return Err(ScmError::already_exists("tag", &tag_name));
                    }
                    let object = repo.find_object(commit_id, None)?;
                    repo.tag(&tag_name, &object, &tagger, &argument.message, false)?;
                    Ok(())
                });

                if let Err(error) = tag_result {
                    warn!(tag = %tag_name, "tag step failed, rolling back commit");
                    rollback_commit(repo, prior_head, &written)?;
                    return Err(error);
                }
            }

            // The new commit is the complete content set; tracked files the
            // caller no longer ships leave the working copy too.
            if let Some(tree) = &prior_tree {
                remove_stale_files(repo, tree, &written)?;
            }

            info!(commit = %commit_id, files = written.len(), "committed file descriptors");
            Ok(commit_id.to_string())
        })
        .await
    }

    async fn fetch(&self, ctx: &OperationContext, target: &SyncTarget) -> ScmResult<()> {
        let target = target.clone();
        let url = self.state.remote_url.clone();

        self.with_repo(ctx, move |repo, ctx| {
            let refspecs = fetch_refspecs(repo, &target)?;
            let refspec_refs: Vec<&str> = refspecs.iter().map(String::as_str).collect();

            let mut options = FetchOptions::new();
            options.remote_callbacks(remote_callbacks(ctx));
            options.download_tags(AutotagOption::None);

            let mut remote = find_origin(repo, &url)?;
            debug!(remote = %url, refspecs = ?refspecs, "fetching");

            let result = remote.fetch(&refspec_refs, Some(&mut options), None);
            if let Err(error) = result {
                if ctx.is_cancelled() {
                    return Err(ScmError::Cancelled);
                }
                return Err(error.into());
            }
            drop(remote);

            match &target {
                SyncTarget::Version(pinned) => checkout_version(repo, pinned.version()),
                _ => fast_forward_head(repo, ctx),
            }
        })
        .await
    }

    async fn push(&self, ctx: &OperationContext, target: &SyncTarget) -> ScmResult<()> {
        let target = target.clone();
        let url = self.state.remote_url.clone();

        self.with_repo(ctx, move |repo, ctx| {
            let refspecs = push_refspecs(repo, &target)?;
            if refspecs.is_empty() {
                debug!("nothing to push");
                return Ok(());
            }
            let refspec_refs: Vec<&str> = refspecs.iter().map(String::as_str).collect();

            let rejections: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
            let mut callbacks = remote_callbacks(ctx);
            let seen = Arc::clone(&rejections);
            callbacks.push_update_reference(move |refname, status| {
                if let Some(message) = status {
                    if let Ok(mut rejected) = seen.lock() {
                        rejected.push(format!("{refname}: {message}"));
                    }
                }
                Ok(())
            });

            let mut options = PushOptions::new();
            options.remote_callbacks(callbacks);

            let mut remote = find_origin(repo, &url)?;
            debug!(remote = %url, refspecs = ?refspecs, "pushing");

            let result = remote.push(&refspec_refs, Some(&mut options));
            if let Err(error) = result {
                if ctx.is_cancelled() {
                    return Err(ScmError::Cancelled);
                }
                return Err(error.into());
            }

            let rejected = rejections
                .lock()
                .map_err(|_| ScmError::internal("push status mutex poisoned"))?;
            if !rejected.is_empty() {
                return Err(ScmError::conflict(format!(
                    "remote rejected update: {}",
                    rejected.join(", ")
                )));
            }
            Ok(())
        })
        .await
    }

    async fn create_branch<'a>(
        &self,
        ctx: &OperationContext,
        name: &str,
        commit_id: Option<&'a str>,
    ) -> ScmResult<Branch> {
        if name.is_empty() {
            return Err(ScmError::validation("name", "branch name is empty"));
        }
        let name = name.to_string();
        let commit_id = commit_id.map(|id| id.to_string());

        self.with_repo(ctx, move |repo, _ctx| {
            if repo.find_branch(&name, BranchType::Local).is_ok() {
                return Err(ScmError::already_exists("branch", &name));
            }

            let commit = match commit_id.as_deref().filter(|id| !id.is_empty()) {
                Some(id) => resolve_commit(repo, id)?,
                None => repo
                    .head()
                    .map_err(|_| ScmError::not_found("head commit", "HEAD"))?
                    .peel_to_commit()?,
            };

            let branch = repo.branch(&name, &commit, false)?;
            let head_id = branch
                .get()
                .target()
                .map(|oid| oid.to_string())
                .unwrap_or_default();
            info!(branch = %name, commit = %head_id, "created branch");
            Ok(Branch::new(&name, head_id, false))
        })
        .await
    }

    async fn rename_branch(
        &self,
        ctx: &OperationContext,
        old_name: &str,
        new_name: &str,
    ) -> ScmResult<()> {
        if new_name.is_empty() {
            return Err(ScmError::validation("new_name", "branch name is empty"));
        }
        let old_name = old_name.to_string();
        let new_name = new_name.to_string();

        self.with_repo(ctx, move |repo, _ctx| {
            let mut branch = repo
                .find_branch(&old_name, BranchType::Local)
                .map_err(|_| ScmError::not_found("branch", &old_name))?;
            if repo.find_branch(&new_name, BranchType::Local).is_ok() {
                return Err(ScmError::already_exists("branch", &new_name));
            }

            branch.rename(&new_name, false)?;
            info!(from = %old_name, to = %new_name, "renamed branch");
            Ok(())
        })
        .await
    }

    async fn delete_branch(&self, ctx: &OperationContext, name: &str) -> ScmResult<()> {
        let name = name.to_string();

        self.with_repo(ctx, move |repo, _ctx| {
            let mut branch = repo
                .find_branch(&name, BranchType::Local)
                .map_err(|_| ScmError::not_found("branch", &name))?;
            branch.delete()?;
            info!(branch = %name, "deleted branch");
            Ok(())
        })
        .await
    }

    async fn branches(&self, ctx: &OperationContext, from_remote: bool) -> ScmResult<Vec<Branch>> {
        let url = self.state.remote_url.clone();

        self.with_repo(ctx, move |repo, ctx| {
            if from_remote {
                let refs = list_remote_refs(repo, &url, ctx)?;
                return Ok(remote_branches(&refs));
            }

            let mut branches = Vec::new();
            for entry in repo.branches(Some(BranchType::Local))? {
                let (branch, _) = entry?;
                let name = match branch.name()? {
                    Some(name) => name.to_string(),
                    None => continue,
                };
                let head_id = branch
                    .get()
                    .target()
                    .map(|oid| oid.to_string())
                    .unwrap_or_default();
                branches.push(Branch::new(name, head_id, false));
            }
            branches.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(branches)
        })
        .await
    }

    async fn tags(&self, ctx: &OperationContext, from_remote: bool) -> ScmResult<Vec<Tag>> {
        let url = self.state.remote_url.clone();

        self.with_repo(ctx, move |repo, ctx| {
            if from_remote {
                let refs = list_remote_refs(repo, &url, ctx)?;
                return Ok(remote_tags(&refs));
            }

            let mut tags = Vec::new();
            for name in local_tag_names(repo)? {
                tags.push(tag_entity(repo, &name)?);
            }
            Ok(tags)
        })
        .await
    }

    async fn versions(
        &self,
        ctx: &OperationContext,
        from_remote: bool,
    ) -> ScmResult<Vec<SourceVersion>> {
        let branches = self.branches(ctx, from_remote).await?;
        let tags = self.tags(ctx, from_remote).await?;

        let mut versions: Vec<SourceVersion> = branches
            .into_iter()
            .map(|branch| SourceVersion::branch(branch.name))
            .collect();
        versions.extend(tags.into_iter().map(|tag| SourceVersion::tag(tag.name)));
        Ok(versions)
    }

    async fn create_tag(
        &self,
        ctx: &OperationContext,
        name: &str,
        argument: &TagArgument,
    ) -> ScmResult<Tag> {
        if name.is_empty() {
            return Err(ScmError::validation("name", "tag name is empty"));
        }
        let name = name.to_string();
        let argument = argument.clone();

        self.with_repo(ctx, move |repo, _ctx| {
            if repo.find_reference(&format!("refs/tags/{name}")).is_ok() {
                return Err(ScmError::already_exists("tag", &name));
            }

            let commit = match argument.commit_id.as_deref().filter(|id| !id.is_empty()) {
                Some(id) => resolve_commit(repo, id)?,
                None => repo
                    .head()
                    .map_err(|_| ScmError::not_found("head commit", "HEAD"))?
                    .peel_to_commit()?,
            };

            let tagger = signature(&argument.author, &argument.author_email)?;
            let object = repo.find_object(commit.id(), None)?;
            repo.tag(&name, &object, &tagger, &argument.message, false)?;

            info!(tag = %name, commit = %commit.id(), "created tag");
            Ok(Tag::new(&name, commit.id().to_string()).with_annotation(TagAnnotation::new(
                &argument.author,
                &argument.author_email,
                &argument.message,
            )))
        })
        .await
    }

    async fn delete_tag(&self, ctx: &OperationContext, name: &str) -> ScmResult<()> {
        let name = name.to_string();

        self.with_repo(ctx, move |repo, _ctx| {
            if repo.find_reference(&format!("refs/tags/{name}")).is_err() {
                return Err(ScmError::not_found("tag", &name));
            }
            repo.tag_delete(&name)?;
            info!(tag = %name, "deleted tag");
            Ok(())
        })
        .await
    }

    async fn head_commit(&self, ctx: &OperationContext) -> ScmResult<String> {
        self.with_repo(ctx, move |repo, _ctx| head_commit_id(repo)).await
    }
}
