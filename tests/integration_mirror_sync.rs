//! End-to-end tests for the content mirroring pipeline.
//!
//! A seeded source remote is mirrored into an initially empty target
//! remote through real working copies, covering first import, converging
//! re-runs and tag conflicts.

mod common;

use common::fixtures::{BareRemote, SeededRemote};
use pretty_assertions::assert_eq;
use std::sync::Arc;

use srcmirror::application::use_cases::mirror_content::{
    ImportOutcome, MirrorContentConfig, MirrorContentUseCase, MirrorError,
    SourceContentRepository, TargetContentRepository,
};
use srcmirror::domain::value_objects::commit::CommitArgument;
use srcmirror::domain::value_objects::source_version::SourceVersion;
use srcmirror::infrastructure::scm::handle_registry::RepositoryHandleRegistry;
use srcmirror::infrastructure::scm::scm_interface::{
    OperationContext, SourceControlActions,
};

struct MirrorSetup {
    source: SeededRemote,
    target: BareRemote,
    source_handle: Arc<dyn SourceControlActions>,
    target_handle: Arc<dyn SourceControlActions>,
    use_case: MirrorContentUseCase,
}

async fn mirror_setup(config: MirrorContentConfig) -> MirrorSetup {
    let source = SeededRemote::new();
    let target = BareRemote::new();
    let registry = RepositoryHandleRegistry::new();

    let source_binding = source.remote.binding("source-work");
    let target_binding = target.binding("target-work").with_retry(true);

    let source_handle = registry.acquire(&source_binding).await.unwrap();
    let target_handle = registry.acquire(&target_binding).await.unwrap();

    let use_case = MirrorContentUseCase::new(
        SourceContentRepository::new(
            Arc::clone(&source_handle),
            source_binding.local_directory(),
        ),
        TargetContentRepository::new(
            Arc::clone(&target_handle),
            target_binding.local_directory(),
        ),
        config,
    );

    MirrorSetup {
        source,
        target,
        source_handle,
        target_handle,
        use_case,
    }
}

#[tokio::test]
async fn test_mirror_branch_into_empty_target() {
    let config = MirrorContentConfig::new(SourceVersion::branch("main"))
        .with_tag("import-1")
        .with_author("Mirror Bot", "mirror@example.com");
    let setup = mirror_setup(config).await;
    let ctx = OperationContext::detached();

    let result = setup.use_case.execute(&ctx).await.unwrap();

    assert_eq!(result.file_count, 2);
    assert_eq!(
        result.source_version.commit_id(),
        setup.source.main_commit.as_str()
    );

    let commit = match &result.outcome {
        ImportOutcome::Committed(id) => id.clone(),
        other => panic!("expected a fresh commit, got {other:?}"),
    };
    assert_eq!(
        setup.target.ref_commit("refs/heads/main").as_deref(),
        Some(commit.as_str())
    );
    assert_eq!(
        setup.target.ref_commit("refs/tags/import-1").as_deref(),
        Some(commit.as_str())
    );
}

#[tokio::test]
async fn test_rerun_converges_without_new_commits() {
    let config = MirrorContentConfig::new(SourceVersion::branch("main"))
        .with_tag("import-1")
        .with_author("Mirror Bot", "mirror@example.com");
    let setup = mirror_setup(config).await;
    let ctx = OperationContext::detached();

    let first = setup.use_case.execute(&ctx).await.unwrap();
    let commit = first.outcome.commit_id().to_string();

    let second = setup.use_case.execute(&ctx).await.unwrap();
    assert_eq!(second.outcome, ImportOutcome::AlreadyCurrent(commit.clone()));
    assert_eq!(
        setup.target.ref_commit("refs/heads/main").as_deref(),
        Some(commit.as_str())
    );
}

#[tokio::test]
async fn test_resume_after_interrupted_push() {
    let config = MirrorContentConfig::new(SourceVersion::branch("main"))
        .with_tag("import-1")
        .with_author("Mirror Bot", "mirror@example.com");
    let setup = mirror_setup(config).await;
    let ctx = OperationContext::detached();

    // Replay the state a crashed run leaves behind: the commit and tag
    // exist in the target working copy but were never pushed.
    let source_binding_files = {
        let source_side = SourceContentRepository::new(
            Arc::clone(&setup.source_handle),
            setup.source.remote.binding("source-work").local_directory(),
        );
        source_side
            .snapshot(&ctx, &SourceVersion::branch("main"))
            .await
            .unwrap()
    };
    let argument = CommitArgument::new("Mirror Bot", "mirror@example.com", "Mirror b:main")
        .with_reference(source_binding_files.version.commit_id())
        .with_branch("main");
    let local_commit = setup
        .target_handle
        .commit_files(&ctx, &argument, &source_binding_files.files, Some("import-1"))
        .await
        .unwrap();
    assert_eq!(setup.target.ref_commit("refs/heads/main"), None);

    let result = setup.use_case.execute(&ctx).await.unwrap();

    assert_eq!(
        result.outcome,
        ImportOutcome::AlreadyCurrent(local_commit.clone())
    );
    assert_eq!(
        setup.target.ref_commit("refs/heads/main"),
        Some(local_commit.clone())
    );
    assert_eq!(
        setup.target.ref_commit("refs/tags/import-1"),
        Some(local_commit)
    );
}

#[tokio::test]
async fn test_upstream_deletion_propagates() {
    let config = MirrorContentConfig::new(SourceVersion::branch("main"))
        .with_author("Mirror Bot", "mirror@example.com");
    let mut setup = mirror_setup(config).await;
    let ctx = OperationContext::detached();

    let first = setup.use_case.execute(&ctx).await.unwrap();
    assert_eq!(first.file_count, 2);

    // Upstream drops notes.txt; the next run mirrors the deletion.
    setup
        .source
        .advance_main(&[("README.md", "# upstream\n")], "drop notes");

    let second = setup.use_case.execute(&ctx).await.unwrap();
    assert_eq!(second.file_count, 1);
    let commit = match &second.outcome {
        ImportOutcome::Committed(id) => id.clone(),
        other => panic!("expected a fresh commit, got {other:?}"),
    };
    assert_eq!(
        setup.target.ref_commit("refs/heads/main").as_deref(),
        Some(commit.as_str())
    );
    assert!(!setup
        .target
        .binding("target-work")
        .local_directory()
        .join("notes.txt")
        .exists());
}

#[tokio::test]
async fn test_mirror_tag_version() {
    let config = MirrorContentConfig::new(SourceVersion::tag("v1"))
        .with_author("Mirror Bot", "mirror@example.com");
    let setup = mirror_setup(config).await;
    let ctx = OperationContext::detached();

    let result = setup.use_case.execute(&ctx).await.unwrap();

    assert_eq!(
        result.source_version.commit_id(),
        setup.source.tag_commit.as_str()
    );
    assert_eq!(result.file_count, 2);
    let commit = result.outcome.commit_id().to_string();
    assert_eq!(
        setup.target.ref_commit("refs/heads/main").as_deref(),
        Some(commit.as_str())
    );
}

#[tokio::test]
async fn test_changed_content_under_existing_tag_is_conflict() {
    let config = MirrorContentConfig::new(SourceVersion::branch("main"))
        .with_tag("import-1")
        .with_author("Mirror Bot", "mirror@example.com");
    let mut setup = mirror_setup(config).await;
    let ctx = OperationContext::detached();

    let first = setup.use_case.execute(&ctx).await.unwrap();
    let first_commit = first.outcome.commit_id().to_string();

    setup.source.advance_main(
        &[
            ("README.md", "# upstream\n"),
            ("notes.txt", "first\n"),
            ("extra.txt", "new content\n"),
        ],
        "second drop",
    );

    // The tag already marks the previous import, so re-importing changed
    // content under the same name must fail without touching the remote.
    let result = setup.use_case.execute(&ctx).await;
    assert!(matches!(result, Err(MirrorError::TagConflict { .. })));
    assert_eq!(
        setup.target.ref_commit("refs/heads/main").as_deref(),
        Some(first_commit.as_str())
    );
}
