//! Git fixtures for the integration suites.
//!
//! Remotes are bare repositories seeded directly through the object
//! database, so tests get deterministic commit ids without shelling out
//! to a git binary.

use git2::{Oid, RepositoryInitOptions, Signature};
use std::path::PathBuf;
use tempfile::TempDir;

use srcmirror::domain::entities::repository::Repository;
use srcmirror::domain::value_objects::remote_url::RemoteUrl;

/// A bare repository acting as the authoritative remote, plus scratch
/// space for working copies.
pub struct BareRemote {
    temp: TempDir,
    pub path: PathBuf,
}

impl BareRemote {
    /// An empty bare remote whose default branch is `main`.
    pub fn new() -> Self {
        super::init_tracing();
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("remote.git");
        let mut options = RepositoryInitOptions::new();
        options.bare(true).initial_head("main");
        git2::Repository::init_opts(&path, &options).unwrap();
        Self { temp, path }
    }

    pub fn open(&self) -> git2::Repository {
        git2::Repository::open(&self.path).unwrap()
    }

    pub fn url(&self) -> RemoteUrl {
        RemoteUrl::new(self.path.to_str().unwrap()).unwrap()
    }

    /// A repository binding whose working copy lives in this fixture's
    /// scratch space.
    pub fn binding(&self, name: &str) -> Repository {
        Repository::new(self.url(), self.temp.path().join(name))
    }

    /// The commit a ref resolves to, if the ref exists. Annotated tag
    /// refs are peeled to their commit.
    pub fn ref_commit(&self, refname: &str) -> Option<String> {
        let repo = self.open();
        let reference = repo.find_reference(refname).ok()?;
        let commit_id = reference.peel_to_commit().ok()?.id().to_string();
        Some(commit_id)
    }
}

/// Write a commit whose tree contains exactly `files`, updating
/// `update_ref` to point at it.
pub fn seed_commit(
    repo: &git2::Repository,
    update_ref: &str,
    parents: &[Oid],
    files: &[(&str, &str)],
    message: &str,
) -> Oid {
    let mut builder = repo.treebuilder(None).unwrap();
    for (name, contents) in files {
        let blob = repo.blob(contents.as_bytes()).unwrap();
        builder.insert(name, blob, 0o100_644).unwrap();
    }
    let tree = repo.find_tree(builder.write().unwrap()).unwrap();

    let owned: Vec<git2::Commit<'_>> = parents
        .iter()
        .map(|oid| repo.find_commit(*oid).unwrap())
        .collect();
    let parent_refs: Vec<&git2::Commit<'_>> = owned.iter().collect();

    let signature = Signature::now("Seeder", "seeder@example.com").unwrap();
    repo.commit(
        Some(update_ref),
        &signature,
        &signature,
        message,
        &tree,
        &parent_refs,
    )
    .unwrap()
}

/// The tree seeded on `main`.
pub const MAIN_FILES: &[(&str, &str)] = &[("README.md", "# upstream\n"), ("notes.txt", "first\n")];

/// A remote pre-seeded with branches `main` and `feature-x` and an
/// annotated tag `v1` on the initial `main` commit.
pub struct SeededRemote {
    pub remote: BareRemote,
    pub main_commit: String,
    pub feature_commit: String,
    pub tag_commit: String,
}

impl SeededRemote {
    pub fn new() -> Self {
        let remote = BareRemote::new();
        let repo = remote.open();

        let main = seed_commit(&repo, "refs/heads/main", &[], MAIN_FILES, "initial import");
        let feature = seed_commit(
            &repo,
            "refs/heads/feature-x",
            &[main],
            &[("README.md", "# upstream\n"), ("feature.txt", "wip\n")],
            "start feature",
        );

        let signature = Signature::now("Seeder", "seeder@example.com").unwrap();
        let object = repo.find_object(main, None).unwrap();
        repo.tag("v1", &object, &signature, "release v1", false)
            .unwrap();

        Self {
            remote,
            main_commit: main.to_string(),
            feature_commit: feature.to_string(),
            tag_commit: main.to_string(),
        }
    }

    /// Advance `main` on the remote; `files` is the complete new tree.
    pub fn advance_main(&mut self, files: &[(&str, &str)], message: &str) -> String {
        let repo = self.remote.open();
        let parent = Oid::from_str(&self.main_commit).unwrap();
        let id = seed_commit(&repo, "refs/heads/main", &[parent], files, message);
        self.main_commit = id.to_string();
        self.main_commit.clone()
    }
}
