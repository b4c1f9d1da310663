//! Throwaway git repositories for integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::fs;
use std::path::{Path, PathBuf};

use git2::{Commit, Oid, Repository, ResetType, Signature};
use tempfile::TempDir;

/// A temporary repository with a configured identity.
pub struct TestRepo {
    _temp_dir: TempDir,
    pub path: PathBuf,
    pub repo: Repository,
}

impl TestRepo {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().to_path_buf();
        let repo = Repository::init(&path).unwrap();

        let mut config = repo.config().unwrap();
        config.set_str("user.name", "Test User").unwrap();
        config.set_str("user.email", "test@example.com").unwrap();

        Self {
            _temp_dir: temp_dir,
            path,
            repo,
        }
    }

    /// Writes (or with `None`, deletes) files and commits them on HEAD.
    pub fn commit(&self, files: &[(&str, Option<&str>)], message: &str) -> String {
        let mut index = self.repo.index().unwrap();
        for (file, content) in files {
            let full = self.path.join(file);
            match content {
                Some(text) => {
                    fs::create_dir_all(full.parent().unwrap()).unwrap();
                    fs::write(&full, text).unwrap();
                    index.add_path(Path::new(file)).unwrap();
                }
                None => {
                    fs::remove_file(&full).unwrap();
                    index.remove_path(Path::new(file)).unwrap();
                }
            }
        }
        index.write().unwrap();

        let tree = self.repo.find_tree(index.write_tree().unwrap()).unwrap();
        let signature = Signature::now("Test User", "test@example.com").unwrap();
        let parent = self.repo.head().ok().map(|h| h.peel_to_commit().unwrap());
        let parents: Vec<&Commit<'_>> = parent.iter().collect();
        self.repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .unwrap()
            .to_string()
    }

    /// Moves HEAD, index and working tree back to `commit`.
    pub fn reset_hard(&self, commit: &str) {
        let object = self.repo.find_object(Oid::from_str(commit).unwrap(), None).unwrap();
        self.repo.reset(&object, ResetType::Hard, None).unwrap();
    }

    /// Moves HEAD back to `commit`, keeping the index and working tree.
    pub fn reset_soft(&self, commit: &str) {
        let object = self.repo.find_object(Oid::from_str(commit).unwrap(), None).unwrap();
        self.repo.reset(&object, ResetType::Soft, None).unwrap();
    }

    pub fn head(&self) -> String {
        self.repo.head().unwrap().peel_to_commit().unwrap().id().to_string()
    }

    /// Tree id of `commit`.
    pub fn tree_of(&self, commit: &str) -> Oid {
        self.repo
            .find_commit(Oid::from_str(commit).unwrap())
            .unwrap()
            .tree_id()
    }

    /// Number of commits reachable from HEAD.
    pub fn history_len(&self) -> usize {
        let mut walk = self.repo.revwalk().unwrap();
        walk.push_head().unwrap();
        walk.count()
    }
}

/// Base commit plus one commit touching a bugfix, a new feature file and docs.
pub fn three_file_repo() -> (TestRepo, String, String) {
    let t = TestRepo::new();
    let base = t.commit(
        &[
            ("src/file1.rs", Some("pub fn parse(input: &str) -> usize {\n    input.len()\n}\n")),
            ("docs/readme.md", Some("# Project\n")),
        ],
        "initial import",
    );
    let head = t.commit(
        &[
            (
                "src/file1.rs",
                Some("pub fn parse(input: &str) -> usize {\n    // fix crash on empty input\n    input.len().max(1)\n}\n"),
            ),
            ("src/file2.rs", Some("pub fn render(items: &[String]) -> String {\n    items.join(\", \")\n}\n")),
            ("docs/readme.md", Some("# Project\n\nUsage notes for the renderer.\n")),
        ],
        "parser fix, renderer and docs",
    );
    (t, base, head)
}
