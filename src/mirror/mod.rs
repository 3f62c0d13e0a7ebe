//! Best-effort local mirroring of a remote repository subtree.
//!
//! Every write lands through [`safe_join`] (lexical containment under the
//! mirror root) and [`write_file_atomic`] (temp sibling + rename), so a crash
//! mid-mirror never leaves a half-written file at a final path.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, OwnedMutexGuard, Semaphore};
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::github::{Content, EntryKind, Remote};

/// The subset of a site repository worth mirroring for local browsing.
pub const DEFAULT_SITE_PATHS: &[&str] = &[
    "docs",
    "blog",
    "docusaurus.config.ts",
    "docusaurus.config.js",
    "sidebars.js",
    "sidebars.ts",
];

const FETCH_CONCURRENCY: usize = 8;

#[derive(Debug, Default)]
pub struct MirrorOutcome {
    pub files_written: usize,
    /// Requested paths that could not be mirrored at this ref.
    pub skipped: Vec<String>,
}

/// Derives the deterministic mirror root for a (user, repo) pair.
#[must_use]
pub fn site_mirror_path(data_dir: &Path, user_id: i64, owner: &str, repo: &str) -> PathBuf {
    data_dir.join("mirrors").join(format!("u{user_id}-{owner}-{repo}"))
}

/// Mirrors each requested path independently. A path that is absent at the
/// ref (or fails mid-transfer) is recorded in `skipped` and the remaining
/// paths are still attempted; a traversal violation aborts the whole
/// operation.
pub async fn mirror_subset(
    client: &Arc<dyn Remote>,
    owner: &str,
    repo: &str,
    reference: &str,
    target_root: &Path,
    paths: &[&str],
) -> Result<MirrorOutcome> {
    fs::create_dir_all(target_root).await?;

    let mut outcome = MirrorOutcome::default();
    for path in paths {
        match mirror_path(client, owner, repo, reference, path, target_root).await {
            Ok(written) => outcome.files_written += written,
            Err(e @ Error::PathTraversal(_)) => return Err(e),
            Err(e) => {
                tracing::debug!("skipping {path} at {reference}: {e}");
                outcome.skipped.push((*path).to_string());
            }
        }
    }
    Ok(outcome)
}

/// Mirrors one remote path (file or directory tree) under `target_root`.
/// Directories are walked with an explicit worklist; file downloads within a
/// listing fan out under a small concurrency bound.
pub async fn mirror_path(
    client: &Arc<dyn Remote>,
    owner: &str,
    repo: &str,
    reference: &str,
    path: &str,
    target_root: &Path,
) -> Result<usize> {
    let mut written = 0;
    let mut worklist = vec![path.to_string()];

    while let Some(current) = worklist.pop() {
        match client
            .get_content(owner, repo, &current, Some(reference))
            .await?
        {
            Content::File(file) => {
                let target = safe_join(target_root, &file.path)?;
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).await?;
                }
                write_file_atomic(&target, &file.content).await?;
                written += 1;
            }
            Content::Directory(entries) => {
                fs::create_dir_all(safe_join(target_root, &current)?).await?;

                // Resolve every target before fetching anything, so a
                // traversal anywhere in the listing aborts the mirror.
                let mut files = Vec::new();
                for entry in entries {
                    match entry.kind {
                        EntryKind::File => {
                            let target = safe_join(target_root, &entry.path)?;
                            files.push((entry.path, target));
                        }
                        EntryKind::Dir => worklist.push(entry.path),
                        EntryKind::Other => {}
                    }
                }
                written += fetch_files(client, owner, repo, reference, files).await?;
            }
        }
    }
    Ok(written)
}

async fn fetch_files(
    client: &Arc<dyn Remote>,
    owner: &str,
    repo: &str,
    reference: &str,
    files: Vec<(String, PathBuf)>,
) -> Result<usize> {
    let semaphore = Arc::new(Semaphore::new(FETCH_CONCURRENCY));
    let mut tasks = JoinSet::new();

    for (remote_path, target) in files {
        let client = Arc::clone(client);
        let semaphore = Arc::clone(&semaphore);
        let owner = owner.to_string();
        let repo = repo.to_string();
        let reference = reference.to_string();

        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
            match client
                .get_content(&owner, &repo, &remote_path, Some(&reference))
                .await?
            {
                Content::File(file) => {
                    if let Some(parent) = target.parent() {
                        fs::create_dir_all(parent).await?;
                    }
                    write_file_atomic(&target, &file.content).await?;
                    Ok::<usize, Error>(1)
                }
                // Listed as a file but resolved to something else; skip it
                Content::Directory(_) => Ok(0),
            }
        });
    }

    let mut written = 0;
    while let Some(joined) = tasks.join_next().await {
        written += joined.map_err(|e| Error::Io(std::io::Error::other(e)))??;
    }
    Ok(written)
}

/// Joins a remote path onto the mirror root, rejecting anything that would
/// lexically escape it: absolute paths, parent components, prefixes.
pub fn safe_join(root: &Path, remote_path: &str) -> Result<PathBuf> {
    let mut resolved = root.to_path_buf();
    for component in Path::new(remote_path).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            _ => return Err(Error::PathTraversal(remote_path.to_string())),
        }
    }
    if !resolved.starts_with(root) {
        return Err(Error::PathTraversal(remote_path.to_string()));
    }
    Ok(resolved)
}

/// Writes content to a uniquely named temporary sibling, fsyncs, then renames
/// into place. A concurrent reader never observes a partial file at `path`.
pub async fn write_file_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let tmp = path.with_file_name(format!(".tmp-{}", Uuid::new_v4()));

    let mut file = File::create(&tmp).await?;
    file.write_all(content).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&tmp, path).await?;
    Ok(())
}

/// Serializes mirror runs per key so a re-mirror of the same (user, repo)
/// waits for the one in flight. Distinct keys never contend.
#[derive(Default)]
pub struct MirrorLocks {
    locks: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl MirrorLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(locks.entry(key.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::testing::FixtureRemote;
    use tempfile::TempDir;

    fn fixture_site() -> Arc<dyn Remote> {
        Arc::new(
            FixtureRemote::new()
                .with_dir(
                    "docs",
                    &[
                        ("docs/intro.md", EntryKind::File),
                        ("docs/advanced", EntryKind::Dir),
                        ("docs/link", EntryKind::Other),
                    ],
                )
                .with_dir("docs/advanced", &[("docs/advanced/deep.md", EntryKind::File)])
                .with_file("docs/intro.md", "sha1", b"# Intro")
                .with_file("docs/advanced/deep.md", "sha2", b"# Deep")
                .with_file("sidebars.js", "sha3", b"module.exports = {};"),
        )
    }

    #[test]
    fn safe_join_accepts_nested_relative_paths() {
        let root = Path::new("/data/mirrors/u1-a-b");
        assert_eq!(
            safe_join(root, "docs/intro.md").unwrap(),
            root.join("docs/intro.md")
        );
        assert_eq!(
            safe_join(root, "./docs/intro.md").unwrap(),
            root.join("docs/intro.md")
        );
    }

    #[test]
    fn safe_join_rejects_adversarial_paths() {
        let root = Path::new("/data/mirrors/u1-a-b");
        for hostile in [
            "../outside.md",
            "..",
            "docs/../../outside.md",
            "/etc/passwd",
            "docs/../../../root/.ssh/authorized_keys",
        ] {
            assert!(
                matches!(safe_join(root, hostile), Err(Error::PathTraversal(_))),
                "{hostile} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn mirrors_present_paths_and_skips_absent_ones() {
        let client = fixture_site();
        let tmp = TempDir::new().unwrap();

        let outcome = mirror_subset(
            &client,
            "octocat",
            "docs",
            "main",
            tmp.path(),
            &["docs", "blog", "sidebars.js"],
        )
        .await
        .unwrap();

        assert_eq!(outcome.files_written, 3);
        assert_eq!(outcome.skipped, vec!["blog"]);

        assert_eq!(
            std::fs::read(tmp.path().join("docs/intro.md")).unwrap(),
            b"# Intro"
        );
        assert_eq!(
            std::fs::read(tmp.path().join("docs/advanced/deep.md")).unwrap(),
            b"# Deep"
        );
        assert!(tmp.path().join("sidebars.js").exists());
        // The symlink-like entry is never materialized
        assert!(!tmp.path().join("docs/link").exists());
    }

    #[tokio::test]
    async fn remirror_overwrites_in_place_and_leaves_no_temp_files() {
        let client = fixture_site();
        let tmp = TempDir::new().unwrap();

        std::fs::create_dir_all(tmp.path().join("docs")).unwrap();
        std::fs::write(tmp.path().join("docs/intro.md"), b"stale").unwrap();

        mirror_subset(&client, "octocat", "docs", "main", tmp.path(), &["docs"])
            .await
            .unwrap();

        assert_eq!(
            std::fs::read(tmp.path().join("docs/intro.md")).unwrap(),
            b"# Intro"
        );

        let leftovers: Vec<_> = walk(tmp.path())
            .into_iter()
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(".tmp-"))
            })
            .collect();
        assert!(leftovers.is_empty(), "stray temp files: {leftovers:?}");
    }

    #[tokio::test]
    async fn traversal_in_a_listing_aborts_the_mirror() {
        let client: Arc<dyn Remote> = Arc::new(
            FixtureRemote::new()
                .with_dir("docs", &[("../evil.md", EntryKind::File)])
                .with_file("../evil.md", "sha1", b"boom"),
        );
        let tmp = TempDir::new().unwrap();

        let result = mirror_subset(&client, "octocat", "docs", "main", tmp.path(), &["docs"]).await;

        assert!(matches!(result, Err(Error::PathTraversal(_))));
        assert!(!tmp.path().parent().unwrap().join("evil.md").exists());
    }

    #[tokio::test]
    async fn atomic_write_replaces_existing_content() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("file.md");

        write_file_atomic(&target, b"first").await.unwrap();
        write_file_atomic(&target, b"second").await.unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"second");
    }

    #[test]
    fn mirror_paths_are_deterministic_per_user_and_repo() {
        let data_dir = Path::new("/data");
        let a = site_mirror_path(data_dir, 1, "octocat", "docs");
        let b = site_mirror_path(data_dir, 1, "octocat", "docs");
        let c = site_mirror_path(data_dir, 2, "octocat", "docs");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("/data/mirrors"));
    }

    fn walk(dir: &Path) -> Vec<PathBuf> {
        let mut out = Vec::new();
        let mut stack = vec![dir.to_path_buf()];
        while let Some(current) = stack.pop() {
            for entry in std::fs::read_dir(&current).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    stack.push(path.clone());
                }
                out.push(path);
            }
        }
        out
    }
}
