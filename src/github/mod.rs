mod client;
mod detect;

pub use client::{GithubClient, GithubRemoteFactory};
pub use detect::is_docusaurus_repo;

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

/// Provider key under which tokens and sites are recorded.
pub const PROVIDER: &str = "github";

/// A repository handle as reported by the listing endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RepoHandle {
    pub owner: String,
    pub name: String,
    pub default_branch: String,
    pub html_url: String,
}

/// A file fetched from the remote, content already decoded.
#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub path: String,
    pub sha: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    /// Symlinks and submodules; listed but never mirrored.
    Other,
}

#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
}

/// The shape of a content response, decided once at the API boundary.
#[derive(Debug, Clone)]
pub enum Content {
    File(RemoteFile),
    Directory(Vec<DirEntry>),
}

/// A create-or-update file request. `prior_sha` must be the current blob sha
/// when updating an existing file and None when creating a new one; the
/// remote rejects a mismatch with a conflict.
#[derive(Debug, Clone)]
pub struct FileWrite {
    pub message: String,
    pub content: Vec<u8>,
    pub branch: String,
    pub prior_sha: Option<String>,
}

/// Remote defines the platform content/branch/PR interface.
#[async_trait]
pub trait Remote: Send + Sync {
    /// Fetches a file or directory listing at a path. `reference` defaults to
    /// the repository's default branch when None.
    async fn get_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        reference: Option<&str>,
    ) -> Result<Content>;

    /// Resolves a ref (e.g. "heads/main") to its commit sha.
    async fn get_ref(&self, owner: &str, repo: &str, reference: &str) -> Result<String>;

    /// Creates a fully qualified ref (e.g. "refs/heads/topic") at a sha.
    async fn create_ref(&self, owner: &str, repo: &str, reference: &str, sha: &str) -> Result<()>;

    async fn put_file(&self, owner: &str, repo: &str, path: &str, write: &FileWrite)
    -> Result<()>;

    /// Opens a pull request and returns its web URL.
    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        head: &str,
        base: &str,
        title: &str,
    ) -> Result<String>;

    /// One page of the authenticated user's repositories. An empty or short
    /// page means the listing is exhausted.
    async fn list_repos_page(&self, page: u32, per_page: u32) -> Result<Vec<RepoHandle>>;
}

/// Builds a `Remote` bound to one user's access token.
pub trait RemoteFactory: Send + Sync {
    fn for_token(&self, token: &str) -> Arc<dyn Remote>;
}

pub const LIST_PAGE_SIZE: u32 = 50;

/// Lazily walks the authenticated user's repositories one at a time,
/// fetching pages on demand. Finite and forward-only.
pub struct RepoPager {
    client: Arc<dyn Remote>,
    page: u32,
    buffer: VecDeque<RepoHandle>,
    done: bool,
}

impl RepoPager {
    #[must_use]
    pub fn new(client: Arc<dyn Remote>) -> Self {
        Self {
            client,
            page: 1,
            buffer: VecDeque::new(),
            done: false,
        }
    }

    pub async fn next(&mut self) -> Result<Option<RepoHandle>> {
        if self.buffer.is_empty() && !self.done {
            let items = self
                .client
                .list_repos_page(self.page, LIST_PAGE_SIZE)
                .await?;
            self.page += 1;
            if items.len() < LIST_PAGE_SIZE as usize {
                self.done = true;
            }
            self.buffer.extend(items);
        }
        Ok(self.buffer.pop_front())
    }
}
