//! The edit-to-PR pipeline: fetch a file for editing, then submit the edit as
//! a fresh branch plus pull request.
//!
//! Submission steps are strictly ordered; each step's output feeds the next.
//! A failure anywhere is fatal to that submission — there is no rollback of
//! an already-created branch, and re-invoking the pipeline derives a new
//! branch name, so the whole sequence is safe to repeat.

use chrono::Utc;
use rand::Rng;

use crate::error::{Error, Result};
use crate::github::{Content, FileWrite, Remote, RemoteFile};

const BRANCH_PREFIX: &str = "admin-edit";

#[derive(Debug, Clone)]
pub struct EditRequest {
    pub owner: String,
    pub repo: String,
    pub path: String,
    pub content: String,
    pub message: Option<String>,
    pub base_branch: String,
}

#[derive(Debug, Clone)]
pub struct SubmittedEdit {
    pub branch: String,
    pub pr_url: String,
}

/// Fetches the current content and sha of a file for display in an editor.
/// A directory at the path reads as absent.
pub async fn fetch_for_edit(
    client: &dyn Remote,
    owner: &str,
    repo: &str,
    path: &str,
    reference: Option<&str>,
) -> Result<RemoteFile> {
    match client.get_content(owner, repo, path, reference).await? {
        Content::File(file) => Ok(file),
        Content::Directory(_) => Err(Error::NotFound),
    }
}

/// Derives a branch name unique to this submission: millisecond timestamp
/// plus a random suffix, so rapid repeated submissions never reuse a name.
fn new_branch_name() -> String {
    let millis = Utc::now().timestamp_millis();
    let mut suffix = [0u8; 2];
    rand::thread_rng().fill(&mut suffix);
    format!("{BRANCH_PREFIX}-{millis}-{}", hex::encode(suffix))
}

pub async fn submit_edit(client: &dyn Remote, request: &EditRequest) -> Result<SubmittedEdit> {
    let owner = request.owner.as_str();
    let repo = request.repo.as_str();

    let base_sha = client
        .get_ref(owner, repo, &format!("heads/{}", request.base_branch))
        .await?;

    let branch = new_branch_name();
    client
        .create_ref(owner, repo, &format!("refs/heads/{branch}"), &base_sha)
        .await?;

    // Best-effort prior sha from the base branch; a brand-new file has none.
    let prior_sha = match client
        .get_content(owner, repo, &request.path, Some(&request.base_branch))
        .await
    {
        Ok(Content::File(file)) => Some(file.sha),
        _ => None,
    };

    let message = request
        .message
        .clone()
        .unwrap_or_else(|| format!("Edit {}", request.path));

    client
        .put_file(
            owner,
            repo,
            &request.path,
            &FileWrite {
                message: message.clone(),
                content: request.content.clone().into_bytes(),
                branch: branch.clone(),
                prior_sha,
            },
        )
        .await?;

    let pr_url = client
        .create_pull_request(owner, repo, &branch, &request.base_branch, &message)
        .await?;

    Ok(SubmittedEdit { branch, pr_url })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::testing::FixtureRemote;

    fn edit_request() -> EditRequest {
        EditRequest {
            owner: "octocat".to_string(),
            repo: "docs".to_string(),
            path: "docs/intro.md".to_string(),
            content: "# Hello".to_string(),
            message: None,
            base_branch: "main".to_string(),
        }
    }

    fn fixture() -> FixtureRemote {
        FixtureRemote::new()
            .with_ref("heads/main", "abc123")
            .with_file("docs/intro.md", "def456", b"# Old intro")
    }

    #[tokio::test]
    async fn submit_creates_branch_writes_file_and_opens_pr() {
        let remote = fixture();

        let submitted = submit_edit(&remote, &edit_request()).await.unwrap();

        assert!(submitted.branch.starts_with("admin-edit-"));
        assert_eq!(
            remote.ref_sha(&format!("refs/heads/{}", submitted.branch)),
            Some("abc123".to_string()),
            "new branch must point at the base head"
        );

        let writes = remote.writes.lock().unwrap().clone();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].path, "docs/intro.md");
        assert_eq!(writes[0].branch, submitted.branch);
        assert_eq!(writes[0].prior_sha.as_deref(), Some("def456"));
        assert_eq!(writes[0].content, b"# Hello");
        assert_eq!(writes[0].message, "Edit docs/intro.md");

        let prs = remote.prs.lock().unwrap().clone();
        assert_eq!(prs.len(), 1);
        assert_eq!(prs[0].head, submitted.branch);
        assert_eq!(prs[0].base, "main");
        assert_eq!(prs[0].title, "Edit docs/intro.md");

        assert!(
            submitted
                .pr_url
                .starts_with("https://github.example/octocat/docs/pull/")
        );
    }

    #[tokio::test]
    async fn new_file_is_written_without_a_prior_sha() {
        let remote = FixtureRemote::new().with_ref("heads/main", "abc123");

        let mut request = edit_request();
        request.path = "docs/brand-new.md".to_string();
        request.message = Some("Add brand-new page".to_string());

        submit_edit(&remote, &request).await.unwrap();

        let writes = remote.writes.lock().unwrap().clone();
        assert_eq!(writes[0].prior_sha, None);
        assert_eq!(writes[0].message, "Add brand-new page");
    }

    #[tokio::test]
    async fn repeated_submissions_produce_distinct_branches_and_prs() {
        let remote = fixture();

        let first = submit_edit(&remote, &edit_request()).await.unwrap();
        let second = submit_edit(&remote, &edit_request()).await.unwrap();

        assert_ne!(first.branch, second.branch);
        assert_ne!(first.pr_url, second.pr_url);
        assert_eq!(remote.prs.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_base_branch_fails_the_submission() {
        let remote = FixtureRemote::new();

        let result = submit_edit(&remote, &edit_request()).await;

        assert!(matches!(result, Err(Error::NotFound)));
        assert!(remote.writes.lock().unwrap().is_empty());
        assert!(remote.prs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn fetch_for_edit_returns_content_and_sha() {
        let remote = fixture();

        let file = fetch_for_edit(&remote, "octocat", "docs", "docs/intro.md", None)
            .await
            .unwrap();

        assert_eq!(file.sha, "def456");
        assert_eq!(file.content, b"# Old intro");
    }

    #[tokio::test]
    async fn fetch_for_edit_treats_directories_as_absent() {
        let remote = FixtureRemote::new().with_dir("docs", &[]);

        let result = fetch_for_edit(&remote, "octocat", "docs", "docs", None).await;

        assert!(matches!(result, Err(Error::NotFound)));
    }
}
