use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::{Content, DirEntry, EntryKind, FileWrite, Remote, RemoteFactory, RemoteFile, RepoHandle};
use crate::config::GithubConfig;
use crate::error::{Error, Result};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// GitHub REST v3 client bound to one user's access token.
#[derive(Clone)]
pub struct GithubClient {
    http: Client,
    api_base: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ContentEntry {
    name: String,
    path: String,
    sha: String,
    #[serde(rename = "type")]
    kind: String,
    content: Option<String>,
    encoding: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentResponse {
    Directory(Vec<ContentEntry>),
    File(Box<ContentEntry>),
}

#[derive(Debug, Deserialize)]
struct RefResponse {
    object: RefObject,
}

#[derive(Debug, Deserialize)]
struct RefObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct RepoOwner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RepoEntry {
    name: String,
    owner: RepoOwner,
    default_branch: Option<String>,
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl GithubClient {
    pub fn new(config: &GithubConfig, token: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self::with_http(http, config, token))
    }

    fn with_http(http: Client, config: &GithubConfig, token: &str) -> Self {
        Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// Percent-encodes each segment of a repository path for use in a URL.
    fn encode_path(path: &str) -> String {
        path.split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Maps GitHub's status codes onto the crate error taxonomy.
    async fn check(resp: Response) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        match status {
            StatusCode::NOT_FOUND => Err(Error::NotFound),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Error::Unauthorized),
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                let message = resp
                    .json::<ErrorBody>()
                    .await
                    .ok()
                    .and_then(|b| b.message)
                    .unwrap_or_else(|| format!("remote rejected the request ({status})"));
                Err(Error::Conflict(message))
            }
            _ => Err(Error::Remote(format!("unexpected status {status}"))),
        }
    }

    fn decode_file(entry: ContentEntry) -> Result<RemoteFile> {
        match entry.encoding.as_deref() {
            Some("base64") => {
                let raw: String = entry
                    .content
                    .unwrap_or_default()
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect();
                let content = STANDARD
                    .decode(raw)
                    .map_err(|_| Error::Remote(format!("undecodable content for {}", entry.path)))?;
                Ok(RemoteFile {
                    path: entry.path,
                    sha: entry.sha,
                    content,
                })
            }
            other => Err(Error::Remote(format!(
                "unsupported content encoding {:?} for {}",
                other, entry.path
            ))),
        }
    }
}

#[async_trait]
impl Remote for GithubClient {
    async fn get_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        reference: Option<&str>,
    ) -> Result<Content> {
        let url = self.url(&format!(
            "/repos/{owner}/{repo}/contents/{}",
            Self::encode_path(path)
        ));
        let mut req = self.http.get(&url).bearer_auth(&self.token);
        if let Some(reference) = reference {
            req = req.query(&[("ref", reference)]);
        }

        let resp = Self::check(req.send().await?).await?;
        let body: ContentResponse = resp.json().await?;

        match body {
            ContentResponse::File(entry) => Ok(Content::File(Self::decode_file(*entry)?)),
            ContentResponse::Directory(entries) => {
                let listing = entries
                    .into_iter()
                    .map(|e| DirEntry {
                        kind: match e.kind.as_str() {
                            "file" => EntryKind::File,
                            "dir" => EntryKind::Dir,
                            _ => EntryKind::Other,
                        },
                        name: e.name,
                        path: e.path,
                    })
                    .collect();
                Ok(Content::Directory(listing))
            }
        }
    }

    async fn get_ref(&self, owner: &str, repo: &str, reference: &str) -> Result<String> {
        let url = self.url(&format!("/repos/{owner}/{repo}/git/ref/{reference}"));
        let resp = Self::check(self.http.get(&url).bearer_auth(&self.token).send().await?).await?;
        let body: RefResponse = resp.json().await?;
        Ok(body.object.sha)
    }

    async fn create_ref(&self, owner: &str, repo: &str, reference: &str, sha: &str) -> Result<()> {
        let url = self.url(&format!("/repos/{owner}/{repo}/git/refs"));
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&json!({ "ref": reference, "sha": sha }))
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn put_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        write: &FileWrite,
    ) -> Result<()> {
        let url = self.url(&format!(
            "/repos/{owner}/{repo}/contents/{}",
            Self::encode_path(path)
        ));

        let mut body = json!({
            "message": write.message,
            "content": STANDARD.encode(&write.content),
            "branch": write.branch,
        });
        if let Some(sha) = &write.prior_sha {
            body["sha"] = json!(sha);
        }

        let resp = self
            .http
            .put(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        head: &str,
        base: &str,
        title: &str,
    ) -> Result<String> {
        let url = self.url(&format!("/repos/{owner}/{repo}/pulls"));
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&json!({ "head": head, "base": base, "title": title }))
            .send()
            .await?;
        let resp = Self::check(resp).await?;
        let body: PullResponse = resp.json().await?;
        Ok(body.html_url)
    }

    async fn list_repos_page(&self, page: u32, per_page: u32) -> Result<Vec<RepoHandle>> {
        let url = self.url("/user/repos");
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[
                ("per_page", per_page.to_string()),
                ("page", page.to_string()),
                (
                    "affiliation",
                    "owner,collaborator,organization_member".to_string(),
                ),
            ])
            .send()
            .await?;
        let resp = Self::check(resp).await?;
        let body: Vec<RepoEntry> = resp.json().await?;

        Ok(body
            .into_iter()
            .map(|r| RepoHandle {
                owner: r.owner.login,
                name: r.name,
                default_branch: r.default_branch.unwrap_or_else(|| "main".to_string()),
                html_url: r.html_url,
            })
            .collect())
    }
}

/// Builds GitHub clients that share one connection pool.
pub struct GithubRemoteFactory {
    http: Client,
    config: GithubConfig,
}

impl GithubRemoteFactory {
    pub fn new(config: GithubConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { http, config })
    }
}

impl RemoteFactory for GithubRemoteFactory {
    fn for_token(&self, token: &str) -> Arc<dyn Remote> {
        Arc::new(GithubClient::with_http(
            self.http.clone(),
            &self.config,
            token,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_path_preserves_segments() {
        assert_eq!(GithubClient::encode_path("docs/intro.md"), "docs/intro.md");
        assert_eq!(
            GithubClient::encode_path("docs/release notes.md"),
            "docs/release%20notes.md"
        );
    }

    #[test]
    fn decode_file_strips_embedded_newlines() {
        let entry = ContentEntry {
            name: "intro.md".to_string(),
            path: "docs/intro.md".to_string(),
            sha: "def456".to_string(),
            kind: "file".to_string(),
            content: Some("IyBIZWxs\nbw==\n".to_string()),
            encoding: Some("base64".to_string()),
        };
        let file = GithubClient::decode_file(entry).unwrap();
        assert_eq!(file.content, b"# Hello");
    }

    #[test]
    fn decode_file_rejects_unknown_encoding() {
        let entry = ContentEntry {
            name: "big.bin".to_string(),
            path: "big.bin".to_string(),
            sha: "abc".to_string(),
            kind: "file".to_string(),
            content: None,
            encoding: Some("none".to_string()),
        };
        assert!(matches!(
            GithubClient::decode_file(entry),
            Err(Error::Remote(_))
        ));
    }
}
