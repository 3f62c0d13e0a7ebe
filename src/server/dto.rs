use serde::{Deserialize, Serialize};

use crate::github::RepoHandle;
use crate::types::Site;

#[derive(Debug, Deserialize)]
pub struct StoreTokenRequest {
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ImportRepoRequest {
    pub owner: String,
    pub repo: String,
    pub default_branch: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct FileParams {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default, rename = "ref")]
    pub reference: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitEditRequest {
    pub path: String,
    pub content: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub base_branch: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RepoListResponse {
    pub repos: Vec<RepoHandle>,
    pub sites: Vec<Site>,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub site: Site,
    pub files_written: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub path: String,
    pub sha: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct EditResponse {
    pub branch: String,
    pub pr_url: String,
}
