use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};

use crate::auth::RequireUser;
use crate::github;
use crate::pipeline::{self, EditRequest};
use crate::server::dto::{EditResponse, FileParams, FileResponse, SubmitEditRequest};
use crate::server::response::{ApiError, ApiResponse};
use crate::server::validation::{validate_branch_name, validate_file_path, validate_owner, validate_repo_name};
use crate::server::{AppState, remote_for_user};

const DEFAULT_EDIT_PATH: &str = "docs/intro.md";
const FALLBACK_BASE_BRANCH: &str = "main";

pub async fn list_sites(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let sites = state.store.list_sites(auth.user.id).map_err(ApiError::from)?;
    Ok(Json(ApiResponse::success(sites)))
}

pub async fn get_file(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((owner, repo)): Path<(String, String)>,
    Query(params): Query<FileParams>,
) -> Result<impl IntoResponse, ApiError> {
    validate_owner(&owner)?;
    validate_repo_name(&repo)?;

    let path = params
        .path
        .unwrap_or_else(|| DEFAULT_EDIT_PATH.to_string());
    validate_file_path(&path)?;

    let client = remote_for_user(&state, auth.user.id)?;
    let file = pipeline::fetch_for_edit(
        client.as_ref(),
        &owner,
        &repo,
        &path,
        params.reference.as_deref(),
    )
    .await
    .map_err(ApiError::from)?;

    Ok(Json(ApiResponse::success(FileResponse {
        path: file.path,
        sha: file.sha,
        content: String::from_utf8_lossy(&file.content).into_owned(),
    })))
}

pub async fn submit_edit(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((owner, repo)): Path<(String, String)>,
    Json(req): Json<SubmitEditRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_owner(&owner)?;
    validate_repo_name(&repo)?;
    validate_file_path(&req.path)?;

    // Fall back to the registered default branch when the caller does not
    // name one, then to "main" for never-imported repositories.
    let base_branch = match req.base_branch {
        Some(branch) => branch,
        None => state
            .store
            .get_site(auth.user.id, github::PROVIDER, &owner, &repo)
            .map_err(ApiError::from)?
            .map(|site| site.default_branch)
            .unwrap_or_else(|| FALLBACK_BASE_BRANCH.to_string()),
    };
    validate_branch_name(&base_branch)?;

    let client = remote_for_user(&state, auth.user.id)?;
    let submitted = pipeline::submit_edit(
        client.as_ref(),
        &EditRequest {
            owner,
            repo,
            path: req.path,
            content: req.content,
            message: req.message,
            base_branch,
        },
    )
    .await
    .map_err(ApiError::from)?;

    Ok(Json(ApiResponse::success(EditResponse {
        branch: submitted.branch,
        pr_url: submitted.pr_url,
    })))
}
