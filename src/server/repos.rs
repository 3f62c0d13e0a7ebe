use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::auth::RequireUser;
use crate::github::{self, RepoHandle, RepoPager, is_docusaurus_repo};
use crate::mirror::{self, site_mirror_path};
use crate::server::dto::{ImportRepoRequest, ImportResponse, RepoListResponse};
use crate::server::response::{ApiError, ApiResponse};
use crate::server::validation::{validate_branch_name, validate_owner, validate_repo_name};
use crate::server::{AppState, remote_for_user};
use crate::types::NewSite;

/// Cap on concurrent detector probes; the listing itself stays sequential.
const DETECT_CONCURRENCY: usize = 8;

pub async fn list_repos(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let client = remote_for_user(&state, auth.user.id)?;

    let mut pager = RepoPager::new(Arc::clone(&client));
    let semaphore = Arc::new(Semaphore::new(DETECT_CONCURRENCY));
    let mut probes = JoinSet::new();
    let mut index = 0usize;

    while let Some(handle) = pager.next().await.map_err(ApiError::from)? {
        let client = Arc::clone(&client);
        let semaphore = Arc::clone(&semaphore);
        let position = index;
        index += 1;

        probes.spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
            let matched = is_docusaurus_repo(client.as_ref(), &handle.owner, &handle.name).await;
            (position, matched, handle)
        });
    }

    let mut matches: Vec<(usize, RepoHandle)> = Vec::new();
    while let Some(joined) = probes.join_next().await {
        let (position, matched, handle) =
            joined.map_err(|_| ApiError::internal("Repository probe failed"))?;
        if matched {
            matches.push((position, handle));
        }
    }
    matches.sort_by_key(|(position, _)| *position);

    let repos = matches.into_iter().map(|(_, handle)| handle).collect();
    let sites = state.store.list_sites(auth.user.id).map_err(ApiError::from)?;

    Ok(Json(ApiResponse::success(RepoListResponse { repos, sites })))
}

pub async fn import_repo(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ImportRepoRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_owner(&req.owner)?;
    validate_repo_name(&req.repo)?;
    validate_branch_name(&req.default_branch)?;

    let client = remote_for_user(&state, auth.user.id)?;

    let local_path = site_mirror_path(&state.data_dir, auth.user.id, &req.owner, &req.repo);
    let lock_key = local_path.to_string_lossy().into_owned();
    let _guard = state.mirror_locks.lock(&lock_key).await;

    let outcome = mirror::mirror_subset(
        &client,
        &req.owner,
        &req.repo,
        &req.default_branch,
        &local_path,
        mirror::DEFAULT_SITE_PATHS,
    )
    .await
    .map_err(ApiError::from)?;

    let site = state
        .store
        .upsert_site(&NewSite {
            user_id: auth.user.id,
            provider: github::PROVIDER.to_string(),
            owner: req.owner,
            repo: req.repo,
            default_branch: req.default_branch,
            local_path: local_path.to_string_lossy().into_owned(),
        })
        .map_err(ApiError::from)?;

    Ok(Json(ApiResponse::success(ImportResponse {
        site,
        files_written: outcome.files_written,
        skipped: outcome.skipped,
    })))
}
