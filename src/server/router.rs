use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{
    Router,
    routing::{get, post},
};

use super::{repos, sites, tokens};
use crate::github::RemoteFactory;
use crate::mirror::MirrorLocks;
use crate::store::Store;
use crate::vault::Vault;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub vault: Vault,
    pub remotes: Arc<dyn RemoteFactory>,
    pub data_dir: PathBuf,
    pub mirror_locks: MirrorLocks,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        remotes: Arc<dyn RemoteFactory>,
        data_dir: PathBuf,
        token_secret: Option<String>,
    ) -> Self {
        let vault = Vault::new(Arc::clone(&store), token_secret.as_deref());
        Self {
            store,
            vault,
            remotes,
            data_dir,
            mirror_locks: MirrorLocks::new(),
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/auth/token", post(tokens::store_token))
        .route("/api/v1/repos", get(repos::list_repos))
        .route("/api/v1/repos/import", post(repos::import_repo))
        .route("/api/v1/sites", get(sites::list_sites))
        .route("/api/v1/sites/{owner}/{repo}/file", get(sites::get_file))
        .route("/api/v1/sites/{owner}/{repo}/edit", post(sites::submit_edit))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
