use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;

use crate::auth::RequireUser;
use crate::github;
use crate::server::AppState;
use crate::server::dto::StoreTokenRequest;
use crate::server::response::{ApiError, ApiResponse};

/// Stores a GitHub access token for the authenticated operator. The token is
/// encrypted before it touches the store and is never echoed back.
pub async fn store_token(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<StoreTokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let token = req.access_token.trim();
    if token.is_empty() {
        return Err(ApiError::bad_request("Access token cannot be empty"));
    }

    state
        .vault
        .store_token(auth.user.id, github::PROVIDER, token)
        .map_err(ApiError::from)?;

    Ok(Json(ApiResponse::success(json!({ "stored": true }))))
}
