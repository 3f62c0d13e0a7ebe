pub mod dto;
mod repos;
pub mod response;
mod router;
mod sites;
mod tokens;
pub mod validation;

use std::sync::Arc;

pub use router::{AppState, create_router};

use crate::github::{self, Remote};
use crate::server::response::ApiError;

/// Builds a remote client for the user's current vault token. A user with no
/// stored token is asked to connect an account rather than met with a crash.
pub(crate) fn remote_for_user(
    state: &AppState,
    user_id: i64,
) -> Result<Arc<dyn Remote>, ApiError> {
    let token = state
        .vault
        .latest_token(user_id, github::PROVIDER)
        .map_err(ApiError::from)?
        .ok_or_else(|| {
            ApiError::unauthorized("No GitHub token stored; connect your account first")
        })?;
    Ok(state.remotes.for_token(&token))
}
