use axum::{routing::get, Router};
use tracing::instrument;

use crate::{
    auth::{middleware::AuthUser, repo_types::PublicUser},
    response::ApiResponse,
    state::AppState,
};

pub fn profile_routes() -> Router<AppState> {
    Router::new().route("/user/profile", get(get_my_profile))
}

#[derive(Debug, serde::Serialize)]
pub struct ProfileResponse {
    pub user: PublicUser,
}

#[instrument(skip_all)]
pub async fn get_my_profile(AuthUser(user): AuthUser) -> ApiResponse<ProfileResponse> {
    ApiResponse::success("Profile fetched successfully", ProfileResponse { user })
}
