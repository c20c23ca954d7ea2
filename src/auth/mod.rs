use crate::state::AppState;
use axum::Router;

pub mod claims;
pub mod cookies;
mod dto;
pub mod handlers;
pub mod jwt;
pub mod middleware;
pub mod password;
mod payload;
pub mod repo;
pub mod repo_types;
mod validation;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
