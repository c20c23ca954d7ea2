use axum::{middleware, Router};

use crate::{auth::middleware::require_auth, state::AppState};

pub mod handlers;

/// Routes behind the auth gate.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(handlers::profile_routes())
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}
