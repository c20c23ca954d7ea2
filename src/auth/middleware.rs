use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, warn};

use super::{cookies::ACCESS_COOKIE, repo_types::PublicUser};
use crate::{error::AppError, state::AppState};

/// Identity attached to a request once the gate has let it through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub PublicUser);

/// Resolves the access-token cookie to a live, active user.
///
/// The user row is re-read on every call so deactivation takes effect immediately,
/// even while previously issued tokens remain cryptographically valid.
pub async fn authenticate(state: &AppState, jar: &CookieJar) -> Result<AuthUser, AppError> {
    let token = jar
        .get(ACCESS_COOKIE)
        .map(|c| c.value())
        .filter(|v| !v.is_empty())
        .ok_or(AppError::Unauthenticated("Authentication required"))?;

    let subject = state.tokens.verify(token).map_err(|e| {
        warn!(error = %e, "rejected access token");
        AppError::from(e)
    })?;

    match state.users.find_by_id(subject.user_id).await? {
        Some(user) if user.is_active => {
            debug!(user_id = user.id, "request authenticated");
            Ok(AuthUser(PublicUser::from(&user)))
        }
        _ => {
            warn!(user_id = subject.user_id, "token for missing or inactive user");
            Err(AppError::Unauthenticated(
                "Invalid token or user is unauthorized",
            ))
        }
    }
}

/// Pipeline stage in front of protected routes.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(&state, &jar).await?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AppError::Unauthenticated("Authentication required"))
    }
}
