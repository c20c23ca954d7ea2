use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, info, instrument, warn};

use crate::{
    auth::{
        cookies::{attach_session, clear_session, REFRESH_COOKIE},
        dto::{LoginRequest, LoginResponse, SignupRequest, SignupResponse, UserPayload},
        password::{hash_password_blocking, verify_password_blocking},
        payload::Payload,
        repo_types::{PublicUser, UserView},
        validation::{validate_login, validate_signup},
    },
    error::AppError,
    response::ApiResponse,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/logout", get(logout))
        .route("/auth/refresh", post(refresh))
}

#[instrument(skip_all)]
pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    Payload(payload): Payload<SignupRequest>,
) -> Result<(StatusCode, CookieJar, ApiResponse<SignupResponse>), AppError> {
    validate_signup(&payload)?;

    if state.users.find_by_email(&payload.email).await?.is_some() {
        warn!("signup for an already registered email");
        return Err(AppError::DuplicateUser);
    }

    let hash = hash_password_blocking(payload.password).await?;
    // The unique index still guards against a concurrent signup for the same email.
    let user = state.users.create(&payload.email, &hash).await?;

    let tokens = state.tokens.issue_pair(user.id)?;
    let jar = attach_session(jar, &state.config.cookie, tokens);

    info!(user_id = user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        jar,
        ApiResponse::success(
            "User registered successfully",
            UserPayload {
                user: PublicUser::from(&user),
            },
        ),
    ))
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Payload(payload): Payload<LoginRequest>,
) -> Result<(CookieJar, ApiResponse<LoginResponse>), AppError> {
    validate_login(&payload)?;

    let Some(user) = state.users.find_by_email(&payload.email).await? else {
        warn!("login for unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !user.is_active {
        warn!(user_id = user.id, "login for inactive user");
        return Err(AppError::UnauthorizedUser);
    }

    if !verify_password_blocking(payload.password, user.password_hash.clone()).await? {
        warn!(user_id = user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    let tokens = state.tokens.issue_pair(user.id)?;
    let jar = attach_session(jar, &state.config.cookie, tokens);

    info!(user_id = user.id, email = %user.email, "user logged in");
    Ok((
        jar,
        ApiResponse::success(
            "Logged in successfully",
            UserPayload {
                user: UserView::from(user),
            },
        ),
    ))
}

/// Always succeeds. Tokens already handed out stay valid until they expire.
#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, ApiResponse<()>) {
    debug!("clearing session cookies");
    (
        clear_session(jar, &state.config.cookie),
        ApiResponse::message("Logged out successfully"),
    )
}

/// Trades a valid refresh-token cookie for a fresh token pair.
#[instrument(skip_all)]
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, ApiResponse<SignupResponse>), AppError> {
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(AppError::Unauthenticated("Authentication required"))?;

    let subject = state.tokens.verify_refresh(&token).map_err(|e| {
        warn!(error = %e, "rejected refresh token");
        AppError::from(e)
    })?;

    let user = match state.users.find_by_id(subject.user_id).await? {
        Some(user) if user.is_active => user,
        _ => {
            warn!(user_id = subject.user_id, "refresh for missing or inactive user");
            return Err(AppError::Unauthenticated(
                "Invalid token or user is unauthorized",
            ));
        }
    };

    let tokens = state.tokens.issue_pair(user.id)?;
    let jar = attach_session(jar, &state.config.cookie, tokens);

    info!(user_id = user.id, "session refreshed");
    Ok((
        jar,
        ApiResponse::success(
            "Session refreshed",
            UserPayload {
                user: PublicUser::from(&user),
            },
        ),
    ))
}
