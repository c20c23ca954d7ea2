use std::net::SocketAddr;

use anyhow::Context;
use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method, Request, Response, StatusCode},
    middleware::map_response,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::{
    auth, config::AppConfig, error::AppError, response::ApiResponse, state::AppState, user,
};

const BODY_LIMIT: usize = 10 * 1024 * 1024;

pub fn build_app(state: AppState) -> Router {
    let config = state.config.clone();

    let router = Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(auth::router())
                .merge(user::router(state.clone()))
                .route("/ping", get(ping)),
        )
        .fallback(not_found)
        .with_state(state)
        .layer(DefaultBodyLimit::max(BODY_LIMIT));

    with_security_headers(router, &config).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(|req: &Request<_>| {
                        let request_id = req
                            .headers()
                            .get("x-request-id")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("none");
                        tracing::info_span!(
                            "http_request",
                            method = %req.method(),
                            uri = %req.uri(),
                            request_id,
                            status = tracing::field::Empty,
                        )
                    })
                    .on_response(
                        |res: &Response<_>, latency: std::time::Duration, span: &tracing::Span| {
                            let status = res.status();
                            span.record("status", tracing::field::display(status));
                            let latency_ms = latency.as_millis() as u64;
                            if status.is_server_error() {
                                error!(%status, latency_ms, "response");
                            } else {
                                info!(%status, latency_ms, "response");
                            }
                        },
                    ),
            )
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(cors_layer(&config))
            .layer(CompressionLayer::new())
            .layer(map_response(envelope_bare_errors))
            .layer(TimeoutLayer::new(config.request_timeout)),
    )
}

async fn ping() -> ApiResponse<()> {
    ApiResponse::message("pong")
}

async fn not_found() -> AppError {
    AppError::NotFound
}

/// Gives error responses produced outside the handlers (405 from routing, 408 from the
/// timeout) the same JSON envelope as everything else. Headers such as `Allow` are kept.
async fn envelope_bare_errors(res: Response<Body>) -> Response<Body> {
    let status = res.status();
    if !(status.is_client_error() || status.is_server_error())
        || res.headers().contains_key(header::CONTENT_TYPE)
    {
        return res;
    }

    let message = match status {
        StatusCode::METHOD_NOT_ALLOWED => "Method not allowed",
        StatusCode::REQUEST_TIMEOUT => "Request timed out",
        other => other.canonical_reason().unwrap_or("Request failed"),
    };
    if status == StatusCode::REQUEST_TIMEOUT {
        warn!("request timed out");
    }

    let (mut parts, _) = res.into_parts();
    let envelope = Json(ApiResponse::failure(message, None)).into_response();
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    Response::from_parts(parts, envelope.into_body())
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    // An empty allow-list means any origin; credentials rule out the literal `*`.
    let allow_origin = if origins.is_empty() {
        AllowOrigin::mirror_request()
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::mirror_request())
}

fn with_security_headers(router: Router, config: &AppConfig) -> Router {
    let hsts = config
        .environment
        .is_production()
        .then(|| HeaderValue::from_static("max-age=15552000; includeSubDomains"));

    router
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("cross-origin-resource-policy"),
            HeaderValue::from_static("cross-origin"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_DNS_PREFETCH_CONTROL,
            HeaderValue::from_static("off"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::STRICT_TRANSPORT_SECURITY,
            move |_: &Response<Body>| hsts.clone(),
        ))
}

pub async fn serve(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!("listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down gracefully"),
        _ = terminate => info!("received SIGTERM, shutting down gracefully"),
    }
}
