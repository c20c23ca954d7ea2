mod app;
mod auth;
mod config;
mod error;
mod response;
mod state;
mod user;


use anyhow::Context;
use tracing_subscriber::EnvFilter;

use crate::{config::AppConfig, state::AppState};

fn init_tracing(config: &AppConfig) {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        format!(
            "auth_api={level},tower_http={level},axum=info",
            level = config.log_level
        )
    });

    if config.environment.is_production() {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(env_filter))
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(env_filter))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("load configuration")?;
    init_tracing(&config);

    let addr = config.socket_addr()?;
    tracing::info!(
        environment = config.environment.as_str(),
        cors = ?config.cors_origins,
        "starting server"
    );

    let state = AppState::init(config).await.map_err(|e| {
        tracing::error!(error = ?e, "failed to start server");
        e
    })?;

    let served = app::serve(app::build_app(state.clone()), addr).await;
    state.close().await;
    served
}
