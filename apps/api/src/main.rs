mod admin;
mod auth;
mod config;
mod db;
mod errors;
mod models;
mod predict;
mod routes;
mod state;
mod subscriptions;
mod tiers;
mod upgrades;

use std::net::SocketAddr;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::jwt::JwtKeys;
use crate::config::Config;
use crate::db::{create_pool, init_schema, seed_if_empty};
use crate::predict::client::PredictionClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_log_directive(&config.rust_log))),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting HABWatch API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize SQLite and materialize the seed accounts on first run
    let db = create_pool(&config.database_url).await?;
    init_schema(&db).await?;
    seed_if_empty(&db).await?;

    let jwt = JwtKeys::new(&config.jwt_secret);

    let predict = PredictionClient::new(
        reqwest::Client::new(),
        config.prediction_api_url.clone(),
        config.image_analysis_api_url.clone(),
    );
    info!("Prediction client initialized ({})", config.prediction_api_url);

    let state = AppState {
        db,
        jwt,
        predict,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Default `RUST_LOG` directive scoped to this crate. The package name uses
/// hyphens but tracing targets use the crate name with underscores, so the
/// name must be converted or the directive matches nothing.
fn default_log_directive(level: &str) -> String {
    format!("{}={}", env!("CARGO_PKG_NAME").replace('-', "_"), level)
}
