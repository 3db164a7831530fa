use sqlx::SqlitePool;

use crate::auth::jwt::JwtKeys;
use crate::config::Config;
use crate::predict::client::PredictionClient;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub jwt: JwtKeys,
    pub predict: PredictionClient,
    pub config: Config,
}
