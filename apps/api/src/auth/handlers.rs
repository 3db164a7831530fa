use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::auth::accounts::{authenticate, create_account};
use crate::errors::AppError;
use crate::models::user::UserView;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub user: UserView,
}

/// POST /api/v1/auth/register
pub async fn handle_register(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = create_account(&state.db, &req.username, &req.password).await?;
    let token = state.jwt.issue(&user, state.config.token_ttl_hours)?;
    Ok(Json(AuthResponse {
        token,
        user: UserView::from(&user),
    }))
}

/// POST /api/v1/auth/login
pub async fn handle_login(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = authenticate(&state.db, &req.username, &req.password).await?;
    let token = state.jwt.issue(&user, state.config.token_ttl_hours)?;
    Ok(Json(AuthResponse {
        token,
        user: UserView::from(&user),
    }))
}
