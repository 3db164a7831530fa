//! Admin dashboard operations: account listing, manual tier changes, usage
//! resets, and account deletion. All routes here sit behind the `AdminUser`
//! extractor.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use crate::auth::extractor::AdminUser;
use crate::errors::AppError;
use crate::models::user::Role;
use crate::state::AppState;
use crate::subscriptions::usage::reset_usage;
use crate::tiers::Tier;

/// The seed admin account is protected from deletion.
const PROTECTED_USERNAME: &str = "admin";

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserRow {
    pub username: String,
    pub role: Role,
    pub tier: Tier,
    pub api_calls_used: i64,
    pub last_reset_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetTierRequest {
    pub tier: String,
}

/// GET /api/v1/admin/users
pub async fn handle_list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<AdminUserRow>>, AppError> {
    let users = list_users(&state.db).await?;
    Ok(Json(users))
}

/// PUT /api/v1/admin/users/:username/tier
pub async fn handle_set_tier(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(username): Path<String>,
    Json(req): Json<SetTierRequest>,
) -> Result<StatusCode, AppError> {
    let tier: Tier = req.tier.parse()?;
    set_tier(&state.db, &username, tier).await?;
    tracing::info!("Admin '{}' set '{username}' to {tier}", admin.username);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/admin/users/:username/reset-usage
pub async fn handle_reset_usage(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(username): Path<String>,
) -> Result<StatusCode, AppError> {
    reset_usage(&state.db, &username).await?;
    tracing::info!("Admin '{}' reset usage for '{username}'", admin.username);
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/admin/users/:username
pub async fn handle_delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(username): Path<String>,
) -> Result<StatusCode, AppError> {
    delete_user(&state.db, &username).await?;
    tracing::info!("Admin '{}' deleted user '{username}'", admin.username);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_users(db: &SqlitePool) -> Result<Vec<AdminUserRow>, AppError> {
    let users = sqlx::query_as(
        r#"
        SELECT u.username, u.role, u.tier, s.api_calls_used, s.last_reset_date, u.created_at
        FROM users u
        JOIN subscriptions s ON s.username = u.username
        ORDER BY u.username
        "#,
    )
    .fetch_all(db)
    .await?;
    Ok(users)
}

pub async fn set_tier(db: &SqlitePool, username: &str, tier: Tier) -> Result<(), AppError> {
    let result = sqlx::query("UPDATE users SET tier = ? WHERE username = ?")
        .bind(tier)
        .bind(username)
        .execute(db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("User '{username}' not found")));
    }
    Ok(())
}

/// Removes the account and its subscription together. Upgrade-request history
/// is kept for audit. The seed admin account cannot be deleted.
pub async fn delete_user(db: &SqlitePool, username: &str) -> Result<(), AppError> {
    if username == PROTECTED_USERNAME {
        return Err(AppError::Forbidden);
    }

    let mut tx = db.begin().await?;
    let result = sqlx::query("DELETE FROM users WHERE username = ?")
        .bind(username)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("User '{username}' not found")));
    }
    sqlx::query("DELETE FROM subscriptions WHERE username = ?")
        .bind(username)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}
