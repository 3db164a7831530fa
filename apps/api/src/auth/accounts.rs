//! Account creation and credential checks, separated from the HTTP handlers
//! so they can be exercised directly against a pool in tests.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::auth::password::{hash_password, verify_password};
use crate::errors::AppError;
use crate::models::user::{Role, User};
use crate::tiers::Tier;

/// Creates a user and its paired subscription row in one transaction.
/// New accounts always start on the free tier with zero usage.
pub async fn create_account(db: &SqlitePool, username: &str, password: &str) -> Result<User, AppError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AppError::Validation("Username must not be empty".to_string()));
    }
    if password.is_empty() {
        return Err(AppError::Validation("Password must not be empty".to_string()));
    }

    let existing: Option<(String,)> = sqlx::query_as("SELECT username FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(db)
        .await?;
    if existing.is_some() {
        return Err(AppError::UsernameTaken);
    }

    let user = User {
        username: username.to_string(),
        password_hash: hash_password(password)?,
        role: Role::User,
        tier: Tier::Free,
        created_at: Utc::now(),
    };

    let mut tx = db.begin().await?;
    sqlx::query(
        "INSERT INTO users (username, password_hash, role, tier, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&user.username)
    .bind(&user.password_hash)
    .bind(user.role)
    .bind(user.tier)
    .bind(user.created_at)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO subscriptions (username, api_calls_used, last_reset_date) VALUES (?, 0, ?)",
    )
    .bind(&user.username)
    .bind(user.created_at)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!("Registered new user '{}' on the free tier", user.username);
    Ok(user)
}

/// Checks credentials. Unknown usernames and bad passwords are
/// indistinguishable to the caller.
pub async fn authenticate(db: &SqlitePool, username: &str, password: &str) -> Result<User, AppError> {
    let user = match load_user(db, username).await {
        Ok(user) => user,
        Err(AppError::NotFound(_)) => return Err(AppError::InvalidCredentials),
        Err(e) => return Err(e),
    };
    if !verify_password(password, &user.password_hash) {
        return Err(AppError::InvalidCredentials);
    }
    Ok(user)
}

pub async fn load_user(db: &SqlitePool, username: &str) -> Result<User, AppError> {
    let user: Option<User> = sqlx::query_as(
        "SELECT username, password_hash, role, tier, created_at FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(db)
    .await?;
    user.ok_or_else(|| AppError::NotFound(format!("User '{username}' not found")))
}
