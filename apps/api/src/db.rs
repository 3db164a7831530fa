use anyhow::Result;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::info;

use crate::auth::password::hash_password;
use crate::models::user::Role;
use crate::tiers::Tier;

/// Creates the SQLite connection pool. The `mode=rwc` query flag creates the
/// database file on first run.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    info!("Opening SQLite database...");

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    info!("SQLite connection pool established");
    Ok(pool)
}

/// Creates all tables. Idempotent; safe to run on every startup.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            username TEXT PRIMARY KEY,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL,
            tier TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS subscriptions (
            username TEXT PRIMARY KEY,
            api_calls_used INTEGER NOT NULL DEFAULT 0,
            last_reset_date TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS upgrade_requests (
            id BLOB PRIMARY KEY,
            username TEXT NOT NULL,
            current_tier TEXT NOT NULL,
            requested_tier TEXT NOT NULL,
            request_date TEXT NOT NULL,
            status TEXT NOT NULL,
            financial_aid_reason TEXT NOT NULL,
            current_situation TEXT NOT NULL,
            how_it_helps TEXT NOT NULL,
            additional_info TEXT,
            admin_notes TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_upgrade_requests_username_status
         ON upgrade_requests (username, status)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Materializes the fixed seed accounts on first run only. An empty users
/// table means "never initialized"; a populated one is left untouched, so
/// seeding never masks a real store state.
pub async fn seed_if_empty(pool: &SqlitePool) -> Result<()> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    if count > 0 {
        return Ok(());
    }

    let seeds: [(&str, &str, Role, Tier); 3] = [
        ("admin", "admin", Role::Admin, Tier::Tier2),
        ("abc", "abc", Role::User, Tier::Free),
        ("test", "test", Role::User, Tier::Tier1),
    ];

    let now = Utc::now();
    let mut tx = pool.begin().await?;
    for (username, password, role, tier) in seeds {
        let hash = hash_password(password)?;
        sqlx::query(
            "INSERT INTO users (username, password_hash, role, tier, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(username)
        .bind(hash)
        .bind(role)
        .bind(tier)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO subscriptions (username, api_calls_used, last_reset_date) VALUES (?, 0, ?)",
        )
        .bind(username)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    info!("Seeded default accounts (admin, abc, test)");
    Ok(())
}

/// In-memory pool with the full schema, for unit tests. A single connection
/// keeps every query on the same in-memory database.
#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    init_schema(&pool).await.expect("schema init");
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_schema_is_idempotent() {
        let pool = test_pool().await;
        init_schema(&pool).await.unwrap();
        init_schema(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_seed_runs_once() {
        let pool = test_pool().await;
        seed_if_empty(&pool).await.unwrap();
        seed_if_empty(&pool).await.unwrap();

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn test_seed_account_tiers_and_roles() {
        let pool = test_pool().await;
        seed_if_empty(&pool).await.unwrap();

        let (tier,): (Tier,) = sqlx::query_as("SELECT tier FROM users WHERE username = 'abc'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(tier, Tier::Free);

        let (role,): (Role,) = sqlx::query_as("SELECT role FROM users WHERE username = 'admin'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(role, Role::Admin);
    }
}
