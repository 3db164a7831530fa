//! Usage metering: the quota gate, the monthly reset window, and the
//! counter updates around metered actions.
//!
//! Policy: the gate is checked immediately before a metered action, and the
//! counter is incremented only after the downstream call has succeeded. A
//! failed prediction never consumes quota.

use chrono::{DateTime, Datelike, Utc};
use sqlx::SqlitePool;

use crate::errors::AppError;
use crate::models::subscription::SubscriptionRow;
use crate::tiers::Tier;

/// True iff the subscription may perform one more metered action this month.
pub fn can_consume(api_calls_used: i64, tier: Tier) -> bool {
    api_calls_used < i64::from(tier.config().api_calls_per_month)
}

/// True when `now` falls in a later calendar month than the last reset.
pub fn window_rolled_over(last_reset: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    (last_reset.year(), last_reset.month()) != (now.year(), now.month())
}

/// Loads the usage row, applying the monthly rollover first if the calendar
/// month has changed since the last reset.
pub async fn current_usage(db: &SqlitePool, username: &str) -> Result<SubscriptionRow, AppError> {
    let row: Option<SubscriptionRow> = sqlx::query_as(
        "SELECT username, api_calls_used, last_reset_date FROM subscriptions WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(db)
    .await?;
    let mut row =
        row.ok_or_else(|| AppError::NotFound(format!("No subscription for '{username}'")))?;

    let now = Utc::now();
    if window_rolled_over(row.last_reset_date, now) {
        sqlx::query("UPDATE subscriptions SET api_calls_used = 0, last_reset_date = ? WHERE username = ?")
            .bind(now)
            .bind(username)
            .execute(db)
            .await?;
        row.api_calls_used = 0;
        row.last_reset_date = now;
    }

    Ok(row)
}

/// Records one successful metered action.
pub async fn record_usage(db: &SqlitePool, username: &str) -> Result<(), AppError> {
    let result =
        sqlx::query("UPDATE subscriptions SET api_calls_used = api_calls_used + 1 WHERE username = ?")
            .bind(username)
            .execute(db)
            .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("No subscription for '{username}'")));
    }
    Ok(())
}

/// Admin reset: counter to zero, window restarted at now.
pub async fn reset_usage(db: &SqlitePool, username: &str) -> Result<(), AppError> {
    let result =
        sqlx::query("UPDATE subscriptions SET api_calls_used = 0, last_reset_date = ? WHERE username = ?")
            .bind(Utc::now())
            .bind(username)
            .execute(db)
            .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("No subscription for '{username}'")));
    }
    Ok(())
}
