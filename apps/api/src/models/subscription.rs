use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::tiers::{Tier, TierConfig};

/// Usage row as stored. Tier is not duplicated here; `users.tier` is the
/// single authoritative tier field and subscription views join it.
#[derive(Debug, Clone, FromRow)]
pub struct SubscriptionRow {
    pub username: String,
    pub api_calls_used: i64,
    pub last_reset_date: DateTime<Utc>,
}

/// Wire view of a user's subscription: current tier, usage for the monthly
/// window, and the tier's static configuration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionView {
    pub username: String,
    pub tier: Tier,
    pub api_calls_used: i64,
    pub api_calls_per_month: u32,
    pub last_reset_date: DateTime<Utc>,
    pub tier_config: &'static TierConfig,
}

impl SubscriptionView {
    pub fn new(row: SubscriptionRow, tier: Tier) -> Self {
        let config = tier.config();
        SubscriptionView {
            username: row.username,
            tier,
            api_calls_used: row.api_calls_used,
            api_calls_per_month: config.api_calls_per_month,
            last_reset_date: row.last_reset_date,
            tier_config: config,
        }
    }
}
