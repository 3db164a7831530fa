use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::tiers::Tier;

/// Lifecycle of a financial-aid upgrade request. Approved and rejected are
/// terminal; there is no transition back to pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeRequest {
    pub id: Uuid,
    pub username: String,
    pub current_tier: Tier,
    pub requested_tier: Tier,
    pub request_date: DateTime<Utc>,
    pub status: RequestStatus,
    pub financial_aid_reason: String,
    pub current_situation: String,
    pub how_it_helps: String,
    pub additional_info: Option<String>,
    pub admin_notes: Option<String>,
}
