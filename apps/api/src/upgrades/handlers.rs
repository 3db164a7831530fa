use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::accounts::load_user;
use crate::auth::extractor::{AdminUser, CurrentUser};
use crate::errors::AppError;
use crate::models::upgrade_request::UpgradeRequest;
use crate::models::user::Role;
use crate::state::AppState;
use crate::tiers::Tier;
use crate::upgrades::workflow;
use crate::upgrades::workflow::AidApplication;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    /// Tier name as a string so an unknown value surfaces as `UnknownTier`.
    pub requested_tier: String,
    pub financial_aid_reason: String,
    pub current_situation: String,
    pub how_it_helps: String,
    pub additional_info: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    pub admin_notes: String,
}

/// POST /api/v1/upgrade-requests
pub async fn handle_submit(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<UpgradeRequest>, AppError> {
    let requested_tier: Tier = req.requested_tier.parse()?;
    // Current tier from the store, not the token.
    let account = load_user(&state.db, &user.username).await?;
    let request = workflow::submit(
        &state.db,
        &account.username,
        account.tier,
        requested_tier,
        AidApplication {
            financial_aid_reason: req.financial_aid_reason,
            current_situation: req.current_situation,
            how_it_helps: req.how_it_helps,
            additional_info: req.additional_info,
        },
    )
    .await?;
    Ok(Json(request))
}

/// GET /api/v1/upgrade-requests
/// Users see their own requests; admins see the whole queue.
pub async fn handle_list(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<UpgradeRequest>>, AppError> {
    let requests = if user.role == Role::Admin {
        workflow::list_all(&state.db).await?
    } else {
        workflow::list_for_user(&state.db, &user.username).await?
    };
    Ok(Json(requests))
}

/// POST /api/v1/upgrade-requests/:id/approve
pub async fn handle_approve(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<UpgradeRequest>, AppError> {
    tracing::info!("Admin '{}' approving upgrade request {id}", admin.username);
    let request = workflow::approve(&state.db, id, &req.admin_notes).await?;
    Ok(Json(request))
}

/// POST /api/v1/upgrade-requests/:id/reject
pub async fn handle_reject(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<UpgradeRequest>, AppError> {
    tracing::info!("Admin '{}' rejecting upgrade request {id}", admin.username);
    let request = workflow::reject(&state.db, id, &req.admin_notes).await?;
    Ok(Json(request))
}
