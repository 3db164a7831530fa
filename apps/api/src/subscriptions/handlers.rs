use axum::{extract::State, Json};

use crate::auth::accounts::load_user;
use crate::auth::extractor::CurrentUser;
use crate::errors::AppError;
use crate::models::subscription::SubscriptionView;
use crate::state::AppState;
use crate::subscriptions::usage::current_usage;
use crate::tiers::{Tier, TierConfig};

/// GET /api/v1/subscription
///
/// The caller's subscription with the monthly window already rolled over if
/// needed. Tier comes from the user row, not the token, so an approved
/// upgrade is visible without re-login.
pub async fn handle_get_subscription(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<SubscriptionView>, AppError> {
    let account = load_user(&state.db, &user.username).await?;
    let row = current_usage(&state.db, &user.username).await?;
    Ok(Json(SubscriptionView::new(row, account.tier)))
}

/// GET /api/v1/tiers
/// Public tier catalog.
pub async fn handle_list_tiers() -> Json<Vec<&'static TierConfig>> {
    Json(Tier::ALL.iter().map(|t| t.config()).collect())
}
