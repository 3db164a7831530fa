pub mod health;

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::state::AppState;
use crate::{admin, auth, predict, subscriptions, upgrades};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Auth
        .route("/api/v1/auth/register", post(auth::handlers::handle_register))
        .route("/api/v1/auth/login", post(auth::handlers::handle_login))
        // Subscription + tier catalog
        .route("/api/v1/tiers", get(subscriptions::handlers::handle_list_tiers))
        .route(
            "/api/v1/subscription",
            get(subscriptions::handlers::handle_get_subscription),
        )
        // Upgrade requests
        .route(
            "/api/v1/upgrade-requests",
            get(upgrades::handlers::handle_list).post(upgrades::handlers::handle_submit),
        )
        .route(
            "/api/v1/upgrade-requests/:id/approve",
            post(upgrades::handlers::handle_approve),
        )
        .route(
            "/api/v1/upgrade-requests/:id/reject",
            post(upgrades::handlers::handle_reject),
        )
        // Admin dashboard
        .route("/api/v1/admin/users", get(admin::handlers::handle_list_users))
        .route(
            "/api/v1/admin/users/:username/tier",
            put(admin::handlers::handle_set_tier),
        )
        .route(
            "/api/v1/admin/users/:username/reset-usage",
            post(admin::handlers::handle_reset_usage),
        )
        .route(
            "/api/v1/admin/users/:username",
            delete(admin::handlers::handle_delete_user),
        )
        // Metered prediction proxies
        .route("/api/v1/predict/map", post(predict::handlers::handle_predict_map))
        .route(
            "/api/v1/predict/imageupload",
            post(predict::handlers::handle_image_upload),
        )
        .with_state(state)
}
