//! Metered prediction endpoints. Order matters: feature gate, then quota
//! gate, then the upstream call, and only a successful call increments the
//! usage counter.

use std::future::Future;

use axum::extract::{Multipart, State};
use axum::Json;
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::auth::accounts::load_user;
use crate::auth::extractor::CurrentUser;
use crate::errors::AppError;
use crate::models::user::{Role, User};
use crate::predict::client::{ImageAnalysis, MapPrediction, MapPredictionRequest, PredictError};
use crate::state::AppState;
use crate::subscriptions::usage::{can_consume, current_usage, record_usage};

#[derive(Debug, Deserialize)]
pub struct MapRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub date: Option<String>,
}

/// POST /api/v1/predict/map
pub async fn handle_predict_map(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<MapRequest>,
) -> Result<Json<MapPrediction>, AppError> {
    let account = load_user(&state.db, &user.username).await?;
    if !account.tier.config().map_access {
        return Err(AppError::Forbidden);
    }

    let request = MapPredictionRequest {
        latitude: req.latitude,
        longitude: req.longitude,
        date: req.date.as_deref(),
        username: &account.username,
        tier: account.tier,
    };
    let prediction = run_metered(&state.db, &account, || state.predict.predict_map(&request)).await?;
    Ok(Json(prediction))
}

/// POST /api/v1/predict/imageupload
///
/// Multipart body with an `image` part. Image upload is a tier feature; the
/// free tier is refused before the quota gate is even consulted.
pub async fn handle_image_upload(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<ImageAnalysis>, AppError> {
    let account = load_user(&state.db, &user.username).await?;
    if !account.tier.config().image_upload {
        return Err(AppError::Forbidden);
    }

    let mut image: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() == Some("image") {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Failed to read image: {e}")))?;
            image = Some((file_name, bytes.to_vec()));
        }
    }
    let (file_name, bytes) =
        image.ok_or_else(|| AppError::Validation("Missing 'image' part".to_string()))?;
    if bytes.is_empty() {
        return Err(AppError::Validation("Uploaded image is empty".to_string()));
    }

    let analysis = run_metered(&state.db, &account, || {
        state
            .predict
            .analyze_image(&account.username, account.tier, file_name, bytes)
    })
    .await?;
    Ok(Json(analysis))
}

/// Runs one metered action for the account: quota gate first, then the
/// upstream call, then the counter increment — which happens only after the
/// call has succeeded, so a failed prediction never consumes quota. Admins
/// are exempt from metering entirely.
async fn run_metered<T, F, Fut>(db: &SqlitePool, account: &User, call: F) -> Result<T, AppError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, PredictError>>,
{
    if account.role != Role::Admin {
        let usage = current_usage(db, &account.username).await?;
        if !can_consume(usage.api_calls_used, account.tier) {
            return Err(AppError::QuotaExceeded);
        }
    }

    let value = call().await?;

    if account.role != Role::Admin {
        record_usage(db, &account.username).await?;
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::accounts::create_account;
    use crate::db::{seed_if_empty, test_pool};
    use crate::tiers::Tier;
    use std::cell::Cell;

    async fn used(db: &SqlitePool, username: &str) -> i64 {
        current_usage(db, username).await.unwrap().api_calls_used
    }

    #[tokio::test]
    async fn test_success_increments_counter() {
        let db = test_pool().await;
        let account = create_account(&db, "abc", "abc").await.unwrap();

        let value = run_metered(&db, &account, || async { Ok::<_, PredictError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(used(&db, "abc").await, 1);
    }

    #[tokio::test]
    async fn test_upstream_failure_consumes_no_quota() {
        let db = test_pool().await;
        let account = create_account(&db, "abc", "abc").await.unwrap();

        let result = run_metered(&db, &account, || async {
            Err::<(), _>(PredictError::Api {
                status: 500,
                message: "model offline".to_string(),
            })
        })
        .await;
        assert!(matches!(result, Err(AppError::Upstream(_))));
        assert_eq!(used(&db, "abc").await, 0);

        // The failed call did not eat into the allowance.
        run_metered(&db, &account, || async { Ok::<_, PredictError>(()) })
            .await
            .unwrap();
        assert_eq!(used(&db, "abc").await, 1);
    }

    #[tokio::test]
    async fn test_exhausted_quota_skips_upstream_call() {
        let db = test_pool().await;
        let account = create_account(&db, "abc", "abc").await.unwrap();
        // Free tier allows 3 calls.
        for _ in 0..3 {
            run_metered(&db, &account, || async { Ok::<_, PredictError>(()) })
                .await
                .unwrap();
        }

        let called = Cell::new(false);
        let result = run_metered(&db, &account, || {
            called.set(true);
            async { Ok::<_, PredictError>(()) }
        })
        .await;
        assert!(matches!(result, Err(AppError::QuotaExceeded)));
        assert!(!called.get());
        assert_eq!(used(&db, "abc").await, 3);
    }

    #[tokio::test]
    async fn test_admin_is_exempt_from_metering() {
        let db = test_pool().await;
        seed_if_empty(&db).await.unwrap();
        let admin = crate::auth::accounts::load_user(&db, "admin").await.unwrap();

        // Even with the counter past the tier2 allowance, the call goes
        // through and the counter stays put.
        let limit = i64::from(Tier::Tier2.config().api_calls_per_month);
        sqlx::query("UPDATE subscriptions SET api_calls_used = ? WHERE username = 'admin'")
            .bind(limit)
            .execute(&db)
            .await
            .unwrap();

        run_metered(&db, &admin, || async { Ok::<_, PredictError>(()) })
            .await
            .unwrap();
        assert_eq!(used(&db, "admin").await, limit);
    }
}
