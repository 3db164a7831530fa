//! Financial-aid upgrade request lifecycle: pending -> approved | rejected.
//!
//! Both decision paths run inside one transaction so the request status and
//! the user's tier can never diverge. A settled request is terminal; decision
//! operations only match pending rows, so a second approve/reject observes
//! `NotFound` and nothing is applied twice.

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::upgrade_request::{RequestStatus, UpgradeRequest};
use crate::tiers::Tier;

const SELECT_COLUMNS: &str = "id, username, current_tier, requested_tier, request_date, status, \
     financial_aid_reason, current_situation, how_it_helps, additional_info, admin_notes";

#[derive(Debug, Clone)]
pub struct AidApplication {
    pub financial_aid_reason: String,
    pub current_situation: String,
    pub how_it_helps: String,
    pub additional_info: Option<String>,
}

impl AidApplication {
    fn validate(&self) -> Result<(), AppError> {
        for (field, value) in [
            ("financialAidReason", &self.financial_aid_reason),
            ("currentSituation", &self.current_situation),
            ("howItHelps", &self.how_it_helps),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::Validation(format!("Field '{field}' must not be empty")));
            }
        }
        Ok(())
    }
}

/// Submits a new upgrade request for the user. At most one pending request
/// may exist per username; the check and the insert share a transaction.
pub async fn submit(
    db: &SqlitePool,
    username: &str,
    current_tier: Tier,
    requested_tier: Tier,
    application: AidApplication,
) -> Result<UpgradeRequest, AppError> {
    application.validate()?;
    if requested_tier == current_tier {
        return Err(AppError::Validation(
            "Requested tier matches your current tier".to_string(),
        ));
    }

    let mut tx = db.begin().await?;
    let pending: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM upgrade_requests WHERE username = ? AND status = ?")
            .bind(username)
            .bind(RequestStatus::Pending)
            .fetch_optional(&mut *tx)
            .await?;
    if pending.is_some() {
        return Err(AppError::DuplicatePendingRequest);
    }

    let request = UpgradeRequest {
        id: Uuid::new_v4(),
        username: username.to_string(),
        current_tier,
        requested_tier,
        request_date: Utc::now(),
        status: RequestStatus::Pending,
        financial_aid_reason: application.financial_aid_reason,
        current_situation: application.current_situation,
        how_it_helps: application.how_it_helps,
        additional_info: application.additional_info,
        admin_notes: None,
    };

    sqlx::query(
        r#"
        INSERT INTO upgrade_requests
            (id, username, current_tier, requested_tier, request_date, status,
             financial_aid_reason, current_situation, how_it_helps, additional_info, admin_notes)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL)
        "#,
    )
    .bind(request.id)
    .bind(&request.username)
    .bind(request.current_tier)
    .bind(request.requested_tier)
    .bind(request.request_date)
    .bind(request.status)
    .bind(&request.financial_aid_reason)
    .bind(&request.current_situation)
    .bind(&request.how_it_helps)
    .bind(&request.additional_info)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!(
        "Upgrade request {} submitted by '{}' ({} -> {})",
        request.id,
        request.username,
        request.current_tier,
        request.requested_tier
    );
    Ok(request)
}

/// Approves a pending request: status -> approved, notes stored, and the
/// user's tier set to the requested tier, all in one transaction.
pub async fn approve(db: &SqlitePool, id: Uuid, admin_notes: &str) -> Result<UpgradeRequest, AppError> {
    let admin_notes = require_notes(admin_notes)?;

    let mut tx = db.begin().await?;
    let request = take_pending(&mut tx, id).await?;

    sqlx::query("UPDATE upgrade_requests SET status = ?, admin_notes = ? WHERE id = ?")
        .bind(RequestStatus::Approved)
        .bind(admin_notes)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE users SET tier = ? WHERE username = ?")
        .bind(request.requested_tier)
        .bind(&request.username)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(
        "Upgrade request {} approved; '{}' is now on {}",
        id,
        request.username,
        request.requested_tier
    );
    Ok(UpgradeRequest {
        status: RequestStatus::Approved,
        admin_notes: Some(admin_notes.to_string()),
        ..request
    })
}

/// Rejects a pending request: status -> rejected, notes stored. No tier change.
pub async fn reject(db: &SqlitePool, id: Uuid, admin_notes: &str) -> Result<UpgradeRequest, AppError> {
    let admin_notes = require_notes(admin_notes)?;

    let mut tx = db.begin().await?;
    let request = take_pending(&mut tx, id).await?;

    sqlx::query("UPDATE upgrade_requests SET status = ?, admin_notes = ? WHERE id = ?")
        .bind(RequestStatus::Rejected)
        .bind(admin_notes)
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!("Upgrade request {} rejected", id);
    Ok(UpgradeRequest {
        status: RequestStatus::Rejected,
        admin_notes: Some(admin_notes.to_string()),
        ..request
    })
}

/// All requests submitted by one user, newest first.
pub async fn list_for_user(db: &SqlitePool, username: &str) -> Result<Vec<UpgradeRequest>, AppError> {
    let requests = sqlx::query_as(&format!(
        "SELECT {SELECT_COLUMNS} FROM upgrade_requests WHERE username = ? ORDER BY request_date DESC",
    ))
    .bind(username)
    .fetch_all(db)
    .await?;
    Ok(requests)
}

/// Every request in the queue, newest first. Admin review view.
pub async fn list_all(db: &SqlitePool) -> Result<Vec<UpgradeRequest>, AppError> {
    let requests = sqlx::query_as(&format!(
        "SELECT {SELECT_COLUMNS} FROM upgrade_requests ORDER BY request_date DESC",
    ))
    .fetch_all(db)
    .await?;
    Ok(requests)
}

fn require_notes(admin_notes: &str) -> Result<&str, AppError> {
    let trimmed = admin_notes.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(
            "Admin notes are required before a decision".to_string(),
        ));
    }
    Ok(trimmed)
}

/// Fetches the request iff it is still pending. Settled requests are not
/// visible here, which is what makes approved/rejected terminal.
async fn take_pending(tx: &mut Transaction<'_, Sqlite>, id: Uuid) -> Result<UpgradeRequest, AppError> {
    let request: Option<UpgradeRequest> = sqlx::query_as(&format!(
        "SELECT {SELECT_COLUMNS} FROM upgrade_requests WHERE id = ? AND status = ?",
    ))
    .bind(id)
    .bind(RequestStatus::Pending)
    .fetch_optional(&mut **tx)
    .await?;
    request.ok_or_else(|| AppError::NotFound(format!("No pending upgrade request with id {id}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::accounts::{create_account, load_user};
    use crate::db::test_pool;

    fn application() -> AidApplication {
        AidApplication {
            financial_aid_reason: "Student researcher without funding".to_string(),
            current_situation: "Monitoring a local lake for blooms".to_string(),
            how_it_helps: "More calls would cover the sampling season".to_string(),
            additional_info: None,
        }
    }

    #[tokio::test]
    async fn test_submit_creates_pending_request() {
        let db = test_pool().await;
        create_account(&db, "abc", "abc").await.unwrap();

        let request = submit(&db, "abc", Tier::Free, Tier::Tier1, application())
            .await
            .unwrap();
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.current_tier, Tier::Free);
        assert_eq!(request.requested_tier, Tier::Tier1);

        let listed = list_for_user(&db, "abc").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, request.id);
    }

    #[tokio::test]
    async fn test_second_pending_submit_is_rejected() {
        let db = test_pool().await;
        create_account(&db, "abc", "abc").await.unwrap();

        submit(&db, "abc", Tier::Free, Tier::Tier1, application())
            .await
            .unwrap();
        let err = submit(&db, "abc", Tier::Free, Tier::Tier2, application())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicatePendingRequest));

        // Exactly one pending request for the username.
        let pending: Vec<UpgradeRequest> = list_for_user(&db, "abc")
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.status == RequestStatus::Pending)
            .collect();
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_pending_requests_are_per_user() {
        let db = test_pool().await;
        create_account(&db, "abc", "abc").await.unwrap();
        create_account(&db, "xyz", "xyz").await.unwrap();

        submit(&db, "abc", Tier::Free, Tier::Tier1, application())
            .await
            .unwrap();
        // A different user's pending request does not block this one.
        submit(&db, "xyz", Tier::Free, Tier::Tier1, application())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_submit_requires_aid_fields() {
        let db = test_pool().await;
        create_account(&db, "abc", "abc").await.unwrap();

        let mut app = application();
        app.current_situation = "   ".to_string();
        let err = submit(&db, "abc", Tier::Free, Tier::Tier1, app).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_submit_rejects_same_tier() {
        let db = test_pool().await;
        create_account(&db, "abc", "abc").await.unwrap();
        let err = submit(&db, "abc", Tier::Free, Tier::Free, application())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_approve_upgrades_tier_and_settles_request() {
        let db = test_pool().await;
        create_account(&db, "abc", "abc").await.unwrap();
        let request = submit(&db, "abc", Tier::Free, Tier::Tier1, application())
            .await
            .unwrap();

        let approved = approve(&db, request.id, "approved").await.unwrap();
        assert_eq!(approved.status, RequestStatus::Approved);
        assert_eq!(approved.admin_notes.as_deref(), Some("approved"));

        let user = load_user(&db, "abc").await.unwrap();
        assert_eq!(user.tier, Tier::Tier1);

        let stored = &list_for_user(&db, "abc").await.unwrap()[0];
        assert_eq!(stored.status, RequestStatus::Approved);
        assert_eq!(stored.admin_notes.as_deref(), Some("approved"));
    }

    #[tokio::test]
    async fn test_approved_request_is_terminal() {
        let db = test_pool().await;
        create_account(&db, "abc", "abc").await.unwrap();
        let request = submit(&db, "abc", Tier::Free, Tier::Tier1, application())
            .await
            .unwrap();
        approve(&db, request.id, "ok").await.unwrap();

        assert!(matches!(
            approve(&db, request.id, "again").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            reject(&db, request.id, "flip").await,
            Err(AppError::NotFound(_))
        ));

        // Tier was applied exactly once and not reverted.
        let user = load_user(&db, "abc").await.unwrap();
        assert_eq!(user.tier, Tier::Tier1);
    }

    #[tokio::test]
    async fn test_reject_keeps_tier() {
        let db = test_pool().await;
        create_account(&db, "abc", "abc").await.unwrap();
        let request = submit(&db, "abc", Tier::Free, Tier::Tier1, application())
            .await
            .unwrap();

        let rejected = reject(&db, request.id, "insufficient detail").await.unwrap();
        assert_eq!(rejected.status, RequestStatus::Rejected);

        let user = load_user(&db, "abc").await.unwrap();
        assert_eq!(user.tier, Tier::Free);
    }

    #[tokio::test]
    async fn test_resubmit_allowed_after_rejection() {
        let db = test_pool().await;
        create_account(&db, "abc", "abc").await.unwrap();
        let request = submit(&db, "abc", Tier::Free, Tier::Tier1, application())
            .await
            .unwrap();
        reject(&db, request.id, "no").await.unwrap();

        submit(&db, "abc", Tier::Free, Tier::Tier1, application())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_decisions_require_notes() {
        let db = test_pool().await;
        create_account(&db, "abc", "abc").await.unwrap();
        let request = submit(&db, "abc", Tier::Free, Tier::Tier1, application())
            .await
            .unwrap();

        assert!(matches!(
            approve(&db, request.id, "  ").await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            reject(&db, request.id, "").await,
            Err(AppError::Validation(_))
        ));

        // Still pending after the failed decisions.
        let stored = &list_for_user(&db, "abc").await.unwrap()[0];
        assert_eq!(stored.status, RequestStatus::Pending);
    }

    #[tokio::test]
    async fn test_decision_on_unknown_id_is_not_found() {
        let db = test_pool().await;
        assert!(matches!(
            approve(&db, Uuid::new_v4(), "notes").await,
            Err(AppError::NotFound(_))
        ));
    }
}
