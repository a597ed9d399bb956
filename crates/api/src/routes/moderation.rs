//! Review moderation queue.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use digital_distributor_core::{ModerationDecision, ReviewId, ReviewStatus};

use crate::db::{RepositoryError, reviews};
use crate::error::{AppError, AppPath, AppQuery, Result};
use crate::middleware::{Moderation, RequireStaff, StaffMember};
use crate::models::review::ModerationReview;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ModerationQuery {
    pub status: Option<ReviewStatus>,
}

#[derive(Debug, Serialize)]
pub struct ModerationResult {
    pub message: &'static str,
    pub review: ModerationReview,
}

/// `GET /api/moderation/reviews?status=`
pub async fn list(
    State(state): State<AppState>,
    RequireStaff(staff, _): RequireStaff<Moderation>,
    AppQuery(query): AppQuery<ModerationQuery>,
) -> Result<Json<Vec<ModerationReview>>> {
    let mut conn = state.pools().pool(staff.role.db_role()).acquire().await?;
    let reviews = reviews::list_for_moderation(&mut conn, query.status).await?;
    Ok(Json(reviews))
}

/// `PATCH /api/moderation/reviews/{id}/approve`
pub async fn approve(
    State(state): State<AppState>,
    RequireStaff(staff, _): RequireStaff<Moderation>,
    AppPath(id): AppPath<ReviewId>,
) -> Result<Json<ModerationResult>> {
    let review = decide(&state, &staff, id, ModerationDecision::Approve).await?;
    Ok(Json(ModerationResult {
        message: "Review approved",
        review,
    }))
}

/// `PATCH /api/moderation/reviews/{id}/reject`
pub async fn reject(
    State(state): State<AppState>,
    RequireStaff(staff, _): RequireStaff<Moderation>,
    AppPath(id): AppPath<ReviewId>,
) -> Result<Json<ModerationResult>> {
    let review = decide(&state, &staff, id, ModerationDecision::Reject).await?;
    Ok(Json(ModerationResult {
        message: "Review rejected",
        review,
    }))
}

#[instrument(skip(state, staff), fields(employee_id = %staff.id))]
async fn decide(
    state: &AppState,
    staff: &StaffMember,
    id: ReviewId,
    decision: ModerationDecision,
) -> Result<ModerationReview> {
    let mut tx = state.pools().begin_as(staff.role.db_role(), None).await?;

    let review = reviews::moderate(&mut tx, id, decision, staff.id)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AppError::NotFound("Review not found".to_owned()),
            other => other.into(),
        })?;
    tx.commit().await?;

    Ok(review)
}
