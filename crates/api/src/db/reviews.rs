//! Review queries and the submission/moderation workflow.
//!
//! Customer statements run on the `normal_user` pool inside an RLS
//! transaction: the select policy shows approved reviews plus the customer's
//! own, and the delete policy only admits the customer's own rejected review.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgConnection;
use tracing::{info, instrument};

use digital_distributor_core::{
    AppId, EmployeeId, ModerationDecision, ReviewId, ReviewStatus, UserId,
};

use super::{RepositoryError, conflict_on_unique};
use crate::models::review::{ExistingReview, ModerationReview, Review};

#[derive(sqlx::FromRow)]
struct ReviewRow {
    review_id: ReviewId,
    app_id: AppId,
    user_id: UserId,
    user_username: Option<String>,
    evaluation: i16,
    comment: String,
    status: ReviewStatus,
    review_date: NaiveDate,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: row.review_id,
            app_id: row.app_id,
            user_id: row.user_id,
            user_username: row.user_username,
            evaluation: row.evaluation,
            comment: row.comment,
            status: row.status,
            review_date: row.review_date,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ModerationRow {
    review_id: ReviewId,
    app_id: AppId,
    app_title: String,
    user_id: UserId,
    user_username: String,
    evaluation: i16,
    comment: String,
    status: ReviewStatus,
    review_date: NaiveDate,
    moderated_at: Option<DateTime<Utc>>,
    moderator_id: Option<EmployeeId>,
}

impl From<ModerationRow> for ModerationReview {
    fn from(row: ModerationRow) -> Self {
        Self {
            id: row.review_id,
            app_id: row.app_id,
            app_title: row.app_title,
            user_id: row.user_id,
            user_username: row.user_username,
            evaluation: row.evaluation,
            comment: row.comment,
            status: row.status,
            review_date: row.review_date,
            moderated_at: row.moderated_at,
            moderator_id: row.moderator_id,
        }
    }
}

const MODERATION_SELECT: &str = r"
    SELECT r.review_id, r.app_id, a.title AS app_title, r.user_id,
           u.username AS user_username, r.evaluation, r.comment, r.status,
           r.review_date, r.moderated_at, r.moderator_id
    FROM reviews r
    INNER JOIN apps a ON a.app_id = r.app_id
    INNER JOIN users u ON u.user_id = r.user_id
";

/// Published reviews of an app, newest first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_approved(
    conn: &mut PgConnection,
    app_id: AppId,
) -> Result<Vec<Review>, RepositoryError> {
    let rows = sqlx::query_as::<_, ReviewRow>(
        r"
        SELECT r.review_id, r.app_id, r.user_id, u.username AS user_username,
               r.evaluation, r.comment, r.status, r.review_date
        FROM reviews r
        INNER JOIN users u ON u.user_id = r.user_id
        WHERE r.app_id = $1 AND r.status = 'approved'
        ORDER BY r.review_date DESC, r.review_id DESC
        ",
    )
    .bind(app_id)
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(Review::from).collect())
}

/// A customer's own review of an app, in any status.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn own_review(
    conn: &mut PgConnection,
    app_id: AppId,
    user_id: UserId,
) -> Result<Option<Review>, RepositoryError> {
    let row = sqlx::query_as::<_, ReviewRow>(
        r"
        SELECT r.review_id, r.app_id, r.user_id, u.username AS user_username,
               r.evaluation, r.comment, r.status, r.review_date
        FROM reviews r
        INNER JOIN users u ON u.user_id = r.user_id
        WHERE r.app_id = $1 AND r.user_id = $2
        ORDER BY r.review_date DESC
        LIMIT 1
        ",
    )
    .bind(app_id)
    .bind(user_id)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(Review::from))
}

async fn existing(
    conn: &mut PgConnection,
    app_id: AppId,
    user_id: UserId,
) -> Result<Option<ExistingReview>, RepositoryError> {
    let row = sqlx::query_as::<_, (ReviewId, ReviewStatus)>(
        "SELECT review_id, status FROM reviews WHERE app_id = $1 AND user_id = $2",
    )
    .bind(app_id)
    .bind(user_id)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(|(id, status)| ExistingReview { id, status }))
}

/// Submit a review for moderation.
///
/// A previous rejected review is deleted and replaced. Run inside a single
/// transaction so the delete and insert land together.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the customer already has a pending
/// or published review of the app.
/// Returns `RepositoryError::Database` for other database errors.
#[instrument(skip(conn, comment))]
pub async fn submit(
    conn: &mut PgConnection,
    app_id: AppId,
    user_id: UserId,
    evaluation: i16,
    comment: &str,
) -> Result<Review, RepositoryError> {
    if let Some(previous) = existing(&mut *conn, app_id, user_id).await? {
        match previous.status {
            ReviewStatus::Pending => {
                return Err(RepositoryError::Conflict(
                    "your review is already under moderation".to_owned(),
                ));
            }
            ReviewStatus::Approved => {
                return Err(RepositoryError::Conflict(
                    "your review is already published".to_owned(),
                ));
            }
            ReviewStatus::Rejected => {
                sqlx::query("DELETE FROM reviews WHERE review_id = $1")
                    .bind(previous.id)
                    .execute(&mut *conn)
                    .await?;
                info!(review_id = %previous.id, "Replacing rejected review");
            }
        }
    }

    let row = sqlx::query_as::<_, ReviewRow>(
        r"
        INSERT INTO reviews (app_id, user_id, evaluation, comment, status, review_date)
        VALUES ($1, $2, $3, $4, 'pending', CURRENT_DATE)
        RETURNING review_id, app_id, user_id, NULL::TEXT AS user_username,
                  evaluation, comment, status, review_date
        ",
    )
    .bind(app_id)
    .bind(user_id)
    .bind(evaluation)
    .bind(comment)
    .fetch_one(conn)
    .await
    .map_err(|e| conflict_on_unique(e, "your review is already under moderation"))?;

    Ok(row.into())
}

/// The moderation queue, optionally filtered by status.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_for_moderation(
    conn: &mut PgConnection,
    status: Option<ReviewStatus>,
) -> Result<Vec<ModerationReview>, RepositoryError> {
    let sql = format!(
        "{MODERATION_SELECT} WHERE ($1::review_status IS NULL OR r.status = $1) \
         ORDER BY r.review_date DESC, r.review_id DESC"
    );

    let rows = sqlx::query_as::<_, ModerationRow>(&sql)
        .bind(status)
        .fetch_all(conn)
        .await?;

    Ok(rows.into_iter().map(ModerationReview::from).collect())
}

/// Approve or reject a pending review.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the review doesn't exist.
/// Returns `RepositoryError::Conflict` if it is no longer pending.
#[instrument(skip(conn))]
pub async fn moderate(
    conn: &mut PgConnection,
    id: ReviewId,
    decision: ModerationDecision,
    moderator: EmployeeId,
) -> Result<ModerationReview, RepositoryError> {
    let current = sqlx::query_scalar::<_, ReviewStatus>(
        "SELECT status FROM reviews WHERE review_id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    if !current.can_moderate() {
        return Err(RepositoryError::Conflict(format!(
            "review is already {current}"
        )));
    }

    sqlx::query(
        r"
        UPDATE reviews
        SET status = $1, moderated_at = NOW(), moderator_id = $2
        WHERE review_id = $3
        ",
    )
    .bind(decision.resulting_status())
    .bind(moderator)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    let sql = format!("{MODERATION_SELECT} WHERE r.review_id = $1");
    let row = sqlx::query_as::<_, ModerationRow>(&sql)
        .bind(id)
        .fetch_one(conn)
        .await?;

    info!(review_id = %id, status = %row.status, "Review moderated");
    Ok(row.into())
}
