//! Review types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use digital_distributor_core::{AppId, EmployeeId, ReviewId, ReviewStatus, UserId};

/// A review as shown on an app page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: ReviewId,
    pub app_id: AppId,
    pub user_id: UserId,
    pub user_username: Option<String>,
    pub evaluation: i16,
    pub comment: String,
    pub status: ReviewStatus,
    pub review_date: NaiveDate,
}

/// A review in the moderation queue.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationReview {
    pub id: ReviewId,
    pub app_id: AppId,
    pub app_title: String,
    pub user_id: UserId,
    pub user_username: String,
    pub evaluation: i16,
    pub comment: String,
    pub status: ReviewStatus,
    pub review_date: NaiveDate,
    pub moderated_at: Option<DateTime<Utc>>,
    pub moderator_id: Option<EmployeeId>,
}

/// The caller's existing review of an app, if any.
#[derive(Debug, Clone, Copy)]
pub struct ExistingReview {
    pub id: ReviewId,
    pub status: ReviewStatus,
}
