//! Customer side of the support desk.

use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use tracing::instrument;

use digital_distributor_core::{
    DbRole, OrderId, SenderType, SupportPriority, SupportRequestId, SupportStatus,
};

use crate::db::orders;
use crate::db::support::{self, Audience, NewSupportRequest};
use crate::error::{AppError, AppJson, AppPath, Result};
use crate::middleware::{Customer, RequireCustomer};
use crate::models::support::{RequestAccess, SupportMessage, SupportRequest};
use crate::state::AppState;
use crate::validation::{Issues, Validate};

/// Bounds for a chat message, shared with the staff side.
pub(crate) const MAX_MESSAGE_LENGTH: usize = 2000;

// =============================================================================
// Request / Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenRequest {
    pub subject: String,
    pub message: String,
    #[serde(default)]
    pub priority: SupportPriority,
    pub order_id: OrderId,
}

impl Validate for OpenRequest {
    fn validate(&self) -> std::result::Result<(), Issues> {
        let mut issues = Issues::new();
        issues.length("subject", self.subject.trim(), 5, Some(120));
        issues.length("message", self.message.trim(), 10, Some(1000));
        if self.order_id.as_i32() <= 0 {
            issues.field("orderId", "must be positive");
        }
        issues.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    pub message: String,
}

impl Validate for ChatMessage {
    fn validate(&self) -> std::result::Result<(), Issues> {
        let mut issues = Issues::new();
        issues.length("message", self.message.trim(), 1, Some(MAX_MESSAGE_LENGTH));
        issues.finish()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenedRequest {
    pub id: SupportRequestId,
    pub status: SupportStatus,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Handlers
// =============================================================================

/// `POST /api/support`
#[instrument(skip(state, customer, body), fields(user_id = %customer.id))]
pub async fn open(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    AppJson(body): AppJson<OpenRequest>,
) -> Result<(StatusCode, Json<OpenedRequest>)> {
    body.validate()?;

    let mut tx = state
        .pools()
        .begin_as(DbRole::User, Some(customer.id.as_i32()))
        .await?;

    if !orders::belongs_to(&mut tx, body.order_id, customer.id).await? {
        return Err(AppError::Forbidden(
            "Order not found or does not belong to you".to_owned(),
        ));
    }

    let request = support::create(
        &mut tx,
        customer.id,
        &NewSupportRequest {
            order_id: body.order_id,
            subject: body.subject.trim().to_owned(),
            message: body.message.trim().to_owned(),
            priority: body.priority,
        },
    )
    .await?;
    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(OpenedRequest {
            id: request.id,
            status: request.status,
            created_at: request.created_at,
        }),
    ))
}

/// `GET /api/support`
pub async fn list(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
) -> Result<Json<Vec<SupportRequest>>> {
    let mut tx = state
        .pools()
        .begin_as(DbRole::User, Some(customer.id.as_i32()))
        .await?;
    let requests = support::list_for_user(&mut tx, customer.id).await?;
    tx.commit().await?;

    Ok(Json(requests))
}

/// `GET /api/support/{id}/messages`
pub async fn messages(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    AppPath(id): AppPath<SupportRequestId>,
) -> Result<Json<Vec<SupportMessage>>> {
    let mut tx = state
        .pools()
        .begin_as(DbRole::User, Some(customer.id.as_i32()))
        .await?;

    own_request(&mut tx, &customer, id).await?;
    let messages = support::list_messages(&mut tx, id, Audience::Customer).await?;
    tx.commit().await?;

    Ok(Json(
        messages
            .into_iter()
            .map(SupportMessage::for_customer)
            .collect(),
    ))
}

/// `POST /api/support/{id}/messages`
#[instrument(skip(state, customer, body), fields(user_id = %customer.id))]
pub async fn post_message(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    AppPath(id): AppPath<SupportRequestId>,
    AppJson(body): AppJson<ChatMessage>,
) -> Result<(StatusCode, Json<SupportMessage>)> {
    body.validate()?;

    let mut tx = state
        .pools()
        .begin_as(DbRole::User, Some(customer.id.as_i32()))
        .await?;

    let access = own_request(&mut tx, &customer, id).await?;
    if !access.status.accepts_messages() {
        return Err(AppError::BadRequest(
            "Cannot post to a completed request".to_owned(),
        ));
    }

    let message = support::add_message(
        &mut tx,
        id,
        SenderType::User,
        customer.id.as_i32(),
        body.message.trim(),
    )
    .await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// The request, if it exists and belongs to the caller.
async fn own_request(
    conn: &mut PgConnection,
    customer: &Customer,
    id: SupportRequestId,
) -> Result<RequestAccess> {
    support::access(conn, id)
        .await?
        .filter(|access| access.user_id == customer.id)
        .ok_or_else(|| AppError::Forbidden("Support request not found".to_owned()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_defaults_to_normal() {
        let body: OpenRequest = serde_json::from_str(
            r#"{"subject":"Refund","message":"The download link is broken","orderId":12}"#,
        )
        .unwrap();
        assert_eq!(body.priority, SupportPriority::Normal);
        assert!(body.validate().is_ok());
    }

    #[test]
    fn test_open_request_bounds() {
        let body = OpenRequest {
            subject: "Hi".to_owned(),
            message: "too short".to_owned(),
            priority: SupportPriority::High,
            order_id: OrderId::new(0),
        };
        let issues = body.validate().unwrap_err();
        assert_eq!(issues.field_errors.len(), 3);
    }

    #[test]
    fn test_blank_chat_message_rejected() {
        let body = ChatMessage {
            message: "   ".to_owned(),
        };
        assert!(body.validate().is_err());

        let body = ChatMessage {
            message: "x".repeat(MAX_MESSAGE_LENGTH + 1),
        };
        assert!(body.validate().is_err());
    }
}
