//! Support request and chat types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use digital_distributor_core::{
    EmployeeId, OrderId, SenderType, SupportMessageId, SupportPriority, SupportRequestId,
    SupportStatus, UserId,
};

/// Display name for staff in customer-facing chat.
pub const STAFF_DISPLAY_NAME: &str = "Support team";

/// A support request as the customer sees it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportRequest {
    pub id: SupportRequestId,
    pub order_id: Option<OrderId>,
    pub subject: String,
    pub message: String,
    pub priority: SupportPriority,
    pub status: SupportStatus,
    pub created_at: DateTime<Utc>,
    pub taken_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// A support request in the staff queue.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffSupportRequest {
    pub id: SupportRequestId,
    pub user_id: UserId,
    pub user_username: String,
    pub user_email: String,
    pub order_id: Option<OrderId>,
    pub subject: String,
    pub message: String,
    pub priority: SupportPriority,
    pub status: SupportStatus,
    pub created_at: DateTime<Utc>,
    pub employee_id: Option<EmployeeId>,
    pub employee_username: Option<String>,
    pub taken_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Fields needed to authorize a chat message.
#[derive(Debug, Clone, Copy)]
pub struct RequestAccess {
    pub user_id: UserId,
    pub employee_id: Option<EmployeeId>,
    pub status: SupportStatus,
}

/// A chat message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportMessage {
    pub id: SupportMessageId,
    pub request_id: SupportRequestId,
    pub sender_type: SenderType,
    pub sender_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_username: Option<String>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl SupportMessage {
    /// Hide individual employee names from customers.
    #[must_use]
    pub fn for_customer(mut self) -> Self {
        if self.sender_type == SenderType::Employee {
            self.sender_username = Some(STAFF_DISPLAY_NAME.to_string());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(sender_type: SenderType, name: &str) -> SupportMessage {
        SupportMessage {
            id: SupportMessageId::new(1),
            request_id: SupportRequestId::new(1),
            sender_type,
            sender_id: 9,
            sender_username: Some(name.to_string()),
            message: "hello".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_customer_view_hides_employee_names() {
        let msg = message(SenderType::Employee, "kate_support").for_customer();
        assert_eq!(msg.sender_username.as_deref(), Some(STAFF_DISPLAY_NAME));

        let msg = message(SenderType::User, "buyer").for_customer();
        assert_eq!(msg.sender_username.as_deref(), Some("buyer"));
    }
}
