//! Status enums and the transition rules that go with them.
//!
//! Each enum mirrors a Postgres enum type created by the migrations
//! (`order_status`, `review_status`, `support_status`, ...). The `postgres`
//! feature derives `sqlx::Type` so values bind and decode directly.

use serde::{Deserialize, Serialize};

/// Error returned when a string does not name a known status value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value}")]
pub struct StatusParseError {
    kind: &'static str,
    value: String,
}

impl StatusParseError {
    /// The offending input.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Implements `as_str`, `Display` and `FromStr` from one variant/label table.
macro_rules! labeled_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The wire and database label.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = StatusParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok(Self::$variant),)+
                    _ => Err(StatusParseError {
                        kind: $kind,
                        value: s.to_owned(),
                    }),
                }
            }
        }
    };
}

// =============================================================================
// Orders
// =============================================================================

/// Lifecycle of a sale.
///
/// `Created -> Processing -> Completed` is driven by time (see
/// [`AutoProgression`](crate::AutoProgression)). The customer may cancel
/// while the order is still `Created` or `Processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Created,
    Processing,
    Completed,
    Cancelled,
}

labeled_enum!(OrderStatus, "order status", {
    Created => "created",
    Processing => "processing",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl OrderStatus {
    /// Whether the customer may still cancel.
    #[must_use]
    pub const fn can_cancel(self) -> bool {
        matches!(self, Self::Created | Self::Processing)
    }

    /// No further transitions happen from a terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// The status the timer moves this order to, if any.
    #[must_use]
    pub const fn next_automatic(self) -> Option<Self> {
        match self {
            Self::Created => Some(Self::Processing),
            Self::Processing => Some(Self::Completed),
            Self::Completed | Self::Cancelled => None,
        }
    }

    /// Whether the order counts as owned (everything but `Cancelled`).
    #[must_use]
    pub const fn grants_ownership(self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

// =============================================================================
// Reviews
// =============================================================================

/// Moderation state of a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "review_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

labeled_enum!(ReviewStatus, "review status", {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

impl ReviewStatus {
    /// A rejected review may be replaced by a fresh submission.
    #[must_use]
    pub const fn can_resubmit(self) -> bool {
        matches!(self, Self::Rejected)
    }

    /// Only pending reviews can be approved or rejected.
    #[must_use]
    pub const fn can_moderate(self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Publicly visible.
    #[must_use]
    pub const fn is_published(self) -> bool {
        matches!(self, Self::Approved)
    }
}

/// Outcome a moderator picks for a pending review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationDecision {
    Approve,
    Reject,
}

impl ModerationDecision {
    /// The review status this decision produces.
    #[must_use]
    pub const fn resulting_status(self) -> ReviewStatus {
        match self {
            Self::Approve => ReviewStatus::Approved,
            Self::Reject => ReviewStatus::Rejected,
        }
    }
}

// =============================================================================
// Support
// =============================================================================

/// State of a support request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "support_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum SupportStatus {
    #[default]
    Created,
    Processing,
    Completed,
}

labeled_enum!(SupportStatus, "support status", {
    Created => "created",
    Processing => "processing",
    Completed => "completed",
});

impl SupportStatus {
    /// An employee may take the request (again).
    #[must_use]
    pub const fn can_take(self) -> bool {
        !matches!(self, Self::Completed)
    }

    /// The chat is still open for new messages.
    #[must_use]
    pub const fn accepts_messages(self) -> bool {
        !matches!(self, Self::Completed)
    }
}

/// Priority the customer attaches to a support request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "support_priority", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum SupportPriority {
    Low,
    #[default]
    Normal,
    High,
}

labeled_enum!(SupportPriority, "support priority", {
    Low => "low",
    Normal => "normal",
    High => "high",
});

/// Who wrote a support chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "sender_type", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    User,
    Employee,
}

labeled_enum!(SenderType, "sender type", {
    User => "user",
    Employee => "employee",
});

// =============================================================================
// Catalog
// =============================================================================

/// Kind of company behind an app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "provider_type", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Developer,
    Publisher,
}

labeled_enum!(ProviderType, "provider type", {
    Developer => "developer",
    Publisher => "publisher",
});

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_cancel_rules() {
        assert!(OrderStatus::Created.can_cancel());
        assert!(OrderStatus::Processing.can_cancel());
        assert!(!OrderStatus::Completed.can_cancel());
        assert!(!OrderStatus::Cancelled.can_cancel());
    }

    #[test]
    fn test_order_automatic_chain_ends_in_terminal_state() {
        let mut status = OrderStatus::Created;
        let mut hops = 0;
        while let Some(next) = status.next_automatic() {
            status = next;
            hops += 1;
        }
        assert_eq!(status, OrderStatus::Completed);
        assert_eq!(hops, 2);
        assert!(status.is_terminal());
        assert_eq!(OrderStatus::Cancelled.next_automatic(), None);
    }

    #[test]
    fn test_cancelled_orders_do_not_grant_ownership() {
        assert!(OrderStatus::Created.grants_ownership());
        assert!(OrderStatus::Completed.grants_ownership());
        assert!(!OrderStatus::Cancelled.grants_ownership());
    }

    #[test]
    fn test_review_rules() {
        assert!(ReviewStatus::Rejected.can_resubmit());
        assert!(!ReviewStatus::Pending.can_resubmit());
        assert!(!ReviewStatus::Approved.can_resubmit());

        assert!(ReviewStatus::Pending.can_moderate());
        assert!(!ReviewStatus::Approved.can_moderate());
        assert!(!ReviewStatus::Rejected.can_moderate());

        assert_eq!(
            ModerationDecision::Approve.resulting_status(),
            ReviewStatus::Approved
        );
        assert_eq!(
            ModerationDecision::Reject.resulting_status(),
            ReviewStatus::Rejected
        );
    }

    #[test]
    fn test_support_rules() {
        assert!(SupportStatus::Created.can_take());
        assert!(SupportStatus::Processing.can_take());
        assert!(!SupportStatus::Completed.can_take());
        assert!(!SupportStatus::Completed.accepts_messages());
        assert_eq!(SupportPriority::default(), SupportPriority::Normal);
    }

    #[test]
    fn test_labels_round_trip_through_from_str() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), *status);
        }
        for status in SupportStatus::ALL {
            assert_eq!(status.to_string().parse::<SupportStatus>().unwrap(), *status);
        }
        assert_eq!("developer".parse::<ProviderType>().unwrap(), ProviderType::Developer);
    }

    #[test]
    fn test_from_str_rejects_unknown() {
        let err = "shipped".parse::<OrderStatus>().unwrap_err();
        assert_eq!(err.value(), "shipped");
        assert_eq!(err.to_string(), "invalid order status: shipped");
        assert!("Pending".parse::<ReviewStatus>().is_err());
    }

    #[test]
    fn test_serde_uses_lowercase_labels() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Processing).unwrap(),
            "\"processing\""
        );
        let priority: SupportPriority = serde_json::from_str("\"high\"").unwrap();
        assert_eq!(priority, SupportPriority::High);
        assert!(serde_json::from_str::<SenderType>("\"bot\"").is_err());
    }
}
