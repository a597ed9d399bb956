//! Order (sale) types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use digital_distributor_core::{AppId, OrderId, OrderStatus};

/// The app an order is for.
#[derive(Debug, Clone, Serialize)]
pub struct OrderApp {
    pub id: AppId,
    pub title: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

/// A customer's order as listed on their orders page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub status: OrderStatus,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub sale_date: DateTime<Utc>,
    /// Present once the order is completed.
    pub download_link: Option<String>,
    pub app: OrderApp,
}

impl Order {
    /// Fill in the download link if the order is completed.
    #[must_use]
    pub fn with_download_link(mut self, base_url: &str) -> Self {
        self.download_link = (self.status == OrderStatus::Completed)
            .then(|| download_link(base_url, self.app.id));
        self
    }
}

/// Download location for a purchased app.
#[must_use]
pub fn download_link(base_url: &str, app_id: AppId) -> String {
    format!("{}/app/id={app_id}", base_url.trim_end_matches('/'))
}

/// A sale created at checkout.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedOrder {
    pub id: OrderId,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub sale_date: DateTime<Utc>,
    pub status: OrderStatus,
    pub app_id: AppId,
}

/// One line of a checkout after prices have been resolved.
#[derive(Debug, Clone, Copy)]
pub struct PricedItem {
    pub app_id: AppId,
    pub amount: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(status: OrderStatus) -> Order {
        Order {
            id: OrderId::new(1),
            status,
            amount: Decimal::new(1999, 2),
            sale_date: Utc::now(),
            download_link: None,
            app: OrderApp {
                id: AppId::new(42),
                title: "Chess".to_string(),
                price: Decimal::new(1999, 2),
            },
        }
    }

    #[test]
    fn test_download_link_only_for_completed() {
        let base = "https://digitaldistributor.com";
        assert_eq!(
            order(OrderStatus::Completed).with_download_link(base).download_link.as_deref(),
            Some("https://digitaldistributor.com/app/id=42")
        );
        for status in [
            OrderStatus::Created,
            OrderStatus::Processing,
            OrderStatus::Cancelled,
        ] {
            assert!(order(status).with_download_link(base).download_link.is_none());
        }
    }

    #[test]
    fn test_download_link_trims_trailing_slash() {
        assert_eq!(
            download_link("https://cdn.example/", AppId::new(7)),
            "https://cdn.example/app/id=7"
        );
    }

    #[test]
    fn test_amount_serializes_as_number() {
        let json = serde_json::to_value(order(OrderStatus::Created)).unwrap_or_default();
        assert_eq!(json["amount"], serde_json::json!(19.99));
        assert_eq!(json["status"], "created");
        assert!(json["downloadLink"].is_null());
    }
}
