//! Read-only reporting types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use digital_distributor_core::{AppId, CategoryId, OrderId, OrderStatus, UserId};

use super::order::OrderApp;

/// Dashboard figures for one period.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub orders_count: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub revenue: Decimal,
    pub new_users: i64,
    pub returns: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg_check: Decimal,
    pub support_requests: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopApp {
    pub app_id: AppId,
    pub title: String,
    pub sales_count: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_revenue: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySales {
    pub date: NaiveDate,
    pub orders_count: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySales {
    pub category_id: CategoryId,
    pub category_title: String,
    pub sales_count: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserGrowth {
    pub date: NaiveDate,
    pub count: i64,
}

/// Buyer as embedded in an order report.
#[derive(Debug, Clone, Serialize)]
pub struct OrderBuyer {
    pub id: UserId,
    pub username: String,
    pub email: String,
}

/// A sale in the analyst order report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportOrder {
    pub id: OrderId,
    pub sale_date: DateTime<Utc>,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub status: OrderStatus,
    pub user: OrderBuyer,
    pub app: OrderApp,
}

/// Filters for the order report. `None` means "don't filter".
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: Option<OrderStatus>,
    pub user_id: Option<UserId>,
    pub app_id: Option<AppId>,
}

/// One page of the order report.
#[derive(Debug, Clone, Serialize)]
pub struct OrderPage {
    pub orders: Vec<ReportOrder>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// A customer's purchase history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: OrderId,
    pub sale_date: DateTime<Utc>,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub status: OrderStatus,
    pub app: OrderApp,
}

/// Reporting period for the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Period {
    #[default]
    Day,
    Week,
    Month,
}

impl Period {
    /// Whole days before today the period reaches back. `Day` is today only.
    #[must_use]
    pub const fn days_back(self) -> i32 {
        match self {
            Self::Day => 0,
            Self::Week => 7,
            Self::Month => 30,
        }
    }

    /// Window in days for registration and support counts. `Day` looks back
    /// a full day rather than to midnight.
    #[must_use]
    pub const fn activity_days(self) -> i32 {
        match self {
            Self::Day => 1,
            Self::Week => 7,
            Self::Month => 30,
        }
    }
}

impl std::str::FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            _ => Err(format!("invalid period: {s}")),
        }
    }
}
