//! Read-only reporting for analysts and admins.
//!
//! Every query runs on the `analyst_user` pool, which only holds `SELECT`
//! grants.

use axum::{Json, extract::State};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use digital_distributor_core::{AppId, DbRole, OrderStatus, UserId};

use crate::db::analytics::AnalyticsRepository;
use crate::db::users::UserRepository;
use crate::error::{AppError, AppPath, AppQuery, Result};
use crate::middleware::{Reporting, RequireStaff};
use crate::models::analytics::{
    CategorySales, DailySales, Metrics, OrderFilter, OrderPage, Period, Purchase, TopApp,
    UserGrowth,
};
use crate::models::user::User;
use crate::state::AppState;

const DEFAULT_TOP_APPS: i64 = 10;
const MAX_TOP_APPS: i64 = 100;
const DEFAULT_DAYS: i32 = 30;
const MAX_DAYS: i32 = 365;
const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 500;

// =============================================================================
// Query Types
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct PeriodQuery {
    pub period: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DaysQuery {
    pub days: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrdersQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub status: Option<OrderStatus>,
    pub user_id: Option<UserId>,
    pub app_id: Option<AppId>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl OrdersQuery {
    fn filter(&self) -> Result<OrderFilter> {
        Ok(OrderFilter {
            start_date: self.start_date.as_deref().map(parse_instant).transpose()?,
            end_date: self.end_date.as_deref().map(parse_instant).transpose()?,
            status: self.status,
            user_id: self.user_id,
            app_id: self.app_id,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct UserPurchases {
    pub user: User,
    pub purchases: Vec<Purchase>,
}

// =============================================================================
// Helpers
// =============================================================================

/// `value` or `default`, forced into `min..=max`.
fn clamp_or<T: Ord>(value: Option<T>, default: T, min: T, max: T) -> T {
    value.unwrap_or(default).clamp(min, max)
}

/// Accept an RFC 3339 timestamp or a bare date (midnight UTC).
fn parse_instant(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| AppError::BadRequest(format!("Invalid date: {value}")))
}

fn repository(state: &AppState) -> AnalyticsRepository<'_> {
    AnalyticsRepository::new(state.pools().pool(DbRole::Analyst))
}

// =============================================================================
// Handlers
// =============================================================================

/// `GET /api/analytics/metrics?period=day|week|month`
pub async fn metrics(
    State(state): State<AppState>,
    _: RequireStaff<Reporting>,
    AppQuery(query): AppQuery<PeriodQuery>,
) -> Result<Json<Metrics>> {
    let period = match query.period.as_deref() {
        None => Period::default(),
        Some(raw) => raw.parse::<Period>().map_err(AppError::BadRequest)?,
    };
    Ok(Json(repository(&state).metrics(period).await?))
}

/// `GET /api/analytics/top-apps?limit=`
pub async fn top_apps(
    State(state): State<AppState>,
    _: RequireStaff<Reporting>,
    AppQuery(query): AppQuery<LimitQuery>,
) -> Result<Json<Vec<TopApp>>> {
    let limit = clamp_or(query.limit, DEFAULT_TOP_APPS, 1, MAX_TOP_APPS);
    Ok(Json(repository(&state).top_apps(limit).await?))
}

/// `GET /api/analytics/sales-by-day?days=`
pub async fn sales_by_day(
    State(state): State<AppState>,
    _: RequireStaff<Reporting>,
    AppQuery(query): AppQuery<DaysQuery>,
) -> Result<Json<Vec<DailySales>>> {
    let days = clamp_or(query.days, DEFAULT_DAYS, 1, MAX_DAYS);
    Ok(Json(repository(&state).sales_by_day(days).await?))
}

/// `GET /api/analytics/sales-by-category`
pub async fn sales_by_category(
    State(state): State<AppState>,
    _: RequireStaff<Reporting>,
) -> Result<Json<Vec<CategorySales>>> {
    Ok(Json(repository(&state).sales_by_category().await?))
}

/// `GET /api/analytics/users-growth?days=`
pub async fn users_growth(
    State(state): State<AppState>,
    _: RequireStaff<Reporting>,
    AppQuery(query): AppQuery<DaysQuery>,
) -> Result<Json<Vec<UserGrowth>>> {
    let days = clamp_or(query.days, DEFAULT_DAYS, 1, MAX_DAYS);
    Ok(Json(repository(&state).users_growth(days).await?))
}

/// `GET /api/analytics/orders`
pub async fn orders(
    State(state): State<AppState>,
    _: RequireStaff<Reporting>,
    AppQuery(query): AppQuery<OrdersQuery>,
) -> Result<Json<OrderPage>> {
    let filter = query.filter()?;
    let limit = clamp_or(query.limit, DEFAULT_PAGE_SIZE, 1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);

    Ok(Json(repository(&state).orders(&filter, limit, offset).await?))
}

/// `GET /api/analytics/users/{id}/purchases`
pub async fn user_purchases(
    State(state): State<AppState>,
    _: RequireStaff<Reporting>,
    AppPath(id): AppPath<UserId>,
) -> Result<Json<UserPurchases>> {
    let users = UserRepository::new(state.pools().pool(DbRole::Analyst));
    let user = users
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_owned()))?;

    let purchases = repository(&state).purchases(id).await?;

    Ok(Json(UserPurchases { user, purchases }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Datelike, Timelike};

    use super::*;

    #[test]
    fn test_clamp_or() {
        assert_eq!(clamp_or(None, DEFAULT_TOP_APPS, 1, MAX_TOP_APPS), 10);
        assert_eq!(clamp_or(Some(0), DEFAULT_TOP_APPS, 1, MAX_TOP_APPS), 1);
        assert_eq!(clamp_or(Some(5000), DEFAULT_DAYS, 1, MAX_DAYS), 365);
        assert_eq!(clamp_or(Some(-4), DEFAULT_DAYS, 1, MAX_DAYS), 1);
    }

    #[test]
    fn test_parse_instant_accepts_dates_and_timestamps() {
        let day = parse_instant("2024-03-01").unwrap();
        assert_eq!((day.year(), day.month(), day.day(), day.hour()), (2024, 3, 1, 0));

        let instant = parse_instant("2024-03-01T12:30:00+02:00").unwrap();
        assert_eq!(instant.hour(), 10);

        assert!(matches!(parse_instant("yesterday"), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_orders_query_builds_filter() {
        let query = OrdersQuery {
            start_date: Some("2024-01-01".to_owned()),
            status: Some(OrderStatus::Completed),
            ..OrdersQuery::default()
        };
        let filter = query.filter().unwrap();
        assert!(filter.start_date.is_some());
        assert!(filter.end_date.is_none());
        assert_eq!(filter.status, Some(OrderStatus::Completed));
        assert!(filter.app_id.is_none());
    }
}
