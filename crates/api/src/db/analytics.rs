//! Reporting queries for the analytics dashboard.
//!
//! Everything here runs on the `analyst_user` pool, which only holds SELECT
//! grants.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::instrument;

use digital_distributor_core::{AppId, CategoryId, OrderId, OrderStatus, UserId};

use super::RepositoryError;
use crate::models::analytics::{
    CategorySales, DailySales, Metrics, OrderBuyer, OrderFilter, OrderPage, Period, Purchase,
    ReportOrder, TopApp, UserGrowth,
};
use crate::models::order::OrderApp;

#[derive(sqlx::FromRow)]
struct MetricsRow {
    orders_count: i64,
    revenue: Decimal,
    avg_check: Decimal,
    returns: i64,
    new_users: i64,
    support_requests: i64,
}

#[derive(sqlx::FromRow)]
struct ReportRow {
    sale_id: OrderId,
    sale_date: DateTime<Utc>,
    amount: Decimal,
    status: OrderStatus,
    user_id: UserId,
    user_username: String,
    user_email: String,
    app_id: AppId,
    app_title: String,
    app_price: Decimal,
}

impl From<ReportRow> for ReportOrder {
    fn from(row: ReportRow) -> Self {
        Self {
            id: row.sale_id,
            sale_date: row.sale_date,
            amount: row.amount,
            status: row.status,
            user: OrderBuyer {
                id: row.user_id,
                username: row.user_username,
                email: row.user_email,
            },
            app: OrderApp {
                id: row.app_id,
                title: row.app_title,
                price: row.app_price,
            },
        }
    }
}

#[derive(sqlx::FromRow)]
struct PurchaseRow {
    sale_id: OrderId,
    sale_date: DateTime<Utc>,
    amount: Decimal,
    status: OrderStatus,
    app_id: AppId,
    app_title: String,
    app_price: Decimal,
}

impl From<PurchaseRow> for Purchase {
    fn from(row: PurchaseRow) -> Self {
        Self {
            id: row.sale_id,
            sale_date: row.sale_date,
            amount: row.amount,
            status: row.status,
            app: OrderApp {
                id: row.app_id,
                title: row.app_title,
                price: row.app_price,
            },
        }
    }
}

/// Order report filter; a NULL bind disables its condition.
const ORDER_FILTER: &str = r"
    WHERE
        ($1::timestamptz IS NULL OR s.sale_date >= $1)
        AND ($2::timestamptz IS NULL OR s.sale_date <= $2)
        AND ($3::order_status IS NULL OR s.status = $3)
        AND ($4::int IS NULL OR s.user_id = $4)
        AND ($5::int IS NULL OR s.app_id = $5)
";

/// Repository for read-only reporting.
pub struct AnalyticsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AnalyticsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Dashboard figures since the start of `period`.
    ///
    /// Sales count from `period`'s start; registrations and support requests
    /// use [`Period::activity_days`].
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn metrics(&self, period: Period) -> Result<Metrics, RepositoryError> {
        let row = sqlx::query_as::<_, MetricsRow>(
            r"
            WITH since AS (
                SELECT CURRENT_DATE - make_interval(days => $1) AS at,
                       CURRENT_DATE - make_interval(days => $2) AS activity_at
            )
            SELECT
                (SELECT COUNT(*) FROM sales, since
                 WHERE status <> 'cancelled' AND sale_date >= since.at) AS orders_count,
                (SELECT COALESCE(SUM(amount), 0) FROM sales, since
                 WHERE status <> 'cancelled' AND sale_date >= since.at) AS revenue,
                (SELECT COALESCE(AVG(amount), 0) FROM sales, since
                 WHERE status <> 'cancelled' AND sale_date >= since.at) AS avg_check,
                (SELECT COUNT(*) FROM sales, since
                 WHERE status = 'cancelled' AND sale_date >= since.at) AS returns,
                (SELECT COUNT(*) FROM users, since
                 WHERE reg_date >= since.activity_at) AS new_users,
                (SELECT COUNT(*) FROM support_requests, since
                 WHERE created_at >= since.activity_at) AS support_requests
            ",
        )
        .bind(period.days_back())
        .bind(period.activity_days())
        .fetch_one(self.pool)
        .await?;

        Ok(Metrics {
            orders_count: row.orders_count,
            revenue: row.revenue,
            new_users: row.new_users,
            returns: row.returns,
            avg_check: row.avg_check.round_dp(2),
            support_requests: row.support_requests,
        })
    }

    /// Best-selling apps by number of live sales.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn top_apps(&self, limit: i64) -> Result<Vec<TopApp>, RepositoryError> {
        let rows = sqlx::query_as::<_, (AppId, String, i64, Decimal)>(
            r"
            SELECT a.app_id, a.title, COUNT(s.sale_id) AS sales_count,
                   COALESCE(SUM(s.amount), 0) AS total_revenue
            FROM apps a
            INNER JOIN sales s ON s.app_id = a.app_id
            WHERE s.status <> 'cancelled'
            GROUP BY a.app_id, a.title
            ORDER BY sales_count DESC, total_revenue DESC
            LIMIT $1
            ",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(app_id, title, sales_count, total_revenue)| TopApp {
                app_id,
                title,
                sales_count,
                total_revenue,
            })
            .collect())
    }

    /// Live sales per day over the last `days` days, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn sales_by_day(&self, days: i32) -> Result<Vec<DailySales>, RepositoryError> {
        let rows = sqlx::query_as::<_, (NaiveDate, i64, Decimal)>(
            r"
            SELECT DATE(sale_date) AS date, COUNT(*) AS orders_count,
                   COALESCE(SUM(amount), 0) AS revenue
            FROM sales
            WHERE status <> 'cancelled'
              AND sale_date >= CURRENT_DATE - make_interval(days => $1)
            GROUP BY DATE(sale_date)
            ORDER BY date ASC
            ",
        )
        .bind(days)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(date, orders_count, revenue)| DailySales {
                date,
                orders_count,
                revenue,
            })
            .collect())
    }

    /// Live sales grouped by category, highest revenue first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn sales_by_category(&self) -> Result<Vec<CategorySales>, RepositoryError> {
        let rows = sqlx::query_as::<_, (CategoryId, String, i64, Decimal)>(
            r"
            SELECT c.category_id, c.title, COUNT(s.sale_id) AS sales_count,
                   COALESCE(SUM(s.amount), 0) AS revenue
            FROM categories c
            INNER JOIN apps a ON a.category_id = c.category_id
            INNER JOIN sales s ON s.app_id = a.app_id
            WHERE s.status <> 'cancelled'
            GROUP BY c.category_id, c.title
            ORDER BY revenue DESC
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(category_id, category_title, sales_count, revenue)| CategorySales {
                category_id,
                category_title,
                sales_count,
                revenue,
            })
            .collect())
    }

    /// Registrations per day over the last `days` days.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn users_growth(&self, days: i32) -> Result<Vec<UserGrowth>, RepositoryError> {
        let rows = sqlx::query_as::<_, (NaiveDate, i64)>(
            r"
            SELECT reg_date AS date, COUNT(*) AS count
            FROM users
            WHERE reg_date >= CURRENT_DATE - make_interval(days => $1)
            GROUP BY reg_date
            ORDER BY date ASC
            ",
        )
        .bind(days)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(date, count)| UserGrowth { date, count })
            .collect())
    }

    /// One page of the filtered order report, plus the unpaged total.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if either query fails.
    #[instrument(skip(self))]
    pub async fn orders(
        &self,
        filter: &OrderFilter,
        limit: i64,
        offset: i64,
    ) -> Result<OrderPage, RepositoryError> {
        let rows = sqlx::query_as::<_, ReportRow>(&format!(
            r"
            SELECT s.sale_id, s.sale_date, s.amount, s.status,
                   s.user_id, u.username AS user_username, u.email AS user_email,
                   s.app_id, a.title AS app_title, a.price AS app_price
            FROM sales s
            INNER JOIN users u ON u.user_id = s.user_id
            INNER JOIN apps a ON a.app_id = s.app_id
            {ORDER_FILTER}
            ORDER BY s.sale_date DESC
            LIMIT $6 OFFSET $7
            "
        ))
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(filter.status)
        .bind(filter.user_id)
        .bind(filter.app_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let count_sql = format!("SELECT COUNT(*) FROM sales s {ORDER_FILTER}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(filter.status)
            .bind(filter.user_id)
            .bind(filter.app_id)
            .fetch_one(self.pool)
            .await?;

        Ok(OrderPage {
            orders: rows.into_iter().map(ReportOrder::from).collect(),
            total,
            limit,
            offset,
        })
    }

    /// Every sale a customer has made, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn purchases(&self, user_id: UserId) -> Result<Vec<Purchase>, RepositoryError> {
        let rows = sqlx::query_as::<_, PurchaseRow>(
            r"
            SELECT s.sale_id, s.sale_date, s.amount, s.status,
                   s.app_id, a.title AS app_title, a.price AS app_price
            FROM sales s
            INNER JOIN apps a ON a.app_id = s.app_id
            WHERE s.user_id = $1
            ORDER BY s.sale_date DESC
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Purchase::from).collect())
    }
}
