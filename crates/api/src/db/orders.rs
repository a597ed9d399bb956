//! Sales (orders) queries.
//!
//! Customer-facing functions take a connection from a transaction opened with
//! [`RolePools::begin_as`](super::RolePools::begin_as) on the `normal_user`
//! pool; RLS limits every statement to the acting customer's rows.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use tracing::{debug, instrument};

use digital_distributor_core::{AppId, OrderId, OrderStatus, ProgressionStep, UserId};

use super::catalog::{APP_JOINS, APP_SELECT, AppRow};
use super::{RepositoryError, conflict_on_unique};
use crate::models::catalog::App;
use crate::models::order::{CreatedOrder, Order, OrderApp, PricedItem};

#[derive(sqlx::FromRow)]
struct OrderRow {
    sale_id: OrderId,
    sale_date: DateTime<Utc>,
    amount: Decimal,
    status: OrderStatus,
    app_id: AppId,
    title: String,
    price: Decimal,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.sale_id,
            status: row.status,
            amount: row.amount,
            sale_date: row.sale_date,
            download_link: None,
            app: OrderApp {
                id: row.app_id,
                title: row.title,
                price: row.price,
            },
        }
    }
}

/// The acting customer's orders, newest first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_visible(conn: &mut PgConnection) -> Result<Vec<Order>, RepositoryError> {
    let rows = sqlx::query_as::<_, OrderRow>(
        r"
        SELECT s.sale_id, s.sale_date, s.amount, s.status,
               a.app_id, a.title, a.price
        FROM sales s
        INNER JOIN apps a ON a.app_id = s.app_id
        ORDER BY s.sale_date DESC
        ",
    )
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(Order::from).collect())
}

/// Distinct apps the acting customer holds a live (non-cancelled) sale for.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn owned_apps(conn: &mut PgConnection) -> Result<Vec<App>, RepositoryError> {
    // The partial unique index on sales keeps at most one live sale per app.
    let sql = format!(
        r"{APP_SELECT}
        FROM sales s
        INNER JOIN apps a ON a.app_id = s.app_id
        {APP_JOINS}
        WHERE s.status <> 'cancelled'
        ORDER BY s.sale_date DESC"
    );

    let rows = sqlx::query_as::<_, AppRow>(&sql).fetch_all(conn).await?;

    Ok(rows.into_iter().map(App::from).collect())
}

/// Whether the acting customer holds a live sale for `app_id`.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn owns_app(conn: &mut PgConnection, app_id: AppId) -> Result<bool, RepositoryError> {
    let owned: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM sales WHERE app_id = $1 AND status <> 'cancelled')",
    )
    .bind(app_id)
    .fetch_one(conn)
    .await?;
    Ok(owned)
}

/// The subset of `app_ids` the acting customer already owns.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn owned_among(
    conn: &mut PgConnection,
    app_ids: &[AppId],
) -> Result<Vec<AppId>, RepositoryError> {
    let ids: Vec<i32> = app_ids.iter().map(AppId::as_i32).collect();

    let owned = sqlx::query_scalar::<_, AppId>(
        r"
        SELECT DISTINCT app_id FROM sales
        WHERE app_id = ANY($1) AND status <> 'cancelled'
        ORDER BY app_id
        ",
    )
    .bind(&ids)
    .fetch_all(conn)
    .await?;

    Ok(owned)
}

/// Record a purchase.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the customer already holds a live
/// sale for the app.
/// Returns `RepositoryError::Database` for other database errors.
#[instrument(skip(conn))]
pub async fn insert(
    conn: &mut PgConnection,
    user_id: UserId,
    item: PricedItem,
) -> Result<CreatedOrder, RepositoryError> {
    #[derive(sqlx::FromRow)]
    struct Row {
        sale_id: OrderId,
        sale_date: DateTime<Utc>,
        amount: Decimal,
        status: OrderStatus,
        app_id: AppId,
    }

    let row = sqlx::query_as::<_, Row>(
        r"
        INSERT INTO sales (sale_date, amount, status, user_id, app_id)
        VALUES (NOW(), $1, 'created', $2, $3)
        RETURNING sale_id, sale_date, amount, status, app_id
        ",
    )
    .bind(item.amount)
    .bind(user_id)
    .bind(item.app_id)
    .fetch_one(conn)
    .await
    .map_err(|e| conflict_on_unique(e, &format!("app {} is already purchased", item.app_id)))?;

    Ok(CreatedOrder {
        id: row.sale_id,
        amount: row.amount,
        sale_date: row.sale_date,
        status: row.status,
        app_id: row.app_id,
    })
}

/// Status of a visible order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn status(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<Option<OrderStatus>, RepositoryError> {
    let status = sqlx::query_scalar::<_, OrderStatus>("SELECT status FROM sales WHERE sale_id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(status)
}

/// Cancel a visible order if it is still cancellable.
///
/// The status guard is repeated in SQL so a concurrent completion wins.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if no cancellable row was updated.
#[instrument(skip(conn))]
pub async fn cancel(conn: &mut PgConnection, id: OrderId) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE sales SET status = 'cancelled'
        WHERE sale_id = $1 AND status IN ('created', 'processing')
        ",
    )
    .bind(id)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }

    Ok(())
}

/// Whether `order_id` exists and belongs to `user_id`.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn belongs_to(
    conn: &mut PgConnection,
    order_id: OrderId,
    user_id: UserId,
) -> Result<bool, RepositoryError> {
    let found: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM sales WHERE sale_id = $1 AND user_id = $2)",
    )
    .bind(order_id)
    .bind(user_id)
    .fetch_one(conn)
    .await?;
    Ok(found)
}

/// Apply one auto-progression step to every qualifying order.
///
/// Returns the number of orders moved.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn advance(
    conn: &mut PgConnection,
    step: &ProgressionStep,
) -> Result<u64, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE sales SET status = $1
        WHERE status = $2 AND sale_date <= $3
        ",
    )
    .bind(step.to)
    .bind(step.from)
    .bind(step.cutoff)
    .execute(conn)
    .await?;

    let moved = result.rows_affected();
    debug!(from = %step.from, to = %step.to, moved, "Advanced orders");
    Ok(moved)
}
