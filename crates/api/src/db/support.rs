//! Support requests and their chat messages.
//!
//! Customers reach these tables through `normal_user` RLS policies that only
//! expose their own requests and the messages on them. Staff use the support
//! or admin pool and see everything.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::{info, instrument};

use digital_distributor_core::{
    EmployeeId, OrderId, SenderType, SupportMessageId, SupportPriority, SupportRequestId,
    SupportStatus, UserId,
};

use super::RepositoryError;
use crate::models::support::{RequestAccess, StaffSupportRequest, SupportMessage, SupportRequest};

/// Fields for a new support request.
#[derive(Debug, Clone)]
pub struct NewSupportRequest {
    pub order_id: OrderId,
    pub subject: String,
    pub message: String,
    pub priority: SupportPriority,
}

/// Who is reading a chat; decides whose names can be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Customer,
    Staff,
}

#[derive(sqlx::FromRow)]
struct RequestRow {
    request_id: SupportRequestId,
    order_id: Option<OrderId>,
    subject: String,
    message: String,
    priority: SupportPriority,
    status: SupportStatus,
    created_at: DateTime<Utc>,
    taken_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
}

impl From<RequestRow> for SupportRequest {
    fn from(row: RequestRow) -> Self {
        Self {
            id: row.request_id,
            order_id: row.order_id,
            subject: row.subject,
            message: row.message,
            priority: row.priority,
            status: row.status,
            created_at: row.created_at,
            taken_at: row.taken_at,
            closed_at: row.closed_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct StaffRequestRow {
    #[sqlx(flatten)]
    request: RequestRow,
    user_id: UserId,
    user_username: String,
    user_email: String,
    employee_id: Option<EmployeeId>,
    employee_username: Option<String>,
}

impl From<StaffRequestRow> for StaffSupportRequest {
    fn from(row: StaffRequestRow) -> Self {
        let request = row.request;
        Self {
            id: request.request_id,
            user_id: row.user_id,
            user_username: row.user_username,
            user_email: row.user_email,
            order_id: request.order_id,
            subject: request.subject,
            message: request.message,
            priority: request.priority,
            status: request.status,
            created_at: request.created_at,
            employee_id: row.employee_id,
            employee_username: row.employee_username,
            taken_at: request.taken_at,
            closed_at: request.closed_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    message_id: SupportMessageId,
    request_id: SupportRequestId,
    sender_type: SenderType,
    sender_id: i32,
    sender_username: Option<String>,
    message: String,
    created_at: DateTime<Utc>,
}

impl From<MessageRow> for SupportMessage {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.message_id,
            request_id: row.request_id,
            sender_type: row.sender_type,
            sender_id: row.sender_id,
            sender_username: row.sender_username,
            message: row.message,
            created_at: row.created_at,
        }
    }
}

const REQUEST_COLUMNS: &str = "sr.request_id, sr.order_id, sr.subject, sr.message, sr.priority, \
     sr.status, sr.created_at, sr.taken_at, sr.closed_at";

fn staff_select() -> String {
    format!(
        r"
        SELECT {REQUEST_COLUMNS},
               sr.user_id, u.username AS user_username, u.email AS user_email,
               sr.employee_id, e.username AS employee_username
        FROM support_requests sr
        INNER JOIN users u ON u.user_id = sr.user_id
        LEFT JOIN employees e ON e.employee_id = sr.employee_id
        "
    )
}

// =============================================================================
// Customer side
// =============================================================================

/// Open a request and post its first message.
///
/// Both rows are written on `conn`; run inside a transaction so neither
/// exists without the other.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if either insert fails.
#[instrument(skip(conn, request), fields(order_id = %request.order_id))]
pub async fn create(
    conn: &mut PgConnection,
    user_id: UserId,
    request: &NewSupportRequest,
) -> Result<SupportRequest, RepositoryError> {
    let sql = format!(
        r"
        INSERT INTO support_requests AS sr (user_id, order_id, subject, message, priority, status, created_at)
        VALUES ($1, $2, $3, $4, $5, 'created', NOW())
        RETURNING {REQUEST_COLUMNS}
        "
    );

    let row = sqlx::query_as::<_, RequestRow>(&sql)
        .bind(user_id)
        .bind(request.order_id)
        .bind(&request.subject)
        .bind(&request.message)
        .bind(request.priority)
        .fetch_one(&mut *conn)
        .await?;

    add_message(
        conn,
        row.request_id,
        SenderType::User,
        user_id.as_i32(),
        &request.message,
    )
    .await?;

    info!(request_id = %row.request_id, "Support request opened");
    Ok(row.into())
}

/// A customer's requests, newest first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_for_user(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Vec<SupportRequest>, RepositoryError> {
    let sql = format!(
        "SELECT {REQUEST_COLUMNS} FROM support_requests sr \
         WHERE sr.user_id = $1 ORDER BY sr.created_at DESC"
    );

    let rows = sqlx::query_as::<_, RequestRow>(&sql)
        .bind(user_id)
        .fetch_all(conn)
        .await?;

    Ok(rows.into_iter().map(SupportRequest::from).collect())
}

// =============================================================================
// Shared
// =============================================================================

/// Owner, assignee and status of a request, if visible.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn access(
    conn: &mut PgConnection,
    id: SupportRequestId,
) -> Result<Option<RequestAccess>, RepositoryError> {
    let row = sqlx::query_as::<_, (UserId, Option<EmployeeId>, SupportStatus)>(
        "SELECT user_id, employee_id, status FROM support_requests WHERE request_id = $1",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(|(user_id, employee_id, status)| RequestAccess {
        user_id,
        employee_id,
        status,
    }))
}

/// Messages on a request, oldest first.
///
/// Staff see the sender's username for every message. Customers can only
/// resolve customer names; staff messages come back without one.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_messages(
    conn: &mut PgConnection,
    id: SupportRequestId,
    audience: Audience,
) -> Result<Vec<SupportMessage>, RepositoryError> {
    let sql = match audience {
        Audience::Customer => {
            r"
            SELECT sm.message_id, sm.request_id, sm.sender_type, sm.sender_id,
                   u.username AS sender_username, sm.message, sm.created_at
            FROM support_messages sm
            LEFT JOIN users u ON u.user_id = sm.sender_id AND sm.sender_type = 'user'
            WHERE sm.request_id = $1
            ORDER BY sm.created_at ASC, sm.message_id ASC
            "
        }
        Audience::Staff => {
            r"
            SELECT sm.message_id, sm.request_id, sm.sender_type, sm.sender_id,
                   CASE sm.sender_type
                       WHEN 'user' THEN u.username
                       WHEN 'employee' THEN e.username
                   END AS sender_username,
                   sm.message, sm.created_at
            FROM support_messages sm
            LEFT JOIN users u ON u.user_id = sm.sender_id AND sm.sender_type = 'user'
            LEFT JOIN employees e ON e.employee_id = sm.sender_id AND sm.sender_type = 'employee'
            WHERE sm.request_id = $1
            ORDER BY sm.created_at ASC, sm.message_id ASC
            "
        }
    };

    let rows = sqlx::query_as::<_, MessageRow>(sql)
        .bind(id)
        .fetch_all(conn)
        .await?;

    Ok(rows.into_iter().map(SupportMessage::from).collect())
}

/// Post a chat message.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
#[instrument(skip(conn, message))]
pub async fn add_message(
    conn: &mut PgConnection,
    id: SupportRequestId,
    sender_type: SenderType,
    sender_id: i32,
    message: &str,
) -> Result<SupportMessage, RepositoryError> {
    let row = sqlx::query_as::<_, MessageRow>(
        r"
        INSERT INTO support_messages (request_id, sender_type, sender_id, message, created_at)
        VALUES ($1, $2, $3, $4, NOW())
        RETURNING message_id, request_id, sender_type, sender_id,
                  NULL::TEXT AS sender_username, message, created_at
        ",
    )
    .bind(id)
    .bind(sender_type)
    .bind(sender_id)
    .bind(message)
    .fetch_one(conn)
    .await?;

    Ok(row.into())
}

// =============================================================================
// Staff side
// =============================================================================

/// The full queue, optionally filtered by status, newest first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_all(
    conn: &mut PgConnection,
    status: Option<SupportStatus>,
) -> Result<Vec<StaffSupportRequest>, RepositoryError> {
    let sql = format!(
        "{} WHERE ($1::support_status IS NULL OR sr.status = $1) ORDER BY sr.created_at DESC",
        staff_select()
    );

    let rows = sqlx::query_as::<_, StaffRequestRow>(&sql)
        .bind(status)
        .fetch_all(conn)
        .await?;

    Ok(rows.into_iter().map(StaffSupportRequest::from).collect())
}

async fn get_staff_view(
    conn: &mut PgConnection,
    id: SupportRequestId,
) -> Result<StaffSupportRequest, RepositoryError> {
    let sql = format!("{} WHERE sr.request_id = $1", staff_select());

    let row = sqlx::query_as::<_, StaffRequestRow>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or(RepositoryError::NotFound)?;

    Ok(row.into())
}

/// Assign a request to an employee and mark it processing.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the request doesn't exist.
/// Returns `RepositoryError::Conflict` if it is already completed.
#[instrument(skip(conn))]
pub async fn take(
    conn: &mut PgConnection,
    id: SupportRequestId,
    employee: EmployeeId,
) -> Result<StaffSupportRequest, RepositoryError> {
    let status = sqlx::query_scalar::<_, SupportStatus>(
        "SELECT status FROM support_requests WHERE request_id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    if !status.can_take() {
        return Err(RepositoryError::Conflict(
            "request is already completed".to_owned(),
        ));
    }

    sqlx::query(
        r"
        UPDATE support_requests
        SET employee_id = $1, taken_at = NOW(), status = 'processing'
        WHERE request_id = $2
        ",
    )
    .bind(employee)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    info!(request_id = %id, employee_id = %employee, "Support request taken");
    get_staff_view(conn, id).await
}

/// Mark a request completed.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the request doesn't exist.
#[instrument(skip(conn))]
pub async fn close(
    conn: &mut PgConnection,
    id: SupportRequestId,
) -> Result<StaffSupportRequest, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE support_requests
        SET status = 'completed', closed_at = COALESCE(closed_at, NOW())
        WHERE request_id = $1
        ",
    )
    .bind(id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }

    info!(request_id = %id, "Support request closed");
    get_staff_view(conn, id).await
}
