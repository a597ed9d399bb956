//! Staff side of the support desk.
//!
//! Support agents and admins work the queue on their own role's pool. Only
//! the assignee or an admin may write into a request's chat.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use digital_distributor_core::{SenderType, SupportRequestId, SupportStatus};

use crate::db::RepositoryError;
use crate::db::support::{self, Audience};
use crate::error::{AppError, AppJson, AppPath, AppQuery, Result};
use crate::middleware::{AdminOnly, RequireStaff, StaffMember, SupportDesk};
use crate::models::support::{RequestAccess, StaffSupportRequest, SupportMessage};
use crate::routes::support::ChatMessage;
use crate::state::AppState;
use crate::validation::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct QueueQuery {
    pub status: Option<SupportStatus>,
}

#[derive(Debug, Serialize)]
pub struct RequestUpdate {
    pub message: &'static str,
    pub request: StaffSupportRequest,
}

fn request_not_found() -> AppError {
    AppError::NotFound("Support request not found".to_owned())
}

/// Map a missing row to a 404 with a specific message.
fn not_found_as_request(err: RepositoryError) -> AppError {
    match err {
        RepositoryError::NotFound => request_not_found(),
        other => other.into(),
    }
}

/// Whether `staff` may post into a request in this state.
fn check_can_post(staff: &StaffMember, access: &RequestAccess) -> Result<()> {
    if !access.status.accepts_messages() {
        return Err(AppError::Forbidden(
            "Cannot post to a completed request".to_owned(),
        ));
    }
    if !staff.is_admin() && access.employee_id != Some(staff.id) {
        return Err(AppError::Forbidden(
            "Only the assigned employee can reply to this request".to_owned(),
        ));
    }
    Ok(())
}

/// `GET /api/employee-support/requests?status=`
pub async fn list(
    State(state): State<AppState>,
    RequireStaff(staff, _): RequireStaff<SupportDesk>,
    AppQuery(query): AppQuery<QueueQuery>,
) -> Result<Json<Vec<StaffSupportRequest>>> {
    let mut conn = state.pools().pool(staff.role.db_role()).acquire().await?;
    let requests = support::list_all(&mut conn, query.status).await?;
    Ok(Json(requests))
}

/// `PATCH /api/employee-support/requests/{id}/take`
#[instrument(skip(state, staff), fields(employee_id = %staff.id))]
pub async fn take(
    State(state): State<AppState>,
    RequireStaff(staff, _): RequireStaff<SupportDesk>,
    AppPath(id): AppPath<SupportRequestId>,
) -> Result<Json<RequestUpdate>> {
    let mut tx = state.pools().begin_as(staff.role.db_role(), None).await?;
    let request = support::take(&mut tx, id, staff.id)
        .await
        .map_err(not_found_as_request)?;
    tx.commit().await?;

    Ok(Json(RequestUpdate {
        message: "Request taken",
        request,
    }))
}

/// `GET /api/employee-support/requests/{id}/messages`
pub async fn messages(
    State(state): State<AppState>,
    RequireStaff(staff, _): RequireStaff<SupportDesk>,
    AppPath(id): AppPath<SupportRequestId>,
) -> Result<Json<Vec<SupportMessage>>> {
    let mut conn = state.pools().pool(staff.role.db_role()).acquire().await?;

    if support::access(&mut conn, id).await?.is_none() {
        return Err(request_not_found());
    }
    let messages = support::list_messages(&mut conn, id, Audience::Staff).await?;

    Ok(Json(messages))
}

/// `POST /api/employee-support/requests/{id}/messages`
#[instrument(skip(state, staff, body), fields(employee_id = %staff.id))]
pub async fn post_message(
    State(state): State<AppState>,
    RequireStaff(staff, _): RequireStaff<SupportDesk>,
    AppPath(id): AppPath<SupportRequestId>,
    AppJson(body): AppJson<ChatMessage>,
) -> Result<(StatusCode, Json<SupportMessage>)> {
    body.validate()?;

    let mut tx = state.pools().begin_as(staff.role.db_role(), None).await?;

    let access = support::access(&mut tx, id)
        .await?
        .ok_or_else(request_not_found)?;
    check_can_post(&staff, &access)?;

    let message = support::add_message(
        &mut tx,
        id,
        SenderType::Employee,
        staff.id.as_i32(),
        body.message.trim(),
    )
    .await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// `PATCH /api/employee-support/requests/{id}/close`
#[instrument(skip(state, staff), fields(employee_id = %staff.id))]
pub async fn close(
    State(state): State<AppState>,
    RequireStaff(staff, _): RequireStaff<AdminOnly>,
    AppPath(id): AppPath<SupportRequestId>,
) -> Result<Json<RequestUpdate>> {
    let mut tx = state.pools().begin_as(staff.role.db_role(), None).await?;
    let request = support::close(&mut tx, id)
        .await
        .map_err(not_found_as_request)?;
    tx.commit().await?;

    Ok(Json(RequestUpdate {
        message: "Request closed",
        request,
    }))
}

#[cfg(test)]
mod tests {
    use digital_distributor_core::{EmployeeId, Role, UserId};

    use super::*;

    fn staff(id: i32, role: Role) -> StaffMember {
        StaffMember {
            id: EmployeeId::new(id),
            username: "agent".to_owned(),
            role,
        }
    }

    fn access(assignee: Option<i32>, status: SupportStatus) -> RequestAccess {
        RequestAccess {
            user_id: UserId::new(1),
            employee_id: assignee.map(EmployeeId::new),
            status,
        }
    }

    #[test]
    fn test_assignee_can_post() {
        let agent = staff(7, Role::Support);
        assert!(check_can_post(&agent, &access(Some(7), SupportStatus::Processing)).is_ok());
    }

    #[test]
    fn test_other_agent_cannot_post() {
        let agent = staff(8, Role::Support);
        assert!(matches!(
            check_can_post(&agent, &access(Some(7), SupportStatus::Processing)),
            Err(AppError::Forbidden(_))
        ));
        assert!(check_can_post(&agent, &access(None, SupportStatus::Created)).is_err());
    }

    #[test]
    fn test_admin_can_post_anywhere_open() {
        let admin = staff(1, Role::Admin);
        assert!(check_can_post(&admin, &access(None, SupportStatus::Created)).is_ok());
        assert!(check_can_post(&admin, &access(Some(7), SupportStatus::Completed)).is_err());
    }
}
