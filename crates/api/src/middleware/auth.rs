//! Bearer-token extractors.
//!
//! Handlers declare who may call them by the extractor they take:
//!
//! - [`RequireAuth`]: any valid token, else 401
//! - [`OptionalAuth`]: a valid token if present; bad tokens are ignored
//! - [`RequireCustomer`]: a customer token, 401 without a token, 403 for staff
//! - [`RequireStaff<R>`]: an employee whose role is in `R::ROLES`, else 401/403

use std::marker::PhantomData;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use digital_distributor_core::{EmployeeId, Role, UserId};

use crate::error::{AppError, set_sentry_user};
use crate::services::auth::Claims;
use crate::state::AppState;

/// The caller identified by a verified token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Option<UserId>,
    pub employee_id: Option<EmployeeId>,
    pub username: String,
    pub email: Option<String>,
    pub role: Role,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            employee_id: claims.employee_id,
            username: claims.username,
            email: claims.email,
            role: claims.role,
        }
    }
}

impl AuthUser {
    /// Whether the caller is an employee of any role.
    #[must_use]
    pub const fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    /// The customer id, if this is a customer token.
    #[must_use]
    pub const fn customer_id(&self) -> Option<UserId> {
        match (self.role, self.user_id) {
            (Role::User, Some(id)) => Some(id),
            _ => None,
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn unauthorized() -> AppError {
    AppError::Unauthorized("Authorization required".to_owned())
}

fn forbidden() -> AppError {
    AppError::Forbidden("Insufficient permissions".to_owned())
}

/// Extractor that requires a valid bearer token.
pub struct RequireAuth(pub AuthUser);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(unauthorized)?;
        let user = AuthUser::from(state.jwt().decode(token)?);

        match (user.user_id, user.employee_id) {
            (Some(id), _) => set_sentry_user(&format!("user:{id}"), &user.username),
            (None, Some(id)) => set_sentry_user(&format!("employee:{id}"), &user.username),
            (None, None) => {}
        }
        tracing::Span::current().record("role", user.role.as_str());

        Ok(Self(user))
    }
}

/// Extractor for routes that work with or without a caller.
pub struct OptionalAuth(pub Option<AuthUser>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = bearer_token(parts)
            .and_then(|token| state.jwt().decode(token).ok())
            .map(AuthUser::from);
        Ok(Self(user))
    }
}

/// A verified customer.
#[derive(Debug, Clone)]
pub struct Customer {
    pub id: UserId,
    pub username: String,
}

/// Extractor that requires a customer token.
pub struct RequireCustomer(pub Customer);

impl FromRequestParts<AppState> for RequireCustomer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;

        let id = user
            .customer_id()
            .ok_or_else(|| AppError::Forbidden("Available to customers only".to_owned()))?;

        Ok(Self(Customer {
            id,
            username: user.username,
        }))
    }
}

/// A set of staff roles allowed through [`RequireStaff`].
pub trait StaffRoles: Send + Sync {
    const ROLES: &'static [Role];
}

/// Moderators and admins.
pub struct Moderation;

impl StaffRoles for Moderation {
    const ROLES: &'static [Role] = &[Role::Moderator, Role::Admin];
}

/// Support agents and admins.
pub struct SupportDesk;

impl StaffRoles for SupportDesk {
    const ROLES: &'static [Role] = &[Role::Support, Role::Admin];
}

/// Analysts and admins.
pub struct Reporting;

impl StaffRoles for Reporting {
    const ROLES: &'static [Role] = &[Role::Analyst, Role::Admin];
}

/// Admins only.
pub struct AdminOnly;

impl StaffRoles for AdminOnly {
    const ROLES: &'static [Role] = &[Role::Admin];
}

/// A verified employee.
#[derive(Debug, Clone)]
pub struct StaffMember {
    pub id: EmployeeId,
    pub username: String,
    pub role: Role,
}

impl StaffMember {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Extractor that requires an employee token with one of `R::ROLES`.
pub struct RequireStaff<R: StaffRoles>(pub StaffMember, pub PhantomData<R>);

impl<R: StaffRoles> FromRequestParts<AppState> for RequireStaff<R> {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;

        if !R::ROLES.contains(&user.role) {
            return Err(forbidden());
        }
        let id = user.employee_id.ok_or_else(forbidden)?;

        Ok(Self(
            StaffMember {
                id,
                username: user.username,
                role: user.role,
            },
            PhantomData,
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/orders");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&parts_with(Some("Bearer abc.def"))), Some("abc.def"));
        assert_eq!(bearer_token(&parts_with(Some("Basic abc"))), None);
        assert_eq!(bearer_token(&parts_with(Some("Bearer "))), None);
        assert_eq!(bearer_token(&parts_with(None)), None);
    }

    #[test]
    fn test_customer_id_requires_user_role() {
        let mut user = AuthUser {
            user_id: Some(UserId::new(1)),
            employee_id: None,
            username: "alice".to_owned(),
            email: None,
            role: Role::User,
        };
        assert_eq!(user.customer_id(), Some(UserId::new(1)));

        user.role = Role::Admin;
        assert_eq!(user.customer_id(), None);
        assert!(user.is_staff());
    }

    #[test]
    fn test_role_sets() {
        assert!(Moderation::ROLES.contains(&Role::Admin));
        assert!(!Moderation::ROLES.contains(&Role::Support));
        assert!(SupportDesk::ROLES.contains(&Role::Support));
        assert!(!Reporting::ROLES.contains(&Role::User));
        assert_eq!(AdminOnly::ROLES, &[Role::Admin]);
    }
}
