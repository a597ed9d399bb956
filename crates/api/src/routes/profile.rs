//! Customer profile changes.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use digital_distributor_core::DbRole;

use crate::db::users::UserRepository;
use crate::error::{AppError, AppJson, Result};
use crate::middleware::RequireCustomer;
use crate::models::user::User;
use crate::services::auth::{
    AuthError, AuthService, MAX_USERNAME_LENGTH, MIN_PASSWORD_LENGTH, MIN_USERNAME_LENGTH,
};
use crate::state::AppState;
use crate::validation::{Issues, Validate};

#[derive(Debug, Deserialize)]
pub struct UsernameChange {
    pub username: String,
}

impl Validate for UsernameChange {
    fn validate(&self) -> std::result::Result<(), Issues> {
        let mut issues = Issues::new();
        issues.length(
            "username",
            self.username.trim(),
            MIN_USERNAME_LENGTH,
            Some(MAX_USERNAME_LENGTH),
        );
        issues.finish()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub old_password: String,
    pub new_password: String,
}

impl Validate for PasswordChange {
    fn validate(&self) -> std::result::Result<(), Issues> {
        let mut issues = Issues::new();
        issues.length("oldPassword", &self.old_password, 1, None);
        issues.length("newPassword", &self.new_password, MIN_PASSWORD_LENGTH, None);
        issues.finish()
    }
}

#[derive(Debug, Serialize)]
pub struct Confirmation {
    pub message: &'static str,
}

/// `PATCH /api/profile/username`
#[instrument(skip(state, customer, body), fields(user_id = %customer.id))]
pub async fn update_username(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    AppJson(body): AppJson<UsernameChange>,
) -> Result<Json<User>> {
    body.validate()?;
    let username = body.username.trim();

    let users = UserRepository::new(state.pools().pool(DbRole::Admin));
    if users.username_taken(username, Some(customer.id)).await? {
        return Err(AuthError::UsernameTaken.into());
    }

    Ok(Json(users.update_username(customer.id, username).await?))
}

/// `PATCH /api/profile/password`
#[instrument(skip(state, customer, body), fields(user_id = %customer.id))]
pub async fn update_password(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    AppJson(body): AppJson<PasswordChange>,
) -> Result<Json<Confirmation>> {
    body.validate()?;

    let auth = AuthService::new(state.pools().pool(DbRole::Admin), state.jwt());
    auth.change_password(customer.id, &body.old_password, &body.new_password)
        .await
        .map_err(|e| match e {
            AuthError::PasswordNotSet => AppError::BadRequest(
                "No password is set for this account, contact support".to_owned(),
            ),
            other => other.into(),
        })?;

    Ok(Json(Confirmation {
        message: "Password changed",
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_change_rules() {
        let body: PasswordChange =
            serde_json::from_str(r#"{"oldPassword":"","newPassword":"abc"}"#).unwrap();
        let issues = body.validate().unwrap_err();
        assert!(issues.field_errors.contains_key("oldPassword"));
        assert!(issues.field_errors.contains_key("newPassword"));
    }

    #[test]
    fn test_username_is_trimmed_before_length_check() {
        let body = UsernameChange {
            username: "  ab  ".to_owned(),
        };
        assert!(body.validate().is_err());
    }
}
