//! Registration, login and username availability.

use axum::{Json, extract::State};
use digital_distributor_core::{DbRole, Email};
use serde::{Deserialize, Serialize};

use crate::error::{AppJson, AppQuery, Result};
use crate::services::auth::{
    AuthService, Login, MAX_USERNAME_LENGTH, MIN_PASSWORD_LENGTH, MIN_USERNAME_LENGTH,
    Registration,
};
use crate::state::AppState;
use crate::validation::{Issues, Validate};

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

impl RegisterRequest {
    /// Check every field and hand back the parsed email.
    fn validate(&self) -> std::result::Result<Email, Issues> {
        let mut issues = Issues::new();
        let email = issues.email("email", self.email.trim());
        issues.length(
            "username",
            self.username.trim(),
            MIN_USERNAME_LENGTH,
            Some(MAX_USERNAME_LENGTH),
        );
        issues.length("password", &self.password, MIN_PASSWORD_LENGTH, None);

        match email {
            Some(email) if issues.is_empty() => Ok(email),
            _ => Err(issues),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> std::result::Result<(), Issues> {
        let mut issues = Issues::new();
        issues.length("username", &self.username, MIN_USERNAME_LENGTH, None);
        issues.length("password", &self.password, 1, None);
        issues.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct UsernameQuery {
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct Availability {
    pub available: bool,
}

// =============================================================================
// Handlers
// =============================================================================

/// `POST /api/auth/register`
pub async fn register(
    State(state): State<AppState>,
    AppJson(body): AppJson<RegisterRequest>,
) -> Result<Json<Registration>> {
    let email = body.validate()?;

    let auth = AuthService::new(state.pools().pool(DbRole::Admin), state.jwt());
    let registration = auth
        .register(body.username.trim(), &email, &body.password)
        .await?;

    Ok(Json(registration))
}

/// `GET /api/auth/check-username?username=`
pub async fn check_username(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<UsernameQuery>,
) -> Result<Json<Availability>> {
    let auth = AuthService::new(state.pools().pool(DbRole::Admin), state.jwt());
    let available = auth.username_available(query.username.trim()).await?;
    Ok(Json(Availability { available }))
}

/// `POST /api/auth/login`
pub async fn login(
    State(state): State<AppState>,
    AppJson(body): AppJson<LoginRequest>,
) -> Result<Json<Login>> {
    body.validate()?;

    let auth = AuthService::new(state.pools().pool(DbRole::Admin), state.jwt());
    let login = auth.login(body.username.trim(), &body.password).await?;

    Ok(Json(login))
}
