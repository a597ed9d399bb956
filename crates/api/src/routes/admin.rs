//! Back-office routes: staff accounts and catalog maintenance.

use axum::{Json, extract::State, http::StatusCode};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use digital_distributor_core::{CategoryId, DbRole, ProviderId, ProviderType, Role};

use crate::db::catalog::CatalogRepository;
use crate::db::employees::EmployeeRepository;
use crate::error::{AppJson, Result};
use crate::middleware::{AdminOnly, RequireStaff};
use crate::models::catalog::{App, Category, NewApp, NewProvider, Provider};
use crate::models::user::Employee;
use crate::services::auth::{
    MAX_USERNAME_LENGTH, MIN_PASSWORD_LENGTH, MIN_USERNAME_LENGTH, hash_password,
};
use crate::state::AppState;
use crate::validation::{Issues, Validate};

// =============================================================================
// Request / Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct NewEmployeeRequest {
    pub username: String,
    pub password: String,
    pub position: String,
}

impl Validate for NewEmployeeRequest {
    fn validate(&self) -> std::result::Result<(), Issues> {
        let mut issues = Issues::new();
        issues.length(
            "username",
            self.username.trim(),
            MIN_USERNAME_LENGTH,
            Some(MAX_USERNAME_LENGTH),
        );
        issues.length("password", &self.password, MIN_PASSWORD_LENGTH, None);
        issues.length("position", self.position.trim(), 1, Some(100));
        if Role::infer_staff(&self.position, &self.username).is_none() {
            issues.field("position", "does not map to a staff role");
        }
        issues.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct PasswordRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct PasswordHash {
    pub hash: String,
}

#[derive(Debug, Deserialize)]
pub struct NewProviderRequest {
    pub provider_name: String,
    pub provider_type: ProviderType,
    pub description: Option<String>,
    pub country: String,
    pub founded_date: NaiveDate,
    pub web: Option<String>,
}

impl Validate for NewProviderRequest {
    fn validate(&self) -> std::result::Result<(), Issues> {
        let mut issues = Issues::new();
        issues.length("provider_name", self.provider_name.trim(), 1, Some(100));
        issues.length("country", self.country.trim(), 2, Some(60));
        if let Some(web) = &self.web {
            issues.length("web", web.trim(), 1, Some(255));
        }
        issues.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct NewAppRequest {
    pub provider_id: ProviderId,
    pub category_id: CategoryId,
    pub title: String,
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub cost_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub release_date: NaiveDate,
}

impl Validate for NewAppRequest {
    fn validate(&self) -> std::result::Result<(), Issues> {
        let mut issues = Issues::new();
        issues.length("title", self.title.trim(), 1, Some(200));
        issues.length("description", self.description.trim(), 1, Some(5000));
        if self.cost_price.is_sign_negative() {
            issues.field("cost_price", "must not be negative");
        }
        if self.price.is_sign_negative() {
            issues.field("price", "must not be negative");
        }
        if self.price < self.cost_price {
            issues.form("price must not be lower than cost_price");
        }
        issues.finish()
    }
}

// =============================================================================
// Employees
// =============================================================================

/// `GET /api/admin/employees`
pub async fn list_employees(
    State(state): State<AppState>,
    _: RequireStaff<AdminOnly>,
) -> Result<Json<Vec<Employee>>> {
    let employees = EmployeeRepository::new(state.pools().pool(DbRole::Admin));
    Ok(Json(employees.list().await?))
}

/// `POST /api/admin/employees`
#[instrument(skip(state, body), fields(username = %body.username))]
pub async fn create_employee(
    State(state): State<AppState>,
    _: RequireStaff<AdminOnly>,
    AppJson(body): AppJson<NewEmployeeRequest>,
) -> Result<(StatusCode, Json<Employee>)> {
    body.validate()?;

    let password_hash = hash_password(&body.password)?;
    let employees = EmployeeRepository::new(state.pools().pool(DbRole::Admin));
    let employee = employees
        .create(body.username.trim(), &password_hash, body.position.trim())
        .await?;

    info!(employee_id = %employee.id, "Employee created");
    Ok((StatusCode::CREATED, Json(employee)))
}

/// `POST /api/admin/generate-password-hash`
pub async fn generate_password_hash(
    _: RequireStaff<AdminOnly>,
    AppJson(body): AppJson<PasswordRequest>,
) -> Result<Json<PasswordHash>> {
    let mut issues = Issues::new();
    issues.length("password", &body.password, 1, None);
    issues.finish()?;

    Ok(Json(PasswordHash {
        hash: hash_password(&body.password)?,
    }))
}

// =============================================================================
// Catalog
// =============================================================================

/// `GET /api/admin/providers`
pub async fn list_providers(
    State(state): State<AppState>,
    _: RequireStaff<AdminOnly>,
) -> Result<Json<Vec<Provider>>> {
    let catalog = CatalogRepository::new(state.pools().pool(DbRole::Admin));
    Ok(Json(catalog.list_providers().await?))
}

/// `POST /api/admin/providers`
pub async fn create_provider(
    State(state): State<AppState>,
    _: RequireStaff<AdminOnly>,
    AppJson(body): AppJson<NewProviderRequest>,
) -> Result<(StatusCode, Json<Provider>)> {
    body.validate()?;

    let catalog = CatalogRepository::new(state.pools().pool(DbRole::Admin));
    let provider = catalog
        .create_provider(&NewProvider {
            name: body.provider_name.trim().to_owned(),
            provider_type: body.provider_type,
            description: body.description,
            country: body.country.trim().to_owned(),
            founded_date: body.founded_date,
            web: body.web.map(|web| web.trim().to_owned()),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(provider)))
}

/// `GET /api/admin/categories`
pub async fn list_categories(
    State(state): State<AppState>,
    _: RequireStaff<AdminOnly>,
) -> Result<Json<Vec<Category>>> {
    let catalog = CatalogRepository::new(state.pools().pool(DbRole::Admin));
    Ok(Json(catalog.list_categories().await?))
}

/// `POST /api/admin/apps`
pub async fn create_app(
    State(state): State<AppState>,
    _: RequireStaff<AdminOnly>,
    AppJson(body): AppJson<NewAppRequest>,
) -> Result<(StatusCode, Json<App>)> {
    body.validate()?;

    let catalog = CatalogRepository::new(state.pools().pool(DbRole::Admin));
    let app = catalog
        .create_app(&NewApp {
            provider_id: body.provider_id,
            category_id: body.category_id,
            title: body.title.trim().to_owned(),
            description: body.description.trim().to_owned(),
            price: body.price,
            cost_price: body.cost_price,
            release_date: body.release_date,
        })
        .await?;

    info!(app_id = %app.id, "App added to catalog");
    Ok((StatusCode::CREATED, Json(app)))
}
