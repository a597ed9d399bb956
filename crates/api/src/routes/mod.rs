//! HTTP route handlers for the JSON API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /api/health                                - Liveness
//! GET    /api/health/ready                          - Readiness (database)
//!
//! # Auth
//! POST   /api/auth/register                         - Register a customer
//! GET    /api/auth/check-username                   - Username availability
//! POST   /api/auth/login                            - Customer or employee login
//!
//! # Catalog (public unless noted)
//! GET    /api/apps                                  - Search apps
//! GET    /api/apps/categories                       - Categories
//! GET    /api/apps/owned                            - Caller's apps (customer)
//! GET    /api/apps/{id}                             - App detail
//! GET    /api/apps/{id}/owned                       - Ownership flag (customer)
//! GET    /api/apps/{id}/reviews                     - Published + own review
//! POST   /api/apps/{id}/reviews                     - Submit review (customer)
//! GET    /api/providers/{id}                        - Provider profile
//! GET    /api/providers/{id}/apps                   - Provider's apps
//!
//! # Orders
//! GET    /api/orders                                - Caller's orders
//! POST   /api/orders/checkout                       - Buy apps (customer)
//! PATCH  /api/orders/{id}/cancel                    - Cancel (customer)
//!
//! # Support (customer)
//! POST   /api/support                               - Open request
//! GET    /api/support                               - Caller's requests
//! GET    /api/support/{id}/messages                 - Chat
//! POST   /api/support/{id}/messages                 - Reply
//!
//! # Employee support (support, admin)
//! GET    /api/employee-support/requests             - Queue
//! PATCH  /api/employee-support/requests/{id}/take   - Assign to self
//! GET    /api/employee-support/requests/{id}/messages
//! POST   /api/employee-support/requests/{id}/messages
//! PATCH  /api/employee-support/requests/{id}/close  - Close (admin)
//!
//! # Moderation (moderator, admin)
//! GET    /api/moderation/reviews                    - Queue
//! PATCH  /api/moderation/reviews/{id}/approve
//! PATCH  /api/moderation/reviews/{id}/reject
//!
//! # Analytics (analyst, admin)
//! GET    /api/analytics/metrics
//! GET    /api/analytics/top-apps
//! GET    /api/analytics/sales-by-day
//! GET    /api/analytics/sales-by-category
//! GET    /api/analytics/users-growth
//! GET    /api/analytics/orders
//! GET    /api/analytics/users/{id}/purchases
//!
//! # Admin
//! GET    /api/admin/employees
//! POST   /api/admin/employees
//! POST   /api/admin/generate-password-hash
//! GET    /api/admin/providers
//! POST   /api/admin/providers
//! GET    /api/admin/categories
//! POST   /api/admin/apps
//!
//! # Profile (customer)
//! PATCH  /api/profile/username
//! PATCH  /api/profile/password
//! ```

pub mod admin;
pub mod analytics;
pub mod apps;
pub mod auth;
pub mod employee_support;
pub mod moderation;
pub mod orders;
pub mod profile;
pub mod providers;
pub mod support;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, patch, post},
};
use serde_json::{Value, json};

use digital_distributor_core::DbRole;

use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/check-username", get(auth::check_username))
        .route("/login", post(auth::login))
}

/// Create the catalog routes router.
pub fn app_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(apps::list))
        .route("/categories", get(apps::categories))
        .route("/owned", get(apps::owned))
        .route("/{id}", get(apps::show))
        .route("/{id}/owned", get(apps::is_owned))
        .route(
            "/{id}/reviews",
            get(apps::list_reviews).post(apps::create_review),
        )
}

/// Create the provider routes router.
pub fn provider_routes() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(providers::show))
        .route("/{id}/apps", get(providers::apps))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::list))
        .route("/checkout", post(orders::checkout))
        .route("/{id}/cancel", patch(orders::cancel))
}

/// Create the customer support routes router.
pub fn support_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(support::list).post(support::open))
        .route(
            "/{id}/messages",
            get(support::messages).post(support::post_message),
        )
}

/// Create the staff support routes router.
pub fn employee_support_routes() -> Router<AppState> {
    Router::new()
        .route("/requests", get(employee_support::list))
        .route("/requests/{id}/take", patch(employee_support::take))
        .route(
            "/requests/{id}/messages",
            get(employee_support::messages).post(employee_support::post_message),
        )
        .route("/requests/{id}/close", patch(employee_support::close))
}

/// Create the moderation routes router.
pub fn moderation_routes() -> Router<AppState> {
    Router::new()
        .route("/reviews", get(moderation::list))
        .route("/reviews/{id}/approve", patch(moderation::approve))
        .route("/reviews/{id}/reject", patch(moderation::reject))
}

/// Create the analytics routes router.
pub fn analytics_routes() -> Router<AppState> {
    Router::new()
        .route("/metrics", get(analytics::metrics))
        .route("/top-apps", get(analytics::top_apps))
        .route("/sales-by-day", get(analytics::sales_by_day))
        .route("/sales-by-category", get(analytics::sales_by_category))
        .route("/users-growth", get(analytics::users_growth))
        .route("/orders", get(analytics::orders))
        .route("/users/{id}/purchases", get(analytics::user_purchases))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/employees",
            get(admin::list_employees).post(admin::create_employee),
        )
        .route(
            "/generate-password-hash",
            post(admin::generate_password_hash),
        )
        .route(
            "/providers",
            get(admin::list_providers).post(admin::create_provider),
        )
        .route("/categories", get(admin::list_categories))
        .route("/apps", post(admin::create_app))
}

/// Create the profile routes router.
pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/username", patch(profile::update_username))
        .route("/password", patch(profile::update_password))
}

/// Create all routes, nested under `/api`.
pub fn routes() -> Router<AppState> {
    let api = Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/auth", auth_routes())
        .nest("/apps", app_routes())
        .nest("/providers", provider_routes())
        .nest("/orders", order_routes())
        .nest("/support", support_routes())
        .nest("/employee-support", employee_support_routes())
        .nest("/moderation", moderation_routes())
        .nest("/analytics", analytics_routes())
        .nest("/admin", admin_routes())
        .nest("/profile", profile_routes());

    Router::new().nest("/api", api)
}

/// Liveness health check endpoint.
///
/// Does not check dependencies.
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1")
        .fetch_one(state.pools().pool(DbRole::Admin))
        .await
    {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
