//! Integration tests for Digital Distributor.
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot`; no
//! socket is bound.
//!
//! # Running Tests
//!
//! ```bash
//! # Router tests (no database needed)
//! cargo test -p digital-distributor-integration-tests
//!
//! # Acceptance tests against a migrated database whose role logins use the
//! # password "test":
//! #   DATABASE_URL=$TEST_DATABASE_URL dd-cli migrate
//! #   DATABASE_URL=$TEST_DATABASE_URL DB_PASSWORD=test dd-cli roles set-passwords
//! TEST_DATABASE_URL=postgres://localhost:5432/dd_test \
//!     cargo test -p digital-distributor-integration-tests -- --ignored
//! ```
//!
//! # Test Files
//!
//! - `api_router` - auth, role and validation guards, health, headers
//! - `acceptance` - registration, checkout, reviews, moderation, support desk (database)
//! - `order_lifecycle` - auto-progression and cancellation (database)

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::missing_panics_doc
)]

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use digital_distributor_api::config::ApiConfig;
use digital_distributor_api::db::RolePools;
use digital_distributor_api::db::employees::EmployeeRepository;
use digital_distributor_api::services::auth::Claims;
use digital_distributor_api::state::AppState;
use digital_distributor_core::{DbRole, EmployeeId, Role, UserId};

/// Database used when `TEST_DATABASE_URL` is not set.
const DEFAULT_TEST_DATABASE_URL: &str = "postgres://localhost:5432/digital_distributor_test";

/// Connection URL for acceptance tests.
#[must_use]
pub fn database_url() -> String {
    std::env::var("TEST_DATABASE_URL").unwrap_or_else(|_| DEFAULT_TEST_DATABASE_URL.to_owned())
}

/// A response split into the parts tests look at.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// The application router plus the state behind it.
#[derive(Clone)]
pub struct TestContext {
    pub state: AppState,
}

impl TestContext {
    /// Build the app with pools that only connect when first used.
    ///
    /// Must be called inside a Tokio runtime.
    #[must_use]
    pub fn new() -> Self {
        let config = ApiConfig::for_tests(&database_url());
        let pools = RolePools::connect_lazy(&config.database).expect("valid test database URL");
        Self {
            state: AppState::new(config, pools),
        }
    }

    #[must_use]
    pub fn router(&self) -> Router {
        digital_distributor_api::app(self.state.clone())
    }

    #[must_use]
    pub fn pools(&self) -> &RolePools {
        self.state.pools()
    }

    /// Bearer token for a customer; the account need not exist.
    #[must_use]
    pub fn customer_token(&self, id: i32, username: &str) -> String {
        let now = Utc::now().timestamp();
        self.sign(&Claims {
            user_id: Some(UserId::new(id)),
            employee_id: None,
            username: username.to_owned(),
            email: Some(format!("{username}@example.com")),
            role: Role::User,
            iat: now,
            exp: now + 3600,
        })
    }

    /// Bearer token for an employee with `role`.
    #[must_use]
    pub fn staff_token(&self, id: i32, username: &str, role: Role) -> String {
        let now = Utc::now().timestamp();
        self.sign(&Claims {
            user_id: None,
            employee_id: Some(EmployeeId::new(id)),
            username: username.to_owned(),
            email: None,
            role,
            iat: now,
            exp: now + 3600,
        })
    }

    fn sign(&self, claims: &Claims) -> String {
        self.state.jwt().encode(claims).expect("token signs")
    }

    /// Send one request through a fresh router.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send_request(request).await
    }

    /// Send a prepared request through a fresh router.
    pub async fn send_request(&self, request: Request<Body>) -> TestResponse {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(Method::PATCH, uri, token, None).await
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A short unique suffix for usernames and catalog titles.
#[must_use]
pub fn unique(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}_{}", &id[..10])
}

/// Catalog rows created for one acceptance test.
#[derive(Debug, Clone, Copy)]
pub struct SeededApp {
    pub app_id: i32,
    pub provider_id: i32,
    pub category_id: i32,
}

/// Insert a provider, a category and one app priced at 9.99.
pub async fn seed_app(pools: &RolePools) -> SeededApp {
    let pool = pools.pool(DbRole::Admin);

    let category_id: i32 =
        sqlx::query_scalar("INSERT INTO categories (title) VALUES ($1) RETURNING category_id")
            .bind(unique("category"))
            .fetch_one(pool)
            .await
            .unwrap();

    let provider_id: i32 = sqlx::query_scalar(
        r"
        INSERT INTO providers (provider_name, provider_type, country, founded_date)
        VALUES ($1, 'developer', 'Finland', DATE '2015-06-01')
        RETURNING provider_id
        ",
    )
    .bind(unique("provider"))
    .fetch_one(pool)
    .await
    .unwrap();

    let app_id: i32 = sqlx::query_scalar(
        r"
        INSERT INTO apps (title, description, price, cost_price, release_date, category_id, provider_id)
        VALUES ($1, 'Seeded for tests', 9.99, 4.00, CURRENT_DATE, $2, $3)
        RETURNING app_id
        ",
    )
    .bind(unique("app"))
    .bind(category_id)
    .bind(provider_id)
    .fetch_one(pool)
    .await
    .unwrap();

    SeededApp {
        app_id,
        provider_id,
        category_id,
    }
}

/// Register a fresh customer through the API; returns `(user_id, token)`.
pub async fn register_customer(ctx: &TestContext) -> (i32, String) {
    let username = unique("cust");
    let resp = ctx
        .post(
            "/api/auth/register",
            None,
            serde_json::json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": "secret123"
            }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK, "{:?}", resp.body);

    let id = i32::try_from(resp.body["user"]["id"].as_i64().unwrap()).unwrap();
    let token = resp.body["token"].as_str().unwrap().to_owned();
    (id, token)
}

/// An employee row created for one acceptance test.
#[derive(Debug, Clone)]
pub struct StaffAccount {
    pub id: i32,
    pub username: String,
    pub token: String,
}

/// Insert an employee with `position` and mint a token for `role`.
pub async fn create_staff(ctx: &TestContext, role: Role, position: &str) -> StaffAccount {
    let employee = EmployeeRepository::new(ctx.pools().pool(DbRole::Admin))
        .create(&unique(role.as_str()), "unused", position)
        .await
        .unwrap();
    let id = employee.id.as_i32();
    let token = ctx.staff_token(id, &employee.username, role);

    StaffAccount {
        id,
        username: employee.username,
        token,
    }
}

/// Buy one app at its catalog price.
pub async fn checkout(ctx: &TestContext, token: &str, app_id: i32) -> TestResponse {
    ctx.post(
        "/api/orders/checkout",
        Some(token),
        serde_json::json!({
            "items": [{ "appId": app_id, "price": 9.99 }],
            "payment": { "method": "card", "cardLast4": "4242" }
        }),
    )
    .await
}
