//! Router tests that never reach the database.
//!
//! Every request here is rejected (or answered) by an extractor, validation
//! or middleware before a pool is touched, so the lazily-connecting pools
//! stay idle.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::json;

use digital_distributor_core::Role;
use digital_distributor_integration_tests::TestContext;

// ============================================================================
// Health & Headers
// ============================================================================

#[tokio::test]
async fn test_health_is_ok() {
    let ctx = TestContext::new();
    let resp = ctx.get("/api/health", None).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_security_headers_present() {
    let ctx = TestContext::new();
    let resp = ctx.get("/api/health", None).await;

    assert_eq!(resp.headers["x-frame-options"], "DENY");
    assert_eq!(resp.headers["x-content-type-options"], "nosniff");
    assert!(resp.headers.contains_key("content-security-policy"));
    assert!(resp.headers.contains_key("strict-transport-security"));
}

#[tokio::test]
async fn test_request_id_generated_when_missing() {
    let ctx = TestContext::new();
    let resp = ctx.get("/api/health", None).await;

    let id = resp.headers["x-request-id"].to_str().unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok());
}

#[tokio::test]
async fn test_request_id_echoed_from_caller() {
    let ctx = TestContext::new();
    let request = Request::builder()
        .uri("/api/health")
        .header("x-request-id", "edge-42")
        .body(Body::empty())
        .unwrap();
    let resp = ctx.send_request(request).await;

    assert_eq!(resp.headers["x-request-id"], "edge-42");
}

#[tokio::test]
async fn test_headers_set_on_error_responses() {
    let ctx = TestContext::new();
    let resp = ctx.get("/api/orders", None).await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers["x-content-type-options"], "nosniff");
    assert!(resp.headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_cors_preflight_allows_client_origin() {
    let ctx = TestContext::new();
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/orders/checkout")
        .header("origin", "http://localhost:5173")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "authorization,content-type")
        .body(Body::empty())
        .unwrap();
    let resp = ctx.send_request(request).await;

    assert_eq!(
        resp.headers["access-control-allow-origin"],
        "http://localhost:5173"
    );
    assert_eq!(resp.headers["access-control-allow-credentials"], "true");
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let ctx = TestContext::new();
    let resp = ctx.get("/api/nope", None).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_missing_token_is_401() {
    let ctx = TestContext::new();

    for uri in [
        "/api/orders",
        "/api/apps/owned",
        "/api/support",
        "/api/moderation/reviews",
        "/api/analytics/metrics",
        "/api/admin/employees",
    ] {
        let resp = ctx.get(uri, None).await;
        assert_eq!(resp.status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(resp.body["message"], "Authorization required", "{uri}");
    }
}

#[tokio::test]
async fn test_bad_token_is_401() {
    let ctx = TestContext::new();
    let resp = ctx.get("/api/orders", Some("not.a.token")).await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.body["message"], "Invalid token");
}

#[tokio::test]
async fn test_tampered_token_is_401() {
    let ctx = TestContext::new();
    let alice = ctx.customer_token(1, "alice");
    let bob = ctx.customer_token(2, "bob");

    // alice's claims under bob's signature
    let (alice_signed, _) = alice.rsplit_once('.').unwrap();
    let (_, bob_signature) = bob.rsplit_once('.').unwrap();
    let forged = format!("{alice_signed}.{bob_signature}");

    let resp = ctx.get("/api/orders", Some(&forged)).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Role Guards
// ============================================================================

#[tokio::test]
async fn test_customer_cannot_moderate() {
    let ctx = TestContext::new();
    let token = ctx.customer_token(1, "alice");

    let resp = ctx.get("/api/moderation/reviews", Some(&token)).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = ctx.patch("/api/moderation/reviews/1/approve", Some(&token)).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_staff_cannot_checkout() {
    let ctx = TestContext::new();
    let token = ctx.staff_token(1, "sam", Role::Support);

    let resp = ctx
        .post(
            "/api/orders/checkout",
            Some(&token),
            json!({
                "items": [{ "appId": 1, "price": 9.99 }],
                "payment": { "method": "card", "cardLast4": "4242" }
            }),
        )
        .await;

    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    assert_eq!(resp.body["message"], "Available to customers only");
}

#[tokio::test]
async fn test_staff_ownership_checks_are_403() {
    let ctx = TestContext::new();
    let token = ctx.staff_token(1, "sam", Role::Admin);

    for uri in ["/api/apps/owned", "/api/apps/1/owned"] {
        let resp = ctx.get(uri, Some(&token)).await;
        assert_eq!(resp.status, StatusCode::FORBIDDEN, "{uri}");
        assert_eq!(resp.body["message"], "Available to customers only", "{uri}");
    }
}

#[tokio::test]
async fn test_staff_have_no_orders() {
    let ctx = TestContext::new();
    let token = ctx.staff_token(1, "sam", Role::Support);

    let resp = ctx.get("/api/orders", Some(&token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body, json!([]));
}

#[tokio::test]
async fn test_staff_areas_check_role() {
    let ctx = TestContext::new();
    let moderator = ctx.staff_token(2, "mod", Role::Moderator);
    let analyst = ctx.staff_token(3, "ana", Role::Analyst);

    assert_eq!(
        ctx.get("/api/analytics/metrics", Some(&moderator)).await.status,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        ctx.get("/api/employee-support/requests", Some(&analyst)).await.status,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        ctx.get("/api/admin/employees", Some(&analyst)).await.status,
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn test_support_agent_cannot_close_requests() {
    let ctx = TestContext::new();
    let token = ctx.staff_token(4, "sue", Role::Support);

    let resp = ctx
        .patch("/api/employee-support/requests/1/close", Some(&token))
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_employee_cannot_use_profile_routes() {
    let ctx = TestContext::new();
    let token = ctx.staff_token(1, "root", Role::Admin);

    let resp = ctx
        .send(
            Method::PATCH,
            "/api/profile/username",
            Some(&token),
            Some(json!({ "username": "renamed" })),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn test_register_validation_errors() {
    let ctx = TestContext::new();
    let resp = ctx
        .post(
            "/api/auth/register",
            None,
            json!({ "username": "ab", "email": "nope", "password": "123" }),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.body["message"], "Invalid request data");
    let fields = &resp.body["issues"]["fieldErrors"];
    assert!(fields.get("username").is_some());
    assert!(fields.get("email").is_some());
    assert!(fields.get("password").is_some());
}

#[tokio::test]
async fn test_login_validation_errors() {
    let ctx = TestContext::new();
    let resp = ctx
        .post("/api/auth/login", None, json!({ "username": "x", "password": "" }))
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.body["issues"]["fieldErrors"].get("password").is_some());
}

#[tokio::test]
async fn test_checkout_requires_items() {
    let ctx = TestContext::new();
    let token = ctx.customer_token(1, "alice");

    let resp = ctx
        .post(
            "/api/orders/checkout",
            Some(&token),
            json!({ "items": [], "payment": { "method": "wallet" } }),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.body["issues"]["fieldErrors"].get("items").is_some());
}

#[tokio::test]
async fn test_checkout_rejects_duplicate_apps() {
    let ctx = TestContext::new();
    let token = ctx.customer_token(1, "alice");

    let resp = ctx
        .post(
            "/api/orders/checkout",
            Some(&token),
            json!({
                "items": [
                    { "appId": 7, "price": 5.0 },
                    { "appId": 7, "price": 5.0 }
                ],
                "payment": { "method": "card", "cardLast4": "4242" }
            }),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let ctx = TestContext::new();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header("content-type", "application/json")
        .body(Body::from("{\"username\":"))
        .unwrap();
    let resp = ctx.send_request(request).await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.body["message"].is_string());
}

#[tokio::test]
async fn test_non_numeric_path_id_is_400() {
    let ctx = TestContext::new();
    let resp = ctx.get("/api/apps/not-a-number", None).await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_review_body_validated_before_lookup() {
    let ctx = TestContext::new();
    let token = ctx.customer_token(1, "alice");

    let resp = ctx
        .post(
            "/api/apps/1/reviews",
            Some(&token),
            json!({ "evaluation": 9, "comment": "short" }),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    let fields = &resp.body["issues"]["fieldErrors"];
    assert!(fields.get("evaluation").is_some());
    assert!(fields.get("comment").is_some());
}

#[tokio::test]
async fn test_admin_app_price_below_cost_is_400() {
    let ctx = TestContext::new();
    let token = ctx.staff_token(1, "root", Role::Admin);

    let resp = ctx
        .post(
            "/api/admin/apps",
            Some(&token),
            json!({
                "provider_id": 1,
                "category_id": 1,
                "title": "Cheap Thrills",
                "description": "Sold at a loss",
                "cost_price": 10.0,
                "price": 5.0,
                "release_date": "2025-01-01"
            }),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.body["issues"]["formErrors"].as_array().unwrap().len(), 1);
}
