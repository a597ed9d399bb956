//! Acceptance tests against a real database.
//!
//! These tests require a migrated `PostgreSQL` database at
//! `TEST_DATABASE_URL` whose role logins use the password `test`.
//!
//! Run with: cargo test -p digital-distributor-integration-tests -- --ignored

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::StatusCode;
use serde_json::json;

use digital_distributor_core::Role;
use digital_distributor_integration_tests::{
    TestContext, checkout, create_staff, register_customer, seed_app, unique,
};

// ============================================================================
// Auth
// ============================================================================

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_register_then_login() {
    let ctx = TestContext::new();
    let username = unique("reg");

    let resp = ctx
        .post(
            "/api/auth/register",
            None,
            json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": "secret123"
            }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["user"]["username"], username.as_str());

    let availability = ctx
        .get(&format!("/api/auth/check-username?username={username}"), None)
        .await;
    assert_eq!(availability.body["available"], false);

    let resp = ctx
        .post(
            "/api/auth/login",
            None,
            json!({ "username": username, "password": "secret123" }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["isEmployee"], false);
    assert_eq!(resp.body["user"]["role"], "user");
    assert!(resp.body["token"].is_string());

    let resp = ctx
        .post(
            "/api/auth/login",
            None,
            json!({ "username": username, "password": "wrong-password" }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_duplicate_email_rejected() {
    let ctx = TestContext::new();
    let username = unique("dup");
    let body = json!({
        "username": username,
        "email": format!("{username}@example.com"),
        "password": "secret123"
    });

    assert_eq!(
        ctx.post("/api/auth/register", None, body).await.status,
        StatusCode::OK
    );

    let again = json!({
        "username": unique("dup"),
        "email": format!("{username}@example.com"),
        "password": "secret123"
    });
    let resp = ctx.post("/api/auth/register", None, again).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Orders
// ============================================================================

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_checkout_twice_is_rejected() {
    let ctx = TestContext::new();
    let seeded = seed_app(ctx.pools()).await;
    let (_, token) = register_customer(&ctx).await;

    let resp = checkout(&ctx, &token, seeded.app_id).await;
    assert_eq!(resp.status, StatusCode::CREATED, "{:?}", resp.body);
    assert_eq!(resp.body["orders"][0]["status"], "created");
    assert_eq!(resp.body["orders"][0]["amount"], 9.99);
    assert_eq!(resp.body["payment"]["status"], "mocked");

    let resp = checkout(&ctx, &token, seeded.app_id).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        resp.body["message"],
        format!("App {} is already purchased", seeded.app_id)
    );

    let owned = ctx
        .get(&format!("/api/apps/{}/owned", seeded.app_id), Some(&token))
        .await;
    assert_eq!(owned.body["owned"], true);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_customers_only_see_their_own_orders() {
    let ctx = TestContext::new();
    let seeded = seed_app(ctx.pools()).await;
    let (_, alice) = register_customer(&ctx).await;
    let (_, bob) = register_customer(&ctx).await;

    let resp = checkout(&ctx, &alice, seeded.app_id).await;
    let order_id = resp.body["orders"][0]["id"].as_i64().unwrap();

    let bobs_orders = ctx.get("/api/orders", Some(&bob)).await;
    assert_eq!(bobs_orders.body, json!([]));

    let resp = ctx
        .patch(&format!("/api/orders/{order_id}/cancel"), Some(&bob))
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let resp = ctx
        .patch(&format!("/api/orders/{order_id}/cancel"), Some(&alice))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["message"], "Order cancelled");

    // A cancelled purchase does not count as ownership
    let resp = checkout(&ctx, &alice, seeded.app_id).await;
    assert_eq!(resp.status, StatusCode::CREATED);
}

// ============================================================================
// Reviews
// ============================================================================

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_review_resubmission_after_rejection() {
    let ctx = TestContext::new();
    let seeded = seed_app(ctx.pools()).await;
    let (_, token) = register_customer(&ctx).await;
    let reviews_uri = format!("/api/apps/{}/reviews", seeded.app_id);
    let review = json!({ "evaluation": 4, "comment": "Solid game, a bit short." });

    let resp = ctx.post(&reviews_uri, Some(&token), review.clone()).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    checkout(&ctx, &token, seeded.app_id).await;

    let resp = ctx.post(&reviews_uri, Some(&token), review.clone()).await;
    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(resp.body["status"], "pending");
    let review_id = resp.body["id"].as_i64().unwrap();

    let resp = ctx.post(&reviews_uri, Some(&token), review.clone()).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    // Pending reviews are not public yet
    let public = ctx.get(&reviews_uri, None).await;
    assert_eq!(public.body["reviews"], json!([]));

    let moderator = create_staff(&ctx, Role::Moderator, "Moderator").await;
    let moderator_token = moderator.token;

    let resp = ctx
        .patch(
            &format!("/api/moderation/reviews/{review_id}/reject"),
            Some(&moderator_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["review"]["status"], "rejected");

    let resp = ctx.post(&reviews_uri, Some(&token), review).await;
    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(resp.body["status"], "pending");
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_moderation_decision_is_final() {
    let ctx = TestContext::new();
    let seeded = seed_app(ctx.pools()).await;
    let (_, token) = register_customer(&ctx).await;
    checkout(&ctx, &token, seeded.app_id).await;

    let resp = ctx
        .post(
            &format!("/api/apps/{}/reviews", seeded.app_id),
            Some(&token),
            json!({ "evaluation": 5, "comment": "Great puzzles, lovely music." }),
        )
        .await;
    let review_id = resp.body["id"].as_i64().unwrap();

    let moderator = create_staff(&ctx, Role::Moderator, "Moderator").await;
    let approve = format!("/api/moderation/reviews/{review_id}/approve");
    let reject = format!("/api/moderation/reviews/{review_id}/reject");

    let resp = ctx.patch(&approve, Some(&moderator.token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["review"]["status"], "approved");

    let resp = ctx.patch(&reject, Some(&moderator.token)).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.body["message"], "review is already approved");

    let resp = ctx.patch(&approve, Some(&moderator.token)).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = ctx
        .patch("/api/moderation/reviews/2147483647/approve", Some(&moderator.token))
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Support
// ============================================================================

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_support_request_requires_own_order() {
    let ctx = TestContext::new();
    let seeded = seed_app(ctx.pools()).await;
    let (_, alice) = register_customer(&ctx).await;
    let (_, bob) = register_customer(&ctx).await;

    let resp = checkout(&ctx, &alice, seeded.app_id).await;
    let order_id = resp.body["orders"][0]["id"].as_i64().unwrap();
    let request = json!({
        "subject": "Download fails",
        "message": "The download link returns an error page.",
        "orderId": order_id
    });

    let resp = ctx.post("/api/support", Some(&bob), request.clone()).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = ctx.post("/api/support", Some(&alice), request).await;
    assert_eq!(resp.status, StatusCode::CREATED);
    let request_id = resp.body["id"].as_i64().unwrap();

    let messages = ctx
        .get(&format!("/api/support/{request_id}/messages"), Some(&alice))
        .await;
    assert_eq!(messages.status, StatusCode::OK);
    assert_eq!(messages.body.as_array().unwrap().len(), 1);

    let resp = ctx
        .get(&format!("/api/support/{request_id}/messages"), Some(&bob))
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

/// Open a support request for a fresh purchase; returns `(customer token, request id)`.
async fn open_request(ctx: &TestContext) -> (String, i64) {
    let seeded = seed_app(ctx.pools()).await;
    let (_, token) = register_customer(ctx).await;
    let resp = checkout(ctx, &token, seeded.app_id).await;
    let order_id = resp.body["orders"][0]["id"].as_i64().unwrap();

    let resp = ctx
        .post(
            "/api/support",
            Some(&token),
            json!({
                "subject": "Licence key missing",
                "message": "The order completed but no key was shown.",
                "orderId": order_id
            }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED, "{:?}", resp.body);

    (token, resp.body["id"].as_i64().unwrap())
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_only_assignee_replies_and_customer_sees_support_team() {
    let ctx = TestContext::new();
    let (customer, request_id) = open_request(&ctx).await;
    let agent = create_staff(&ctx, Role::Support, "Support specialist").await;
    let other_agent = create_staff(&ctx, Role::Support, "Support specialist").await;
    let base = format!("/api/employee-support/requests/{request_id}");
    let reply = json!({ "message": "We are looking into it." });

    let resp = ctx.patch(&format!("{base}/take"), Some(&agent.token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["request"]["status"], "processing");

    let resp = ctx
        .post(&format!("{base}/messages"), Some(&other_agent.token), reply.clone())
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = ctx
        .post(&format!("{base}/messages"), Some(&agent.token), reply)
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);

    // Customers see a generic name for staff, staff see the agent
    let customer_view = ctx
        .get(&format!("/api/support/{request_id}/messages"), Some(&customer))
        .await;
    let staff_reply = customer_view
        .body
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["senderType"] == "employee")
        .unwrap();
    assert_eq!(staff_reply["senderUsername"], "Support team");

    let staff_view = ctx
        .get(&format!("{base}/messages"), Some(&other_agent.token))
        .await;
    let staff_reply = staff_view
        .body
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["senderType"] == "employee")
        .unwrap();
    assert_eq!(staff_reply["senderUsername"], agent.username.as_str());
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_completed_request_is_read_only() {
    let ctx = TestContext::new();
    let (customer, request_id) = open_request(&ctx).await;
    let agent = create_staff(&ctx, Role::Support, "Support specialist").await;
    let admin = create_staff(&ctx, Role::Admin, "Administrator").await;
    let base = format!("/api/employee-support/requests/{request_id}");
    let reply = json!({ "message": "Any update?" });

    let resp = ctx.patch(&format!("{base}/close"), Some(&agent.token)).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = ctx.patch(&format!("{base}/close"), Some(&admin.token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body["request"]["status"], "completed");

    let resp = ctx.patch(&format!("{base}/take"), Some(&agent.token)).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = ctx
        .post(
            &format!("/api/support/{request_id}/messages"),
            Some(&customer),
            reply.clone(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = ctx
        .post(&format!("{base}/messages"), Some(&admin.token), reply)
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}
