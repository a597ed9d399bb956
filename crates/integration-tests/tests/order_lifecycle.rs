//! Order auto-progression against a real database.
//!
//! Kept in its own test binary: progression updates every order in the
//! database, so it must not race the other acceptance tests.
//!
//! Run with: cargo test -p digital-distributor-integration-tests -- --ignored

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::Value;

use digital_distributor_api::services::order_status::advance_order_statuses;
use digital_distributor_core::AutoProgression;
use digital_distributor_integration_tests::{
    TestContext, checkout, register_customer, seed_app,
};

fn find_order(orders: &Value, id: i64) -> &Value {
    orders
        .as_array()
        .unwrap()
        .iter()
        .find(|order| order["id"].as_i64() == Some(id))
        .unwrap()
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_orders_progress_by_age_and_completed_cannot_cancel() {
    let ctx = TestContext::new();
    let seeded = seed_app(ctx.pools()).await;
    let (_, token) = register_customer(&ctx).await;
    let progression = AutoProgression::default();

    let resp = checkout(&ctx, &token, seeded.app_id).await;
    assert_eq!(resp.status, StatusCode::CREATED);
    let order_id = resp.body["orders"][0]["id"].as_i64().unwrap();

    // 20s later: past the processing threshold, short of completion
    advance_order_statuses(ctx.pools(), &progression, Utc::now() + Duration::seconds(20))
        .await
        .unwrap();
    let orders = ctx.get("/api/orders", Some(&token)).await.body;
    let order = find_order(&orders, order_id);
    assert_eq!(order["status"], "processing");
    assert!(order["downloadLink"].is_null());

    advance_order_statuses(ctx.pools(), &progression, Utc::now() + Duration::seconds(60))
        .await
        .unwrap();
    let orders = ctx.get("/api/orders", Some(&token)).await.body;
    let order = find_order(&orders, order_id);
    assert_eq!(order["status"], "completed");
    assert_eq!(
        order["downloadLink"],
        format!("https://digitaldistributor.com/app/id={}", seeded.app_id)
    );

    let resp = ctx
        .patch(&format!("/api/orders/{order_id}/cancel"), Some(&token))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}
