//! Order history, checkout and cancellation.
//!
//! Every statement runs on the `normal_user` pool inside a transaction acting
//! as the caller, so RLS decides which sales are visible.

use std::collections::{HashMap, HashSet};

use axum::{Json, extract::State, http::StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use digital_distributor_core::{AppId, DbRole, OrderId, OrderStatus};

use crate::db::RepositoryError;
use crate::db::catalog::CatalogRepository;
use crate::db::orders;
use crate::error::{AppError, AppJson, AppPath, Result};
use crate::middleware::{RequireAuth, RequireCustomer};
use crate::models::order::{CreatedOrder, Order, PricedItem};
use crate::state::AppState;
use crate::validation::{Issues, Validate};

// =============================================================================
// Request / Response Types
// =============================================================================

const fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItem {
    pub app_id: AppId,
    /// Price the client displayed. Amounts are charged from the catalog.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Card,
    Wallet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    pub method: PaymentMethod,
    pub card_last4: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub items: Vec<CheckoutItem>,
    pub payment: PaymentDetails,
}

impl Validate for CheckoutRequest {
    fn validate(&self) -> std::result::Result<(), Issues> {
        let mut issues = Issues::new();

        if self.items.is_empty() {
            issues.field("items", "must contain at least 1 element(s)");
        }
        for (i, item) in self.items.iter().enumerate() {
            if item.app_id.as_i32() <= 0 {
                issues.field(&format!("items.{i}.appId"), "must be positive");
            }
            if item.price.is_sign_negative() {
                issues.field(&format!("items.{i}.price"), "must not be negative");
            }
            if item.quantity < 1 {
                issues.field(&format!("items.{i}.quantity"), "must be positive");
            }
        }
        if let Some(last4) = &self.payment.card_last4
            && last4.chars().count() != 4
        {
            issues.field("payment.cardLast4", "must contain exactly 4 character(s)");
        }

        issues.finish()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub status: &'static str,
    pub method: PaymentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_last4: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub orders: Vec<CreatedOrder>,
    pub payment: PaymentReceipt,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

// =============================================================================
// Handlers
// =============================================================================

/// `GET /api/orders`
///
/// Staff have no orders and get an empty list.
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    let Some(user_id) = caller.customer_id() else {
        return Ok(Json(Vec::new()));
    };

    let mut tx = state
        .pools()
        .begin_as(DbRole::User, Some(user_id.as_i32()))
        .await?;
    let orders = orders::list_visible(&mut tx).await?;
    tx.commit().await?;

    let base_url = &state.config().orders.download_base_url;
    Ok(Json(
        orders
            .into_iter()
            .map(|order| order.with_download_link(base_url))
            .collect(),
    ))
}

/// `POST /api/orders/checkout`
#[instrument(skip(state, customer, body), fields(user_id = %customer.id))]
pub async fn checkout(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    AppJson(body): AppJson<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>)> {
    body.validate()?;

    let app_ids = unique_app_ids(&body.items)?;

    let catalog = CatalogRepository::new(state.pools().pool(DbRole::User));
    let prices: HashMap<AppId, Decimal> = catalog.prices(&app_ids).await?.into_iter().collect();
    let priced = price_items(&body.items, &prices)?;

    let mut tx = state
        .pools()
        .begin_as(DbRole::User, Some(customer.id.as_i32()))
        .await?;

    if let Some(owned) = orders::owned_among(&mut tx, &app_ids).await?.first() {
        return Err(AppError::BadRequest(format!(
            "App {owned} is already purchased"
        )));
    }

    let mut created = Vec::with_capacity(priced.len());
    for item in priced {
        created.push(orders::insert(&mut tx, customer.id, item).await?);
    }
    tx.commit().await?;

    info!(orders = created.len(), "Checkout completed");

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            orders: created,
            payment: PaymentReceipt {
                status: "mocked",
                method: body.payment.method,
                card_last4: body.payment.card_last4,
            },
        }),
    ))
}

/// `PATCH /api/orders/{id}/cancel`
#[instrument(skip(state, customer), fields(user_id = %customer.id))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    AppPath(id): AppPath<OrderId>,
) -> Result<Json<MessageResponse>> {
    let mut tx = state
        .pools()
        .begin_as(DbRole::User, Some(customer.id.as_i32()))
        .await?;

    let status = orders::status(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_owned()))?;

    match status {
        OrderStatus::Completed => {
            return Err(AppError::BadRequest(
                "Completed orders cannot be cancelled".to_owned(),
            ));
        }
        OrderStatus::Cancelled => {
            return Err(AppError::BadRequest("Order is already cancelled".to_owned()));
        }
        OrderStatus::Created | OrderStatus::Processing => {}
    }

    orders::cancel(&mut tx, id).await.map_err(|e| match e {
        // Completed by the updater between the two statements.
        RepositoryError::NotFound => {
            AppError::BadRequest("Completed orders cannot be cancelled".to_owned())
        }
        other => other.into(),
    })?;
    tx.commit().await?;

    info!(order_id = %id, "Order cancelled");
    Ok(Json(MessageResponse {
        message: "Order cancelled",
    }))
}

// =============================================================================
// Helpers
// =============================================================================

/// App ids in request order, rejecting repeats.
fn unique_app_ids(items: &[CheckoutItem]) -> Result<Vec<AppId>> {
    let mut seen = HashSet::with_capacity(items.len());
    let mut ids = Vec::with_capacity(items.len());

    for item in items {
        if !seen.insert(item.app_id) {
            return Err(AppError::BadRequest(format!(
                "App {} appears more than once in the order",
                item.app_id
            )));
        }
        ids.push(item.app_id);
    }

    Ok(ids)
}

/// Charge each item at the catalog price times its quantity.
fn price_items(
    items: &[CheckoutItem],
    prices: &HashMap<AppId, Decimal>,
) -> Result<Vec<PricedItem>> {
    items
        .iter()
        .map(|item| {
            let price = prices
                .get(&item.app_id)
                .ok_or_else(|| AppError::BadRequest(format!("App {} not found", item.app_id)))?;
            Ok(PricedItem {
                app_id: item.app_id,
                amount: *price * Decimal::from(item.quantity),
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(app_id: i32, quantity: i32) -> CheckoutItem {
        CheckoutItem {
            app_id: AppId::new(app_id),
            price: Decimal::new(999, 2),
            quantity,
        }
    }

    #[test]
    fn test_quantity_defaults_to_one() {
        let body: CheckoutRequest = serde_json::from_str(
            r#"{"items":[{"appId":3,"price":9.99}],"payment":{"method":"wallet"}}"#,
        )
        .unwrap();
        assert_eq!(body.items[0].quantity, 1);
        assert_eq!(body.payment.method, PaymentMethod::Wallet);
        assert!(body.validate().is_ok());
    }

    #[test]
    fn test_unknown_payment_method_is_rejected() {
        let parsed = serde_json::from_str::<CheckoutRequest>(
            r#"{"items":[{"appId":3,"price":1}],"payment":{"method":"cash"}}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_validation_collects_item_problems() {
        let body = CheckoutRequest {
            items: vec![item(0, 0)],
            payment: PaymentDetails {
                method: PaymentMethod::Card,
                card_last4: Some("12345".to_owned()),
            },
        };
        let issues = body.validate().unwrap_err();
        assert!(issues.field_errors.contains_key("items.0.appId"));
        assert!(issues.field_errors.contains_key("items.0.quantity"));
        assert!(issues.field_errors.contains_key("payment.cardLast4"));

        let empty = CheckoutRequest {
            items: Vec::new(),
            payment: PaymentDetails {
                method: PaymentMethod::Card,
                card_last4: None,
            },
        };
        assert!(empty.validate().unwrap_err().field_errors.contains_key("items"));
    }

    #[test]
    fn test_duplicate_apps_rejected() {
        assert!(unique_app_ids(&[item(1, 1), item(2, 1)]).is_ok());
        assert!(matches!(
            unique_app_ids(&[item(1, 1), item(1, 2)]),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_amount_uses_catalog_price() {
        let prices = HashMap::from([(AppId::new(1), Decimal::new(1500, 2))]);
        let priced = price_items(&[item(1, 2)], &prices).unwrap();
        assert_eq!(priced[0].amount, Decimal::new(3000, 2));

        assert!(matches!(
            price_items(&[item(2, 1)], &prices),
            Err(AppError::BadRequest(_))
        ));
    }
}
