//! Catalog and review routes.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use digital_distributor_core::{AppId, CategoryId, DbRole};

use crate::db::catalog::CatalogRepository;
use crate::db::{orders, reviews};
use crate::error::{AppError, AppJson, AppPath, AppQuery, Result};
use crate::middleware::{Customer, OptionalAuth, RequireCustomer};
use crate::models::catalog::{App, Category};
use crate::models::review::Review;
use crate::state::AppState;
use crate::validation::{Issues, Validate};

const MIN_COMMENT_LENGTH: usize = 10;
const MAX_COMMENT_LENGTH: usize = 2000;

// =============================================================================
// Request / Response Types
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogQuery {
    #[serde(default)]
    pub search: String,
    pub category_id: Option<CategoryId>,
}

#[derive(Debug, Serialize)]
pub struct Ownership {
    pub owned: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppReviews {
    pub reviews: Vec<Review>,
    pub user_review: Option<Review>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub evaluation: i16,
    pub comment: String,
}

impl Validate for ReviewRequest {
    fn validate(&self) -> std::result::Result<(), Issues> {
        let mut issues = Issues::new();
        issues.range("evaluation", &self.evaluation, &1, &5);
        issues.length(
            "comment",
            self.comment.trim(),
            MIN_COMMENT_LENGTH,
            Some(MAX_COMMENT_LENGTH),
        );
        issues.finish()
    }
}

fn app_not_found() -> AppError {
    AppError::NotFound("App not found".to_owned())
}

// =============================================================================
// Catalog
// =============================================================================

/// `GET /api/apps?search=&categoryId=`
pub async fn list(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<CatalogQuery>,
) -> Result<Json<Vec<App>>> {
    let catalog = CatalogRepository::new(state.pools().pool(DbRole::User));
    let apps = catalog.list_apps(&query.search, query.category_id).await?;
    Ok(Json(apps))
}

/// `GET /api/apps/categories`
pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    let catalog = CatalogRepository::new(state.pools().pool(DbRole::User));
    Ok(Json(catalog.list_categories().await?))
}

/// `GET /api/apps/{id}`
pub async fn show(
    State(state): State<AppState>,
    AppPath(id): AppPath<AppId>,
) -> Result<Json<App>> {
    let catalog = CatalogRepository::new(state.pools().pool(DbRole::User));
    let app = catalog.get_app(id).await?.ok_or_else(app_not_found)?;
    Ok(Json(app))
}

// =============================================================================
// Ownership
// =============================================================================

/// `GET /api/apps/owned`
pub async fn owned(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
) -> Result<Json<Vec<App>>> {
    let mut tx = state
        .pools()
        .begin_as(DbRole::User, Some(customer.id.as_i32()))
        .await?;
    let apps = orders::owned_apps(&mut tx).await?;
    tx.commit().await?;

    Ok(Json(apps))
}

/// `GET /api/apps/{id}/owned`
pub async fn is_owned(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    AppPath(id): AppPath<AppId>,
) -> Result<Json<Ownership>> {
    let mut tx = state
        .pools()
        .begin_as(DbRole::User, Some(customer.id.as_i32()))
        .await?;
    let owned = orders::owns_app(&mut tx, id).await?;
    tx.commit().await?;

    Ok(Json(Ownership { owned }))
}

// =============================================================================
// Reviews
// =============================================================================

/// `GET /api/apps/{id}/reviews`
///
/// Published reviews for everyone. A signed-in customer also gets their own
/// review back whatever its status.
pub async fn list_reviews(
    State(state): State<AppState>,
    OptionalAuth(caller): OptionalAuth,
    AppPath(id): AppPath<AppId>,
) -> Result<Json<AppReviews>> {
    let acting = caller.as_ref().and_then(|user| user.customer_id());

    let mut tx = state
        .pools()
        .begin_as(DbRole::User, acting.map(|id| id.as_i32()))
        .await?;
    let published = reviews::list_approved(&mut tx, id).await?;
    let user_review = match acting {
        Some(user_id) => reviews::own_review(&mut tx, id, user_id).await?,
        None => None,
    };
    tx.commit().await?;

    Ok(Json(AppReviews {
        reviews: published,
        user_review,
    }))
}

/// `POST /api/apps/{id}/reviews`
#[instrument(skip(state, customer, body), fields(user_id = %customer.id))]
pub async fn create_review(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    AppPath(id): AppPath<AppId>,
    AppJson(body): AppJson<ReviewRequest>,
) -> Result<(StatusCode, Json<Review>)> {
    body.validate()?;
    let review = submit_review(&state, &customer, id, &body).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

async fn submit_review(
    state: &AppState,
    customer: &Customer,
    app_id: AppId,
    body: &ReviewRequest,
) -> Result<Review> {
    let catalog = CatalogRepository::new(state.pools().pool(DbRole::User));
    if catalog.get_app(app_id).await?.is_none() {
        return Err(app_not_found());
    }

    let mut tx = state
        .pools()
        .begin_as(DbRole::User, Some(customer.id.as_i32()))
        .await?;

    if !orders::owns_app(&mut tx, app_id).await? {
        return Err(AppError::Forbidden(
            "You can only review apps you have purchased".to_owned(),
        ));
    }

    let review = reviews::submit(
        &mut tx,
        app_id,
        customer.id,
        body.evaluation,
        body.comment.trim(),
    )
    .await?;
    tx.commit().await?;

    Ok(review)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_review_rules() {
        let ok = ReviewRequest {
            evaluation: 5,
            comment: "Works great on my laptop".to_owned(),
        };
        assert!(ok.validate().is_ok());

        let bad = ReviewRequest {
            evaluation: 6,
            comment: "  short   ".to_owned(),
        };
        let issues = bad.validate().unwrap_err();
        assert!(issues.field_errors.contains_key("evaluation"));
        assert!(issues.field_errors.contains_key("comment"));
    }

    #[test]
    fn test_catalog_query_defaults() {
        let query: CatalogQuery = serde_json::from_str("{}").unwrap_or_default();
        assert!(query.search.is_empty());
        assert!(query.category_id.is_none());
    }
}
