//! Provider profile routes.

use axum::{Json, extract::State};

use digital_distributor_core::{DbRole, ProviderId};

use crate::db::catalog::CatalogRepository;
use crate::error::{AppError, AppPath, Result};
use crate::models::catalog::{App, Provider};
use crate::state::AppState;

/// `GET /api/providers/{id}`
pub async fn show(
    State(state): State<AppState>,
    AppPath(id): AppPath<ProviderId>,
) -> Result<Json<Provider>> {
    let catalog = CatalogRepository::new(state.pools().pool(DbRole::User));
    let provider = catalog
        .get_provider(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Provider not found".to_owned()))?;
    Ok(Json(provider))
}

/// `GET /api/providers/{id}/apps`
pub async fn apps(
    State(state): State<AppState>,
    AppPath(id): AppPath<ProviderId>,
) -> Result<Json<Vec<App>>> {
    let catalog = CatalogRepository::new(state.pools().pool(DbRole::User));
    Ok(Json(catalog.list_provider_apps(id).await?))
}
