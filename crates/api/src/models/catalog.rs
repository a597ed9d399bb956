//! Catalog types: apps, categories and providers.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use digital_distributor_core::{AppId, CategoryId, ProviderId, ProviderType};

/// A product category.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub title: String,
    pub description: Option<String>,
}

/// Category as embedded in an app.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryRef {
    pub id: CategoryId,
    pub title: String,
}

/// Provider as embedded in an app.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderSummary {
    pub id: ProviderId,
    pub name: String,
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    pub country: Option<String>,
}

/// Full provider profile.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: ProviderId,
    pub name: String,
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    pub description: Option<String>,
    pub country: Option<String>,
    pub founded_date: Option<NaiveDate>,
    pub web: Option<String>,
}

/// An app in the catalog with its category and provider.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct App {
    pub id: AppId,
    pub title: String,
    pub description: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub release_date: Option<NaiveDate>,
    pub category: Option<CategoryRef>,
    pub provider: Option<ProviderSummary>,
}

/// Fields for a new catalog entry.
#[derive(Debug, Clone)]
pub struct NewApp {
    pub provider_id: ProviderId,
    pub category_id: CategoryId,
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub cost_price: Decimal,
    pub release_date: NaiveDate,
}

/// Fields for a new provider.
#[derive(Debug, Clone)]
pub struct NewProvider {
    pub name: String,
    pub provider_type: ProviderType,
    pub description: Option<String>,
    pub country: String,
    pub founded_date: NaiveDate,
    pub web: Option<String>,
}
