//! Catalog repository: apps, categories, providers.
//!
//! Reads are public and run on the `normal_user` pool without an RLS
//! identity. Writes come from `/api/admin` on the admin pool.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::instrument;

use digital_distributor_core::{AppId, CategoryId, ProviderId, ProviderType};

use super::{RepositoryError, conflict_on_unique};
use crate::models::catalog::{
    App, Category, CategoryRef, NewApp, NewProvider, Provider, ProviderSummary,
};

/// Columns selected for an [`App`], aliased for [`AppRow`].
pub(crate) const APP_SELECT: &str = r"
    SELECT a.app_id,
           a.title,
           a.description,
           a.price,
           a.release_date,
           c.category_id,
           c.title AS category_title,
           p.provider_id,
           p.provider_name,
           p.provider_type,
           p.country AS provider_country
";

/// Joins that go with [`APP_SELECT`].
pub(crate) const APP_JOINS: &str = r"
    LEFT JOIN categories c ON c.category_id = a.category_id
    LEFT JOIN providers p ON p.provider_id = a.provider_id
";

const APP_ORDER: &str = "ORDER BY a.release_date DESC NULLS LAST, a.title ASC";

#[derive(sqlx::FromRow)]
pub(crate) struct AppRow {
    app_id: AppId,
    title: String,
    description: Option<String>,
    price: Decimal,
    release_date: Option<NaiveDate>,
    category_id: Option<CategoryId>,
    category_title: Option<String>,
    provider_id: Option<ProviderId>,
    provider_name: Option<String>,
    provider_type: Option<ProviderType>,
    provider_country: Option<String>,
}

impl From<AppRow> for App {
    fn from(row: AppRow) -> Self {
        let category = row
            .category_id
            .zip(row.category_title)
            .map(|(id, title)| CategoryRef { id, title });

        let provider = match (row.provider_id, row.provider_name, row.provider_type) {
            (Some(id), Some(name), Some(provider_type)) => Some(ProviderSummary {
                id,
                name,
                provider_type,
                country: row.provider_country,
            }),
            _ => None,
        };

        Self {
            id: row.app_id,
            title: row.title,
            description: row.description,
            price: row.price,
            release_date: row.release_date,
            category,
            provider,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProviderRow {
    provider_id: ProviderId,
    provider_name: String,
    provider_type: ProviderType,
    description: Option<String>,
    country: Option<String>,
    founded_date: Option<NaiveDate>,
    web: Option<String>,
}

impl From<ProviderRow> for Provider {
    fn from(row: ProviderRow) -> Self {
        Self {
            id: row.provider_id,
            name: row.provider_name,
            provider_type: row.provider_type,
            description: row.description,
            country: row.country,
            founded_date: row.founded_date,
            web: row.web,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    category_id: CategoryId,
    title: String,
    description: Option<String>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.category_id,
            title: row.title,
            description: row.description,
        }
    }
}

/// Repository for the public catalog.
pub struct CatalogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Search the catalog.
    ///
    /// `search` matches title or description case-insensitively; an empty
    /// string matches everything.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_apps(
        &self,
        search: &str,
        category_id: Option<CategoryId>,
    ) -> Result<Vec<App>, RepositoryError> {
        let sql = format!(
            r"{APP_SELECT}
            FROM apps a
            {APP_JOINS}
            WHERE ($1 = '' OR a.title ILIKE '%' || $1 || '%' OR a.description ILIKE '%' || $1 || '%')
              AND ($2::INT IS NULL OR a.category_id = $2)
            {APP_ORDER}"
        );

        let rows = sqlx::query_as::<_, AppRow>(&sql)
            .bind(search.trim())
            .bind(category_id)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(App::from).collect())
    }

    /// Get one app.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_app(&self, id: AppId) -> Result<Option<App>, RepositoryError> {
        let sql = format!("{APP_SELECT} FROM apps a {APP_JOINS} WHERE a.app_id = $1");

        let row = sqlx::query_as::<_, AppRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(App::from))
    }

    /// Current catalog price for each of `ids` that exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn prices(&self, ids: &[AppId]) -> Result<Vec<(AppId, Decimal)>, RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(AppId::as_i32).collect();

        let rows = sqlx::query_as::<_, (AppId, Decimal)>(
            "SELECT app_id, price FROM apps WHERE app_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// All categories, alphabetically.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT category_id, title, description FROM categories ORDER BY title",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Category::from).collect())
    }

    /// Get one provider.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_provider(&self, id: ProviderId) -> Result<Option<Provider>, RepositoryError> {
        let row = sqlx::query_as::<_, ProviderRow>(
            r"
            SELECT provider_id, provider_name, provider_type, description, country, founded_date, web
            FROM providers
            WHERE provider_id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Provider::from))
    }

    /// All providers, alphabetically.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_providers(&self) -> Result<Vec<Provider>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProviderRow>(
            r"
            SELECT provider_id, provider_name, provider_type, description, country, founded_date, web
            FROM providers
            ORDER BY provider_name
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Provider::from).collect())
    }

    /// Apps published by one provider.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_provider_apps(&self, id: ProviderId) -> Result<Vec<App>, RepositoryError> {
        let sql = format!("{APP_SELECT} FROM apps a {APP_JOINS} WHERE a.provider_id = $1 {APP_ORDER}");

        let rows = sqlx::query_as::<_, AppRow>(&sql)
            .bind(id)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(App::from).collect())
    }

    /// Add a provider.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    /// Returns `RepositoryError::Database` for other database errors.
    #[instrument(skip(self, provider), fields(name = %provider.name))]
    pub async fn create_provider(&self, provider: &NewProvider) -> Result<Provider, RepositoryError> {
        let row = sqlx::query_as::<_, ProviderRow>(
            r"
            INSERT INTO providers (provider_name, provider_type, description, country, founded_date, web)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING provider_id, provider_name, provider_type, description, country, founded_date, web
            ",
        )
        .bind(&provider.name)
        .bind(provider.provider_type)
        .bind(&provider.description)
        .bind(&provider.country)
        .bind(provider.founded_date)
        .bind(&provider.web)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "provider already exists"))?;

        Ok(row.into())
    }

    /// Add an app and return it with its category and provider.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the provider or category does
    /// not exist.
    /// Returns `RepositoryError::Database` for other database errors.
    #[instrument(skip(self, app), fields(title = %app.title))]
    pub async fn create_app(&self, app: &NewApp) -> Result<App, RepositoryError> {
        let id: AppId = sqlx::query_scalar(
            r"
            INSERT INTO apps (title, description, price, cost_price, release_date, category_id, provider_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING app_id
            ",
        )
        .bind(&app.title)
        .bind(&app.description)
        .bind(app.price)
        .bind(app.cost_price)
        .bind(app.release_date)
        .bind(app.category_id)
        .bind(app.provider_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return RepositoryError::Conflict("unknown provider or category".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        self.get_app(id).await?.ok_or(RepositoryError::NotFound)
    }
}
