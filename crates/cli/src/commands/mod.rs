//! Subcommand implementations.

pub mod employee;
pub mod migrate;
pub mod roles;

use digital_distributor_api::config::ConfigError;
use digital_distributor_api::db::RepositoryError;
use digital_distributor_api::services::auth::AuthError;
use sqlx::PgPool;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Role passwords could not be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Database connection or query error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A migration failed to apply.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Position maps to no staff role.
    #[error("Position {0:?} does not map to a staff role (admin, moderator, support, analyst)")]
    InvalidPosition(String),

    /// Input rejected before touching the database.
    #[error("Invalid {0}: {1}")]
    InvalidInput(&'static str, String),

    /// Repository error.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Password hashing failed.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Connect with `DATABASE_URL` exactly as configured (owner credentials).
async fn connect_owner() -> Result<PgPool, CommandError> {
    let database_url =
        std::env::var("DATABASE_URL").map_err(|_| CommandError::MissingEnvVar("DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    Ok(PgPool::connect(&database_url).await?)
}
