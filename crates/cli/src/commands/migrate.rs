//! Database migration command.
//!
//! Applies `crates/api/migrations/` in order: enum types, tables and indexes,
//! the five login roles with their grants, then the row-level-security
//! policies. Already-applied migrations are skipped.

use super::{CommandError, connect_owner};

/// Run all pending migrations.
///
/// # Errors
///
/// Returns `CommandError` if the connection or any migration fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect_owner().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../api/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    tracing::warn!("Login roles have no password yet if this is a fresh database. Run 'dd-cli roles set-passwords'.");
    pool.close().await;
    Ok(())
}
