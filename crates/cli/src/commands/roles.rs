//! Database login role management.
//!
//! Passwords are resolved exactly as the API resolves them
//! (`DB_<ROLE>_PASSWORD`, falling back to `DB_PASSWORD`), so running this
//! with the API's environment keeps both sides in step.

use digital_distributor_api::config::RolePasswords;
use digital_distributor_core::DbRole;
use secrecy::ExposeSecret;

use super::{CommandError, connect_owner};

/// Set the password of each of the five login roles.
///
/// # Errors
///
/// Returns `CommandError` if a password is missing or a statement fails.
pub async fn set_passwords() -> Result<(), CommandError> {
    let passwords = RolePasswords::resolve(&|key: &str| std::env::var(key).ok())?;
    let pool = connect_owner().await?;

    for role in DbRole::ALL {
        // Quoting happens server-side; ALTER ROLE cannot take bind parameters.
        let statement: String =
            sqlx::query_scalar("SELECT format('ALTER ROLE %I PASSWORD %L', $1, $2)")
                .bind(role.login_name())
                .bind(passwords.get(role).expose_secret())
                .fetch_one(&pool)
                .await?;

        sqlx::raw_sql(&statement).execute(&pool).await?;
        tracing::info!("Password set for {}", role.login_name());
    }

    pool.close().await;
    Ok(())
}
