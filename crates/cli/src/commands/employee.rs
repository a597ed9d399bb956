//! Staff account management.

use digital_distributor_api::db::employees::EmployeeRepository;
use digital_distributor_api::services::auth::{
    MAX_USERNAME_LENGTH, MIN_PASSWORD_LENGTH, MIN_USERNAME_LENGTH, hash_password,
};
use digital_distributor_core::Role;
use secrecy::{ExposeSecret, SecretString};

use super::{CommandError, connect_owner};

/// Check the arguments and return the role the position maps to.
fn check_input(username: &str, position: &str, password: &str) -> Result<Role, CommandError> {
    let len = username.chars().count();
    if !(MIN_USERNAME_LENGTH..=MAX_USERNAME_LENGTH).contains(&len) {
        return Err(CommandError::InvalidInput(
            "username",
            format!("must be {MIN_USERNAME_LENGTH}-{MAX_USERNAME_LENGTH} characters"),
        ));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(CommandError::InvalidInput(
            "password",
            format!("must be at least {MIN_PASSWORD_LENGTH} characters"),
        ));
    }

    Role::infer_staff(position, username)
        .ok_or_else(|| CommandError::InvalidPosition(position.to_owned()))
}

/// Create an employee with an argon2-hashed password.
///
/// # Errors
///
/// Returns `CommandError` if the input is invalid, the username is taken or
/// the database is unreachable.
pub async fn create(
    username: &str,
    position: &str,
    password: &SecretString,
) -> Result<(), CommandError> {
    let username = username.trim();
    let position = position.trim();
    let role = check_input(username, position, password.expose_secret())?;

    let password_hash = hash_password(password.expose_secret())?;
    let pool = connect_owner().await?;

    tracing::info!("Creating employee: {} ({})", username, role);
    let employee = EmployeeRepository::new(&pool)
        .create(username, &password_hash, position)
        .await?;

    tracing::info!(
        "Employee created successfully! ID: {}, Username: {}, Role: {}",
        employee.id,
        employee.username,
        role
    );

    pool.close().await;
    Ok(())
}
