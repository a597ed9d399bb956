//! Authentication service.
//!
//! Password login for customers and employees, registration, password
//! changes and bearer tokens. All lookups run on the admin pool because they
//! happen before an RLS identity exists.

mod error;
mod jwt;

pub use error::AuthError;
pub use jwt::{Claims, JwtKeys};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};

use digital_distributor_core::{Email, Role, UserId};

use crate::db::RepositoryError;
use crate::db::employees::EmployeeRepository;
use crate::db::users::UserRepository;
use crate::models::user::User;

/// Shortest username accepted anywhere.
pub const MIN_USERNAME_LENGTH: usize = 3;

/// Longest username accepted anywhere.
pub const MAX_USERNAME_LENGTH: usize = 50;

/// Shortest password accepted at registration or on change.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Result of a successful registration.
#[derive(Debug, Serialize)]
pub struct Registration {
    pub token: String,
    pub user: User,
}

/// The account a login resolved to, as returned to the client.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: i32,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reg_date: Option<NaiveDate>,
    pub role: Role,
}

/// Result of a successful login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Login {
    pub token: String,
    pub user: SessionUser,
    pub is_employee: bool,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    employees: EmployeeRepository<'a>,
    keys: &'a JwtKeys,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service over the admin pool.
    #[must_use]
    pub const fn new(pool: &'a PgPool, keys: &'a JwtKeys) -> Self {
        Self {
            users: UserRepository::new(pool),
            employees: EmployeeRepository::new(pool),
            keys,
        }
    }

    /// Register a customer and sign them in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::EmailTaken` or `AuthError::UsernameTaken` if either
    /// is already registered.
    pub async fn register(
        &self,
        username: &str,
        email: &Email,
        password: &str,
    ) -> Result<Registration, AuthError> {
        if self.users.email_taken(email).await? {
            return Err(AuthError::EmailTaken);
        }
        if self.users.username_taken(username, None).await? {
            return Err(AuthError::UsernameTaken);
        }

        let password_hash = hash_password(password)?;

        let user = self
            .users
            .create(username, email, &password_hash)
            .await
            .map_err(|e| match e {
                // Lost a race with a concurrent registration.
                RepositoryError::Conflict(_) => AuthError::UsernameTaken,
                other => AuthError::Repository(other),
            })?;

        info!(user_id = %user.id, "Customer registered");

        let token = self.keys.encode(&Claims::customer(&user, Utc::now()))?;
        Ok(Registration { token, user })
    }

    /// Whether `username` can be registered.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the lookup fails.
    pub async fn username_available(&self, username: &str) -> Result<bool, AuthError> {
        if username.chars().count() < MIN_USERNAME_LENGTH {
            return Ok(false);
        }
        Ok(!self.users.username_taken(username, None).await?)
    }

    /// Log in by username. Employees are matched before customers.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for an unknown username or a
    /// wrong password, `AuthError::PasswordNotSet` for an account without a
    /// password, and `AuthError::UnrecognizedPosition` for an employee whose
    /// position maps to no role.
    pub async fn login(&self, username: &str, password: &str) -> Result<Login, AuthError> {
        if let Some(record) = self.employees.get_with_password_by_username(username).await? {
            let hash = record.password_hash.ok_or(AuthError::PasswordNotSet)?;
            verify_password(password, &hash)?;

            let employee = record.employee;
            let Some(role) = Role::infer_staff(&employee.position, &employee.username) else {
                warn!(
                    employee_id = %employee.id,
                    position = %employee.position,
                    "Employee position maps to no role"
                );
                return Err(AuthError::UnrecognizedPosition);
            };

            info!(employee_id = %employee.id, %role, "Employee logged in");

            let token = self
                .keys
                .encode(&Claims::employee(&employee, role, Utc::now()))?;
            return Ok(Login {
                token,
                user: SessionUser {
                    id: employee.id.as_i32(),
                    username: employee.username,
                    email: None,
                    reg_date: None,
                    role,
                },
                is_employee: true,
            });
        }

        let record = self
            .users
            .get_with_password_by_username(username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        let hash = record.password_hash.ok_or(AuthError::PasswordNotSet)?;
        verify_password(password, &hash)?;

        let user = record.user;
        let token = self.keys.encode(&Claims::customer(&user, Utc::now()))?;

        Ok(Login {
            token,
            user: SessionUser {
                id: user.id.as_i32(),
                username: user.username,
                email: Some(user.email.into_inner()),
                reg_date: Some(user.reg_date),
                role: Role::User,
            },
            is_employee: false,
        })
    }

    /// Replace a customer's password after checking the current one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::PasswordNotSet` if the account has no password,
    /// `AuthError::InvalidCredentials` if `old_password` is wrong, and
    /// `AuthError::Repository(NotFound)` if the user doesn't exist.
    pub async fn change_password(
        &self,
        user_id: UserId,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let record = self
            .users
            .get_with_password_by_id(user_id)
            .await?
            .ok_or(AuthError::Repository(RepositoryError::NotFound))?;
        let hash = record.password_hash.ok_or(AuthError::PasswordNotSet)?;
        verify_password(old_password, &hash)?;

        let new_hash = hash_password(new_password)?;
        self.users.update_password(user_id, &new_hash).await?;

        info!(user_id = %user_id, "Password changed");
        Ok(())
    }
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a stored hash.
///
/// A hash that doesn't parse counts as a mismatch.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("hunter22", &hash).is_ok());
        assert!(matches!(
            verify_password("hunter23", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_hashes_are_salted() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn test_unparseable_hash_is_a_mismatch() {
        assert!(matches!(
            verify_password("anything", "$2b$10$notargon"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_session_user_skips_missing_fields() {
        let user = SessionUser {
            id: 9,
            username: "support_ivan".to_owned(),
            email: None,
            reg_date: None,
            role: Role::Support,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json, serde_json::json!({"id": 9, "username": "support_ivan", "role": "support"}));
    }
}
