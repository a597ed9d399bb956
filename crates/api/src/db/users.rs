//! Customer repository.
//!
//! Runs on the admin pool: registration, login and profile edits happen
//! before (or regardless of) an RLS identity being established.

use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::instrument;

use digital_distributor_core::{Email, UserId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::user::{User, UserWithPassword};

#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: UserId,
    username: String,
    email: String,
    reg_date: NaiveDate,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: row.user_id,
            username: row.username,
            email,
            reg_date: row.reg_date,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserPasswordRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: Option<String>,
}

impl TryFrom<UserPasswordRow> for UserWithPassword {
    type Error = RepositoryError;

    fn try_from(row: UserPasswordRow) -> Result<Self, Self::Error> {
        Ok(Self {
            user: row.user.try_into()?,
            password_hash: row.password_hash.filter(|hash| !hash.trim().is_empty()),
        })
    }
}

/// Repository for customer accounts.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored email is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT user_id, username, email, reg_date FROM users WHERE user_id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user and their password hash by username.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_with_password_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserWithPassword>, RepositoryError> {
        let row = sqlx::query_as::<_, UserPasswordRow>(
            r"
            SELECT user_id, username, email, reg_date, password_hash
            FROM users
            WHERE username = $1
            ",
        )
        .bind(username)
        .fetch_optional(self.pool)
        .await?;

        row.map(UserWithPassword::try_from).transpose()
    }

    /// Get a user and their password hash by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_with_password_by_id(
        &self,
        id: UserId,
    ) -> Result<Option<UserWithPassword>, RepositoryError> {
        let row = sqlx::query_as::<_, UserPasswordRow>(
            r"
            SELECT user_id, username, email, reg_date, password_hash
            FROM users
            WHERE user_id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(UserWithPassword::try_from).transpose()
    }

    /// Whether any account uses this email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn email_taken(&self, email: &Email) -> Result<bool, RepositoryError> {
        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
                .bind(email.as_str())
                .fetch_one(self.pool)
                .await?;
        Ok(taken)
    }

    /// Whether an account other than `except` uses this username.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn username_taken(
        &self,
        username: &str,
        except: Option<UserId>,
    ) -> Result<bool, RepositoryError> {
        let taken: bool = sqlx::query_scalar(
            r"
            SELECT EXISTS (
                SELECT 1 FROM users
                WHERE username = $1 AND ($2::INT IS NULL OR user_id <> $2)
            )
            ",
        )
        .bind(username)
        .bind(except)
        .fetch_one(self.pool)
        .await?;
        Ok(taken)
    }

    /// Register a new customer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the username or email is taken.
    /// Returns `RepositoryError::Database` for other database errors.
    #[instrument(skip(self, email, password_hash))]
    pub async fn create(
        &self,
        username: &str,
        email: &Email,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO users (username, email, password_hash, reg_date)
            VALUES ($1, $2, $3, CURRENT_DATE)
            RETURNING user_id, username, email, reg_date
            ",
        )
        .bind(username)
        .bind(email.as_str())
        .bind(password_hash)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "username or email already exists"))?;

        row.try_into()
    }

    /// Change a customer's username.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    /// Returns `RepositoryError::Conflict` if the username is taken.
    #[instrument(skip(self))]
    pub async fn update_username(
        &self,
        id: UserId,
        username: &str,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            UPDATE users SET username = $1
            WHERE user_id = $2
            RETURNING user_id, username, email, reg_date
            ",
        )
        .bind(username)
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "username already exists"))?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Replace a customer's password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    #[instrument(skip(self, password_hash))]
    pub async fn update_password(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE users SET password_hash = $1 WHERE user_id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}
