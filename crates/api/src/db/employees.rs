//! Employee repository (admin pool).

use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::instrument;

use digital_distributor_core::EmployeeId;

use super::{RepositoryError, conflict_on_unique};
use crate::models::user::{Employee, EmployeeWithPassword};

#[derive(sqlx::FromRow)]
struct EmployeeRow {
    employee_id: EmployeeId,
    username: String,
    position: Option<String>,
    hire_date: Option<NaiveDate>,
}

impl From<EmployeeRow> for Employee {
    fn from(row: EmployeeRow) -> Self {
        Self {
            id: row.employee_id,
            username: row.username,
            position: row.position.unwrap_or_default(),
            hire_date: row.hire_date,
        }
    }
}

/// Repository for staff accounts.
pub struct EmployeeRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> EmployeeRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an employee and their password hash by username.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_with_password_by_username(
        &self,
        username: &str,
    ) -> Result<Option<EmployeeWithPassword>, RepositoryError> {
        #[derive(sqlx::FromRow)]
        struct Row {
            #[sqlx(flatten)]
            employee: EmployeeRow,
            password_hash: Option<String>,
        }

        let row = sqlx::query_as::<_, Row>(
            r"
            SELECT employee_id, username, position, hire_date, password_hash
            FROM employees
            WHERE username = $1
            ",
        )
        .bind(username)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|r| EmployeeWithPassword {
            employee: r.employee.into(),
            password_hash: r.password_hash.filter(|hash| !hash.trim().is_empty()),
        }))
    }

    /// All employees, most recently hired first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Employee>, RepositoryError> {
        let rows = sqlx::query_as::<_, EmployeeRow>(
            r"
            SELECT employee_id, username, position, hire_date
            FROM employees
            ORDER BY hire_date DESC NULLS LAST, employee_id DESC
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Employee::from).collect())
    }

    /// Hire a new employee.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the username is taken.
    /// Returns `RepositoryError::Database` for other database errors.
    #[instrument(skip(self, password_hash))]
    pub async fn create(
        &self,
        username: &str,
        password_hash: &str,
        position: &str,
    ) -> Result<Employee, RepositoryError> {
        let row = sqlx::query_as::<_, EmployeeRow>(
            r"
            INSERT INTO employees (username, password_hash, position, hire_date)
            VALUES ($1, $2, $3, CURRENT_DATE)
            RETURNING employee_id, username, position, hire_date
            ",
        )
        .bind(username)
        .bind(password_hash)
        .bind(position)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "employee username already exists"))?;

        Ok(row.into())
    }
}
