//! Customer and employee domain types.

use chrono::NaiveDate;
use serde::Serialize;

use digital_distributor_core::{Email, EmployeeId, UserId};

/// A registered customer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: Email,
    pub reg_date: NaiveDate,
}

/// A customer together with their stored password hash.
///
/// Never serialized.
#[derive(Debug, Clone)]
pub struct UserWithPassword {
    pub user: User,
    /// `None` for accounts imported without a password.
    pub password_hash: Option<String>,
}

/// A staff member.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: EmployeeId,
    pub username: String,
    pub position: String,
    pub hire_date: Option<NaiveDate>,
}

/// A staff member together with their stored password hash.
#[derive(Debug, Clone)]
pub struct EmployeeWithPassword {
    pub employee: Employee,
    pub password_hash: Option<String>,
}
