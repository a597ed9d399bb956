//! Application roles and the database logins they map to.
//!
//! A [`Role`] travels inside the JWT. Each role is served by exactly one
//! [`DbRole`] pool, so Postgres grants and RLS policies are the last line of
//! authorization.

use serde::{Deserialize, Serialize};

/// Error returned when a string does not name a known role.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid role: {0}")]
pub struct RoleParseError(String);

/// Role carried in an access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A customer.
    User,
    Admin,
    Moderator,
    Support,
    Analyst,
}

impl Role {
    /// The database login that serves requests made under this role.
    #[must_use]
    pub const fn db_role(self) -> DbRole {
        match self {
            Self::User => DbRole::User,
            Self::Admin => DbRole::Admin,
            Self::Moderator => DbRole::Moderator,
            Self::Support => DbRole::Support,
            Self::Analyst => DbRole::Analyst,
        }
    }

    /// Any role other than a customer.
    #[must_use]
    pub const fn is_staff(self) -> bool {
        !matches!(self, Self::User)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::Moderator => "moderator",
            Self::Support => "support",
            Self::Analyst => "analyst",
        }
    }

    /// Derive a staff role from an employee's position and username.
    ///
    /// Roles are tried in the order admin, moderator, support, analyst, and a
    /// role matches when its keyword appears in either the position or the
    /// username (case-insensitive). English and Russian spellings are both
    /// recognised. Returns `None` when nothing matches.
    ///
    /// ```
    /// use digital_distributor_core::Role;
    ///
    /// assert_eq!(Role::infer_staff("Director of Sales", "ivan"), Some(Role::Admin));
    /// assert_eq!(Role::infer_staff("Модератор", "anna"), Some(Role::Moderator));
    /// assert_eq!(Role::infer_staff("Courier", "support_kate"), Some(Role::Support));
    /// assert_eq!(Role::infer_staff("Courier", "kate"), None);
    /// ```
    #[must_use]
    pub fn infer_staff(position: &str, username: &str) -> Option<Self> {
        const KEYWORDS: &[(Role, &[&str])] = &[
            (Role::Admin, &["admin", "director", "администратор", "директор"]),
            (Role::Moderator, &["moderator", "модератор"]),
            (Role::Support, &["support", "поддержк"]),
            (Role::Analyst, &["analyst", "аналитик"]),
        ];

        let position = position.to_lowercase();
        let username = username.to_lowercase();

        KEYWORDS.iter().find_map(|(role, words)| {
            [&position, &username]
                .iter()
                .any(|text| words.iter().any(|word| text.contains(word)))
                .then_some(*role)
        })
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            "moderator" => Ok(Self::Moderator),
            "support" => Ok(Self::Support),
            "analyst" => Ok(Self::Analyst),
            _ => Err(RoleParseError(s.to_owned())),
        }
    }
}

/// A Postgres login role with its own connection pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbRole {
    Admin,
    Analyst,
    Moderator,
    Support,
    User,
}

impl DbRole {
    pub const ALL: [Self; 5] = [
        Self::Admin,
        Self::Analyst,
        Self::Moderator,
        Self::Support,
        Self::User,
    ];

    /// Name of the login created by the migrations.
    #[must_use]
    pub const fn login_name(self) -> &'static str {
        match self {
            Self::Admin => "admin_user",
            Self::Analyst => "analyst_user",
            Self::Moderator => "moderator_user",
            Self::Support => "support_user",
            Self::User => "normal_user",
        }
    }

    /// Environment variable holding this login's password override.
    #[must_use]
    pub const fn password_env_key(self) -> &'static str {
        match self {
            Self::Admin => "DB_ADMIN_PASSWORD",
            Self::Analyst => "DB_ANALYST_PASSWORD",
            Self::Moderator => "DB_MODERATOR_PASSWORD",
            Self::Support => "DB_SUPPORT_PASSWORD",
            Self::User => "DB_USER_PASSWORD",
        }
    }
}

impl std::fmt::Display for DbRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.login_name())
    }
}
