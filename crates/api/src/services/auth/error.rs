//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong password or unknown username.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// The account exists but has no password hash.
    #[error("password not set, contact an administrator")]
    PasswordNotSet,

    /// An employee whose position and username map to no staff role.
    #[error("employee position has no assigned role")]
    UnrecognizedPosition,

    /// Registration email already in use.
    #[error("email is already in use")]
    EmailTaken,

    /// Registration or profile username already in use.
    #[error("username is already taken")]
    UsernameTaken,

    /// Missing, malformed, expired or forged bearer token.
    #[error("invalid token")]
    InvalidToken,

    /// Signing a token failed.
    #[error("token encoding failed: {0}")]
    TokenEncoding(#[source] jsonwebtoken::errors::Error),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
