//! Bearer token issuing and verification.
//!
//! Tokens are HS256 JWTs valid for seven days. A token identifies either a
//! customer (`userId`) or an employee (`employeeId`), never both.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use digital_distributor_core::{EmployeeId, Role, UserId};

use super::AuthError;
use crate::models::user::{Employee, User};

const TOKEN_TTL_DAYS: i64 = 7;

const fn customer_role() -> Role {
    Role::User
}

/// JWT payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<EmployeeId>,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Tokens minted before roles existed carry none; they are customers.
    #[serde(default = "customer_role")]
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    /// Claims for a customer session starting at `now`.
    #[must_use]
    pub fn customer(user: &User, now: DateTime<Utc>) -> Self {
        Self {
            user_id: Some(user.id),
            employee_id: None,
            username: user.username.clone(),
            email: Some(user.email.as_str().to_owned()),
            role: Role::User,
            iat: now.timestamp(),
            exp: (now + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
        }
    }

    /// Claims for a staff session starting at `now`.
    #[must_use]
    pub fn employee(employee: &Employee, role: Role, now: DateTime<Utc>) -> Self {
        Self {
            user_id: None,
            employee_id: Some(employee.id),
            username: employee.username.clone(),
            email: None,
            role,
            iat: now.timestamp(),
            exp: (now + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
        }
    }
}

/// Signing and verification keys derived from `JWT_SECRET`.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtKeys").finish_non_exhaustive()
    }
}

impl JwtKeys {
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            validation,
        }
    }

    /// Sign `claims` into a compact token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenEncoding` if serialization or signing fails.
    pub fn encode(&self, claims: &Claims) -> Result<String, AuthError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(AuthError::TokenEncoding)
    }

    /// Verify a token's signature and expiry and return its claims.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` for any malformed, forged or expired
    /// token.
    pub fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected bearer token");
                AuthError::InvalidToken
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;
    use digital_distributor_core::Email;

    use super::*;

    fn keys(secret: &str) -> JwtKeys {
        JwtKeys::new(&SecretString::from(secret.to_owned()))
    }

    fn alice() -> User {
        User {
            id: UserId::new(42),
            username: "alice".to_owned(),
            email: Email::parse("alice@example.com").unwrap(),
            reg_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        }
    }

    #[test]
    fn test_customer_token_round_trip() {
        let keys = keys("k8Qz!v2Lr#9mXw$4Tn@7pBy^3Hs&6Jd*");
        let claims = Claims::customer(&alice(), Utc::now());
        let token = keys.encode(&claims).unwrap();

        let decoded = keys.decode(&token).unwrap();
        assert_eq!(decoded, claims);
        assert_eq!(decoded.role, Role::User);
        assert_eq!(decoded.exp - decoded.iat, 7 * 24 * 60 * 60);
    }

    #[test]
    fn test_employee_claims_omit_user_fields() {
        let employee = Employee {
            id: EmployeeId::new(3),
            username: "mod_anna".to_owned(),
            position: "Moderator".to_owned(),
            hire_date: None,
        };
        let claims = Claims::employee(&employee, Role::Moderator, Utc::now());
        let json = serde_json::to_value(&claims).unwrap();

        assert_eq!(json["employeeId"], 3);
        assert_eq!(json["role"], "moderator");
        assert!(json.get("userId").is_none());
        assert!(json.get("email").is_none());
    }

    #[test]
    fn test_expired_token_rejected() {
        let keys = keys("k8Qz!v2Lr#9mXw$4Tn@7pBy^3Hs&6Jd*");
        let issued = Utc::now() - Duration::days(8);
        let token = keys.encode(&Claims::customer(&alice(), issued)).unwrap();

        assert!(matches!(keys.decode(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_foreign_signature_rejected() {
        let token = keys("some-other-secret-with-enough-length!")
            .encode(&Claims::customer(&alice(), Utc::now()))
            .unwrap();

        let result = keys("k8Qz!v2Lr#9mXw$4Tn@7pBy^3Hs&6Jd*").decode(&token);
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_missing_role_defaults_to_customer() {
        let secret = "k8Qz!v2Lr#9mXw$4Tn@7pBy^3Hs&6Jd*";
        let exp = (Utc::now() + Duration::hours(1)).timestamp();
        let payload = serde_json::json!({
            "userId": 5,
            "username": "legacy",
            "iat": exp - 3600,
            "exp": exp,
        });
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &payload,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();

        let claims = keys(secret).decode(&token).unwrap();
        assert_eq!(claims.role, Role::User);
        assert_eq!(claims.user_id, Some(UserId::new(5)));
    }

    #[test]
    fn test_garbage_rejected() {
        let keys = keys("k8Qz!v2Lr#9mXw$4Tn@7pBy^3Hs&6Jd*");
        assert!(keys.decode("not.a.jwt").is_err());
        assert!(keys.decode("").is_err());
    }
}
