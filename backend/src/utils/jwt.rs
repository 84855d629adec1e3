//! JWT session token utilities for authentication and authorization.
//!
//! The sole source of cryptographic trust in the system. Session tokens are
//! self-contained signed claim bundles; verification is pure CPU work and
//! never touches storage. There is no revocation list: logout is a
//! client-side discard, which is a documented limitation of the design.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::database::models::{Role, User};
use crate::errors::ServiceError;

/// Session token lifetime for a normal login.
pub const SESSION_TTL_HOURS: i64 = 4;
/// Shortened lifetime while impersonating another user.
pub const IMPERSONATION_TTL_HOURS: i64 = 2;

/// JWT claims carried by every session token.
///
/// `role` is the effective role governing authorization; `original_role` is
/// the stored role it may have been downgraded from. The `original_user_*`
/// fields are only present while impersonating and point back at the admin
/// who started the session.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User ID
    pub sub: String,
    pub username: String,
    /// Effective role
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impersonating: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_username: Option<String>,
    /// Token expiration timestamp
    pub exp: usize,
    /// Token issued at timestamp
    pub iat: usize,
}

impl Claims {
    pub fn is_impersonating(&self) -> bool {
        self.impersonating.unwrap_or(false) && self.original_user_id.is_some()
    }
}

/// JWT token utility for creating and validating session tokens.
pub struct JwtUtils {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtUtils {
    /// Create a new JwtUtils instance from the injected configuration.
    pub fn new(config: &Config) -> Self {
        let encoding_key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        JwtUtils {
            encoding_key,
            decoding_key,
            validation,
        }
    }

    /// Generate a standard session token for a logged-in user.
    ///
    /// `effective_role` is the role governing authorization right now
    /// (possibly inherited); the user's stored role rides along as
    /// `original_role`.
    pub fn generate_session_token(
        &self,
        user: &User,
        effective_role: Role,
    ) -> Result<String, ServiceError> {
        let claims = self.base_claims(
            &user.id,
            &user.username,
            effective_role,
            Some(user.role),
            Duration::hours(SESSION_TTL_HOURS),
        );
        self.sign(&claims)
    }

    /// Generate an impersonation token: the target's identity and effective
    /// role up front, with an auditable back-link to the requesting admin.
    pub fn generate_impersonation_token(
        &self,
        target: &User,
        target_effective_role: Role,
        original_user_id: &str,
        original_username: &str,
        original_role: Role,
    ) -> Result<String, ServiceError> {
        let mut claims = self.base_claims(
            &target.id,
            &target.username,
            target_effective_role,
            Some(original_role),
            Duration::hours(IMPERSONATION_TTL_HOURS),
        );
        claims.impersonating = Some(true);
        claims.original_user_id = Some(original_user_id.to_string());
        claims.original_username = Some(original_username.to_string());
        self.sign(&claims)
    }

    /// Validate and decode a session token.
    ///
    /// Rejects tampered payloads and tokens past their embedded expiry;
    /// performs no storage lookup.
    pub fn validate_token(&self, token: &str) -> Result<Claims, ServiceError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|token_data| token_data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    ServiceError::unauthenticated("session token expired")
                }
                _ => ServiceError::unauthenticated("invalid session token"),
            })
    }

    fn base_claims(
        &self,
        user_id: &str,
        username: &str,
        role: Role,
        original_role: Option<Role>,
        ttl: Duration,
    ) -> Claims {
        let now = Utc::now();
        Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            role,
            original_role,
            impersonating: None,
            original_user_id: None,
            original_username: None,
            exp: (now + ttl).timestamp() as usize,
            iat: now.timestamp() as usize,
        }
    }

    fn sign(&self, claims: &Claims) -> Result<String, ServiceError> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|e| ServiceError::internal_error(format!("Token generation failed: {}", e)))
    }

    #[cfg(test)]
    fn sign_with_ttl(&self, user_id: &str, ttl: Duration) -> Result<String, ServiceError> {
        let claims = self.base_claims(user_id, "test", Role::User, None, ttl);
        self.sign(&claims)
    }
}
