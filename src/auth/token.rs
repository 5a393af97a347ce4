//! JWT issuance and verification.
//!
//! Tokens are signed with HS256 and carry the user id, email, and role.
//! Issued tokens expire after seven days.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::entity::user::{self, Role};
use crate::error::ApiError;

/// Token lifetime: 7 days.
pub const TOKEN_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Payload embedded in every issued token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i32,
    pub email: String,
    pub role: Role,
    /// Issued at (Unix timestamp).
    pub iat: u64,
    /// Expiration time (Unix timestamp).
    pub exp: u64,
}

/// Signs and verifies bearer tokens against a shared secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Issue a signed token for a user, used as auto-login on signup and on
    /// successful login.
    pub fn issue(&self, user: &user::Model) -> Result<String, ApiError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|err| {
                tracing::error!(error = %err, "system time before Unix epoch");
                ApiError::Internal
            })?
            .as_secs();

        let claims = Claims {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
            iat: now,
            exp: now + TOKEN_TTL_SECS,
        };

        encode(&Header::default(), &claims, &self.encoding).map_err(|err| {
            tracing::error!(error = %err, "failed to sign token");
            ApiError::Internal
        })
    }

    /// Verify a token's signature and expiry, returning its claims.
    ///
    /// The caller decides what a failure means; the context builder degrades
    /// it to an anonymous identity.
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding, &Validation::default()).map(|data| data.claims)
    }
}
