//! Per-request identity derived from the `Authorization` header.
//!
//! Building the identity never fails: a missing, malformed, or expired
//! bearer token degrades to an anonymous identity instead of rejecting the
//! request. The resolvers are the sole enforcement point.

use axum::http::{header::AUTHORIZATION, HeaderMap};

use crate::auth::TokenCodec;
use crate::entity::user::Role;
use crate::error::ApiError;

/// The actor behind the current request, attached to every resolver
/// invocation as per-request GraphQL data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub authenticated: bool,
    pub user_id: Option<i32>,
    pub role: Option<Role>,
}

impl Identity {
    /// The safe fallback used for missing or invalid credentials.
    pub fn anonymous() -> Self {
        Self {
            authenticated: false,
            user_id: None,
            role: None,
        }
    }

    /// Build an identity from the request headers.
    ///
    /// Reads `Authorization: Bearer <token>`, verifies the token, and falls
    /// back to anonymous on any failure. A bad token is logged at `warn` and
    /// swallowed, never surfaced as a request error.
    pub fn from_headers(headers: &HeaderMap, tokens: &TokenCodec) -> Self {
        let Some(header) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
            return Self::anonymous();
        };

        // "Bearer <token>" - take the part after the scheme.
        let Some(token) = header.split_whitespace().nth(1) else {
            return Self::anonymous();
        };

        match tokens.verify(token) {
            Ok(claims) => {
                tracing::info!(
                    user = claims.user_id,
                    role = ?claims.role,
                    "authenticated request"
                );
                Self {
                    authenticated: true,
                    user_id: Some(claims.user_id),
                    role: Some(claims.role),
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "invalid authentication token");
                Self::anonymous()
            }
        }
    }

    /// The authenticated user id, or `NotAuthenticated`.
    pub fn require_user(&self) -> Result<i32, ApiError> {
        match self.user_id {
            Some(id) if self.authenticated => Ok(id),
            _ => Err(ApiError::NotAuthenticated),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Some(Role::Admin)
    }
}
