//! Domain errors surfaced to GraphQL clients.
//!
//! Every error carries a stable `code` extension alongside its message.
//! Database failures are logged server-side and reach the client only as a
//! generic internal error.

use async_graphql::ErrorExtensions;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not authenticated")]
    NotAuthenticated,
    /// The argument completes the message, e.g. "view this post".
    #[error("Not authorized to {0}")]
    NotAuthorized(&'static str),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Validation(String),
    /// One message for unknown email and wrong password alike, so a caller
    /// cannot probe which emails are registered.
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    /// Machine-readable error code exposed in the GraphQL error extensions.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NotAuthenticated => "UNAUTHENTICATED",
            ApiError::NotAuthorized(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Validation(_) => "BAD_USER_INPUT",
            ApiError::InvalidCredentials => "INVALID_CREDENTIALS",
            ApiError::Internal => "INTERNAL_SERVER_ERROR",
        }
    }
}

impl ErrorExtensions for ApiError {
    fn extend(&self) -> async_graphql::Error {
        async_graphql::Error::new(self.to_string()).extend_with(|_, e| e.set("code", self.code()))
    }
}

/// Log a database failure and hand the client a generic internal error.
pub fn internal(err: sea_orm::DbErr) -> async_graphql::Error {
    tracing::error!(error = %err, "database error");
    ApiError::Internal.extend()
}
