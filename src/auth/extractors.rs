//! Axum extractors for authentication.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use super::errors::AuthError;
use super::state::HasAuthState;
use super::types::AuthenticatedUser;

/// Extract the bearer token from the Authorization header.
pub fn bearer_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ").map(str::trim)
}

/// Extractor for endpoints that require authentication.
///
/// Per-request gate over the access token: extract the bearer credential,
/// verify it, and bind the subject to the request. Verification is stateless
/// and never consults the user store; a signature-valid, unexpired token is
/// trusted without a database round trip.
pub struct Auth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for Auth
where
    S: HasAuthState + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AuthError::NoToken)?;

        let claims = state
            .jwt()
            .validate_access_token(token)
            .map_err(|_| AuthError::InvalidToken)?;

        Ok(Auth(AuthenticatedUser { claims }))
    }
}
