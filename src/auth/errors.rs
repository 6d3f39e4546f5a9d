//! Authentication error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Rejection for requests that fail bearer authentication.
///
/// Missing, malformed, tampered, and expired tokens all map to the same 401
/// so callers cannot tell which check failed. The refresh cookie is left
/// untouched: an expired access token is exactly the case the refresh
/// endpoint exists for.
#[derive(Debug)]
pub enum AuthError {
    /// No bearer token in the Authorization header
    NoToken,
    /// Token present but failed verification
    InvalidToken,
}

impl AuthError {
    fn message(&self) -> &'static str {
        match self {
            AuthError::NoToken => "Not authorized, no token",
            AuthError::InvalidToken => "Not authorized, token failed",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
        }

        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response()
    }
}
