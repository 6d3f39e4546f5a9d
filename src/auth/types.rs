//! Authentication user types.

use crate::jwt::Claims;

/// Authenticated user bound to the request from a verified access token.
/// Derived per request; never persisted.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// JWT claims from the access token
    pub claims: Claims,
}

impl AuthenticatedUser {
    /// The subject (user UUID) this request acts as.
    pub fn subject(&self) -> &str {
        &self.claims.sub
    }
}
