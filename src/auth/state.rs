//! Authentication state trait.

use crate::jwt::JwtConfig;

/// Trait for state types that provide JWT access for authentication.
/// Verification is stateless, so the middleware needs nothing else.
pub trait HasAuthState {
    fn jwt(&self) -> &JwtConfig;
}
