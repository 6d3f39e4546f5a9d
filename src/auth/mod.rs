//! JWT session authentication.
//!
//! Dual-token system: short-lived access tokens (15 min) carried as a bearer
//! header, and long-lived refresh tokens (7 days) carried in an HttpOnly
//! cookie. Verification is stateless; expired access tokens are renewed
//! through the refresh endpoint by the client, not by this middleware.

mod cookie;
mod errors;
mod extractors;
mod ownership;
mod state;
mod types;

pub use cookie::{REFRESH_COOKIE_NAME, clear_refresh_cookie, get_cookie, refresh_cookie};
pub use errors::AuthError;
pub use extractors::{Auth, bearer_token};
pub use ownership::{Access, authorize};
pub use state::HasAuthState;
pub use types::AuthenticatedUser;
