//! Refresh-token cookie contract.
//!
//! The refresh token travels exclusively in an HttpOnly cookie so page
//! scripts can never read it. `SameSite=Lax` lets top-level navigations carry
//! the cookie while blocking cross-site embedded requests. The cookie has no
//! Max-Age: the browser drops it when the session ends, and the token's own
//! embedded expiry bounds its validity either way.

use axum::http::header;

/// Cookie name for the refresh token (long-lived, 7 days).
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Build the Set-Cookie value that attaches a refresh token.
/// `secure` must be true in any deployment served over HTTPS.
pub fn refresh_cookie(token: &str, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/{}",
        REFRESH_COOKIE_NAME, token, secure
    )
}

/// Build the Set-Cookie value that clears the refresh cookie.
/// Empty value plus Max-Age=0 makes the browser discard it regardless of
/// prior state.
pub fn clear_refresh_cookie(secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!(
        "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0{}",
        REFRESH_COOKIE_NAME, secure
    )
}

/// Extract a cookie value from the Cookie header.
/// Returns the raw value with no validation; validation is the codec's job.
pub fn get_cookie<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}
