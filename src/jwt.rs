//! JWT token generation and validation.
//!
//! Tokens are HS256-signed and self-contained: validity is decided entirely
//! by the signature and the embedded expiry, with no server-side token store.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived access token (15 minutes), carried as a bearer header
    Access,
    /// Long-lived refresh token (7 days), carried only in an HttpOnly cookie
    Refresh,
}

/// JWT claims shared by access and refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user UUID)
    pub sub: String,
    /// Token type
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Access token duration: 15 minutes
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 15 * 60;

/// Refresh token duration: 7 days
pub const REFRESH_TOKEN_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// A freshly issued access/refresh token pair for one subject.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Configuration for JWT operations.
///
/// Holds the signing secret as immutable key material, initialized once at
/// startup and shared read-only across all request handlers.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtConfig {
    /// Create a new JWT configuration with the given secret.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    fn sign(&self, subject: &str, token_type: TokenType, ttl: u64) -> Result<String, JwtError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| JwtError::TimeError)?
            .as_secs();

        let claims = Claims {
            sub: subject.to_string(),
            token_type,
            iat: now,
            exp: now + ttl,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(JwtError::Encoding)
    }

    /// Generate a short-lived access token for a subject.
    pub fn generate_access_token(&self, subject: &str) -> Result<String, JwtError> {
        self.sign(subject, TokenType::Access, ACCESS_TOKEN_DURATION_SECS)
    }

    /// Generate a long-lived refresh token for a subject.
    pub fn generate_refresh_token(&self, subject: &str) -> Result<String, JwtError> {
        self.sign(subject, TokenType::Refresh, REFRESH_TOKEN_DURATION_SECS)
    }

    /// Issue a full session: one access token and one refresh token.
    ///
    /// Stateless issuance: two calls for the same subject yield independent,
    /// both-valid token pairs until their respective expiries.
    pub fn issue_session(&self, subject: &str) -> Result<SessionTokens, JwtError> {
        Ok(SessionTokens {
            access_token: self.generate_access_token(subject)?,
            refresh_token: self.generate_refresh_token(subject)?,
        })
    }

    fn validate(&self, token: &str, expected: TokenType) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let token_data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(JwtError::Decoding)?;

        if token_data.claims.token_type != expected {
            return Err(JwtError::WrongTokenType);
        }

        Ok(token_data.claims)
    }

    /// Validate and decode an access token.
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, JwtError> {
        self.validate(token, TokenType::Access)
    }

    /// Validate and decode a refresh token.
    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, JwtError> {
        self.validate(token, TokenType::Refresh)
    }
}

/// Errors that can occur during JWT operations.
///
/// Verification failures are deliberately not distinguished to API callers:
/// malformed, tampered, expired, and wrong-type tokens all surface as one
/// opaque rejection.
#[derive(Debug)]
pub enum JwtError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Error decoding the token
    Decoding(jsonwebtoken::errors::Error),
    /// System time error
    TimeError,
    /// Wrong token type (e.g., using refresh token as access token)
    WrongTokenType,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::Decoding(e) => write!(f, "Failed to decode token: {}", e),
            JwtError::TimeError => write!(f, "System time error"),
            JwtError::WrongTokenType => write!(f, "Wrong token type"),
        }
    }
}

impl std::error::Error for JwtError {}
