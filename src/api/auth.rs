//! Authentication endpoints: signup, login, logout, refresh.
//!
//! Signup and login issue a full session: an access token in the response
//! body and a refresh token in an HttpOnly cookie. Refresh exchanges a valid
//! refresh cookie for a new access token without credentials; the refresh
//! token itself is reused as-is until it expires.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::IntoResponse,
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use super::error::{ApiError, ResultExt};
use crate::auth::{REFRESH_COOKIE_NAME, clear_refresh_cookie, get_cookie, refresh_cookie};
use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::password::{hash_password, verify_password};

#[derive(Clone)]
pub struct AuthApiState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub secure_cookies: bool,
}

pub fn router(state: AuthApiState) -> Router {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/refresh", post(refresh))
        .with_state(state)
}

// --- Request/Response types ---

#[derive(Deserialize)]
struct SignupRequest {
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

/// Session payload returned by signup and login.
#[derive(Serialize)]
struct SessionResponse {
    id: String,
    name: String,
    email: String,
    token: String,
}

#[derive(Serialize)]
struct RefreshResponse {
    token: String,
}

// --- Handlers ---

async fn signup(
    State(state): State<AuthApiState>,
    Json(payload): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(name), Some(email), Some(password)) =
        (payload.name, payload.email, payload.password)
    else {
        return Err(ApiError::bad_request("Please add all fields"));
    };
    if name.is_empty() || email.is_empty() || password.is_empty() {
        return Err(ApiError::bad_request("Please add all fields"));
    }

    let existing = state
        .db
        .users()
        .get_by_email(&email)
        .await
        .db_err("Failed to check existing user")?;
    if existing.is_some() {
        return Err(ApiError::bad_request("User already exists"));
    }

    let password_hash = hash_password(&password).map_err(|e| {
        error!("Failed to hash password: {}", e);
        ApiError::internal("Failed to create user")
    })?;

    let uuid = uuid::Uuid::new_v4().to_string();
    state
        .db
        .users()
        .create(&uuid, &name, &email, &password_hash)
        .await
        .db_err("Failed to create user")?;

    let session = state.jwt.issue_session(&uuid).map_err(|e| {
        error!("Failed to issue session: {}", e);
        ApiError::internal("Failed to create session")
    })?;

    Ok((
        StatusCode::CREATED,
        [(
            SET_COOKIE,
            refresh_cookie(&session.refresh_token, state.secure_cookies),
        )],
        Json(SessionResponse {
            id: uuid,
            name,
            email,
            token: session.access_token,
        }),
    ))
}

async fn login(
    State(state): State<AuthApiState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(email), Some(password)) = (payload.email, payload.password) else {
        return Err(ApiError::bad_request("Invalid credentials"));
    };

    // One generic message for unknown email and wrong password alike, so the
    // response does not reveal whether the email is registered.
    let user = state
        .db
        .users()
        .get_by_email(&email)
        .await
        .db_err("Failed to look up user")?
        .ok_or_else(|| ApiError::bad_request("Invalid credentials"))?;

    if !verify_password(&password, &user.password_hash) {
        return Err(ApiError::bad_request("Invalid credentials"));
    }

    let session = state.jwt.issue_session(&user.uuid).map_err(|e| {
        error!("Failed to issue session: {}", e);
        ApiError::internal("Failed to create session")
    })?;

    Ok((
        StatusCode::OK,
        [(
            SET_COOKIE,
            refresh_cookie(&session.refresh_token, state.secure_cookies),
        )],
        Json(SessionResponse {
            id: user.uuid,
            name: user.name,
            email: user.email,
            token: session.access_token,
        }),
    ))
}

async fn logout(State(state): State<AuthApiState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(SET_COOKIE, clear_refresh_cookie(state.secure_cookies))],
        Json(serde_json::json!({ "message": "Logged out successfully" })),
    )
}

/// Exchange a valid refresh cookie for a new access token.
///
/// The cookie is not cleared on failure; the client treats a refresh failure
/// as terminal and logs out explicitly. No cookie is rewritten on success
/// either, since the refresh token is not rotated.
async fn refresh(
    State(state): State<AuthApiState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let refresh_token = get_cookie(&headers, REFRESH_COOKIE_NAME)
        .ok_or_else(|| ApiError::unauthorized("Not authorized, no refresh token"))?;

    let claims = state
        .jwt
        .validate_refresh_token(refresh_token)
        .map_err(|_| ApiError::unauthorized("Not authorized, invalid refresh token"))?;

    // Deleted accounts must not keep minting access tokens.
    let user = state
        .db
        .users()
        .get_by_uuid(&claims.sub)
        .await
        .db_err("Failed to look up user")?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;

    let token = state.jwt.generate_access_token(&user.uuid).map_err(|e| {
        error!("Failed to generate access token: {}", e);
        ApiError::internal("Failed to generate token")
    })?;

    Ok(Json(RefreshResponse { token }))
}
