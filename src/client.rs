//! API client with transparent access-token renewal.
//!
//! Wraps any `tower::Service` transport (an in-process router or a real HTTP
//! connector) and plays the browser's role in the session protocol: it holds
//! the access token, stores the refresh cookie like a cookie jar, and on a
//! 401 performs exactly one refresh attempt followed by exactly one replay of
//! the original request. The refresh call itself bypasses the interceptor, so
//! a failing refresh can never recurse; its failure discards all local
//! session state (forced logout).

use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode, header};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::{BoxError, Service, ServiceExt};

use crate::auth::REFRESH_COOKIE_NAME;

const REFRESH_PATH: &str = "/api/auth/refresh";

/// Locally persisted session: the signup/login response plus the live token.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub name: String,
    pub email: String,
    pub token: String,
}

#[derive(Debug, Default)]
struct ClientState {
    session: Option<Session>,
    /// Raw refresh cookie value, mirroring the browser cookie jar.
    refresh_cookie: Option<String>,
}

/// Errors surfaced by the client.
#[derive(Debug)]
pub enum ClientError {
    /// The transport failed to produce a response
    Transport(BoxError),
    /// A helper expected success but got an error status
    UnexpectedStatus(StatusCode, String),
    /// The response body could not be parsed
    InvalidBody(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Transport(e) => write!(f, "Transport error: {}", e),
            ClientError::UnexpectedStatus(status, msg) => {
                write!(f, "Unexpected status {}: {}", status, msg)
            }
            ClientError::InvalidBody(msg) => write!(f, "Invalid response body: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {}

/// Session-aware API client.
pub struct ApiClient<S> {
    transport: S,
    state: Arc<Mutex<ClientState>>,
}

impl<S: Clone> Clone for ApiClient<S> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            state: self.state.clone(),
        }
    }
}

impl<S> ApiClient<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + Sync + 'static,
    S::Error: Into<BoxError> + Send,
    S::Future: Send,
{
    pub fn new(transport: S) -> Self {
        Self {
            transport,
            state: Arc::new(Mutex::new(ClientState::default())),
        }
    }

    /// The currently persisted session, if any.
    pub fn session(&self) -> Option<Session> {
        self.state.lock().unwrap().session.clone()
    }

    /// Load a previously persisted session (e.g. restored from disk at startup).
    pub fn restore_session(&self, session: Session) {
        self.state.lock().unwrap().session = Some(session);
    }

    /// Replace the stored access token in place, keeping the rest of the session.
    pub fn set_access_token(&self, token: &str) {
        if let Some(session) = self.state.lock().unwrap().session.as_mut() {
            session.token = token.to_string();
        }
    }

    /// Send a request with the one-shot refresh-and-retry protocol applied.
    ///
    /// Requests to the refresh endpoint itself, and the single replay of a
    /// failed request, propagate their outcome without further retries.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Response<Body>, ClientError> {
        let response = self.dispatch(method.clone(), path, body, true).await?;

        if response.status() != StatusCode::UNAUTHORIZED || path == REFRESH_PATH {
            return Ok(response);
        }

        match self.refresh().await {
            Ok(()) => self.dispatch(method, path, body, true).await,
            Err(_) => {
                // Terminal: drop all local session state and surface the
                // original failure.
                self.force_logout();
                Ok(response)
            }
        }
    }

    /// Perform one refresh call and persist the new access token.
    ///
    /// The call bypasses `send`, so it is never itself retried. It runs on a
    /// spawned task: even if the caller abandons the retry mid-flight, the
    /// refresh completes and other pending requests see the renewed token.
    async fn refresh(&self) -> Result<(), ClientError> {
        let client = self.clone();
        let handle = tokio::spawn(async move {
            let response = client
                .dispatch(Method::POST, REFRESH_PATH, None, false)
                .await?;

            if response.status() != StatusCode::OK {
                return Err(ClientError::UnexpectedStatus(
                    response.status(),
                    "refresh failed".to_string(),
                ));
            }

            let json = read_json(response).await?;
            let token = json["token"]
                .as_str()
                .ok_or_else(|| ClientError::InvalidBody("missing token".to_string()))?
                .to_string();

            let mut state = client.state.lock().unwrap();
            if let Some(session) = state.session.as_mut() {
                session.token = token;
            }
            Ok(())
        });

        handle
            .await
            .map_err(|e| ClientError::Transport(Box::new(e)))?
    }

    /// Build and dispatch a single request, capturing any refresh cookie the
    /// response sets. `attach_token` controls the bearer header; the refresh
    /// call sends the cookie only.
    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        attach_token: bool,
    ) -> Result<Response<Body>, ClientError> {
        let mut builder = Request::builder().method(method).uri(path);

        {
            let state = self.state.lock().unwrap();
            if attach_token {
                if let Some(session) = &state.session {
                    builder = builder.header(
                        header::AUTHORIZATION,
                        format!("Bearer {}", session.token),
                    );
                }
            }
            if let Some(cookie) = &state.refresh_cookie {
                builder = builder.header(
                    header::COOKIE,
                    format!("{}={}", REFRESH_COOKIE_NAME, cookie),
                );
            }
        }

        let request = match body {
            Some(value) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(value.to_string())),
            None => builder.body(Body::empty()),
        }
        .map_err(|e| ClientError::Transport(Box::new(e)))?;

        let response = self
            .transport
            .clone()
            .oneshot(request)
            .await
            .map_err(|e| ClientError::Transport(e.into()))?;

        self.capture_cookies(&response);
        Ok(response)
    }

    /// Mirror Set-Cookie headers into the local cookie jar.
    fn capture_cookies(&self, response: &Response<Body>) {
        for value in response.headers().get_all(header::SET_COOKIE) {
            let Ok(value) = value.to_str() else { continue };
            let Some(rest) = value.strip_prefix(REFRESH_COOKIE_NAME) else {
                continue;
            };
            let Some(rest) = rest.trim_start().strip_prefix('=') else {
                continue;
            };
            let cookie_value = rest.split(';').next().unwrap_or("").trim();

            let mut state = self.state.lock().unwrap();
            if cookie_value.is_empty() || value.contains("Max-Age=0") {
                state.refresh_cookie = None;
            } else {
                state.refresh_cookie = Some(cookie_value.to_string());
            }
        }
    }

    fn force_logout(&self) {
        let mut state = self.state.lock().unwrap();
        state.session = None;
        state.refresh_cookie = None;
    }

    async fn establish_session(
        &self,
        path: &str,
        body: Value,
    ) -> Result<Session, ClientError> {
        let response = self.send(Method::POST, path, Some(&body)).await?;
        let status = response.status();
        let json = read_json(response).await?;

        if !status.is_success() {
            let message = json["error"].as_str().unwrap_or("unknown error").to_string();
            return Err(ClientError::UnexpectedStatus(status, message));
        }

        let session = Session {
            id: json["id"].as_str().unwrap_or_default().to_string(),
            name: json["name"].as_str().unwrap_or_default().to_string(),
            email: json["email"].as_str().unwrap_or_default().to_string(),
            token: json["token"]
                .as_str()
                .ok_or_else(|| ClientError::InvalidBody("missing token".to_string()))?
                .to_string(),
        };

        self.state.lock().unwrap().session = Some(session.clone());
        Ok(session)
    }

    /// Sign up and persist the resulting session.
    pub async fn signup(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, ClientError> {
        self.establish_session(
            "/api/auth/signup",
            serde_json::json!({ "name": name, "email": email, "password": password }),
        )
        .await
    }

    /// Log in and persist the resulting session.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        self.establish_session(
            "/api/auth/login",
            serde_json::json!({ "email": email, "password": password }),
        )
        .await
    }

    /// Log out on the server and discard local session state.
    pub async fn logout(&self) -> Result<(), ClientError> {
        self.send(Method::POST, "/api/auth/logout", None).await?;
        self.force_logout();
        Ok(())
    }
}

/// Read a response body as JSON.
pub async fn read_json(response: Response<Body>) -> Result<Value, ClientError> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .map_err(|e| ClientError::InvalidBody(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| ClientError::InvalidBody(e.to_string()))
}
