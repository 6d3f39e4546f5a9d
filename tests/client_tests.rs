//! Tests for the client-side refresh interceptor.
//!
//! Tests cover:
//! - Transparent refresh-and-replay when the access token has gone stale
//! - Exactly one refresh call and exactly one retry per originating request
//! - Refresh calls bypassing the interceptor (no recursion)
//! - Forced logout when the refresh itself fails
//! - The client cookie jar mirroring the server's Set-Cookie headers

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use taskward::client::{ApiClient, Session};
use taskward::{ServerConfig, create_app, db::Database};
use tower::{Service, ServiceExt};

/// Counts requests per endpoint while forwarding to a real app router.
#[derive(Clone)]
struct CountingTransport {
    inner: axum::Router,
    refresh_calls: Arc<AtomicUsize>,
    task_calls: Arc<AtomicUsize>,
}

impl Service<Request<Body>> for CountingTransport {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response<Body>, Infallible>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Infallible>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let path = request.uri().path();
        if path == "/api/auth/refresh" {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        } else if path.starts_with("/api/tasks") {
            self.task_calls.fetch_add(1, Ordering::SeqCst);
        }

        let inner = self.inner.clone();
        Box::pin(async move { inner.oneshot(request).await })
    }
}

/// Stub transport: every protected request fails with 401; the refresh
/// endpoint succeeds or fails depending on `refresh_ok`.
#[derive(Clone)]
struct StubTransport {
    refresh_ok: bool,
    refresh_calls: Arc<AtomicUsize>,
    task_calls: Arc<AtomicUsize>,
}

impl Service<Request<Body>> for StubTransport {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response<Body>, Infallible>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Infallible>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let is_refresh = request.uri().path() == "/api/auth/refresh";
        if is_refresh {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        } else {
            self.task_calls.fetch_add(1, Ordering::SeqCst);
        }

        let response = if is_refresh && self.refresh_ok {
            Response::builder()
                .status(StatusCode::OK)
                .header("content-type", "application/json")
                .body(Body::from(r#"{"token":"t-renewed"}"#))
                .unwrap()
        } else {
            Response::builder()
                .status(StatusCode::UNAUTHORIZED)
                .header("content-type", "application/json")
                .body(Body::from(r#"{"error":"Not authorized, token failed"}"#))
                .unwrap()
        };
        Box::pin(async move { Ok(response) })
    }
}

fn stale_session() -> Session {
    Session {
        id: "uuid-stale".to_string(),
        name: "Ann".to_string(),
        email: "a@x.com".to_string(),
        token: "stale-token".to_string(),
    }
}

async fn create_counting_client() -> (
    ApiClient<CountingTransport>,
    Database,
    Arc<AtomicUsize>,
    Arc<AtomicUsize>,
) {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let config = ServerConfig {
        db: db.clone(),
        jwt_secret: b"test-jwt-secret".to_vec(),
        secure_cookies: false,
    };
    let refresh_calls = Arc::new(AtomicUsize::new(0));
    let task_calls = Arc::new(AtomicUsize::new(0));
    let transport = CountingTransport {
        inner: create_app(&config),
        refresh_calls: refresh_calls.clone(),
        task_calls: task_calls.clone(),
    };
    (ApiClient::new(transport), db, refresh_calls, task_calls)
}

#[tokio::test]
async fn test_signup_and_authenticated_request() {
    let (client, _db, refresh_calls, _task_calls) = create_counting_client().await;

    let session = client.signup("Ann", "a@x.com", "secret").await.unwrap();
    assert_eq!(session.name, "Ann");

    let response = client
        .send(
            Method::POST,
            "/api/tasks",
            Some(&serde_json::json!({ "title": "Buy milk" })),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // A valid token never triggers a refresh.
    assert_eq!(refresh_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_transparent_refresh_and_replay() {
    let (client, _db, refresh_calls, _task_calls) = create_counting_client().await;

    client.signup("Ann", "a@x.com", "secret").await.unwrap();
    client
        .send(
            Method::POST,
            "/api/tasks",
            Some(&serde_json::json!({ "title": "Buy milk" })),
        )
        .await
        .unwrap();

    // Simulate the access token going stale while the refresh cookie is
    // still good.
    client.set_access_token("stale-token");

    let response = client.send(Method::GET, "/api/tasks", None).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = taskward::client::read_json(response).await.unwrap();
    assert_eq!(json.as_array().unwrap().len(), 1);

    assert_eq!(refresh_calls.load(Ordering::SeqCst), 1);
    let session = client.session().expect("session persists across refresh");
    assert_ne!(session.token, "stale-token");
}

// A request that always receives 401 triggers exactly one refresh call and
// exactly one retry, then surfaces the final failure without looping.
#[tokio::test]
async fn test_single_refresh_single_retry() {
    let refresh_calls = Arc::new(AtomicUsize::new(0));
    let task_calls = Arc::new(AtomicUsize::new(0));
    let client = ApiClient::new(StubTransport {
        refresh_ok: true,
        refresh_calls: refresh_calls.clone(),
        task_calls: task_calls.clone(),
    });
    client.restore_session(stale_session());

    let response = client.send(Method::GET, "/api/tasks", None).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(task_calls.load(Ordering::SeqCst), 2); // original + one retry

    // The refresh succeeded, so the renewed token is persisted even though
    // the retry still failed.
    assert_eq!(client.session().unwrap().token, "t-renewed");
}

// When the refresh itself fails, there is no retry: local session state is
// discarded and the original failure surfaces.
#[tokio::test]
async fn test_failed_refresh_forces_logout() {
    let refresh_calls = Arc::new(AtomicUsize::new(0));
    let task_calls = Arc::new(AtomicUsize::new(0));
    let client = ApiClient::new(StubTransport {
        refresh_ok: false,
        refresh_calls: refresh_calls.clone(),
        task_calls: task_calls.clone(),
    });
    client.restore_session(stale_session());

    let response = client.send(Method::GET, "/api/tasks", None).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(task_calls.load(Ordering::SeqCst), 1); // no retry
    assert!(client.session().is_none());
}

// A request addressed to the refresh endpoint itself propagates its failure
// without triggering another refresh.
#[tokio::test]
async fn test_refresh_request_is_never_retried() {
    let refresh_calls = Arc::new(AtomicUsize::new(0));
    let task_calls = Arc::new(AtomicUsize::new(0));
    let client = ApiClient::new(StubTransport {
        refresh_ok: false,
        refresh_calls: refresh_calls.clone(),
        task_calls: task_calls.clone(),
    });
    client.restore_session(stale_session());

    let response = client
        .send(Method::POST, "/api/auth/refresh", None)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(task_calls.load(Ordering::SeqCst), 0);
}

// End-to-end forced logout against the real router: the account disappears
// while its tokens are still signature-valid.
#[tokio::test]
async fn test_deleted_account_forces_logout() {
    let (client, db, refresh_calls, _task_calls) = create_counting_client().await;

    let session = client.signup("Ann", "a@x.com", "secret").await.unwrap();
    db.users().delete(&session.id).await.unwrap();

    client.set_access_token("stale-token");
    let response = client.send(Method::GET, "/api/tasks", None).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(refresh_calls.load(Ordering::SeqCst), 1);
    assert!(client.session().is_none());
}

// The client mirrors Set-Cookie into its jar: refresh works with no manual
// cookie handling, and logout empties the jar.
#[tokio::test]
async fn test_cookie_jar_follows_login_and_logout() {
    let (client, _db, _refresh_calls, _task_calls) = create_counting_client().await;

    client.signup("Ann", "a@x.com", "secret").await.unwrap();

    let response = client
        .send(Method::POST, "/api/auth/refresh", None)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    client.logout().await.unwrap();
    assert!(client.session().is_none());

    let response = client
        .send(Method::POST, "/api/auth/refresh", None)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = taskward::client::read_json(response).await.unwrap();
    assert_eq!(json["error"], "Not authorized, no refresh token");
}

#[tokio::test]
async fn test_login_helper_surfaces_bad_credentials() {
    let (client, _db, _refresh_calls, _task_calls) = create_counting_client().await;

    client.signup("Ann", "a@x.com", "secret").await.unwrap();
    client.logout().await.unwrap();

    let err = client.login("a@x.com", "wrong").await.unwrap_err();
    match err {
        taskward::client::ClientError::UnexpectedStatus(status, message) => {
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(message, "Invalid credentials");
        }
        other => panic!("unexpected error: {}", other),
    }

    assert!(client.session().is_none());
}

// Clones share session state: a refresh completed through one handle is
// visible to every other pending request.
#[tokio::test]
async fn test_clones_share_refreshed_credentials() {
    let (client, _db, _refresh_calls, _task_calls) = create_counting_client().await;

    client.signup("Ann", "a@x.com", "secret").await.unwrap();
    client.set_access_token("stale-token");

    let clone = client.clone();
    let response = client.send(Method::GET, "/api/tasks", None).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(
        clone.session().unwrap().token,
        client.session().unwrap().token
    );
    assert_ne!(clone.session().unwrap().token, "stale-token");
}
