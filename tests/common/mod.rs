//! In-process LMS backend for end-to-end tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;

pub struct Backend {
    pub access_token: Mutex<String>,
    pub refresh_token: Mutex<String>,
    pub refresh_calls: AtomicUsize,
    pub refresh_delay: Duration,
    pub course_calls: AtomicUsize,
}

impl Backend {
    pub fn new(refresh_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            access_token: Mutex::new("T1".to_owned()),
            refresh_token: Mutex::new("R1".to_owned()),
            refresh_calls: AtomicUsize::new(0),
            refresh_delay,
            course_calls: AtomicUsize::new(0),
        })
    }

    /// Server-side expiry: the access token the client holds stops working.
    pub fn expire_access(&self) {
        *self.access_token.lock().unwrap() = "T1-expired-server-side".to_owned();
    }

    pub fn revoke_refresh(&self) {
        *self.refresh_token.lock().unwrap() = "revoked".to_owned();
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let expected = format!("Bearer {}", self.access_token.lock().unwrap());
        headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) == Some(expected.as_str())
    }
}

fn ok(data: Value) -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "SUCCESS", "data": data })))
}

fn err(status: StatusCode, message: &str, code: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "status": "ERROR", "message": message, "errorCode": code })))
}

async fn sign_in(State(backend): State<Arc<Backend>>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["password"] != "secret" {
        return err(StatusCode::UNAUTHORIZED, "Invalid email or password", "INVALID_CREDENTIALS");
    }
    ok(json!({
        "user": { "id": "u1", "email": body["email"], "firstName": "Ada", "lastName": "Lovelace", "role": "STUDENT" },
        "accessToken": backend.access_token.lock().unwrap().clone(),
        "refreshToken": backend.refresh_token.lock().unwrap().clone(),
    }))
}

async fn refresh(State(backend): State<Arc<Backend>>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let call = backend.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
    tokio::time::sleep(backend.refresh_delay).await;

    if body["refreshToken"] != *backend.refresh_token.lock().unwrap() {
        return err(StatusCode::UNAUTHORIZED, "Refresh token revoked", "REFRESH_REVOKED");
    }
    let token = format!("T{}", call + 1);
    *backend.access_token.lock().unwrap() = token.clone();
    ok(json!({ "accessToken": token }))
}

async fn courses(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    backend.course_calls.fetch_add(1, Ordering::SeqCst);
    if !backend.authorized(&headers) {
        return err(StatusCode::UNAUTHORIZED, "jwt expired", "TOKEN_EXPIRED");
    }
    ok(json!({ "items": [{ "id": "c1", "title": "Rust", "published": true }], "total": 1, "page": 1, "totalPages": 1 }))
}

async fn verify(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !backend.authorized(&headers) {
        return err(StatusCode::UNAUTHORIZED, "jwt expired", "TOKEN_EXPIRED");
    }
    ok(json!({ "id": "u1", "email": "ada@example.com", "firstName": "Ada", "lastName": "Lovelace" }))
}

async fn logout() -> (StatusCode, Json<Value>) {
    ok(Value::Null)
}

/// Serve the backend on an ephemeral port and return its base URL.
pub async fn spawn_backend(backend: Arc<Backend>) -> String {
    let app = Router::new()
        .route("/api/auth/signIn", post(sign_in))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/verify", get(verify))
        .route("/api/courses", get(courses))
        .with_state(backend);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}
