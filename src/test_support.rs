//! Scripted transport and fixtures shared by unit tests.

use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use tokio::sync::Notify;

use crate::config::ClientConfig;
use crate::net::request::ApiRequest;
use crate::net::transport::{RawResponse, Transport, TransportError};
use crate::session::coordinator::REFRESH_PATH;

pub(crate) const BASE_URL: &str = "http://lms.test";

type Handler = dyn Fn(&ApiRequest) -> Result<RawResponse, TransportError> + Send + Sync;

/// Transport that records every request and answers through a closure.
///
/// With a gate installed, refresh calls block until the gate is notified so
/// tests can pile requests up behind an in-flight refresh.
pub(crate) struct MockTransport {
    handler: Box<Handler>,
    refresh_gate: Option<Arc<Notify>>,
    log: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub(crate) fn new<F>(handler: F) -> Self
    where
        F: Fn(&ApiRequest) -> Result<RawResponse, TransportError> + Send + Sync + 'static,
    {
        Self { handler: Box::new(handler), refresh_gate: None, log: Mutex::new(Vec::new()) }
    }

    pub(crate) fn gated<F>(handler: F, gate: Arc<Notify>) -> Self
    where
        F: Fn(&ApiRequest) -> Result<RawResponse, TransportError> + Send + Sync + 'static,
    {
        Self { handler: Box::new(handler), refresh_gate: Some(gate), log: Mutex::new(Vec::new()) }
    }

    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.log.lock().expect("log mutex should lock").clone()
    }

    pub(crate) fn calls_to(&self, path: &str) -> usize {
        self.requests().iter().filter(|r| r.path() == path).count()
    }

    pub(crate) fn refresh_calls(&self) -> usize {
        self.calls_to(REFRESH_PATH)
    }

    pub(crate) fn last_request(&self) -> ApiRequest {
        self.requests().pop().expect("at least one request")
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse, TransportError> {
        self.log.lock().expect("log mutex should lock").push(request.clone());
        if request.path() == REFRESH_PATH {
            if let Some(gate) = &self.refresh_gate {
                gate.notified().await;
            }
        }
        (self.handler)(request)
    }
}

pub(crate) fn test_config() -> ClientConfig {
    ClientConfig::new(BASE_URL)
}

pub(crate) fn envelope_ok(data: Value) -> RawResponse {
    RawResponse::new(200, serde_json::to_vec(&json!({ "status": "SUCCESS", "data": data })).unwrap())
}

pub(crate) fn envelope_err(status: u16, message: &str, code: &str) -> RawResponse {
    RawResponse::new(
        status,
        serde_json::to_vec(&json!({ "status": "ERROR", "message": message, "errorCode": code })).unwrap(),
    )
}

pub(crate) fn unauthorized() -> RawResponse {
    envelope_err(401, "jwt expired", "TOKEN_EXPIRED")
}

/// Handler for a backend that accepts only `valid` on protected endpoints
/// and answers refresh calls with `refresh`.
pub(crate) fn bearer_guard(
    valid: &'static str,
    refresh: RawResponse,
) -> impl Fn(&ApiRequest) -> Result<RawResponse, TransportError> + Send + Sync + 'static {
    move |req| {
        if req.path() == REFRESH_PATH {
            return Ok(refresh.clone());
        }
        if req.bearer() == Some(valid) {
            Ok(envelope_ok(json!({ "path": req.path(), "token": valid })))
        } else {
            Ok(unauthorized())
        }
    }
}

/// Poll until `condition` holds, yielding to other tasks in between.
pub(crate) async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    }
    panic!("condition not reached");
}

/// JSON body carried by a recorded request.
pub(crate) fn json_body(request: &ApiRequest) -> Value {
    match &request.body {
        Some(crate::net::request::RequestBody::Json(value)) => value.clone(),
        other => panic!("expected a JSON body, got {other:?}"),
    }
}

/// Client over a scripted transport, preloaded with `T1`/`R1`.
pub(crate) fn signed_in_client<F>(handler: F) -> (crate::ApiClient, Arc<MockTransport>)
where
    F: Fn(&ApiRequest) -> Result<RawResponse, TransportError> + Send + Sync + 'static,
{
    let transport = Arc::new(MockTransport::new(handler));
    let store = Arc::new(crate::MemoryTokenStore::with_tokens(&crate::TokenPair::new("T1", "R1")));
    let client = crate::ApiClient::with_transport(&test_config(), store, transport.clone());
    (client, transport)
}
