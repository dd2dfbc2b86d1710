//! HTTP client core.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every service call goes through [`ApiClient::execute`]: the request is
//! resolved against the base URL, decorated with default headers and the
//! current access token, sent, and normalized through the response envelope.
//! A 401 is handed to the [`SessionManager`] once; a second 401 for the same
//! request ends the session.

use std::sync::Arc;

use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use serde::de::{DeserializeOwned, IgnoredAny};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::session::coordinator::SessionManager;
use crate::session::store::{TokenStore, open_store};

use super::envelope::decode_response;
use super::request::{ApiRequest, RequestSpec, build_url};
use super::transport::{RawResponse, ReqwestTransport, Transport};

const REQUEST_ID_HEADER: &str = "x-request-id";

pub struct ApiClient {
    base_url: String,
    default_headers: HeaderMap,
    transport: Arc<dyn Transport>,
    session: Arc<SessionManager>,
}

impl ApiClient {
    /// Client with the token store selected by `config.token_store`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::ClientBuild`] if the HTTP client fails to build.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        Self::new(config, open_store(&config.token_store))
    }

    /// Client over the reqwest transport with an explicit token store.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::ClientBuild`] if the HTTP client fails to build.
    pub fn new(config: &ClientConfig, store: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new(config)?);
        Ok(Self::with_transport(config, store, transport))
    }

    #[must_use]
    pub fn with_transport(config: &ClientConfig, store: Arc<dyn TokenStore>, transport: Arc<dyn Transport>) -> Self {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let session = Arc::new(SessionManager::new(config, store, transport.clone()));
        Self { base_url: config.base_url.clone(), default_headers, transport, session }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn TokenStore> {
        self.session.store()
    }

    /// Resolve a [`RequestSpec`] into a sendable request descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidRequest`] for an unparsable URL or token.
    pub fn build(&self, spec: RequestSpec) -> Result<ApiRequest, ApiError> {
        let url = build_url(&self.base_url, &spec.path, &spec.query)?;
        let mut request = ApiRequest::new(spec.method, url);
        request.headers = self.default_headers.clone();
        request.body = spec.body;
        request.intercept_unauthorized = spec.intercept_unauthorized;

        let request_id = uuid::Uuid::new_v4().to_string();
        let request_id =
            HeaderValue::from_str(&request_id).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        request.headers.insert(HeaderName::from_static(REQUEST_ID_HEADER), request_id);

        if spec.authenticated {
            if let Some(token) = self.store().access_token() {
                request.set_bearer(&token)?;
            }
        }
        Ok(request)
    }

    /// Build, send and decode a call.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`]; terminal variants mean the session has been cleared.
    pub async fn execute<T: DeserializeOwned>(&self, spec: RequestSpec) -> Result<T, ApiError> {
        let request = self.build(spec)?;
        let response = self.send(request).await?;
        decode_response(&response)
    }

    /// [`execute`](Self::execute) for calls whose payload is not needed.
    ///
    /// # Errors
    ///
    /// Same as [`execute`](Self::execute), minus decode failures.
    pub async fn execute_discard(&self, spec: RequestSpec) -> Result<(), ApiError> {
        self.execute::<IgnoredAny>(spec).await.map(|_| ())
    }

    /// Send a built request, routing a first 401 through the session
    /// coordinator.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Network`] when no response arrives and the
    /// coordinator's errors when a 401 cannot be recovered.
    pub async fn send(&self, mut request: ApiRequest) -> Result<RawResponse, ApiError> {
        debug!(method = %request.method, path = request.path(), "api request");
        let response = self.transport.send(&request).await?;

        if response.status != 401 || !request.intercept_unauthorized {
            return Ok(response);
        }
        if request.retried {
            return Err(self.reject_replayed(&request));
        }

        let response = self.session.handle_unauthorized(&mut request).await?;
        if response.status == 401 {
            return Err(self.reject_replayed(&request));
        }
        Ok(response)
    }

    fn reject_replayed(&self, request: &ApiRequest) -> ApiError {
        self.session.expire();
        ApiError::Unauthorized(format!("{} {} rejected after token refresh", request.method, request.path()))
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
