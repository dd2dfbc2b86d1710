//! Network seam between the HTTP core and the wire.
//!
//! `ReqwestTransport` is the production implementation; tests swap in a
//! scripted transport through the same trait.

use crate::config::ClientConfig;
use crate::error::ApiError;

use super::request::{ApiRequest, MultipartForm, RequestBody};

/// Raw HTTP response before envelope normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    #[must_use]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { status, body: body.into() }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// No response was received for a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        Self::Network(err.0)
    }
}

/// Sends a fully-built request and returns whatever the server answered.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse, TransportError>;
}

pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a reqwest-backed transport with the configured timeouts.
    ///
    /// The cookie store is enabled so HTTP-only session cookies travel with
    /// every call, including the refresh call.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::ClientBuild`] if the HTTP client fails to build.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeouts.request())
            .connect_timeout(config.timeouts.connect())
            .cookie_store(true)
            .build()
            .map_err(|e| ApiError::ClientBuild(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse, TransportError> {
        let mut builder = self
            .http
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone());

        builder = match &request.body {
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Multipart(form)) => builder.multipart(multipart_form(form)?),
            None => builder,
        };

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        Ok(RawResponse { status, body: body.to_vec() })
    }
}

fn multipart_form(form: &MultipartForm) -> Result<reqwest::multipart::Form, TransportError> {
    let mut out = reqwest::multipart::Form::new();
    for field in &form.fields {
        let mut part = reqwest::multipart::Part::bytes(field.bytes.clone());
        if let Some(file_name) = &field.file_name {
            part = part.file_name(file_name.clone());
        }
        if let Some(content_type) = &field.content_type {
            part = part
                .mime_str(content_type)
                .map_err(|e| TransportError(format!("invalid content type {content_type}: {e}")))?;
        }
        out = out.part(field.name.clone(), part);
    }
    Ok(out)
}
