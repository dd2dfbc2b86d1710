//! Request descriptors that can be replayed verbatim after a token refresh.
//!
//! DESIGN
//! ======
//! Requests are captured as plain data (`ApiRequest`) before they touch the
//! network, so the session coordinator can rewrite the `Authorization`
//! header and send the same descriptor a second time. Multipart bodies are
//! stored as owned bytes for the same reason.

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;

/// A file or text field in a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartField {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    pub fields: Vec<MultipartField>,
}

impl MultipartForm {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.fields.push(MultipartField {
            name: name.to_owned(),
            file_name: None,
            content_type: None,
            bytes: value.as_bytes().to_vec(),
        });
        self
    }

    #[must_use]
    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, bytes: Vec<u8>) -> Self {
        self.fields.push(MultipartField {
            name: name.to_owned(),
            file_name: Some(file_name.to_owned()),
            content_type: Some(content_type.to_owned()),
            bytes,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Multipart(MultipartForm),
}

/// Fully-resolved outgoing request.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
    /// Set once the request has been replayed after a refresh.
    pub retried: bool,
    /// When false a 401 is reported as-is instead of starting a refresh.
    pub intercept_unauthorized: bool,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            retried: false,
            intercept_unauthorized: true,
        }
    }

    /// Replace the `Authorization` header with `Bearer <token>`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidRequest`] if the token is not a valid header value.
    pub fn set_bearer(&mut self, token: &str) -> Result<(), ApiError> {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| ApiError::InvalidRequest(format!("authorization header: {e}")))?;
        self.headers.insert(AUTHORIZATION, value);
        Ok(())
    }

    /// Token currently carried in the `Authorization` header.
    #[must_use]
    pub fn bearer(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
    }

    /// Path component of the URL, used for log fields.
    #[must_use]
    pub fn path(&self) -> &str {
        let after_scheme = self.url.split_once("://").map_or(self.url.as_str(), |(_, rest)| rest);
        let path = after_scheme.find('/').map_or("/", |idx| &after_scheme[idx..]);
        path.split('?').next().unwrap_or(path)
    }
}

/// Declarative description of an API call relative to the base URL.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    pub authenticated: bool,
    pub intercept_unauthorized: bool,
}

impl RequestSpec {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            authenticated: true,
            intercept_unauthorized: true,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    #[must_use]
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidRequest`] if `body` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        self.body = Some(RequestBody::Json(value));
        Ok(self)
    }

    #[must_use]
    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.body = Some(RequestBody::Multipart(form));
        self
    }

    /// Add a query pair; `None` values are skipped.
    #[must_use]
    pub fn query(mut self, key: &str, value: Option<impl ToString>) -> Self {
        if let Some(value) = value {
            self.query.push((key.to_owned(), value.to_string()));
        }
        self
    }

    /// Send without attaching the stored access token.
    #[must_use]
    pub fn anonymous(mut self) -> Self {
        self.authenticated = false;
        self
    }

    /// Report 401 responses directly instead of refreshing the session.
    #[must_use]
    pub fn without_refresh(mut self) -> Self {
        self.intercept_unauthorized = false;
        self
    }
}

/// Join `base` and `path` and append percent-encoded query pairs.
///
/// # Errors
///
/// Returns [`ApiError::InvalidRequest`] if the joined URL does not parse.
pub fn build_url(base: &str, path: &str, query: &[(String, String)]) -> Result<String, ApiError> {
    let joined = format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'));
    let mut url = reqwest::Url::parse(&joined).map_err(|e| ApiError::InvalidRequest(format!("{joined}: {e}")))?;
    let pairs = query.iter().filter(|(_, v)| !v.is_empty()).collect::<Vec<_>>();
    if !pairs.is_empty() {
        let mut serializer = url.query_pairs_mut();
        for (key, value) in pairs {
            serializer.append_pair(key, value);
        }
    }
    Ok(url.into())
}

#[cfg(test)]
#[path = "request_test.rs"]
mod tests;
