//! Error types shared by the HTTP core, the session coordinator and services.
//!
//! ERROR HANDLING
//! ==============
//! `ApiError` mirrors how a failure reaches a caller: no response at all,
//! an HTTP/envelope failure, or a terminal session failure. `RefreshError`
//! is cloneable because a single refresh outcome is fanned out to every
//! request that was waiting on it.

use serde_json::Value;

/// Errors returned by API calls made through [`crate::ApiClient`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// No response was received (connect failure, timeout, reset).
    #[error("unable to reach the server: {0}")]
    Network(String),

    /// The server answered with an error envelope or a non-success status.
    #[error("request failed with status {status}: {message}")]
    Api {
        status: u16,
        message: String,
        error_code: Option<String>,
        errors: Option<Value>,
    },

    /// A replayed request was rejected with 401 again. The session is gone.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The access token could not be renewed. The session is gone.
    #[error("session expired: {0}")]
    SessionExpired(#[from] RefreshError),

    /// The response body did not match the expected shape.
    #[error("response decode failed: {0}")]
    Decode(String),

    /// The request could not be built (bad header value, bad URL).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    ClientBuild(String),
}

impl ApiError {
    /// True when the failure ended the session and the caller should send the
    /// user back to sign-in.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Unauthorized(_) | Self::SessionExpired(_))
    }

    /// Machine-readable code from the error envelope, if the server sent one.
    #[must_use]
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Api { error_code, .. } => error_code.as_deref(),
            Self::SessionExpired(RefreshError::Rejected { error_code, .. }) => error_code.as_deref(),
            _ => None,
        }
    }
}

/// Reasons a token refresh can fail. Every variant is terminal for the session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    /// No refresh token was stored; no network call was made.
    #[error("no refresh token available")]
    MissingRefreshToken,

    /// The refresh call never produced a response.
    #[error("refresh request failed: {0}")]
    Network(String),

    /// The refresh endpoint answered with an error status or envelope.
    #[error("refresh rejected with status {status}: {message}")]
    Rejected {
        status: u16,
        message: String,
        error_code: Option<String>,
    },

    /// The refresh response did not carry an access token.
    #[error("refresh response missing access token")]
    MissingAccessToken,

    /// The refresh call did not finish within the configured timeout.
    #[error("refresh request timed out")]
    Timeout,

    /// The task driving the refresh was dropped before it settled.
    #[error("refresh interrupted before completion")]
    Interrupted,
}

/// Errors produced while reading [`crate::ClientConfig`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A variable held a value outside its accepted set.
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
