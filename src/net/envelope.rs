//! Uniform response envelope and its normalization into `Result`.
//!
//! Every backend endpoint answers with
//! `{status: "SUCCESS"|"ERROR", data?, message?, errorCode?, errors?}`.
//! An `"ERROR"` envelope is a failure regardless of the HTTP status code.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ApiError;

use super::transport::RawResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EnvelopeStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub status: EnvelopeStatus,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub errors: Option<Value>,
}

impl Envelope {
    /// Parse a body as an envelope; `None` when it is not one.
    #[must_use]
    pub fn parse(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }
}

fn generic_failure_message(status: u16) -> String {
    match status {
        401 => "authentication required".to_owned(),
        403 => "access denied".to_owned(),
        404 => "resource not found".to_owned(),
        500..=599 => format!("server error ({status})"),
        _ => format!("request failed ({status})"),
    }
}

/// Turn a raw response into the caller's typed payload or an [`ApiError`].
///
/// # Errors
///
/// Returns [`ApiError::Api`] for error envelopes and non-success statuses,
/// and [`ApiError::Decode`] when the payload does not match `T`.
pub fn decode_response<T: DeserializeOwned>(response: &RawResponse) -> Result<T, ApiError> {
    let envelope = Envelope::parse(&response.body);

    if let Some(env) = &envelope {
        if env.status == EnvelopeStatus::Error {
            return Err(envelope_error(response.status, env));
        }
    }

    if !response.is_success() {
        return Err(match &envelope {
            Some(env) => envelope_error(response.status, env),
            None => ApiError::Api {
                status: response.status,
                message: generic_failure_message(response.status),
                error_code: None,
                errors: None,
            },
        });
    }

    let payload = match envelope {
        Some(env) => env.data.unwrap_or(Value::Null),
        None if response.body.iter().all(u8::is_ascii_whitespace) => Value::Null,
        None => serde_json::from_slice::<Value>(&response.body).map_err(|e| ApiError::Decode(e.to_string()))?,
    };

    serde_json::from_value(payload).map_err(|e| ApiError::Decode(e.to_string()))
}

fn envelope_error(status: u16, env: &Envelope) -> ApiError {
    ApiError::Api {
        status,
        message: env
            .message
            .clone()
            .unwrap_or_else(|| generic_failure_message(status)),
        error_code: env.error_code.clone(),
        errors: env.errors.clone(),
    }
}

#[cfg(test)]
#[path = "envelope_test.rs"]
mod tests;
