//! Authentication service.
//!
//! Sign-in and sign-up go out anonymously with 401 interception disabled, so
//! bad credentials come back as [`ApiError::Api`] instead of starting a
//! refresh. Issued tokens are handed to the session manager, which stores
//! them and broadcasts `SignedIn`.

use serde_json::json;
use tracing::warn;

use crate::error::ApiError;
use crate::net::client::ApiClient;
use crate::net::request::RequestSpec;

use super::types::{AuthSession, SignUp, User};

pub struct AuthService<'a> {
    client: &'a ApiClient,
}

impl<'a> AuthService<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// # Errors
    ///
    /// Returns [`ApiError::Api`] for rejected credentials.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, ApiError> {
        let spec = RequestSpec::post("/api/auth/signIn")
            .anonymous()
            .without_refresh()
            .json(&json!({ "email": email, "password": password }))?;
        self.start_session(spec).await
    }

    /// # Errors
    ///
    /// Returns [`ApiError::Api`] with field errors when the form is rejected.
    pub async fn sign_up(&self, form: &SignUp) -> Result<AuthSession, ApiError> {
        let spec = RequestSpec::post("/api/auth/signUp").anonymous().without_refresh().json(form)?;
        self.start_session(spec).await
    }

    /// Revoke the session server-side, then clear local credentials.
    ///
    /// The server call is best-effort: local sign-out always happens.
    pub async fn logout(&self) {
        if let Err(e) = self.revoke().await {
            warn!(error = %e, "server logout failed; clearing local session anyway");
        }
        self.client.session().sign_out();
    }

    /// The user behind the stored access token.
    ///
    /// # Errors
    ///
    /// Terminal [`ApiError`] variants when the session cannot be recovered.
    pub async fn verify(&self) -> Result<User, ApiError> {
        self.client.execute(RequestSpec::get("/api/auth/verify")).await
    }

    async fn revoke(&self) -> Result<(), ApiError> {
        let refresh_token = self.client.store().refresh_token();
        let spec = RequestSpec::post("/api/auth/logout")
            .without_refresh()
            .json(&json!({ "refreshToken": refresh_token }))?;
        self.client.execute_discard(spec).await
    }

    async fn start_session(&self, spec: RequestSpec) -> Result<AuthSession, ApiError> {
        let session: AuthSession = self.client.execute(spec).await?;
        if session.access_token.is_empty() {
            return Err(ApiError::Decode("auth response carried no access token".to_owned()));
        }
        self.client.session().establish(&session.token_pair());
        Ok(session)
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
