//! Session refresh coordinator.
//!
//! ARCHITECTURE
//! ============
//! A 401 on an ordinary request lands in [`SessionManager::handle_unauthorized`].
//! The first caller to arrive while idle becomes the leader and issues the one
//! refresh call; everyone arriving while that call is outstanding parks a
//! oneshot sender in a FIFO queue. When the call settles, the leader updates
//! the token store, resolves every queued sender with the same outcome and
//! only then clears the in-flight flag. Each caller then replays its own
//! request with the fresh token, at most once.
//!
//! CONCURRENCY
//! ===========
//! The flag and the queue share one `std::sync::Mutex` that is never held
//! across an `.await`. The leader keeps an `InFlight` guard: if its future is
//! dropped before settling, waiters are rejected with
//! [`RefreshError::Interrupted`] and the flag is cleared so the next 401 can
//! start over.
//!
//! ERROR HANDLING
//! ==============
//! Any refresh failure (no stored refresh token, transport error, timeout,
//! non-success status, error envelope, missing access token) is terminal:
//! tokens are cleared and a single `LoggedOut` event is broadcast.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{ACCEPT, HeaderValue};
use serde_json::Value;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{ApiError, RefreshError};
use crate::net::envelope::{Envelope, EnvelopeStatus};
use crate::net::request::{ApiRequest, RequestBody};
use crate::net::transport::{RawResponse, Transport};

use super::store::{TokenPair, TokenStore};

pub const REFRESH_PATH: &str = "/api/auth/refresh";

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Session lifecycle notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Credentials were issued by sign-in or sign-up.
    SignedIn,
    /// The access token was renewed silently.
    Refreshed,
    /// The session ended; callers should return to sign-in.
    LoggedOut,
}

type RefreshOutcome = Result<String, RefreshError>;

#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    waiters: VecDeque<oneshot::Sender<RefreshOutcome>>,
}

enum Role {
    Leader,
    Follower(oneshot::Receiver<RefreshOutcome>),
}

pub struct SessionManager {
    store: Arc<dyn TokenStore>,
    transport: Arc<dyn Transport>,
    refresh_url: String,
    refresh_timeout: Duration,
    state: Mutex<RefreshState>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    #[must_use]
    pub fn new(config: &ClientConfig, store: Arc<dyn TokenStore>, transport: Arc<dyn Transport>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            transport,
            refresh_url: format!("{}{REFRESH_PATH}", config.base_url),
            refresh_timeout: config.timeouts.refresh(),
            state: Mutex::new(RefreshState::default()),
            events,
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Receive session lifecycle events, including the logout signal.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.lock_state().refreshing
    }

    /// Number of requests parked behind the in-flight refresh.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.lock_state().waiters.len()
    }

    /// Recover `request` from a 401 by refreshing the session and replaying it.
    ///
    /// The descriptor is marked retried before anything else, so a replay
    /// that is rejected again is never routed back through here.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] if the request was already retried,
    /// [`ApiError::SessionExpired`] if the refresh failed, and
    /// [`ApiError::Network`] if the replay itself gets no response.
    pub async fn handle_unauthorized(&self, request: &mut ApiRequest) -> Result<RawResponse, ApiError> {
        if request.retried {
            return Err(ApiError::Unauthorized(format!(
                "{} {} rejected after token refresh",
                request.method,
                request.path()
            )));
        }
        request.retried = true;

        let token = match self.join_refresh() {
            Role::Leader => self.lead_refresh().await?,
            Role::Follower(rx) => {
                debug!(path = request.path(), "request queued behind in-flight refresh");
                rx.await.unwrap_or(Err(RefreshError::Interrupted))?
            }
        };

        request.set_bearer(&token)?;
        debug!(method = %request.method, path = request.path(), "replaying request with refreshed token");
        Ok(self.transport.send(request).await?)
    }

    /// Store freshly issued credentials (sign-in, sign-up).
    pub fn establish(&self, pair: &TokenPair) {
        self.store.set(pair);
        info!("session established");
        self.emit(SessionEvent::SignedIn);
    }

    /// Explicit sign-out: always clears credentials and signals logout.
    pub fn sign_out(&self) {
        self.store.clear();
        info!("signed out");
        self.emit(SessionEvent::LoggedOut);
    }

    /// Terminal 401 on a replayed request. Signals logout only if a session
    /// was still stored, so a burst of rejected replays logs out once.
    pub fn expire(&self) {
        if self.store.take().is_empty() {
            return;
        }
        warn!("session rejected after refresh; signing out");
        self.emit(SessionEvent::LoggedOut);
    }

    fn join_refresh(&self) -> Role {
        let mut state = self.lock_state();
        if state.refreshing {
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            Role::Follower(rx)
        } else {
            state.refreshing = true;
            Role::Leader
        }
    }

    async fn lead_refresh(&self) -> RefreshOutcome {
        let mut in_flight = InFlight { manager: self, settled: false };

        let outcome = match self.request_new_tokens().await {
            Ok(pair) => {
                self.store.set(&pair);
                Ok(pair.access_token)
            }
            Err(e) => {
                self.store.clear();
                Err(e)
            }
        };

        let queued = in_flight.settle(&outcome);
        match &outcome {
            Ok(_) => {
                info!(queued, "access token refreshed");
                self.emit(SessionEvent::Refreshed);
            }
            Err(e) => {
                warn!(error = %e, queued, "token refresh failed; signing out");
                self.emit(SessionEvent::LoggedOut);
            }
        }
        outcome
    }

    async fn request_new_tokens(&self) -> Result<TokenPair, RefreshError> {
        let Some(refresh_token) = self.store.refresh_token() else {
            return Err(RefreshError::MissingRefreshToken);
        };

        let mut request = ApiRequest::new(Method::POST, self.refresh_url.clone());
        request.intercept_unauthorized = false;
        request.headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        request.body = Some(RequestBody::Json(serde_json::json!({ "refreshToken": refresh_token })));

        debug!("issuing refresh call");
        let response = tokio::time::timeout(self.refresh_timeout, self.transport.send(&request))
            .await
            .map_err(|_| RefreshError::Timeout)?
            .map_err(|e| RefreshError::Network(e.0))?;

        parse_refresh_response(&response)
    }

    /// Resolve every waiter with `outcome`, then clear the in-flight flag.
    /// Returns how many waiters were resolved.
    fn finish(&self, outcome: &RefreshOutcome) -> usize {
        let mut state = self.lock_state();
        let waiters = std::mem::take(&mut state.waiters);
        let count = waiters.len();
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
        state.refreshing = false;
        count
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn lock_state(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct InFlight<'a> {
    manager: &'a SessionManager,
    settled: bool,
}

impl InFlight<'_> {
    fn settle(&mut self, outcome: &RefreshOutcome) -> usize {
        self.settled = true;
        self.manager.finish(outcome)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!("refresh dropped before completion; releasing queued requests");
            self.manager.finish(&Err(RefreshError::Interrupted));
        }
    }
}

/// Extract the new credential pair from a refresh response.
///
/// Tokens are read from the envelope's `data` when present, otherwise from
/// the top-level object.
pub(crate) fn parse_refresh_response(response: &RawResponse) -> Result<TokenPair, RefreshError> {
    let envelope = Envelope::parse(&response.body);

    if let Some(env) = &envelope {
        if env.status == EnvelopeStatus::Error || !response.is_success() {
            return Err(RefreshError::Rejected {
                status: response.status,
                message: env.message.clone().unwrap_or_else(|| "refresh rejected".to_owned()),
                error_code: env.error_code.clone(),
            });
        }
    } else if !response.is_success() {
        return Err(RefreshError::Rejected {
            status: response.status,
            message: "refresh rejected".to_owned(),
            error_code: None,
        });
    }

    let payload = match envelope {
        Some(env) => env.data.unwrap_or(Value::Null),
        None => serde_json::from_slice::<Value>(&response.body).unwrap_or(Value::Null),
    };

    let token_field = |key: &str| {
        payload
            .get(key)
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
    };

    let access_token = token_field("accessToken").ok_or(RefreshError::MissingAccessToken)?;
    Ok(TokenPair { access_token, refresh_token: token_field("refreshToken") })
}

#[cfg(test)]
#[path = "coordinator_test.rs"]
mod tests;
